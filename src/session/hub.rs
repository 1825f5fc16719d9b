//! Session hub: presence broadcasting and signaling relay
//!
//! The hub is the single ownership point for shared state. It holds the
//! [`SessionRegistry`] together with one outbound channel per live connection
//! behind one mutex, so every mutation and the sends it produces form one
//! atomic step in a single global ordering domain. Connection tasks never
//! touch the registry directly.

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use super::{ConnectionId, RegisterOutcome, SessionRegistry};
use crate::server::ServerMessage;

/// Outbound channel for one connection, drained by that connection's task.
///
/// Unbounded so sends never block while the hub lock is held; a send to a
/// connection that is tearing down simply fails and is ignored.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

struct HubState {
    registry: SessionRegistry,
    senders: HashMap<ConnectionId, OutboundSender>,
}

/// Coordinates all live connections.
///
/// The hub:
/// - Maintains the authoritative session registry
/// - Broadcasts a full snapshot to every connection after each mutation
/// - Relays opaque signaling payloads between two named connections
pub struct SessionHub {
    state: Mutex<HubState>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState {
                registry: SessionRegistry::new(),
                senders: HashMap::new(),
            }),
        }
    }

    /// Number of live connections.
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    /// Admit a freshly accepted connection.
    ///
    /// Inserts an anonymous session and sends the current snapshot privately
    /// to the newcomer, so it cannot miss state that changed before the first
    /// broadcast it observes.
    pub async fn connect(&self, connection_id: ConnectionId, sender: OutboundSender) {
        let mut state = self.state.lock().await;
        state.registry.insert(connection_id);
        state.senders.insert(connection_id, sender);

        let snapshot = ServerMessage::all_users(&state.registry.snapshot());
        if let Some(tx) = state.senders.get(&connection_id) {
            let _ = tx.send(snapshot);
        }
        info!("Participant {} connected", connection_id);
    }

    /// Attempt to claim an avatar identity for a connection.
    ///
    /// On acceptance every connection receives the new snapshot; on rejection
    /// only the requester is told, since no shared state changed.
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        character_id: String,
        user_name: String,
    ) -> RegisterOutcome {
        let mut state = self.state.lock().await;
        let outcome = state
            .registry
            .try_register(connection_id, character_id, user_name);

        match &outcome {
            RegisterOutcome::Accepted => {
                info!("Participant {} registered", connection_id);
                broadcast_snapshot(&state);
            }
            RegisterOutcome::Rejected { character_id } => {
                debug!(
                    "Participant {} rejected: character {} already taken",
                    connection_id, character_id
                );
                if let Some(tx) = state.senders.get(&connection_id) {
                    let _ = tx.send(ServerMessage::character_taken(character_id.clone()));
                }
            }
            RegisterOutcome::Gone => {
                debug!("Registration from vanished connection {}", connection_id);
            }
        }
        outcome
    }

    /// Apply a position update and broadcast the new snapshot.
    ///
    /// A late `move` from a connection that already disconnected is silently
    /// dropped.
    pub async fn move_to(&self, connection_id: ConnectionId, x: f64, y: f64) {
        let mut state = self.state.lock().await;
        if state.registry.set_position(connection_id, x, y) {
            broadcast_snapshot(&state);
        } else {
            debug!("Move from vanished connection {}", connection_id);
        }
    }

    /// Relay an opaque signaling payload to the addressed connection.
    ///
    /// Best-effort: if `to` does not resolve to a live connection the message
    /// is dropped and the sender is not informed. Delivery confirmation, if
    /// needed, belongs to the peers' own protocol layer.
    pub async fn forward_signal(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        payload: serde_json::Value,
    ) {
        let state = self.state.lock().await;
        match state.senders.get(&to) {
            Some(tx) => {
                let _ = tx.send(ServerMessage::signal(from, payload));
                debug!("Relayed signal {} -> {}", from, to);
            }
            None => {
                debug!("Dropped signal {} -> {}: target not live", from, to);
            }
        }
    }

    /// Remove a connection and broadcast the shrunken snapshot.
    ///
    /// Idempotent: a second call for the same id does nothing and triggers no
    /// second broadcast.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.state.lock().await;
        state.senders.remove(&connection_id);
        if state.registry.remove(connection_id) {
            info!("Participant {} disconnected", connection_id);
            broadcast_snapshot(&state);
        }
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Send the current snapshot to every live connection.
///
/// Must be called with the hub lock held so the snapshot and its delivery
/// order are consistent across connections. Send failures mean the receiving
/// task is tearing down; its own disconnect path cleans up.
fn broadcast_snapshot(state: &HubState) {
    let snapshot = ServerMessage::all_users(&state.registry.snapshot());
    for tx in state.senders.values() {
        let _ = tx.send(snapshot.clone());
    }
}
