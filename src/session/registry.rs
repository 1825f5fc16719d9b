//! Session registry and identity allocation
//!
//! The registry is the single authoritative store of live sessions. Every
//! snapshot is derived from its current contents; nothing is cached elsewhere.
//! It is plain synchronous state, owned exclusively by the [`SessionHub`],
//! which serializes all access behind one lock.
//!
//! [`SessionHub`]: super::SessionHub

use std::collections::HashMap;

use super::{ConnectionId, ParticipantSession, Profile, SPAWN_POSITION};

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Identity claimed; the session now carries the profile and sits at the
    /// spawn position.
    Accepted,
    /// Another live session already holds this character id.
    Rejected { character_id: String },
    /// The connection vanished before the request was applied; nothing to do.
    Gone,
}

/// Authoritative store of all live participant sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, ParticipantSession>,
    next_seq: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions, anonymous ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Insert an anonymous session for a freshly accepted connection.
    ///
    /// Connection ids are fresh v4 UUIDs, so a collision with a live entry is
    /// unreachable in normal operation; if it ever happens the stale entry is
    /// replaced.
    pub fn insert(&mut self, connection_id: ConnectionId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.sessions
            .insert(connection_id, ParticipantSession::anonymous(connection_id, seq));
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&ParticipantSession> {
        self.sessions.get(&connection_id)
    }

    /// Update a session's position. Returns `false` when the session no longer
    /// exists (a late `move` after disconnect is silently dropped).
    ///
    /// Anonymous sessions may move too; only identity uniqueness requires
    /// registration.
    pub fn set_position(&mut self, connection_id: ConnectionId, x: f64, y: f64) -> bool {
        match self.sessions.get_mut(&connection_id) {
            Some(session) => {
                session.position.x = x;
                session.position.y = y;
                true
            }
            None => false,
        }
    }

    /// Remove a session. Idempotent; returns `false` when it was already gone.
    pub fn remove(&mut self, connection_id: ConnectionId) -> bool {
        self.sessions.remove(&connection_id).is_some()
    }

    /// Copy out all live sessions in insertion order.
    ///
    /// Consumers key on connection/character id; the ordering only keeps
    /// successive snapshots stable.
    pub fn snapshot(&self) -> Vec<ParticipantSession> {
        let mut sessions: Vec<ParticipantSession> = self.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.joined_seq);
        sessions
    }

    /// Attempt to claim `character_id` for `connection_id`.
    ///
    /// Rejected when any *other* live session holds the id; re-registration by
    /// the same connection with the same id is accepted. On acceptance the
    /// profile is set and the position reset to the spawn point, even if the
    /// participant had moved before a prior registration attempt.
    pub fn try_register(
        &mut self,
        connection_id: ConnectionId,
        character_id: String,
        user_name: String,
    ) -> RegisterOutcome {
        let taken = self.sessions.values().any(|s| {
            s.connection_id != connection_id && s.character_id() == Some(character_id.as_str())
        });

        match self.sessions.get_mut(&connection_id) {
            None => RegisterOutcome::Gone,
            Some(_) if taken => RegisterOutcome::Rejected { character_id },
            Some(session) => {
                session.profile = Some(Profile {
                    character_id,
                    user_name,
                });
                session.position = SPAWN_POSITION;
                RegisterOutcome::Accepted
            }
        }
    }
}
