//! Participant session data model
//!
//! A session is created when a WebSocket connection is accepted and lives until
//! that connection closes. It starts anonymous; a successful registration
//! attaches an avatar profile and places the participant at the spawn point.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one live transport connection.
///
/// Assigned by the transport layer when the connection is accepted, unique and
/// stable for the connection's lifetime, and used as the addressing key for
/// broadcasts and signaling.
pub type ConnectionId = Uuid;

/// Position every participant is placed at by a successful registration.
pub const SPAWN_POSITION: Position = Position { x: 100.0, y: 100.0 };

/// A 2-D coordinate in the shared space.
///
/// The server does not validate bounds; the client clamps movement to its map
/// cosmetically and the server trusts the value as sent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Avatar identity claimed by a registered participant.
///
/// `character_id` comes from a small fixed catalog on the client; the server
/// only cares that no two live sessions hold the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub character_id: String,
    pub user_name: String,
}

/// One connected, possibly-identified client.
#[derive(Debug, Clone)]
pub struct ParticipantSession {
    /// Addressing key for this session's transport connection.
    pub connection_id: ConnectionId,
    /// Avatar profile; `None` until registration succeeds.
    pub profile: Option<Profile>,
    /// Last reported position.
    pub position: Position,
    /// Monotonic insertion order, used to keep snapshots stable.
    pub joined_seq: u64,
}

impl ParticipantSession {
    /// Create an anonymous session for a freshly accepted connection.
    pub fn anonymous(connection_id: ConnectionId, joined_seq: u64) -> Self {
        Self {
            connection_id,
            profile: None,
            position: SPAWN_POSITION,
            joined_seq,
        }
    }

    /// The character id this session holds, if registered.
    pub fn character_id(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.character_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_session() {
        let id = Uuid::new_v4();
        let session = ParticipantSession::anonymous(id, 3);
        assert_eq!(session.connection_id, id);
        assert!(session.profile.is_none());
        assert_eq!(session.position, SPAWN_POSITION);
        assert_eq!(session.joined_seq, 3);
        assert_eq!(session.character_id(), None);
    }

    #[test]
    fn test_character_id_after_profile() {
        let mut session = ParticipantSession::anonymous(Uuid::new_v4(), 0);
        session.profile = Some(Profile {
            character_id: "char1".to_string(),
            user_name: "Ann".to_string(),
        });
        assert_eq!(session.character_id(), Some("char1"));
    }
}
