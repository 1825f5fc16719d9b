//! Protocol message definitions
//!
//! Defines the message types exchanged between participants and the relay.
//! All messages are JSON text frames tagged by an `event` field, with
//! camelCase payload fields to match the deployed browser client.
//!
//! Signaling payloads are opaque: the relay carries them as raw JSON values
//! and never parses, validates, or stores their contents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::session::{ConnectionId, ParticipantSession, Position};

// ============================================================================
// Error Types
// ============================================================================

/// Protocol-related errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

// ============================================================================
// Client Messages
// ============================================================================

/// Messages sent from a participant to the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Claim an avatar identity and display name
    #[serde(rename_all = "camelCase")]
    RegisterCharacter {
        /// Avatar identity token from the client's character catalog
        character_id: String,
        /// Human-readable display name
        user_name: String,
    },

    /// Report a new position
    ///
    /// The server applies the coordinates as sent; bounds are a client-side
    /// rendering concern.
    Move { x: f64, y: f64 },

    /// Relay an opaque call-setup payload to another connection
    Signal {
        /// Connection id of the addressed peer
        to: ConnectionId,
        /// Opaque offer/answer/candidate data, forwarded verbatim
        signal: Value,
    },
}

impl ClientMessage {
    /// Parse a client message from a JSON text frame
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the message to JSON (primarily for testing)
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Create a RegisterCharacter message
    pub fn register_character(
        character_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        ClientMessage::RegisterCharacter {
            character_id: character_id.into(),
            user_name: user_name.into(),
        }
    }

    /// Create a Move message
    pub fn move_to(x: f64, y: f64) -> Self {
        ClientMessage::Move { x, y }
    }

    /// Create a Signal message
    pub fn signal(to: ConnectionId, signal: Value) -> Self {
        ClientMessage::Signal { to, signal }
    }
}

// ============================================================================
// Server Messages
// ============================================================================

/// Messages sent from the relay to participants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Full participant-list snapshot
    ///
    /// Sent to every connection after any registry mutation, and privately to
    /// a newcomer on connect. No diffing, no sequence numbers: the last
    /// delivered snapshot wins on the client.
    AllUsers { users: Vec<UserEntry> },

    /// Registration rejected: the identity is already held
    ///
    /// Sent only to the requesting connection; no shared state changed.
    #[serde(rename_all = "camelCase")]
    CharacterTaken { character_id: String },

    /// Opaque call-setup payload relayed from another participant
    Signal {
        /// Connection id of the sender
        from: ConnectionId,
        /// Opaque payload, delivered unchanged
        signal: Value,
    },
}

/// One participant in an `all-users` snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    /// Addressing key for signaling
    pub connection_id: ConnectionId,
    /// Avatar identity; omitted while the session is anonymous
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    /// Last reported position
    pub position: Position,
    /// Display name; omitted while the session is anonymous
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl From<&ParticipantSession> for UserEntry {
    fn from(session: &ParticipantSession) -> Self {
        Self {
            connection_id: session.connection_id,
            character_id: session.profile.as_ref().map(|p| p.character_id.clone()),
            position: session.position,
            user_name: session.profile.as_ref().map(|p| p.user_name.clone()),
        }
    }
}

impl ServerMessage {
    /// Serialize the message to JSON
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Create an AllUsers snapshot from registry sessions
    pub fn all_users(sessions: &[ParticipantSession]) -> Self {
        ServerMessage::AllUsers {
            users: sessions.iter().map(UserEntry::from).collect(),
        }
    }

    /// Create a CharacterTaken message
    pub fn character_taken(character_id: impl Into<String>) -> Self {
        ServerMessage::CharacterTaken {
            character_id: character_id.into(),
        }
    }

    /// Create a Signal message
    pub fn signal(from: ConnectionId, signal: Value) -> Self {
        ServerMessage::Signal { from, signal }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ParticipantSession, Profile};
    use serde_json::json;
    use uuid::Uuid;

    // -------------------------------------------------------------------------
    // Client Message Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_register_character_serialization() {
        let msg = ClientMessage::register_character("char1", "Ann");
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"event\":\"register-character\""));
        assert!(json.contains("\"characterId\":\"char1\""));
        assert!(json.contains("\"userName\":\"Ann\""));

        let parsed = ClientMessage::from_json(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_move_serialization() {
        let msg = ClientMessage::move_to(110.0, 100.0);
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"event\":\"move\""));
        assert!(json.contains("\"x\":110.0"));

        let parsed = ClientMessage::from_json(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_signal_payload_survives_round_trip() {
        let to = Uuid::new_v4();
        let payload = json!({
            "type": "offer",
            "sdp": "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n",
        });
        let msg = ClientMessage::signal(to, payload.clone());
        let json = msg.to_json().unwrap();

        match ClientMessage::from_json(&json).unwrap() {
            ClientMessage::Signal { to: parsed_to, signal } => {
                assert_eq!(parsed_to, to);
                assert_eq!(signal, payload);
            }
            other => panic!("Expected Signal, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_client_message() {
        assert!(ClientMessage::from_json("not json").is_err());
        assert!(ClientMessage::from_json(r#"{"event":"teleport"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"event":"move","x":1.0}"#).is_err());
    }

    // -------------------------------------------------------------------------
    // Server Message Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_all_users_serialization() {
        let mut registered = ParticipantSession::anonymous(Uuid::new_v4(), 0);
        registered.profile = Some(Profile {
            character_id: "char1".to_string(),
            user_name: "Ann".to_string(),
        });
        let anonymous = ParticipantSession::anonymous(Uuid::new_v4(), 1);

        let msg = ServerMessage::all_users(&[registered, anonymous]);
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"event\":\"all-users\""));
        assert!(json.contains("\"characterId\":\"char1\""));
        assert!(json.contains("\"userName\":\"Ann\""));
        assert!(json.contains("\"x\":100.0"));

        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_anonymous_entry_omits_identity_fields() {
        let anonymous = ParticipantSession::anonymous(Uuid::new_v4(), 0);
        let json = ServerMessage::all_users(&[anonymous]).to_json().unwrap();
        assert!(!json.contains("characterId"));
        assert!(!json.contains("userName"));
    }

    #[test]
    fn test_character_taken_serialization() {
        let msg = ServerMessage::character_taken("char1");
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"event\":\"character-taken\""));
        assert!(json.contains("\"characterId\":\"char1\""));

        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_server_signal_serialization() {
        let from = Uuid::new_v4();
        let msg = ServerMessage::signal(from, json!({"candidate": "candidate:1 1 UDP"}));
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"event\":\"signal\""));
        assert!(json.contains(&format!("\"from\":\"{from}\"")));

        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }
}
