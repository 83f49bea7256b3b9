use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::types::{PeerId, PresenceSnapshot, RoomCode};

/// A single chat message. Never mutated after creation; threads only
/// append or bulk-delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique id, the deduplication key under at-least-once delivery.
    pub id: Uuid,
    pub sender_id: PeerId,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Derive the thread key for a peer pairing.
///
/// Both sides must arrive at the same key independently, so the two ids
/// are sorted before joining. The argument order does not matter.
pub fn thread_key(a: PeerId, b: PeerId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}

/// Everything a peer ever puts on the wire.
///
/// `sender_id` is carried on every envelope so receivers can discard their
/// own broadcasts; `sender_room_code` lets a handshake receiver address
/// its reply. Per-payload targets carry the rest of the routing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub sender_id: PeerId,
    pub sender_room_code: RoomCode,
    pub payload: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Payload {
    /// Link establishment. Carries the sender's full snapshot so the
    /// receiver can create its LinkRecord without a follow-up round trip.
    HandshakeRequest {
        target_room_code: RoomCode,
        snapshot: PresenceSnapshot,
        is_initiator: bool,
    },

    /// Full-snapshot presence broadcast to every linked partner.
    PresenceUpdate { snapshot: PresenceSnapshot },

    /// Chat message for one specific partner.
    Chat { target_id: PeerId, message: Message },

    /// Ephemeral composing indicator. Never persisted, never replayed.
    Typing { target_id: PeerId, is_typing: bool },

    /// Tear down the link with one specific partner. Fire-and-forget,
    /// no acknowledgement.
    Unlink { target_id: PeerId },
}

impl Payload {
    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HandshakeRequest { .. } => "handshake_request",
            Self::PresenceUpdate { .. } => "presence_update",
            Self::Chat { .. } => "chat",
            Self::Typing { .. } => "typing",
            Self::Unlink { .. } => "unlink",
        }
    }
}

impl Envelope {
    /// Serialize to binary (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        bincode::deserialize(data).map_err(|_| ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gender;

    #[test]
    fn test_envelope_roundtrip() {
        let sender = PeerId::generate();
        let env = Envelope {
            sender_id: sender,
            sender_room_code: RoomCode::generate(),
            payload: Payload::Chat {
                target_id: PeerId::generate(),
                message: Message {
                    id: Uuid::new_v4(),
                    sender_id: sender,
                    text: "see you at eight".to_string(),
                    sent_at: Utc::now(),
                },
            },
        };

        let bytes = env.to_bytes().unwrap();
        let restored = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(env, restored);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(Envelope::from_bytes(&[0xFF; 7]).is_err());
    }

    #[test]
    fn test_thread_key_symmetric() {
        let a = PeerId::generate();
        let b = PeerId::generate();
        assert_eq!(thread_key(a, b), thread_key(b, a));
        assert_ne!(thread_key(a, b), thread_key(a, a));
    }

    #[test]
    fn test_handshake_carries_snapshot() {
        let env = Envelope {
            sender_id: PeerId::generate(),
            sender_room_code: RoomCode::generate(),
            payload: Payload::HandshakeRequest {
                target_room_code: RoomCode::generate(),
                snapshot: PresenceSnapshot::new("Ada", Gender::Female, Utc::now()),
                is_initiator: true,
            },
        };

        let restored = Envelope::from_bytes(&env.to_bytes().unwrap()).unwrap();
        match restored.payload {
            Payload::HandshakeRequest { snapshot, .. } => assert_eq!(snapshot.name, "Ada"),
            other => panic!("unexpected payload {:?}", other.kind()),
        }
    }
}
