use serde::{Deserialize, Serialize};

use crate::types::{PeerId, RoomCode};

/// A peer's local identity: the permanent id plus the rotatable room code.
/// No account, no email, no phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerIdentity {
    id: PeerId,
    room_code: RoomCode,
}

impl PeerIdentity {
    /// Generate a fresh identity on first run.
    pub fn generate() -> Self {
        Self {
            id: PeerId::generate(),
            room_code: RoomCode::generate(),
        }
    }

    /// Restore a previously persisted identity.
    pub fn from_parts(id: PeerId, room_code: RoomCode) -> Self {
        Self { id, room_code }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    /// Replace the room code with a freshly generated one.
    ///
    /// Existing links are keyed by id and are unaffected; the old code
    /// simply stops being discoverable.
    pub fn rotate_room_code(&mut self) -> RoomCode {
        self.room_code = RoomCode::generate();
        self.room_code.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_generation() {
        let a = PeerIdentity::generate();
        let b = PeerIdentity::generate();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_rotation_keeps_id() {
        let mut identity = PeerIdentity::generate();
        let id_before = identity.id();
        let code_before = identity.room_code().clone();

        let new_code = identity.rotate_room_code();

        assert_eq!(identity.id(), id_before);
        assert_eq!(identity.room_code(), &new_code);
        // A 36^6 space makes a repeat effectively impossible in one draw.
        assert_ne!(identity.room_code(), &code_before);
    }
}
