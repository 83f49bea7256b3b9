//! Events the engine emits toward the presentation layer.

use serde::Serialize;

use tether_shared::protocol::Message;
use tether_shared::types::{LinkRecord, PeerId, RoomCode};

/// State changes worth reflecting in a UI, in the order they happened.
#[derive(Debug, Clone, Serialize)]
pub enum EngineEvent {
    /// A handshake completed and a new partner link exists.
    LinkEstablished { record: LinkRecord },

    /// A partner's snapshot was replaced by a newer one.
    /// `activity_changed` is set when the activity itself moved, not just
    /// mood or flavor text, and is what drives notifications.
    PartnerUpdated {
        record: LinkRecord,
        activity_changed: bool,
    },

    /// A link was torn down, either locally or by the partner.
    PartnerUnlinked {
        partner_id: PeerId,
        remote_initiated: bool,
    },

    /// An inbound chat message was appended to a thread.
    MessageReceived { thread_key: String, message: Message },

    /// A partner started or stopped composing.
    TypingChanged { partner_id: PeerId, is_typing: bool },

    /// The local room code was rotated.
    RoomCodeRotated { room_code: RoomCode },
}

impl EngineEvent {
    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LinkEstablished { .. } => "link_established",
            Self::PartnerUpdated { .. } => "partner_updated",
            Self::PartnerUnlinked { .. } => "partner_unlinked",
            Self::MessageReceived { .. } => "message_received",
            Self::TypingChanged { .. } => "typing_changed",
            Self::RoomCodeRotated { .. } => "room_code_rotated",
        }
    }
}
