//! # tether-shared
//!
//! Types shared by every Tether crate: peer identity and addressing,
//! the presence data model, and the wire protocol envelopes exchanged
//! between peers.

pub mod constants;
pub mod identity;
pub mod protocol;
pub mod types;

mod error;

pub use error::{ProtocolError, RoomCodeError, TetherError};
pub use identity::PeerIdentity;
pub use types::{PeerId, RoomCode};
