use thiserror::Error;

use tether_net::TransportError;
use tether_shared::types::PeerId;
use tether_store::StoreError;

/// Errors surfaced by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No link with partner {0}")]
    UnknownPartner(PeerId),

    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Message text is too long")]
    MessageTooLong,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
