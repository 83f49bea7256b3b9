//! The transport abstraction the session engine is built against.
//!
//! A transport is a multi-writer broadcast medium: every published
//! envelope is delivered to every subscriber, including the publisher's
//! own subscription. Relevance filtering (self-filter, room-code and
//! partner-id addressing) happens above this layer, so a transport can be
//! swapped for a cloud-backed one without touching protocol code.

use futures::stream::BoxStream;
use thiserror::Error;

use tether_shared::protocol::Envelope;

/// Stream of inbound envelopes handed to a subscriber.
pub type EnvelopeStream = BoxStream<'static, Envelope>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport channel closed")]
    Closed,

    #[error("Publish failed: {0}")]
    Publish(String),
}

/// Abstract broadcast/pub-sub channel.
///
/// One instance is created per process and injected into the engine.
/// `publish` is fire-and-forget; delivery is best effort.
pub trait Transport: Send + Sync {
    fn publish(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Attach a new subscriber. Dropping the returned stream detaches it.
    fn subscribe(&self) -> EnvelopeStream;
}
