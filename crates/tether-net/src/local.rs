//! In-process broadcast hub.
//!
//! Fan-out over [`tokio::sync::broadcast`]: every subscriber sees every
//! published envelope. Envelopes travel encoded, exactly as they would on
//! a real shared channel, so malformed traffic is dropped here at the
//! transport boundary and never reaches protocol code. Publishing with no
//! subscribers attached succeeds and the envelope is simply dropped,
//! matching the fire-and-forget contract of the protocol.

use futures::stream::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use tether_shared::constants::HUB_CHANNEL_CAPACITY;
use tether_shared::protocol::Envelope;

use crate::transport::{EnvelopeStream, Transport, TransportError};

/// Local fan-out transport shared by every peer in the process.
#[derive(Debug, Clone)]
pub struct LocalHub {
    tx: broadcast::Sender<Vec<u8>>,
}

impl LocalHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new(HUB_CHANNEL_CAPACITY)
    }
}

impl Transport for LocalHub {
    fn publish(&self, envelope: Envelope) -> Result<(), TransportError> {
        let data = envelope
            .to_bytes()
            .map_err(|e| TransportError::Publish(e.to_string()))?;

        debug!(
            sender = %envelope.sender_id.short(),
            kind = envelope.payload.kind(),
            len = data.len(),
            subscribers = self.tx.receiver_count(),
            "hub publish"
        );

        // send only errors when no receiver is attached; a broadcast into
        // an empty room is not a failure.
        let _ = self.tx.send(data);
        Ok(())
    }

    fn subscribe(&self) -> EnvelopeStream {
        let rx = self.tx.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(data) => match Envelope::from_bytes(&data) {
                        Ok(envelope) => return Some((envelope, rx)),
                        Err(e) => {
                            warn!(len = data.len(), error = %e, "dropping undecodable envelope");
                            continue;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber lagged, oldest envelopes dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}
