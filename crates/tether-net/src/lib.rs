// Transport layer: an abstract broadcast channel plus the in-process
// fan-out implementation used by local sessions and tests.

pub mod local;
pub mod transport;

pub use local::LocalHub;
pub use transport::{EnvelopeStream, Transport, TransportError};
