//! Engine configuration.

use std::time::Duration;

use tether_shared::constants::{
    ENGINE_CHANNEL_CAPACITY, HANDSHAKE_RESEND_DELAY_MS, WEATHER_TIMEOUT_SECS,
};

/// Tunables for one engine instance. [`Default`] matches the values in
/// [`tether_shared::constants`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay before the single handshake re-send. Covers the race where
    /// the remote subscriber attaches after the first publish. Fixed
    /// delay, no backoff.
    pub handshake_resend_delay: Duration,

    /// Upper bound on geolocation and weather enrichment. A presence
    /// update is published without weather rather than wait longer.
    pub weather_timeout: Duration,

    /// Capacity of the command and event channels.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            handshake_resend_delay: Duration::from_millis(HANDSHAKE_RESEND_DELAY_MS),
            weather_timeout: Duration::from_secs(WEATHER_TIMEOUT_SECS),
            channel_capacity: ENGINE_CHANNEL_CAPACITY,
        }
    }
}
