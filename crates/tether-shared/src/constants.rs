/// Application name
pub const APP_NAME: &str = "Tether";

/// Length of a room code in characters
pub const ROOM_CODE_LEN: usize = 6;

/// Characters a room code may contain
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Delay before the single handshake re-send, in milliseconds
pub const HANDSHAKE_RESEND_DELAY_MS: u64 = 500;

/// A partner counts as online if heard from within this window, in seconds
pub const LIVENESS_WINDOW_SECS: i64 = 120;

/// Upper bound on geolocation + weather enrichment, in seconds
pub const WEATHER_TIMEOUT_SECS: u64 = 3;

/// Maximum length of a chat message in characters
pub const MAX_CHAT_TEXT_LEN: usize = 2_000;

/// Maximum length of a custom activity label in characters
pub const MAX_CUSTOM_LABEL_LEN: usize = 20;

/// Capacity of the in-process broadcast hub
pub const HUB_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the engine command and event channels
pub const ENGINE_CHANNEL_CAPACITY: usize = 256;
