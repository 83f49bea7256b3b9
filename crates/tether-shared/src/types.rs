use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
use crate::error::RoomCodeError;

// Permanent opaque peer identifier. Generated once per installation,
// never rotated. All linking and merging is keyed by this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub Uuid);

impl PeerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short human-shareable address used for initial discovery only.
/// Rotatable at will; active links are keyed by [`PeerId`], not by code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a fresh random code over `A-Z0-9`.
    ///
    /// Enough entropy that two strangers seeking at the same moment are
    /// unlikely to collide; not a secret and not cryptographically strong.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse user input: trims, uppercases, validates charset and length.
    pub fn parse(input: &str) -> Result<Self, RoomCodeError> {
        let code = input.trim().to_ascii_uppercase();
        if let Some(bad) = code.chars().find(|&c| !matches!(c, 'A'..='Z' | '0'..='9')) {
            return Err(RoomCodeError::Charset(bad));
        }
        if code.len() != ROOM_CODE_LEN {
            return Err(RoomCodeError::Length {
                expected: ROOM_CODE_LEN,
                got: code.len(),
            });
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Avatar glyph selection only; carried opaquely through the protocol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// What a peer is currently doing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Work,
    Coding,
    Gaming,
    Commuting,
    Sleeping,
    Studying,
    Cooking,
    Exercising,
    Relaxing,
    Traveling,
    Eating,
    Custom,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Coding => "Coding",
            Self::Gaming => "Gaming",
            Self::Commuting => "Commuting",
            Self::Sleeping => "Sleeping",
            Self::Studying => "Studying",
            Self::Cooking => "Cooking",
            Self::Exercising => "Exercising",
            Self::Relaxing => "Relaxing",
            Self::Traveling => "Traveling",
            Self::Eating => "Eating",
            Self::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherInfo {
    /// Temperature in degrees Celsius.
    pub temp: i32,
    /// Short condition description, e.g. "Partly Cloudy".
    pub condition: String,
    /// Weather emoji.
    pub icon: String,
}

/// A peer's current activity with its flavor text and enrichment.
///
/// `updated_at` strictly increases on every local mutation of the owner's
/// own snapshot and is the sole tie-breaker when merging remote copies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub kind: ActivityKind,
    /// Only meaningful when `kind` is [`ActivityKind::Custom`].
    pub custom_label: Option<String>,
    pub status_label: String,
    pub mood_label: String,
    pub caption: String,
    pub weather: Option<WeatherInfo>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// The activity a fresh installation starts out with.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            kind: ActivityKind::Relaxing,
            custom_label: None,
            status_label: "Active now".to_string(),
            mood_label: "\u{1F60A} Happy".to_string(),
            caption: "Settling in.".to_string(),
            weather: None,
            updated_at: now,
        }
    }

    /// Display name for the activity, preferring the custom label.
    pub fn display_label(&self) -> &str {
        match (&self.kind, &self.custom_label) {
            (ActivityKind::Custom, Some(label)) => label,
            _ => self.kind.label(),
        }
    }
}

/// Full representation of a peer's presence. Always replaces, never
/// patches, a stored copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceSnapshot {
    pub name: String,
    pub avatar: Option<String>,
    pub gender: Gender,
    pub activity: Activity,
}

impl PresenceSnapshot {
    pub fn new(name: impl Into<String>, gender: Gender, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            avatar: None,
            gender,
            activity: Activity::initial(now),
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.activity.updated_at
    }
}

/// The authoritative local view of one confirmed partner.
///
/// Created on handshake completion, refreshed on every accepted inbound
/// envelope from the partner, deleted on unlink. Written only by its
/// holder, never by the partner it describes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkRecord {
    pub partner_id: PeerId,
    pub partner_room_code: RoomCode,
    pub partner_snapshot: PresenceSnapshot,
    pub last_seen_at: DateTime<Utc>,
}

impl LinkRecord {
    /// A partner is online if heard from within the liveness window.
    /// Derived on read, never stored.
    pub fn is_online(&self, now: DateTime<Utc>) -> bool {
        now - self.last_seen_at < chrono::Duration::seconds(crate::constants::LIVENESS_WINDOW_SECS)
    }
}
