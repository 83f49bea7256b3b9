//! Flavor collaborators: caption, weather, geolocation and notification
//! providers the engine consumes, plus the simulated defaults.
//!
//! These are deliberately thin contracts. A shell can swap in a real
//! weather lookup or an LLM caption writer; the engine only requires
//! that captions are pure and that the async providers resolve quickly
//! or get cut off by the runtime's timeout.

use futures::future::{ready, BoxFuture, FutureExt};
use rand::seq::SliceRandom;
use rand::Rng;

use tether_shared::types::{ActivityKind, WeatherInfo};

/// Pure flavor text for a presence card. Any non-empty string is valid.
pub trait CaptionSource: Send + Sync {
    fn caption(&self, kind: ActivityKind, status: &str, mood: &str) -> String;
}

/// Optional weather enrichment. Must resolve or be cancelled within the
/// runtime's timeout; a presence update is never gated on it.
pub trait WeatherProvider: Send + Sync {
    fn fetch(&self, coords: Option<(f64, f64)>) -> BoxFuture<'static, Option<WeatherInfo>>;
}

/// Optional coordinates for the weather lookup.
pub trait Geolocator: Send + Sync {
    fn locate(&self) -> BoxFuture<'static, Option<(f64, f64)>>;
}

/// Fire-and-forget notification sink. Must be safe to call when the
/// underlying capability is unavailable.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str, tag: &str);
}

/// The full provider set injected into the engine.
pub struct Providers {
    pub captions: Box<dyn CaptionSource>,
    pub weather: Box<dyn WeatherProvider>,
    pub geolocator: Box<dyn Geolocator>,
    pub notifier: Box<dyn Notifier>,
}

impl Default for Providers {
    fn default() -> Self {
        Self {
            captions: Box::new(CannedCaptions),
            weather: Box::new(SimulatedWeather),
            geolocator: Box::new(NoGeolocator),
            notifier: Box::new(NoopNotifier),
        }
    }
}

// ---------------------------------------------------------------------------
// Default implementations
// ---------------------------------------------------------------------------

/// Picks from a fixed phrase table per activity kind.
pub struct CannedCaptions;

fn phrases(kind: ActivityKind) -> &'static [&'static str] {
    match kind {
        ActivityKind::Work => &[
            "Productivity mode: ON. \u{1F680}",
            "Making moves, not excuses. \u{1F4BC}",
            "In the zone. Do not disturb. \u{1F6D1}",
            "Meeting marathon in progress. \u{1F3C3}",
        ],
        ActivityKind::Coding => &[
            "Debugging the universe. \u{1F4BB}",
            "It works on my machine! \u{1F937}",
            "Turning coffee into code. \u{2615}",
            "Compiling... please wait. \u{23F3}",
        ],
        ActivityKind::Gaming => &[
            "One more level, I promise! \u{1F3AE}",
            "Lag is my only enemy. \u{1F4F6}",
            "Saving the world (virtually). \u{2694}",
            "Respawning in 3... 2... 1... \u{1F9DF}",
        ],
        ActivityKind::Commuting => &[
            "On the move! \u{1F68C}",
            "Traffic jam jamming. \u{1F697}",
            "Podcasting and traveling. \u{1F3A7}",
            "Cruising through the chaos. \u{1F6A6}",
        ],
        ActivityKind::Sleeping => &[
            "Dreaming... \u{1F634}",
            "Recharging batteries. \u{1F50B}",
            "Entering REM cycle. \u{1F4A4}",
            "Offline for maintenance. \u{1F6CC}",
        ],
        ActivityKind::Studying => &[
            "Knowledge is power! \u{1F4DA}",
            "Brain expanding... \u{1F9E0}",
            "Cramming session active. \u{1F4DD}",
            "Library mode engaged. \u{1F910}",
        ],
        ActivityKind::Cooking => &[
            "Chef in the kitchen! \u{1F373}",
            "Don't burn the house down. \u{1F525}",
            "Taste testing in progress. \u{1F944}",
            "Adding a pinch of love. \u{2764}",
        ],
        ActivityKind::Exercising => &[
            "Getting those gains! \u{1F4AA}",
            "Beast mode activated. \u{1F98D}",
            "Running away from problems. \u{1F3C3}",
            "Endorphins loading... \u{1F50B}",
        ],
        ActivityKind::Relaxing => &[
            "Inner peace found. \u{1F9D8}",
            "Doing absolutely nothing. \u{1F343}",
            "Horizontal life. \u{1F6CB}",
            "Recharging the social battery. \u{1F50B}",
        ],
        ActivityKind::Traveling => &[
            "Adventure awaits! \u{2708}",
            "Catch flights, not feelings. \u{1F6EB}",
            "Wanderlust enabled. \u{1F5FA}",
            "Tourist mode: ON. \u{1F4F8}",
        ],
        ActivityKind::Eating => &[
            "Yum! \u{1F355}",
            "Food coma imminent. \u{1F60B}",
            "Feast mode. \u{1F356}",
            "Taste bud party! \u{1F389}",
        ],
        ActivityKind::Custom => &[
            "Living my best life! \u{2728}",
            "Main character energy. \u{1F31F}",
            "Plotting world domination. \u{1F608}",
            "Mystery mode activated. \u{1F575}",
        ],
    }
}

impl CaptionSource for CannedCaptions {
    fn caption(&self, kind: ActivityKind, _status: &str, _mood: &str) -> String {
        let options = phrases(kind);
        options
            .choose(&mut rand::thread_rng())
            .unwrap_or(&options[0])
            .to_string()
    }
}

/// Derives a plausible condition and temperature without any network.
pub struct SimulatedWeather;

const CONDITIONS: &[(&str, &str, std::ops::Range<i32>)] = &[
    ("Sunny", "\u{2600}", 20..35),
    ("Partly Cloudy", "\u{26C5}", 15..25),
    ("Clear Night", "\u{1F319}", 10..18),
    ("Rainy", "\u{1F327}", 12..20),
    ("Windy", "\u{1F4A8}", 10..22),
];

impl WeatherProvider for SimulatedWeather {
    fn fetch(&self, _coords: Option<(f64, f64)>) -> BoxFuture<'static, Option<WeatherInfo>> {
        let mut rng = rand::thread_rng();
        let (condition, icon, range) = &CONDITIONS[rng.gen_range(0..CONDITIONS.len())];
        let info = WeatherInfo {
            temp: rng.gen_range(range.clone()),
            condition: condition.to_string(),
            icon: icon.to_string(),
        };
        ready(Some(info)).boxed()
    }
}

/// No coordinates available.
pub struct NoGeolocator;

impl Geolocator for NoGeolocator {
    fn locate(&self) -> BoxFuture<'static, Option<(f64, f64)>> {
        ready(None).boxed()
    }
}

/// Swallows notifications.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _title: &str, _body: &str, _tag: &str) {}
}
