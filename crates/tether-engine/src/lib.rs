//! # tether-engine
//!
//! The peer synchronization engine: turns a room code into a confirmed
//! bidirectional link, keeps partner presence eventually consistent with
//! last-write-wins merging, and carries the chat and typing traffic
//! between linked peers.
//!
//! The protocol itself lives in [`session::SessionState`], a synchronous
//! state machine with no I/O. [`runtime::spawn_engine`] wraps one session
//! in a tokio task wired to a [`tether_net::Transport`], a
//! [`tether_store::Database`], and the flavor providers, exposing a
//! command/event channel pair to the presentation layer.

pub mod clock;
pub mod config;
pub mod events;
pub mod flavor;
pub mod runtime;
pub mod session;

mod error;

pub use clock::MonotonicClock;
pub use config::EngineConfig;
pub use error::EngineError;
pub use events::EngineEvent;
pub use flavor::Providers;
pub use runtime::{spawn_engine, EngineCommand, EngineHandle, Overview};
pub use session::{Dispatch, LinkState, SessionState};
