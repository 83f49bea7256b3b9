//! # tether-store
//!
//! Local persistence for a Tether peer: the installation identity, the
//! owner's last presence snapshot, the set of confirmed partner links,
//! and the chat threads.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every
//! persisted record. A restart resumes from exactly this state.

pub mod database;
pub mod identity;
pub mod migrations;
pub mod presence;
pub mod threads;

mod error;

pub use database::Database;
pub use error::StoreError;
