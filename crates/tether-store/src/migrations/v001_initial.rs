//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `identity`, `own_presence`, `links`,
//! and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Local identity (single row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS identity (
    slot      INTEGER PRIMARY KEY CHECK (slot = 0),
    peer_id   TEXT NOT NULL,                -- UUID v4
    room_code TEXT NOT NULL                 -- 6-char uppercase alphanumeric
);

-- ----------------------------------------------------------------
-- The owner's own presence snapshot (single row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS own_presence (
    slot     INTEGER PRIMARY KEY CHECK (slot = 0),
    snapshot TEXT NOT NULL                  -- JSON PresenceSnapshot
);

-- ----------------------------------------------------------------
-- Confirmed partner links
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS links (
    partner_id        TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    partner_room_code TEXT NOT NULL,
    snapshot          TEXT NOT NULL,              -- JSON PresenceSnapshot
    last_seen_at      TEXT NOT NULL               -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Chat messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4, dedup key
    thread_key TEXT NOT NULL,               -- sorted id pair "lo:hi"
    sender_id  TEXT NOT NULL,               -- UUID v4
    text       TEXT NOT NULL,
    sent_at    TEXT NOT NULL                -- ISO-8601
);

CREATE INDEX IF NOT EXISTS idx_messages_thread_ts
    ON messages(thread_key, sent_at ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
