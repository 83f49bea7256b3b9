//! Persistence of the owner's snapshot and the partner [`LinkRecord`]s.
//!
//! Snapshots are stored as JSON columns. They are full-replacement values
//! in the protocol, so a whole-column rewrite per update is the natural
//! storage shape.

use chrono::{DateTime, Utc};
use rusqlite::params;

use tether_shared::types::{LinkRecord, PeerId, PresenceSnapshot, RoomCode};

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    // ------------------------------------------------------------------
    // Own snapshot
    // ------------------------------------------------------------------

    /// Write (or overwrite) the owner's presence snapshot.
    pub fn save_own_snapshot(&self, snapshot: &PresenceSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.conn().execute(
            "INSERT INTO own_presence (slot, snapshot) VALUES (0, ?1)
             ON CONFLICT(slot) DO UPDATE SET snapshot = ?1",
            params![json],
        )?;
        Ok(())
    }

    /// Load the owner's last persisted snapshot, if any.
    pub fn load_own_snapshot(&self) -> Result<Option<PresenceSnapshot>> {
        let row = self.conn().query_row(
            "SELECT snapshot FROM own_presence WHERE slot = 0",
            [],
            |row| row.get::<_, String>(0),
        );

        match row {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    // ------------------------------------------------------------------
    // Partner links
    // ------------------------------------------------------------------

    /// Insert or replace the link record for a partner.
    pub fn upsert_link(&self, record: &LinkRecord) -> Result<()> {
        let json = serde_json::to_string(&record.partner_snapshot)?;
        self.conn().execute(
            "INSERT INTO links (partner_id, partner_room_code, snapshot, last_seen_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(partner_id) DO UPDATE SET
                 partner_room_code = ?2,
                 snapshot = ?3,
                 last_seen_at = ?4",
            params![
                record.partner_id.to_string(),
                record.partner_room_code.as_str(),
                json,
                record.last_seen_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Delete the link record for a partner. Returns whether a row existed.
    pub fn delete_link(&self, partner_id: PeerId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM links WHERE partner_id = ?1",
            params![partner_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Load every persisted link record.
    pub fn list_links(&self) -> Result<Vec<LinkRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT partner_id, partner_room_code, snapshot, last_seen_at FROM links",
        )?;

        let rows = stmt.query_map([], |row| {
            let partner_id: String = row.get(0)?;
            let code: String = row.get(1)?;
            let json: String = row.get(2)?;
            let last_seen: String = row.get(3)?;
            Ok((partner_id, code, json, last_seen))
        })?;

        let mut links = Vec::new();
        for row in rows {
            let (partner_id, code, json, last_seen) = row?;
            links.push(LinkRecord {
                partner_id: PeerId::parse(&partner_id)?,
                partner_room_code: RoomCode::parse(&code)
                    .map_err(|e| StoreError::Corrupt(format!("room code: {e}")))?,
                partner_snapshot: serde_json::from_str(&json)?,
                last_seen_at: parse_timestamp(&last_seen)?,
            });
        }
        Ok(links)
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_shared::types::Gender;

    fn test_record() -> LinkRecord {
        let now = Utc::now();
        LinkRecord {
            partner_id: PeerId::generate(),
            partner_room_code: RoomCode::generate(),
            partner_snapshot: PresenceSnapshot::new("Remote", Gender::Male, now),
            last_seen_at: now,
        }
    }

    #[test]
    fn own_snapshot_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_own_snapshot().unwrap().is_none());

        let snapshot = PresenceSnapshot::new("Me", Gender::Female, Utc::now());
        db.save_own_snapshot(&snapshot).unwrap();

        let reloaded = db.load_own_snapshot().unwrap().unwrap();
        assert_eq!(reloaded, snapshot);
    }

    #[test]
    fn link_upsert_replaces() {
        let db = Database::open_in_memory().unwrap();
        let mut record = test_record();

        db.upsert_link(&record).unwrap();
        record.partner_snapshot.name = "Renamed".to_string();
        db.upsert_link(&record).unwrap();

        let links = db.list_links().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].partner_snapshot.name, "Renamed");
    }

    #[test]
    fn delete_link_reports_existence() {
        let db = Database::open_in_memory().unwrap();
        let record = test_record();

        db.upsert_link(&record).unwrap();
        assert!(db.delete_link(record.partner_id).unwrap());
        assert!(!db.delete_link(record.partner_id).unwrap());
        assert!(db.list_links().unwrap().is_empty());
    }
}
