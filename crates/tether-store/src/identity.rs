//! Persistence of the single local [`PeerIdentity`].

use rusqlite::params;

use tether_shared::types::{PeerId, RoomCode};
use tether_shared::PeerIdentity;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Write (or overwrite) the local identity.
    pub fn save_identity(&self, identity: &PeerIdentity) -> Result<()> {
        self.conn().execute(
            "INSERT INTO identity (slot, peer_id, room_code) VALUES (0, ?1, ?2)
             ON CONFLICT(slot) DO UPDATE SET peer_id = ?1, room_code = ?2",
            params![identity.id().to_string(), identity.room_code().as_str()],
        )?;
        Ok(())
    }

    /// Load the local identity, if one has been persisted.
    pub fn load_identity(&self) -> Result<Option<PeerIdentity>> {
        let row = self
            .conn()
            .query_row(
                "SELECT peer_id, room_code FROM identity WHERE slot = 0",
                [],
                |row| {
                    let id: String = row.get(0)?;
                    let code: String = row.get(1)?;
                    Ok((id, code))
                },
            );

        match row {
            Ok((id, code)) => {
                let id = PeerId::parse(&id)?;
                let code = RoomCode::parse(&code)
                    .map_err(|e| StoreError::Corrupt(format!("room code: {e}")))?;
                Ok(Some(PeerIdentity::from_parts(id, code)))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// Load the identity or generate and persist a fresh one.
    pub fn load_or_create_identity(&self) -> Result<PeerIdentity> {
        if let Some(identity) = self.load_identity()? {
            return Ok(identity);
        }

        let identity = PeerIdentity::generate();
        tracing::info!(
            peer = %identity.id().short(),
            code = %identity.room_code(),
            "generated new local identity"
        );
        self.save_identity(&identity)?;
        Ok(identity)
    }
}
