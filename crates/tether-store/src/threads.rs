//! Chat thread persistence.
//!
//! Messages are append-only and keyed by their UUID; `INSERT OR IGNORE`
//! makes duplicate delivery a storage-level no-op. The only deletion is
//! the whole-thread clear.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use tether_shared::protocol::Message;
use tether_shared::types::PeerId;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Append a message to a thread.
    ///
    /// Returns `false` if a message with the same id was already stored,
    /// which is how at-least-once deliveries collapse into one row.
    pub fn insert_message(&self, thread_key: &str, message: &Message) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO messages (id, thread_key, sender_id, text, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                thread_key,
                message.sender_id.to_string(),
                message.text,
                message.sent_at.to_rfc3339(),
            ],
        )?;
        Ok(affected > 0)
    }

    /// Load a thread's messages ordered by send time ascending.
    pub fn messages_for_thread(&self, thread_key: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender_id, text, sent_at
             FROM messages
             WHERE thread_key = ?1
             ORDER BY sent_at ASC",
        )?;

        let rows = stmt.query_map(params![thread_key], |row| {
            let id: String = row.get(0)?;
            let sender: String = row.get(1)?;
            let text: String = row.get(2)?;
            let sent_at: String = row.get(3)?;
            Ok((id, sender, text, sent_at))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, sender, text, sent_at) = row?;
            messages.push(Message {
                id: Uuid::parse_str(&id)?,
                sender_id: PeerId::parse(&sender)?,
                text,
                sent_at: DateTime::parse_from_rfc3339(&sent_at)?.with_timezone(&Utc),
            });
        }
        Ok(messages)
    }

    /// Bulk-delete a thread. Destructive and non-undoable.
    ///
    /// Returns the number of messages removed.
    pub fn clear_thread(&self, thread_key: &str) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE thread_key = ?1",
            params![thread_key],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_shared::protocol::thread_key;

    fn test_message(sender: PeerId, text: &str, sent_at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            text: text.to_string(),
            sent_at,
        }
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        let sender = PeerId::generate();
        let key = thread_key(sender, PeerId::generate());
        let message = test_message(sender, "hello", Utc::now());

        assert!(db.insert_message(&key, &message).unwrap());
        assert!(!db.insert_message(&key, &message).unwrap());
        assert_eq!(db.messages_for_thread(&key).unwrap().len(), 1);
    }

    #[test]
    fn thread_ordered_by_sent_at() {
        let db = Database::open_in_memory().unwrap();
        let a = PeerId::generate();
        let b = PeerId::generate();
        let key = thread_key(a, b);
        let base = Utc::now();

        // Insert out of order; reads must come back sorted.
        db.insert_message(&key, &test_message(b, "second", base + chrono::Duration::seconds(2)))
            .unwrap();
        db.insert_message(&key, &test_message(a, "first", base))
            .unwrap();

        let messages = db.messages_for_thread(&key).unwrap();
        assert_eq!(messages[0].text, "first");
        assert_eq!(messages[1].text, "second");
    }

    #[test]
    fn clear_thread_removes_only_that_thread() {
        let db = Database::open_in_memory().unwrap();
        let a = PeerId::generate();
        let b = PeerId::generate();
        let c = PeerId::generate();
        let key_ab = thread_key(a, b);
        let key_ac = thread_key(a, c);

        db.insert_message(&key_ab, &test_message(a, "one", Utc::now()))
            .unwrap();
        db.insert_message(&key_ac, &test_message(a, "two", Utc::now()))
            .unwrap();

        assert_eq!(db.clear_thread(&key_ab).unwrap(), 1);
        assert!(db.messages_for_thread(&key_ab).unwrap().is_empty());
        assert_eq!(db.messages_for_thread(&key_ac).unwrap().len(), 1);
    }
}
