use crate::Database;
use crate::models::{MessageRow, UserRow, UserSummaryRow};
use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;

/// Attachment URLs to persist alongside a message. Populated fields must
/// all come from completed uploads; a message is never stored with a
/// partially resolved set.
#[derive(Debug, Default, Clone)]
pub struct NewAttachments {
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub file_url: Option<String>,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// All users except the caller, for the sidebar listing.
    pub fn list_users_except(&self, caller_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, created_at FROM users WHERE id != ?1 ORDER BY username",
            )?;

            let rows = stmt
                .query_map([caller_id], |row| {
                    Ok(UserSummaryRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    /// Persist a message, assigning its id and creation timestamp.
    /// Messages are immutable once stored; there is no update or delete.
    pub fn insert_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: Option<&str>,
        attachments: &NewAttachments,
    ) -> Result<MessageRow> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, sender_id, receiver_id, text, image_url, video_url, audio_url, file_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    &id,
                    sender_id,
                    receiver_id,
                    text,
                    attachments.image_url.as_deref(),
                    attachments.video_url.as_deref(),
                    attachments.audio_url.as_deref(),
                    attachments.file_url.as_deref(),
                    &created_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(MessageRow {
            id,
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: text.map(str::to_string),
            image_url: attachments.image_url.clone(),
            video_url: attachments.video_url.clone(),
            audio_url: attachments.audio_url.clone(),
            file_url: attachments.file_url.clone(),
            created_at,
        })
    }

    /// All messages between two participants, either direction, ascending
    /// by creation time.
    pub fn conversation(&self, participant_a: &str, participant_b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, text, image_url, video_url, audio_url, file_url, created_at
                 FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at ASC",
            )?;

            let rows = stmt
                .query_map([participant_a, participant_b], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        receiver_id: row.get(2)?,
                        text: row.get(3)?,
                        image_url: row.get(4)?,
                        video_url: row.get(5)?,
                        audio_url: row.get(6)?,
                        file_url: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users(usernames: &[&str]) -> (Database, Vec<String>) {
        let db = Database::open_in_memory().unwrap();
        let ids: Vec<String> = usernames
            .iter()
            .map(|name| {
                let id = Uuid::new_v4().to_string();
                db.create_user(&id, name, "argon2-hash").unwrap();
                id
            })
            .collect();
        (db, ids)
    }

    #[test]
    fn insert_assigns_id_and_timestamp() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let row = db
            .insert_message(&ids[0], &ids[1], Some("hi"), &NewAttachments::default())
            .unwrap();

        assert!(row.id.parse::<Uuid>().is_ok());
        assert!(row.created_at.parse::<chrono::DateTime<chrono::Utc>>().is_ok());
        assert_eq!(row.text.as_deref(), Some("hi"));
        assert!(row.image_url.is_none());
    }

    #[test]
    fn conversation_is_bidirectional_and_ascending() {
        let (db, ids) = db_with_users(&["alice", "bob", "carol"]);
        db.insert_message(&ids[0], &ids[1], Some("first"), &NewAttachments::default())
            .unwrap();
        db.insert_message(&ids[1], &ids[0], Some("second"), &NewAttachments::default())
            .unwrap();
        // Unrelated conversation must not appear
        db.insert_message(&ids[0], &ids[2], Some("other"), &NewAttachments::default())
            .unwrap();

        let msgs = db.conversation(&ids[0], &ids[1]).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].text.as_deref(), Some("first"));
        assert_eq!(msgs[1].text.as_deref(), Some("second"));
        assert!(msgs[0].created_at <= msgs[1].created_at);

        // Same result regardless of argument order, and idempotent
        let mirrored = db.conversation(&ids[1], &ids[0]).unwrap();
        assert_eq!(mirrored.len(), 2);
        assert_eq!(db.conversation(&ids[0], &ids[1]).unwrap().len(), 2);
    }

    #[test]
    fn user_listing_excludes_caller() {
        let (db, ids) = db_with_users(&["alice", "bob", "carol"]);
        let listed = db.list_users_except(&ids[0]).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|u| u.id != ids[0]));
    }

    #[test]
    fn attachment_urls_round_trip() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let attachments = NewAttachments {
            image_url: Some("https://store.example/image/abc.png".into()),
            file_url: Some("https://store.example/raw/report_pdf".into()),
            ..Default::default()
        };
        db.insert_message(&ids[0], &ids[1], None, &attachments).unwrap();

        let msgs = db.conversation(&ids[0], &ids[1]).unwrap();
        assert_eq!(msgs[0].image_url, attachments.image_url);
        assert_eq!(msgs[0].file_url, attachments.file_url);
        assert!(msgs[0].video_url.is_none());
        assert!(msgs[0].text.is_none());
    }
}
