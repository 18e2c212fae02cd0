//! `SQLite` reader for the Messages `chat.db`.
//!
//! Opening is the only fatal step. Every later query logs its error and
//! returns an empty result so one bad conversation never stops the run.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};

use crate::domain::{
    AppError, Attachment, ContactResolver, Conversation, FilterConfig, Message, NoContacts,
    Result,
};

use super::attributed_body::decode_attributed_body;

const CONVERSATIONS_QUERY: &str = "
    SELECT DISTINCT
        c.chat_identifier,
        COALESCE(NULLIF(c.display_name, ''), c.room_name) AS display_name,
        h.id AS phone_or_email
    FROM chat c
    LEFT JOIN chat_handle_join chj ON c.ROWID = chj.chat_id
    LEFT JOIN handle h ON chj.handle_id = h.ROWID
    ORDER BY c.chat_identifier";

const MESSAGES_QUERY: &str = "
    SELECT
        m.ROWID,
        m.date,
        m.text,
        m.attributedBody,
        m.is_from_me,
        h.id AS sender_handle
    FROM message m
    JOIN chat_message_join cmj ON m.ROWID = cmj.message_id
    JOIN chat c ON cmj.chat_id = c.ROWID
    LEFT JOIN handle h ON m.handle_id = h.ROWID
    WHERE c.chat_identifier = ?1
    ORDER BY m.date ASC, m.ROWID ASC";

const ATTACHMENTS_QUERY: &str = "
    SELECT
        a.filename,
        a.transfer_name,
        a.mime_type,
        a.total_bytes
    FROM message_attachment_join maj
    JOIN attachment a ON maj.attachment_id = a.ROWID
    WHERE maj.message_id = ?1";

/// Read-only connection to chat.db plus the contact lookup collaborator.
///
/// The connection is held for the whole run and closed on drop.
pub struct ChatDbReader {
    conn: Connection,
    filters: FilterConfig,
    contacts: Box<dyn ContactResolver>,
}

impl ChatDbReader {
    /// Opens chat.db in read-only mode.
    ///
    /// # Errors
    /// `DatabaseNotFound` when the file is missing, `DatabaseAccess` when it
    /// exists but cannot be read (typically missing Full Disk Access).
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AppError::DatabaseNotFound {
                path: path.to_path_buf(),
            });
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| AppError::database_access(path, e))?;

        conn.execute_batch(
            "PRAGMA query_only = ON;
             PRAGMA temp_store = MEMORY;",
        )
        .map_err(|e| AppError::database_access(path, e))?;

        // SQLite opens lazily; touch the schema so permission errors surface here.
        conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| AppError::database_access(path, e))?;

        tracing::info!("Connected to iMessage database");

        Ok(Self {
            conn,
            filters: FilterConfig::default(),
            contacts: Box::new(NoContacts),
        })
    }

    /// Applies conversation filters to [`Self::list_conversations`].
    #[must_use]
    pub fn with_filters(mut self, filters: FilterConfig) -> Self {
        self.filters = filters;
        self
    }

    /// Sets the contact lookup used by [`Self::resolve_contact_name`].
    #[must_use]
    pub fn with_contacts(mut self, contacts: Box<dyn ContactResolver>) -> Self {
        self.contacts = contacts;
        self
    }

    /// Lists conversations ordered by chat identifier.
    ///
    /// Chats without participants are kept with an empty handle set.
    pub fn list_conversations(&self) -> Vec<Conversation> {
        tracing::info!("Analyzing chat database...");

        let conversations = match self.query_conversations() {
            Ok(conversations) => conversations,
            Err(e) => {
                tracing::error!("Error fetching conversations: {e}");
                return Vec::new();
            }
        };

        let total = conversations.len();
        let kept: Vec<Conversation> = conversations
            .into_iter()
            .filter(|c| passes_filters(&c.identity, self.filters))
            .collect();

        if kept.len() < total {
            tracing::info!("Filtered out {} conversations", total - kept.len());
        }
        tracing::info!("Found {} conversations to process", kept.len());

        kept
    }

    /// Messages of one conversation, oldest first.
    pub fn messages_for(&self, identity: &str) -> Vec<Message> {
        self.query_messages(identity).unwrap_or_else(|e| {
            tracing::warn!(conversation = identity, "Error fetching messages: {e}");
            Vec::new()
        })
    }

    /// Attachments of one message, in store order.
    pub fn attachments_for(&self, message_row_id: i64) -> Vec<Attachment> {
        self.query_attachments(message_row_id).unwrap_or_else(|e| {
            tracing::warn!(message = message_row_id, "Error fetching attachments: {e}");
            Vec::new()
        })
    }

    /// Contact name for a handle or chat identifier, if one is known.
    pub fn resolve_contact_name(&self, handle: &str) -> Option<String> {
        self.contacts.resolve(handle)
    }

    fn query_conversations(&self) -> Result<Vec<Conversation>> {
        let mut stmt = self
            .conn
            .prepare(CONVERSATIONS_QUERY)
            .map_err(AppError::database)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((lossy_text(row, 0)?, lossy_text(row, 1)?, lossy_text(row, 2)?))
            })
            .map_err(AppError::database)?;

        let mut grouped: BTreeMap<String, Conversation> = BTreeMap::new();
        for row in rows {
            let (identity, display_name, handle) = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Failed to read chat row: {}", e);
                    continue;
                }
            };

            let Some(identity) = identity.filter(|i| !i.is_empty()) else {
                continue;
            };

            let conversation = grouped.entry(identity.clone()).or_insert_with(|| {
                let conversation = Conversation::new(identity);
                match display_name {
                    Some(name) => conversation.with_display_name(name),
                    None => conversation,
                }
            });

            if let Some(handle) = handle.filter(|h| !h.is_empty()) {
                conversation.handles.insert(handle);
            }
        }

        Ok(grouped.into_values().collect())
    }

    fn query_messages(&self, identity: &str) -> Result<Vec<Message>> {
        let mut stmt = self
            .conn
            .prepare_cached(MESSAGES_QUERY)
            .map_err(AppError::database)?;

        let rows = stmt
            .query_map([identity], |row| {
                let text = lossy_text(row, 2)?;
                let body: Option<Vec<u8>> = row.get(3)?;

                let text = match text {
                    Some(t) if !t.trim().is_empty() => Some(t),
                    _ => body.as_deref().and_then(decode_attributed_body),
                };

                Ok(Message {
                    row_id: row.get(0)?,
                    date: row.get(1)?,
                    text,
                    is_from_me: row.get::<_, Option<i64>>(4)?.unwrap_or(0) != 0,
                    sender_handle: lossy_text(row, 5)?,
                })
            })
            .map_err(AppError::database)?;

        let mut messages = Vec::new();
        for row in rows {
            match row {
                Ok(message) => messages.push(message),
                Err(e) => tracing::warn!("Failed to read message row: {}", e),
            }
        }

        tracing::debug!("Fetched {} messages for {}", messages.len(), identity);

        Ok(messages)
    }

    fn query_attachments(&self, message_row_id: i64) -> Result<Vec<Attachment>> {
        let mut stmt = self
            .conn
            .prepare_cached(ATTACHMENTS_QUERY)
            .map_err(AppError::database)?;

        let rows = stmt
            .query_map([message_row_id], |row| {
                Ok(Attachment {
                    filename: lossy_text(row, 0)?,
                    transfer_name: lossy_text(row, 1)?,
                    mime_type: lossy_text(row, 2)?,
                    total_bytes: row.get(3)?,
                })
            })
            .map_err(AppError::database)?;

        let mut attachments = Vec::new();
        for row in rows {
            match row {
                Ok(attachment) => attachments.push(attachment),
                Err(e) => tracing::warn!("Failed to read attachment row: {}", e),
            }
        }

        Ok(attachments)
    }
}

impl ContactResolver for ChatDbReader {
    fn resolve(&self, handle: &str) -> Option<String> {
        self.resolve_contact_name(handle)
    }
}

/// Reads a text column, replacing invalid UTF-8 instead of failing the row.
fn lossy_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
    })
}

/// Whether a conversation survives the configured filters.
fn passes_filters(identity: &str, filters: FilterConfig) -> bool {
    if filters.skip_short_codes && is_short_code(identity) {
        tracing::debug!("Skipping short code conversation {}", identity);
        return false;
    }

    if filters.north_america_only && !is_north_american(identity) {
        tracing::debug!("Skipping non-North American conversation {}", identity);
        return false;
    }

    true
}

/// Strips phone formatting characters.
fn phone_digits(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' ' | '(' | ')'))
        .collect()
}

/// 2FA / marketing short codes: six digits or fewer.
fn is_short_code(identifier: &str) -> bool {
    let digits = phone_digits(identifier);
    !digits.is_empty() && digits.len() <= 6 && digits.chars().all(|c| c.is_ascii_digit())
}

/// NANP numbers (`+1` and ten digits, or ten bare digits). Non-phone
/// identities (emails, group chats) always pass.
fn is_north_american(identifier: &str) -> bool {
    if identifier.contains('@') {
        return true;
    }

    let digits = phone_digits(identifier);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    digits.len() == 10 || (digits.len() == 11 && digits.starts_with('1'))
}

/// Builds chat.db-shaped databases for tests.
#[cfg(test)]
pub mod fixture {
    use std::path::Path;

    use rusqlite::{params, Connection, OptionalExtension};

    const SCHEMA: &str = "
        CREATE TABLE chat (
            ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_identifier TEXT,
            display_name TEXT,
            room_name TEXT
        );
        CREATE TABLE handle (
            ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL
        );
        CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER);
        CREATE TABLE message (
            ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
            date INTEGER,
            text TEXT,
            attributedBody BLOB,
            is_from_me INTEGER DEFAULT 0,
            handle_id INTEGER DEFAULT 0
        );
        CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
        CREATE TABLE attachment (
            ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT,
            transfer_name TEXT,
            mime_type TEXT,
            total_bytes INTEGER
        );
        CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER);";

    /// Writable handle on a fixture database.
    pub struct ChatDbFixture {
        conn: Connection,
    }

    impl ChatDbFixture {
        pub fn create(path: &Path) -> Self {
            let conn = Connection::open(path).unwrap();
            conn.execute_batch(SCHEMA).unwrap();
            Self { conn }
        }

        /// Reopens a database built earlier with [`Self::create`].
        pub fn open(path: &Path) -> Self {
            Self {
                conn: Connection::open(path).unwrap(),
            }
        }

        pub fn add_chat(&self, identity: &str, display_name: Option<&str>, handles: &[&str]) -> i64 {
            self.conn
                .execute(
                    "INSERT INTO chat (chat_identifier, display_name) VALUES (?1, ?2)",
                    params![identity, display_name],
                )
                .unwrap();
            let chat_id = self.conn.last_insert_rowid();

            for handle in handles {
                let handle_id = self.handle_id(handle);
                self.conn
                    .execute(
                        "INSERT INTO chat_handle_join (chat_id, handle_id) VALUES (?1, ?2)",
                        params![chat_id, handle_id],
                    )
                    .unwrap();
            }

            chat_id
        }

        pub fn add_message(
            &self,
            chat_id: i64,
            date: Option<i64>,
            text: Option<&str>,
            is_from_me: bool,
            sender: Option<&str>,
        ) -> i64 {
            let handle_id = sender.map_or(0, |s| self.handle_id(s));
            self.conn
                .execute(
                    "INSERT INTO message (date, text, is_from_me, handle_id) VALUES (?1, ?2, ?3, ?4)",
                    params![date, text, i64::from(is_from_me), handle_id],
                )
                .unwrap();
            let message_id = self.conn.last_insert_rowid();

            self.conn
                .execute(
                    "INSERT INTO chat_message_join (chat_id, message_id) VALUES (?1, ?2)",
                    params![chat_id, message_id],
                )
                .unwrap();

            message_id
        }

        pub fn set_attributed_body(&self, message_id: i64, body: &[u8]) {
            self.conn
                .execute(
                    "UPDATE message SET attributedBody = ?1 WHERE ROWID = ?2",
                    params![body, message_id],
                )
                .unwrap();
        }

        pub fn add_attachment(
            &self,
            message_id: i64,
            filename: Option<&str>,
            transfer_name: Option<&str>,
        ) -> i64 {
            self.conn
                .execute(
                    "INSERT INTO attachment (filename, transfer_name, mime_type, total_bytes)
                     VALUES (?1, ?2, 'application/octet-stream', 0)",
                    params![filename, transfer_name],
                )
                .unwrap();
            let attachment_id = self.conn.last_insert_rowid();

            self.conn
                .execute(
                    "INSERT INTO message_attachment_join (message_id, attachment_id) VALUES (?1, ?2)",
                    params![message_id, attachment_id],
                )
                .unwrap();

            attachment_id
        }

        fn handle_id(&self, handle: &str) -> i64 {
            let existing: Option<i64> = self
                .conn
                .query_row("SELECT ROWID FROM handle WHERE id = ?1", [handle], |row| {
                    row.get(0)
                })
                .optional()
                .unwrap();

            existing.unwrap_or_else(|| {
                self.conn
                    .execute("INSERT INTO handle (id) VALUES (?1)", [handle])
                    .unwrap();
                self.conn.last_insert_rowid()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::fixture::ChatDbFixture;
    use super::*;
    use crate::domain::ContactBook;
    use tempfile::tempdir;

    #[test]
    fn test_open_missing_database() {
        let dir = tempdir().unwrap();
        let result = ChatDbReader::open(&dir.path().join("chat.db"));
        assert!(matches!(result, Err(AppError::DatabaseNotFound { .. })));
    }

    #[test]
    fn test_open_unreadable_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        std::fs::write(&path, b"this is not a sqlite database at all, just bytes").unwrap();

        let result = ChatDbReader::open(&path);
        assert!(matches!(result, Err(AppError::DatabaseAccess { .. })));
    }

    #[test]
    fn test_list_conversations_groups_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let db = ChatDbFixture::create(&path);
        db.add_chat("chat42", Some("Family"), &["+15551112222", "mom@example.com"]);
        db.add_chat("+15551234567", None, &["+15551234567"]);
        db.add_chat("lonely", None, &[]);

        let reader = ChatDbReader::open(&path).unwrap();
        let conversations = reader.list_conversations();

        let ids: Vec<&str> = conversations.iter().map(|c| c.identity.as_str()).collect();
        assert_eq!(ids, vec!["+15551234567", "chat42", "lonely"]);

        let family = &conversations[1];
        assert_eq!(family.display_name.as_deref(), Some("Family"));
        assert_eq!(family.handles.len(), 2);
        assert!(conversations[2].handles.is_empty());
    }

    #[test]
    fn test_filters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let db = ChatDbFixture::create(&path);
        db.add_chat("+15551234567", None, &[]);
        db.add_chat("+447700900123", None, &[]);
        db.add_chat("12345", None, &[]);
        db.add_chat("someone@example.com", None, &[]);

        let reader = ChatDbReader::open(&path).unwrap().with_filters(FilterConfig {
            north_america_only: false,
            skip_short_codes: true,
        });
        assert_eq!(reader.list_conversations().len(), 3);

        let reader = reader.with_filters(FilterConfig {
            north_america_only: true,
            skip_short_codes: true,
        });
        let ids: Vec<String> = reader
            .list_conversations()
            .into_iter()
            .map(|c| c.identity)
            .collect();
        assert_eq!(ids, vec!["+15551234567", "someone@example.com"]);
    }

    #[test]
    fn test_messages_ordered_with_ties_in_row_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let db = ChatDbFixture::create(&path);
        let chat = db.add_chat("+15551234567", None, &["+15551234567"]);
        db.add_message(chat, Some(300), Some("third"), false, Some("+15551234567"));
        db.add_message(chat, Some(100), Some("first"), true, None);
        db.add_message(chat, Some(200), Some("tie-a"), true, None);
        db.add_message(chat, Some(200), Some("tie-b"), false, Some("+15551234567"));

        let reader = ChatDbReader::open(&path).unwrap();
        let texts: Vec<String> = reader
            .messages_for("+15551234567")
            .into_iter()
            .filter_map(|m| m.text)
            .collect();

        assert_eq!(texts, vec!["first", "tie-a", "tie-b", "third"]);
        assert!(reader.messages_for("nobody").is_empty());
    }

    #[test]
    fn test_message_falls_back_to_attributed_body() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let db = ChatDbFixture::create(&path);
        let chat = db.add_chat("+15551234567", None, &[]);
        let id = db.add_message(chat, Some(1), None, true, None);
        db.set_attributed_body(id, b"\x04\x0bstreamtyped\x84\x84\x08NSString\x01\x94\x84\x01+\x05hello\x86");

        let reader = ChatDbReader::open(&path).unwrap();
        let messages = reader.messages_for("+15551234567");
        assert_eq!(messages[0].text.as_deref(), Some("hello"));
        assert!(messages[0].is_from_me);
    }

    #[test]
    fn test_attachments_for_message() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let db = ChatDbFixture::create(&path);
        let chat = db.add_chat("+15551234567", None, &[]);
        let msg = db.add_message(chat, Some(1), None, true, None);
        db.add_attachment(msg, Some("~/Library/Messages/Attachments/a/b/IMG_1.jpg"), None);
        db.add_attachment(msg, None, Some("voice.caf"));

        let reader = ChatDbReader::open(&path).unwrap();
        let attachments = reader.attachments_for(msg);
        assert_eq!(attachments.len(), 2);
        assert!(reader.attachments_for(msg + 100).is_empty());
    }

    #[test]
    fn test_invalid_utf8_keeps_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let db = ChatDbFixture::create(&path);
        let chat = db.add_chat("+15551234567", None, &["+15551234567"]);
        db.add_message(chat, Some(1), Some("fine"), true, None);
        let broken = db.add_message(chat, Some(2), None, false, Some("+15551234567"));
        let attachment = db.add_attachment(broken, None, None);
        drop(db);

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE message SET text = CAST(X'68C3' AS TEXT) WHERE ROWID = ?1",
            [broken],
        )
        .unwrap();
        conn.execute(
            "UPDATE attachment SET filename = CAST(X'2F782FFF2E6A7067' AS TEXT) WHERE ROWID = ?1",
            [attachment],
        )
        .unwrap();
        drop(conn);

        let reader = ChatDbReader::open(&path).unwrap();
        let messages = reader.messages_for("+15551234567");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text.as_deref(), Some("h\u{FFFD}"));

        let attachments = reader.attachments_for(broken);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename.as_deref(), Some("/x/\u{FFFD}.jpg"));
    }

    #[test]
    fn test_query_failure_returns_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        // Valid SQLite file without the Messages schema
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (x INTEGER);")
            .unwrap();

        let reader = ChatDbReader::open(&path).unwrap();
        assert!(reader.list_conversations().is_empty());
        assert!(reader.messages_for("x").is_empty());
        assert!(reader.attachments_for(1).is_empty());
    }

    #[test]
    fn test_contact_resolution_delegates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        ChatDbFixture::create(&path);

        let mut entries = BTreeMap::new();
        entries.insert("+15551234567".to_string(), "Alice".to_string());

        let reader = ChatDbReader::open(&path)
            .unwrap()
            .with_contacts(Box::new(ContactBook::new(entries)));

        assert_eq!(reader.resolve_contact_name("+15551234567"), Some("Alice".into()));
        assert_eq!(reader.resolve_contact_name("+15550000000"), None);
    }

    #[test]
    fn test_short_code_detection() {
        assert!(is_short_code("12345"));
        assert!(is_short_code("(262) 966"));
        assert!(!is_short_code("+15551234567"));
        assert!(!is_short_code("someone@example.com"));
        assert!(!is_short_code(""));
    }

    #[test]
    fn test_north_american_detection() {
        assert!(is_north_american("+1 (555) 123-4567"));
        assert!(is_north_american("5551234567"));
        assert!(is_north_american("chat123456789"));
        assert!(is_north_american("a@b.com"));
        assert!(!is_north_american("+447700900123"));
    }
}
