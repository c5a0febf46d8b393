//! SQLite database for users, sessions, documents and chat exchanges
//!
//! A single connection sits behind a `parking_lot::Mutex`. Every method locks,
//! runs synchronously and releases before returning, so no lock is ever held
//! across an `.await`.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    ChatExchange, Document, DocumentOutcome, DocumentStatus, DocumentView, Session, SourceKind,
    User,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, created_at";
const DOCUMENT_COLUMNS: &str =
    "id, source, name, locator, status, uploaded_by, chunk_count, error, created_at";
const CHAT_COLUMNS: &str = "id, user_id, question, answer, asked_at, answered_at";

/// Rows removed by a user cascade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserDeletion {
    pub chats: usize,
    pub documents: usize,
    pub sessions: usize,
}

/// SQLite-backed record store
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for tests and throwaway instances)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Internal(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        "#,
        )
        .map_err(|e| Error::Internal(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                name TEXT NOT NULL,
                locator TEXT NOT NULL,
                status TEXT NOT NULL,
                uploaded_by TEXT NOT NULL,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_uploaded_by ON documents(uploaded_by);
            CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at);

            CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                asked_at TEXT NOT NULL,
                answered_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chats_user_id ON chats(user_id, answered_at);
        "#,
        )
        .map_err(|e| Error::Internal(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    // ==================== Users ====================

    /// Insert a new user; a uniqueness violation is a validation error
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.username,
                user.email,
                user.password_hash,
                user.is_admin,
                format_ts(&user.created_at),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Error::validation("User already exists")
            }
            other => Error::Database(other),
        })?;

        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.query_user("id", &id.to_string())
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_user("email", email)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.query_user("username", username)
    }

    fn query_user(&self, column: &str, value: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);

        let user = conn
            .query_row(&sql, params![value], row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Regular (non-admin) users, oldest first
    pub fn list_non_admin_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM users WHERE is_admin = 0 ORDER BY created_at ASC",
            USER_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn count_users(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete a user with their chats, documents and sessions in one transaction.
    ///
    /// Backing files are not touched here; callers remove them first.
    pub fn delete_user_cascade(&self, id: Uuid) -> Result<UserDeletion> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = id.to_string();

        let chats = tx.execute("DELETE FROM chats WHERE user_id = ?1", params![id])?;
        let documents = tx.execute("DELETE FROM documents WHERE uploaded_by = ?1", params![id])?;
        let sessions = tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
        let users = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;

        if users == 0 {
            return Err(Error::NotFound("User not found".to_string()));
        }

        tx.commit()?;

        Ok(UserDeletion {
            chats,
            documents,
            sessions,
        })
    }

    // ==================== Sessions ====================

    pub fn insert_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token_hash,
                session.user_id.to_string(),
                format_ts(&session.created_at),
                format_ts(&session.expires_at),
            ],
        )?;
        Ok(())
    }

    /// Resolve a token digest to its user if the session has not expired
    pub fn user_for_token_hash(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM users
             WHERE id = (SELECT user_id FROM sessions WHERE token_hash = ?1 AND expires_at > ?2)",
            USER_COLUMNS
        );

        let user = conn
            .query_row(&sql, params![token_hash, format_ts(&now)], row_to_user)
            .optional()?;
        Ok(user)
    }

    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![format_ts(&now)],
        )?;
        Ok(removed)
    }

    // ==================== Documents ====================

    pub fn insert_document(&self, document: &Document) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO documents (id, source, name, locator, status, uploaded_by, chunk_count, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                document.id.to_string(),
                document.source.as_str(),
                document.name,
                document.locator,
                document.status.as_str(),
                document.uploaded_by.to_string(),
                document.chunk_count,
                document.error,
                format_ts(&document.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);

        let document = conn
            .query_row(&sql, params![id.to_string()], row_to_document)
            .optional()?;
        Ok(document)
    }

    /// Commit a terminal outcome if the document is still pending.
    ///
    /// Returns `false` when no pending document with this id exists; the
    /// stored record is then left untouched.
    pub fn complete_document(&self, id: Uuid, outcome: &DocumentOutcome) -> Result<bool> {
        let conn = self.conn.lock();

        let (chunk_count, error) = match outcome {
            DocumentOutcome::Processed { chunk_count } => (*chunk_count, None),
            DocumentOutcome::Failed { reason } => (0, Some(reason.as_str())),
        };

        let changed = conn.execute(
            "UPDATE documents SET status = ?2, chunk_count = ?3, error = ?4
             WHERE id = ?1 AND status = 'pending'",
            params![
                id.to_string(),
                outcome.status().as_str(),
                chunk_count,
                error,
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn delete_document(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
        Ok(removed > 0)
    }

    /// All documents, newest first, with the uploader's username
    pub fn list_documents_with_uploader(&self) -> Result<Vec<DocumentView>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT d.id, d.source, d.name, d.locator, d.status, d.uploaded_by,
                    d.chunk_count, d.error, d.created_at, u.username
             FROM documents d
             LEFT JOIN users u ON u.id = d.uploaded_by
             ORDER BY d.created_at DESC, d.rowid DESC",
        )?;

        let views = stmt
            .query_map([], |row| {
                Ok(DocumentView {
                    document: row_to_document(row)?,
                    uploaded_by_username: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
    }

    pub fn list_documents_by_uploader(&self, user_id: Uuid) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM documents WHERE uploaded_by = ?1 ORDER BY created_at ASC",
            DOCUMENT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let documents = stmt
            .query_map(params![user_id.to_string()], row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(documents)
    }

    // ==================== Chats ====================

    pub fn insert_exchange(&self, exchange: &ChatExchange) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO chats (id, user_id, question, answer, asked_at, answered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                exchange.id.to_string(),
                exchange.user_id.to_string(),
                exchange.question,
                exchange.answer,
                format_ts(&exchange.asked_at),
                format_ts(&exchange.answered_at),
            ],
        )?;
        Ok(())
    }

    /// The last `limit` exchanges of a user, returned oldest first
    pub fn recent_exchanges(&self, user_id: Uuid, limit: usize) -> Result<Vec<ChatExchange>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM chats WHERE user_id = ?1
             ORDER BY answered_at DESC, rowid DESC LIMIT ?2",
            CHAT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut exchanges = stmt
            .query_map(params![user_id.to_string(), limit as i64], row_to_exchange)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        exchanges.reverse();
        Ok(exchanges)
    }

    /// Every exchange of a user, oldest first
    pub fn history(&self, user_id: Uuid) -> Result<Vec<ChatExchange>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM chats WHERE user_id = ?1 ORDER BY answered_at ASC, rowid ASC",
            CHAT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let exchanges = stmt
            .query_map(params![user_id.to_string()], row_to_exchange)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(exchanges)
    }
}

// ==================== Helper Functions ====================

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

fn get_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn get_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: get_ts(row, 5)?,
    })
}

fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    let source: String = row.get(1)?;
    let status: String = row.get(4)?;

    Ok(Document {
        id: get_uuid(row, 0)?,
        source: SourceKind::parse(&source)
            .ok_or_else(|| conversion_error(1, format!("unknown source '{}'", source)))?,
        name: row.get(2)?,
        locator: row.get(3)?,
        status: DocumentStatus::parse(&status)
            .ok_or_else(|| conversion_error(4, format!("unknown status '{}'", status)))?,
        uploaded_by: get_uuid(row, 5)?,
        chunk_count: row.get(6)?,
        error: row.get(7)?,
        created_at: get_ts(row, 8)?,
    })
}

fn row_to_exchange(row: &Row) -> rusqlite::Result<ChatExchange> {
    Ok(ChatExchange {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        question: row.get(2)?,
        answer: row.get(3)?,
        asked_at: get_ts(row, 4)?,
        answered_at: get_ts(row, 5)?,
    })
}
