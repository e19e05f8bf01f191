//! Blob evidence store: media kept inline in SQLite, referenced by UUID
//!
//! One connection is shared by every session and held for the whole INSERT.
//! A very large blob therefore delays other sessions' evidence writes, and if
//! their effect queues fill (`effect_queue_depth`) their ingestion waits too.
//! Deployments with large media or many concurrent sessions should use the
//! disk store.

use super::{EvidenceError, EvidenceMedia, EvidenceStore};
use proctor_core::EvidenceRef;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteBlobEvidenceStore {
    db: Mutex<Connection>,
}

impl SqliteBlobEvidenceStore {
    pub fn open(db_path: &Path) -> Result<Self, rusqlite::Error> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Open in-memory store (for testing)
    pub fn open_memory() -> Result<Self, rusqlite::Error> {
        let db = Connection::open_in_memory()?;
        Self::init_schema(&db)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn init_schema(db: &Connection) -> Result<(), rusqlite::Error> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS evidence_blobs (
                blob_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                media_kind TEXT NOT NULL,
                captured_at INTEGER NOT NULL,
                content BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evidence_session ON evidence_blobs(session_id);
        "#,
        )
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite itself consistent
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch blob content by id
    pub fn load(&self, blob_id: &str) -> Result<Option<Vec<u8>>, rusqlite::Error> {
        self.conn()
            .query_row(
                "SELECT content FROM evidence_blobs WHERE blob_id = ?1",
                params![blob_id],
                |row| row.get(0),
            )
            .optional()
    }
}

impl EvidenceStore for SqliteBlobEvidenceStore {
    fn capture(
        &self,
        session_id: &str,
        media: &EvidenceMedia,
    ) -> Result<EvidenceRef, EvidenceError> {
        let blob_id = uuid::Uuid::new_v4().to_string();
        self.conn().execute(
            r#"INSERT INTO evidence_blobs (blob_id, session_id, media_kind, captured_at, content)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                blob_id,
                session_id,
                media.kind.as_str(),
                media.captured_at_ms,
                &media.bytes[..],
            ],
        )?;
        Ok(EvidenceRef::Blob { blob_id })
    }
}
