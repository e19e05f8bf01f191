//! Violation log
//!
//! Durable record of confirmed violations. Scoring reads grouped tallies back
//! out of the same log, so `tallies` must reflect every successful `append`.
//!
//! Backends:
//! - `MemoryViolationLog`: tests and replay
//! - `JsonlViolationLog`: one JSON event per line
//! - `SqliteViolationLog`: `cheating_logs` + `session_scores` tables

use proctor_core::{ErrorCode, Severity, ViolationEvent, ViolationKind, ViolationTally};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Log IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Log database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl LogError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::LogSinkFailed
    }
}

/// Append-only violation store with grouped read-back
pub trait ViolationLog: Send + Sync {
    fn append(&self, event: &ViolationEvent) -> Result<(), LogError>;

    /// Counts grouped by (kind, severity) for one session
    fn tallies(&self, session_id: &str) -> Result<Vec<ViolationTally>, LogError>;

    /// Persist the latest score for a session (backends without a score table ignore it)
    fn record_score(
        &self,
        _session_id: &str,
        _score: f64,
        _computed_at_ms: i64,
    ) -> Result<(), LogError> {
        Ok(())
    }
}

fn group<'a>(events: impl Iterator<Item = &'a ViolationEvent>) -> Vec<ViolationTally> {
    let mut counts: BTreeMap<(ViolationKind, Severity), u64> = BTreeMap::new();
    for event in events {
        *counts.entry((event.kind, event.severity)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((kind, severity), count)| ViolationTally {
            kind,
            severity,
            count,
        })
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory log
#[derive(Default)]
pub struct MemoryViolationLog {
    events: Mutex<Vec<ViolationEvent>>,
    scores: Mutex<BTreeMap<String, f64>>,
}

impl MemoryViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ViolationEvent> {
        lock(&self.events).clone()
    }

    pub fn events_for(&self, session_id: &str) -> Vec<ViolationEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn score_for(&self, session_id: &str) -> Option<f64> {
        lock(&self.scores).get(session_id).copied()
    }
}

impl ViolationLog for MemoryViolationLog {
    fn append(&self, event: &ViolationEvent) -> Result<(), LogError> {
        lock(&self.events).push(event.clone());
        Ok(())
    }

    fn tallies(&self, session_id: &str) -> Result<Vec<ViolationTally>, LogError> {
        let events = lock(&self.events);
        Ok(group(events.iter().filter(|e| e.session_id == session_id)))
    }

    fn record_score(
        &self,
        session_id: &str,
        score: f64,
        _computed_at_ms: i64,
    ) -> Result<(), LogError> {
        lock(&self.scores).insert(session_id.to_string(), score);
        Ok(())
    }
}

/// JSONL log: `<root>/violations.jsonl`
pub struct JsonlViolationLog {
    path: PathBuf,
    // Serializes appends from concurrent session workers
    write_lock: Mutex<()>,
}

impl JsonlViolationLog {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join("violations.jsonl"),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_events(&self) -> Result<Vec<ViolationEvent>, LogError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ViolationEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(path = %self.path.display(), line = line_no + 1, error = %e, "skipping unreadable log line")
                }
            }
        }
        Ok(events)
    }
}

impl ViolationLog for JsonlViolationLog {
    fn append(&self, event: &ViolationEvent) -> Result<(), LogError> {
        let line = serde_json::to_string(event)?;

        let _guard = lock(&self.write_lock);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn tallies(&self, session_id: &str) -> Result<Vec<ViolationTally>, LogError> {
        let events = self.read_events()?;
        Ok(group(events.iter().filter(|e| e.session_id == session_id)))
    }
}

/// SQLite log
pub struct SqliteViolationLog {
    db: Mutex<Connection>,
}

impl SqliteViolationLog {
    pub fn open(db_path: &Path) -> Result<Self, LogError> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Open in-memory log (for testing)
    pub fn open_memory() -> Result<Self, LogError> {
        let db = Connection::open_in_memory()?;
        Self::init_schema(&db)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn init_schema(db: &Connection) -> Result<(), rusqlite::Error> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cheating_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                violation_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                description TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                evidence_path TEXT,
                evidence_blob_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_logs_session ON cheating_logs(session_id);

            CREATE TABLE IF NOT EXISTS session_scores (
                session_id TEXT PRIMARY KEY,
                cheating_score REAL NOT NULL,
                computed_at INTEGER NOT NULL
            );
        "#,
        )
    }

    pub fn score_for(&self, session_id: &str) -> Result<Option<f64>, LogError> {
        Ok(lock(&self.db)
            .query_row(
                "SELECT cheating_score FROM session_scores WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn event_count(&self, session_id: &str) -> Result<u64, LogError> {
        let count: i64 = lock(&self.db).query_row(
            "SELECT COUNT(*) FROM cheating_logs WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl ViolationLog for SqliteViolationLog {
    fn append(&self, event: &ViolationEvent) -> Result<(), LogError> {
        let evidence_path = event.evidence.as_ref().and_then(|e| e.path());
        let evidence_blob_id = event.evidence.as_ref().and_then(|e| e.blob_id());

        lock(&self.db).execute(
            r#"INSERT INTO cheating_logs
               (event_id, session_id, violation_type, severity, description, timestamp,
                evidence_path, evidence_blob_id)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                event.event_id,
                event.session_id,
                event.kind.as_str(),
                event.severity.as_str(),
                event.description,
                event.ts_ms,
                evidence_path,
                evidence_blob_id,
            ],
        )?;
        Ok(())
    }

    fn tallies(&self, session_id: &str) -> Result<Vec<ViolationTally>, LogError> {
        let db = lock(&self.db);
        let mut stmt = db.prepare(
            r#"SELECT violation_type, severity, COUNT(*) FROM cheating_logs
               WHERE session_id = ?1
               GROUP BY violation_type, severity"#,
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut tallies = Vec::new();
        for row in rows {
            let (kind, severity, count) = row?;
            match (kind.parse::<ViolationKind>(), severity.parse::<Severity>()) {
                (Ok(kind), Ok(severity)) => tallies.push(ViolationTally {
                    kind,
                    severity,
                    count: count as u64,
                }),
                _ => warn!(session_id, kind = %kind, severity = %severity, "skipping unrecognized log rows"),
            }
        }
        Ok(tallies)
    }

    fn record_score(
        &self,
        session_id: &str,
        score: f64,
        computed_at_ms: i64,
    ) -> Result<(), LogError> {
        lock(&self.db).execute(
            r#"INSERT OR REPLACE INTO session_scores (session_id, cheating_score, computed_at)
               VALUES (?1, ?2, ?3)"#,
            params![session_id, score, computed_at_ms],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::EvidenceRef;
    use tempfile::TempDir;

    fn event(session: &str, kind: ViolationKind, severity: Severity, ts_ms: i64) -> ViolationEvent {
        ViolationEvent::new(session, kind, severity, kind.default_description(), ts_ms)
    }

    fn count_of(tallies: &[ViolationTally], kind: ViolationKind) -> u64 {
        tallies
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.count)
            .sum()
    }

    #[test]
    fn test_memory_tallies_are_per_session() {
        let log = MemoryViolationLog::new();
        log.append(&event("a", ViolationKind::PhoneDetected, Severity::High, 1)).unwrap();
        log.append(&event("a", ViolationKind::PhoneDetected, Severity::High, 2)).unwrap();
        log.append(&event("b", ViolationKind::TabSwitch, Severity::Medium, 3)).unwrap();

        let tallies = log.tallies("a").unwrap();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].count, 2);
        assert!(log.tallies("missing").unwrap().is_empty());
    }

    #[test]
    fn test_jsonl_append_and_tally() {
        let tmpdir = TempDir::new().unwrap();
        let log = JsonlViolationLog::new(tmpdir.path());

        assert!(log.tallies("s1").unwrap().is_empty());

        log.append(&event("s1", ViolationKind::BookDetected, Severity::Medium, 10)).unwrap();
        log.append(&event("s1", ViolationKind::BookDetected, Severity::Medium, 20)).unwrap();
        log.append(&event("s2", ViolationKind::BookDetected, Severity::Medium, 30)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("BOOK_DETECTED"));

        let tallies = log.tallies("s1").unwrap();
        assert_eq!(count_of(&tallies, ViolationKind::BookDetected), 2);
    }

    #[test]
    fn test_jsonl_skips_corrupt_lines() {
        let tmpdir = TempDir::new().unwrap();
        let log = JsonlViolationLog::new(tmpdir.path());
        log.append(&event("s1", ViolationKind::TabSwitch, Severity::Medium, 1)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .unwrap()
            .write_all(b"{not json\n")
            .unwrap();

        let tallies = log.tallies("s1").unwrap();
        assert_eq!(count_of(&tallies, ViolationKind::TabSwitch), 1);
    }

    #[test]
    fn test_sqlite_records_evidence_and_scores() {
        let log = SqliteViolationLog::open_memory().unwrap();
        let with_path = event("s1", ViolationKind::PhoneDetected, Severity::High, 1)
            .with_evidence(Some(EvidenceRef::Path {
                path: "/data/evidence/s1/x.jpg".into(),
            }));
        let with_blob = event("s1", ViolationKind::PhoneDetected, Severity::High, 2)
            .with_evidence(Some(EvidenceRef::Blob {
                blob_id: "b-1".into(),
            }));
        log.append(&with_path).unwrap();
        log.append(&with_blob).unwrap();
        log.append(&event("s1", ViolationKind::TabSwitch, Severity::Medium, 3)).unwrap();

        assert_eq!(log.event_count("s1").unwrap(), 3);
        let tallies = log.tallies("s1").unwrap();
        assert_eq!(tallies.len(), 2);
        assert_eq!(count_of(&tallies, ViolationKind::PhoneDetected), 2);

        assert_eq!(log.score_for("s1").unwrap(), None);
        log.record_score("s1", 12.5, 100).unwrap();
        log.record_score("s1", 30.0, 200).unwrap();
        assert_eq!(log.score_for("s1").unwrap(), Some(30.0));
    }

    #[test]
    fn test_sqlite_keeps_repeats_sharing_an_event_id() {
        let log = SqliteViolationLog::open_memory().unwrap();
        let repeat = event("s1", ViolationKind::TabSwitch, Severity::Medium, 7);
        log.append(&repeat).unwrap();
        log.append(&repeat).unwrap();

        assert_eq!(log.event_count("s1").unwrap(), 2);
        assert_eq!(count_of(&log.tallies("s1").unwrap(), ViolationKind::TabSwitch), 2);
    }

    #[test]
    fn test_sqlite_skips_unknown_kinds() {
        let log = SqliteViolationLog::open_memory().unwrap();
        lock(&log.db)
            .execute(
                r#"INSERT INTO cheating_logs
                   (event_id, session_id, violation_type, severity, description, timestamp)
                   VALUES ('x', 's1', 'FACE_DETECTION', 'HIGH', 'legacy', 0)"#,
                [],
            )
            .unwrap();
        log.append(&event("s1", ViolationKind::MultiplePersons, Severity::High, 1)).unwrap();

        let tallies = log.tallies("s1").unwrap();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].kind, ViolationKind::MultiplePersons);
    }
}
