use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{EvidenceRef, Severity, ViolationKind};

/// A confirmed violation, immutable once built
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViolationEvent {
    /// Content hash sha256(session_id|kind|ts_ms). Not unique: repeated reports
    /// of one kind in the same millisecond share an id.
    pub event_id: String,
    pub session_id: String,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub description: String,
    /// Confirmation instant (milliseconds)
    pub ts_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<EvidenceRef>,
}

impl ViolationEvent {
    pub fn compute_event_id(session_id: &str, kind: ViolationKind, ts_ms: i64) -> String {
        let input = format!("{}|{}|{}", session_id, kind.as_str(), ts_ms);
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn new(
        session_id: &str,
        kind: ViolationKind,
        severity: Severity,
        description: impl Into<String>,
        ts_ms: i64,
    ) -> Self {
        Self {
            event_id: Self::compute_event_id(session_id, kind, ts_ms),
            session_id: session_id.to_string(),
            kind,
            severity,
            description: description.into(),
            ts_ms,
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Option<EvidenceRef>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.ts_ms)
            .single()
            .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
    }
}

/// Grouped violation count for one (kind, severity) pair of a session's log
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViolationTally {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub count: u64,
}
