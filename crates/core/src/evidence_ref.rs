use serde::{Deserialize, Serialize};

/// Handle linking a violation record to captured media.
///
/// A record points at either a file on disk or an inline blob, never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "store", rename_all = "snake_case")]
pub enum EvidenceRef {
    Path { path: String },
    Blob { blob_id: String },
}

impl EvidenceRef {
    pub fn path(&self) -> Option<&str> {
        match self {
            EvidenceRef::Path { path } => Some(path),
            EvidenceRef::Blob { .. } => None,
        }
    }

    pub fn blob_id(&self) -> Option<&str> {
        match self {
            EvidenceRef::Blob { blob_id } => Some(blob_id),
            EvidenceRef::Path { .. } => None,
        }
    }
}
