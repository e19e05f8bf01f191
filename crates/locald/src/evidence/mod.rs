//! Evidence capture
//!
//! When a session confirms a violation the media that triggered it is handed
//! to an `EvidenceStore`. Stores return an `EvidenceRef` that the violation
//! log records alongside the event: a file path (disk mode) or a blob id
//! (blob mode), selected once per deployment.
//!
//! Ship Hardening: session ids are validated before they become paths.

mod blob_store;
mod disk_store;
pub mod path_safety;

pub use blob_store::SqliteBlobEvidenceStore;
pub use disk_store::DiskEvidenceStore;
pub use path_safety::{safe_join, validate_session_id, PathValidationError};

use crate::config::EvidenceConfig;
use proctor_core::{ErrorCode, EvidenceRef};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("Unsafe evidence path: {0}")]
    Path(#[from] PathValidationError),

    #[error("Evidence IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Evidence database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl EvidenceError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::EvidenceWriteFailed
    }
}

/// Which stream the captured media came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Encoded still image
    Frame,
    /// Raw 16-bit mono PCM
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Frame => "frame",
            MediaKind::Audio => "audio",
        }
    }
}

/// Raw media that produced a confirmation
#[derive(Debug, Clone)]
pub struct EvidenceMedia {
    pub kind: MediaKind,
    pub bytes: Arc<[u8]>,
    pub captured_at_ms: i64,
}

/// Persist media for a session and hand back a reference to it
pub trait EvidenceStore: Send + Sync {
    fn capture(&self, session_id: &str, media: &EvidenceMedia)
        -> Result<EvidenceRef, EvidenceError>;
}

/// Build the store selected by configuration (None when disabled)
pub fn store_from_config(
    config: &EvidenceConfig,
) -> Result<Option<Arc<dyn EvidenceStore>>, EvidenceError> {
    match config {
        EvidenceConfig::Disabled => Ok(None),
        EvidenceConfig::Disk { root } => Ok(Some(Arc::new(DiskEvidenceStore::new(root.clone())))),
        EvidenceConfig::Blob { db_path } => {
            Ok(Some(Arc::new(SqliteBlobEvidenceStore::open(db_path)?)))
        }
    }
}
