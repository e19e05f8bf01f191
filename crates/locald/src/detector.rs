//! Detector boundary
//!
//! Frame and audio inference live outside the engine. The engine only calls
//! these traits and treats every failure (error or panic) as "no signal".

use proctor_core::{AudioSignals, ErrorCode, FrameSignals};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Detector panicked: {0}")]
    Panicked(String),
}

impl DetectorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DetectorError::Malformed(_) => ErrorCode::MalformedInput,
            DetectorError::Inference(_) | DetectorError::Panicked(_) => {
                ErrorCode::DetectorFailure
            }
        }
    }
}

/// Vision inference over one encoded frame
pub trait FrameDetector: Send + Sync {
    fn detect(&self, frame: &[u8]) -> Result<FrameSignals, DetectorError>;
}

/// Audio analysis over one encoded chunk
pub trait AudioDetector: Send + Sync {
    fn analyze(&self, chunk: &[u8]) -> Result<AudioSignals, DetectorError>;
}

/// Decodes payloads that already carry JSON-encoded detector output.
///
/// Used for replaying recorded sessions where inference ran upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSignalDetector;

impl FrameDetector for JsonSignalDetector {
    fn detect(&self, frame: &[u8]) -> Result<FrameSignals, DetectorError> {
        serde_json::from_slice(frame).map_err(|e| DetectorError::Malformed(e.to_string()))
    }
}

impl AudioDetector for JsonSignalDetector {
    fn analyze(&self, chunk: &[u8]) -> Result<AudioSignals, DetectorError> {
        serde_json::from_slice(chunk).map_err(|e| DetectorError::Malformed(e.to_string()))
    }
}

/// Run frame inference on the blocking pool
pub async fn detect_frame(
    detector: Arc<dyn FrameDetector>,
    frame: Arc<[u8]>,
) -> Result<FrameSignals, DetectorError> {
    tokio::task::spawn_blocking(move || detector.detect(&frame))
        .await
        .map_err(|e| DetectorError::Panicked(e.to_string()))?
}

/// Run audio analysis on the blocking pool
pub async fn analyze_audio(
    detector: Arc<dyn AudioDetector>,
    chunk: Arc<[u8]>,
) -> Result<AudioSignals, DetectorError> {
    tokio::task::spawn_blocking(move || detector.analyze(&chunk))
        .await
        .map_err(|e| DetectorError::Panicked(e.to_string()))?
}
