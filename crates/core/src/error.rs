/// Error taxonomy shared by the engine and its collaborators.
/// None of these are fatal: every code maps to a locally recovered condition.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    DetectorFailure,
    MalformedInput,
    EvidenceWriteFailed,
    LogSinkFailed,
    UnknownSession,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DetectorFailure => "detector_failure",
            ErrorCode::MalformedInput => "malformed_input",
            ErrorCode::EvidenceWriteFailed => "evidence_write_failed",
            ErrorCode::LogSinkFailed => "log_sink_failed",
            ErrorCode::UnknownSession => "unknown_session",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            session_id: None,
        }
    }

    pub fn for_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }
}
