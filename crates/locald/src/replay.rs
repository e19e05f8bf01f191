//! Offline replay of recorded proctoring sessions
//!
//! Input is JSONL, one action per line:
//!
//! ```text
//! {"session_id":"s1","ts_ms":0,"type":"start"}
//! {"session_id":"s1","ts_ms":100,"type":"frame","signals":{"person_count":0,"face_count":0}}
//! {"session_id":"s1","ts_ms":150,"type":"audio","signals":{"voice_rms_energy":0.01,"spectral_peak_count":1}}
//! {"session_id":"s1","ts_ms":200,"type":"direct","kind":"TAB_SWITCH"}
//! {"session_id":"s1","ts_ms":9000,"type":"stop"}
//! ```
//!
//! Frame and audio payloads carry detector output inline and are decoded by
//! the engine's detectors exactly like live media.

use crate::engine::ProctorEngine;
use proctor_core::{ErrorCode, ErrorReport, ViolationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayLine {
    pub session_id: String,
    pub ts_ms: i64,
    #[serde(flatten)]
    pub action: ReplayAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayAction {
    Start,
    Stop,
    Frame {
        signals: serde_json::Value,
    },
    Audio {
        signals: serde_json::Value,
    },
    Direct {
        kind: ViolationKind,
        #[serde(default)]
        description: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSummary {
    pub events: u64,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    pub lines: u64,
    pub sessions: BTreeMap<String, SessionSummary>,
    pub errors: Vec<ErrorReport>,
}

/// Feed every line through the engine, stop whatever is still running, then
/// score each session that appeared in the input.
pub async fn run_replay<R: BufRead>(engine: &ProctorEngine, reader: R) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                summary.errors.push(ErrorReport::new(
                    ErrorCode::MalformedInput,
                    format!("line {}: {}", line_no, e),
                ));
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;

        let record: ReplayLine = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed replay line");
                summary.errors.push(ErrorReport::new(
                    ErrorCode::MalformedInput,
                    format!("line {}: {}", line_no, e),
                ));
                continue;
            }
        };

        let session_id = record.session_id.as_str();
        let emitted = match record.action {
            ReplayAction::Start => {
                engine.start_session(session_id);
                0
            }
            ReplayAction::Stop => {
                if let Some(drain) = engine.stop_session(session_id).await {
                    drain.wait().await;
                }
                0
            }
            ReplayAction::Frame { signals } => engine
                .ingest_frame(session_id, signals.to_string().into_bytes(), record.ts_ms)
                .await
                .len(),
            ReplayAction::Audio { signals } => engine
                .ingest_audio(session_id, signals.to_string().into_bytes(), record.ts_ms)
                .await
                .len(),
            ReplayAction::Direct { kind, description } => engine
                .report_direct(session_id, kind, description.as_deref(), record.ts_ms)
                .await
                .map_or(0, |_| 1),
        };

        summary
            .sessions
            .entry(record.session_id.clone())
            .or_default()
            .events += emitted as u64;
    }

    for session_id in engine.active_sessions() {
        if let Some(drain) = engine.stop_session(&session_id).await {
            drain.wait().await;
        }
    }

    for (session_id, session) in summary.sessions.iter_mut() {
        match engine.current_score(session_id).await {
            Ok(score) => session.score = Some(score),
            Err(e) => summary.errors.push(
                ErrorReport::new(e.code(), e.to_string()).for_session(session_id),
            ),
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::io::Cursor;

    #[test]
    fn test_parse_lines() {
        let line: ReplayLine = serde_json::from_str(
            r#"{"session_id":"s1","ts_ms":5,"type":"direct","kind":"TAB_SWITCH"}"#,
        )
        .unwrap();
        assert!(matches!(
            line.action,
            ReplayAction::Direct {
                kind: ViolationKind::TabSwitch,
                description: None
            }
        ));

        let line: ReplayLine =
            serde_json::from_str(r#"{"session_id":"s1","ts_ms":0,"type":"start"}"#).unwrap();
        assert!(matches!(line.action, ReplayAction::Start));
    }

    #[tokio::test]
    async fn test_replay_scores_sessions() {
        let engine = ProctorEngine::builder(EngineConfig::default()).build().unwrap();
        let input = [
            r#"{"session_id":"s1","ts_ms":0,"type":"start"}"#,
            r#"{"session_id":"s1","ts_ms":10,"type":"direct","kind":"TAB_SWITCH"}"#,
            r#"not json"#,
            r#"{"session_id":"s1","ts_ms":20,"type":"stop"}"#,
            r#"{"session_id":"s1","ts_ms":30,"type":"direct","kind":"TAB_SWITCH"}"#,
        ]
        .join("\n");

        let summary = run_replay(&engine, Cursor::new(input)).await;
        assert_eq!(summary.lines, 5);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].code, ErrorCode::MalformedInput);

        let s1 = &summary.sessions["s1"];
        assert_eq!(s1.events, 1);
        // MEDIUM(3) x TAB_SWITCH(2) = 6 -> 4.0
        assert!((s1.score.unwrap() - 4.0).abs() < 1e-9);
    }
}
