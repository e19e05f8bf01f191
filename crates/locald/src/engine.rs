//! Proctoring engine facade
//!
//! ```text
//!  frame/audio bytes ──► detector ──► aggregator ──► session monitor ──► events
//!                        (blocking     (conditions)   (timers, per        │
//!                         pool)                        session lock)      ▼
//!                                                                  effects worker
//!                                                                  evidence → log → publish
//! ```
//!
//! Unknown or stopped sessions are ignored on every ingest path. Each ingest
//! takes its session turn before detection, so one session's observations
//! reach the monitor in arrival order while other sessions run freely.

use crate::aggregator::SignalAggregator;
use crate::config::{ConfigError, EngineConfig};
use crate::detector::{analyze_audio, detect_frame, AudioDetector, FrameDetector, JsonSignalDetector};
use crate::effects::EffectSinks;
use crate::evidence::{store_from_config, EvidenceError, EvidenceMedia, EvidenceStore, MediaKind};
use crate::notify::{Notifier, TracingNotifier};
use crate::registry::{SessionDrain, SessionHandle, SessionRegistry};
use crate::scoring::CheatingScorer;
use crate::violation_log::{LogError, MemoryViolationLog, ViolationLog};
use proctor_core::{ErrorCode, Severity, ViolationEvent, ViolationKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Evidence(#[from] EvidenceError),
}

pub struct ProctorEngine {
    config: Arc<EngineConfig>,
    aggregator: SignalAggregator,
    scorer: CheatingScorer,
    frame_detector: Arc<dyn FrameDetector>,
    audio_detector: Arc<dyn AudioDetector>,
    log: Arc<dyn ViolationLog>,
    capture_media: bool,
    registry: SessionRegistry,
}

pub struct EngineBuilder {
    config: EngineConfig,
    frame_detector: Option<Arc<dyn FrameDetector>>,
    audio_detector: Option<Arc<dyn AudioDetector>>,
    log: Option<Arc<dyn ViolationLog>>,
    notifier: Option<Arc<dyn Notifier>>,
    evidence: Option<Option<Arc<dyn EvidenceStore>>>,
}

impl EngineBuilder {
    pub fn frame_detector(mut self, detector: Arc<dyn FrameDetector>) -> Self {
        self.frame_detector = Some(detector);
        self
    }

    pub fn audio_detector(mut self, detector: Arc<dyn AudioDetector>) -> Self {
        self.audio_detector = Some(detector);
        self
    }

    pub fn violation_log(mut self, log: Arc<dyn ViolationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Override the store selected by `config.evidence` (None disables capture)
    pub fn evidence_store(mut self, store: Option<Arc<dyn EvidenceStore>>) -> Self {
        self.evidence = Some(store);
        self
    }

    pub fn build(self) -> Result<ProctorEngine, EngineError> {
        self.config.validate()?;

        let evidence = match self.evidence {
            Some(store) => store,
            None => store_from_config(&self.config.evidence)?,
        };
        let log: Arc<dyn ViolationLog> = match self.log {
            Some(log) => log,
            None => Arc::new(MemoryViolationLog::new()),
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(TracingNotifier),
        };
        let frame_detector: Arc<dyn FrameDetector> = match self.frame_detector {
            Some(detector) => detector,
            None => Arc::new(JsonSignalDetector),
        };
        let audio_detector: Arc<dyn AudioDetector> = match self.audio_detector {
            Some(detector) => detector,
            None => Arc::new(JsonSignalDetector),
        };
        let capture_media = evidence.is_some();

        let config = Arc::new(self.config);
        let sinks = EffectSinks {
            evidence,
            log: log.clone(),
            notifier,
        };

        Ok(ProctorEngine {
            aggregator: SignalAggregator::new(config.thresholds.clone()),
            scorer: CheatingScorer::new(config.scoring.clone()),
            frame_detector,
            audio_detector,
            log,
            capture_media,
            registry: SessionRegistry::new(config.clone(), sinks),
            config,
        })
    }
}

impl ProctorEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            frame_detector: None,
            audio_detector: None,
            log: None,
            notifier: None,
            evidence: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn start_session(&self, session_id: &str) -> Arc<SessionHandle> {
        self.registry.start(session_id)
    }

    pub async fn stop_session(&self, session_id: &str) -> Option<SessionDrain> {
        self.registry.stop(session_id).await
    }

    pub fn active_sessions(&self) -> Vec<String> {
        self.registry.active_sessions()
    }

    fn media(&self, kind: MediaKind, bytes: &Arc<[u8]>, now_ms: i64) -> Option<EvidenceMedia> {
        self.capture_media.then(|| EvidenceMedia {
            kind,
            bytes: bytes.clone(),
            captured_at_ms: now_ms,
        })
    }

    pub async fn ingest_frame(
        &self,
        session_id: &str,
        frame: impl Into<Arc<[u8]>>,
        now_ms: i64,
    ) -> Vec<ViolationEvent> {
        let Some(handle) = self.registry.get(session_id) else {
            debug!(session_id, code = ErrorCode::UnknownSession.as_str(), "frame ignored");
            return Vec::new();
        };
        let frame: Arc<[u8]> = frame.into();

        // Held across detection so a slow detector cannot reorder the session
        let Some(mut turn) = handle.turn().await else {
            return Vec::new();
        };

        let outcome = detect_frame(self.frame_detector.clone(), frame.clone()).await;
        let conditions = self.aggregator.frame_outcome(session_id, outcome);
        if conditions.is_empty() {
            return Vec::new();
        }

        let media = self.media(MediaKind::Frame, &frame, now_ms);
        turn.ingest_frame(&conditions, now_ms, media).await
    }

    pub async fn ingest_audio(
        &self,
        session_id: &str,
        chunk: impl Into<Arc<[u8]>>,
        now_ms: i64,
    ) -> Vec<ViolationEvent> {
        let Some(handle) = self.registry.get(session_id) else {
            debug!(session_id, code = ErrorCode::UnknownSession.as_str(), "audio ignored");
            return Vec::new();
        };
        let chunk: Arc<[u8]> = chunk.into();

        // Held across detection so a slow detector cannot reorder the session
        let Some(mut turn) = handle.turn().await else {
            return Vec::new();
        };

        let outcome = analyze_audio(self.audio_detector.clone(), chunk.clone()).await;
        let conditions = self.aggregator.audio_outcome(session_id, outcome);
        if conditions.is_empty() {
            return Vec::new();
        }

        let media = self.media(MediaKind::Audio, &chunk, now_ms);
        turn.ingest_audio(&conditions, now_ms, media).await
    }

    /// Record a client-reported violation; severity comes from the policy table
    pub async fn report_direct(
        &self,
        session_id: &str,
        kind: ViolationKind,
        description: Option<&str>,
        now_ms: i64,
    ) -> Option<ViolationEvent> {
        self.report_direct_with_severity(session_id, kind, description, None, now_ms)
            .await
    }

    pub async fn report_direct_with_severity(
        &self,
        session_id: &str,
        kind: ViolationKind,
        description: Option<&str>,
        severity: Option<Severity>,
        now_ms: i64,
    ) -> Option<ViolationEvent> {
        let Some(handle) = self.registry.get(session_id) else {
            debug!(
                session_id,
                code = ErrorCode::UnknownSession.as_str(),
                kind = kind.as_str(),
                "direct report ignored"
            );
            return None;
        };
        handle
            .report_direct(kind, description, severity, now_ms)
            .await
    }

    /// Recompute the session's score from its log and persist it
    pub async fn current_score(&self, session_id: &str) -> Result<f64, LogError> {
        let log = self.log.clone();
        let sid = session_id.to_string();
        let scorer = self.scorer.clone();

        let joined = tokio::task::spawn_blocking(move || -> Result<f64, LogError> {
            let tallies = log.tallies(&sid)?;
            let score = scorer.score(&tallies);
            log.record_score(&sid, score, chrono::Utc::now().timestamp_millis())?;
            Ok(score)
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) => Err(LogError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            ))),
        }
    }
}
