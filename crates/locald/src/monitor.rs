//! Session monitor
//!
//! Owns one session's violation timers and decides, per observation, which
//! violations are confirmed. Pure decision logic: no I/O, no locking. The
//! registry serializes calls and hands the resulting events to the effects
//! worker.

use crate::aggregator::Conditions;
use crate::config::{EmissionPolicy, EngineConfig};
use crate::timer::ViolationTimer;
use proctor_core::{Modality, Severity, ViolationEvent, ViolationKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SessionMonitor {
    session_id: String,
    config: Arc<EngineConfig>,
    timers: HashMap<ViolationKind, ViolationTimer>,
}

impl SessionMonitor {
    pub fn new(session_id: impl Into<String>, config: Arc<EngineConfig>) -> Self {
        Self {
            session_id: session_id.into(),
            config,
            timers: HashMap::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Timer for a kind with an episode in progress
    pub fn timer(&self, kind: ViolationKind) -> Option<&ViolationTimer> {
        self.timers.get(&kind).filter(|t| t.onset_ms().is_some())
    }

    /// Number of kinds with an episode in progress
    pub fn active_timers(&self) -> usize {
        self.timers.values().filter(|t| t.onset_ms().is_some()).count()
    }

    pub fn ingest_frame_signals(&mut self, conditions: &Conditions, now_ms: i64) -> Vec<ViolationEvent> {
        self.ingest(Modality::Frame, conditions, now_ms)
    }

    pub fn ingest_audio_signals(&mut self, conditions: &Conditions, now_ms: i64) -> Vec<ViolationEvent> {
        self.ingest(Modality::Audio, conditions, now_ms)
    }

    fn ingest(
        &mut self,
        modality: Modality,
        conditions: &Conditions,
        now_ms: i64,
    ) -> Vec<ViolationEvent> {
        let mut events = Vec::new();

        for (&kind, &is_true) in conditions {
            if kind.modality() != modality {
                warn!(session_id = %self.session_id, kind = kind.as_str(), "condition on wrong stream ignored");
                continue;
            }

            if !is_true {
                if let Some(timer) = self.timers.get_mut(&kind) {
                    if let Some(onset_ms) = timer.onset_ms() {
                        debug!(
                            session_id = %self.session_id,
                            kind = kind.as_str(),
                            onset_ms,
                            "episode cleared"
                        );
                    }
                    timer.observe(false, now_ms);
                }
                continue;
            }

            let policy = self.config.policy(kind);
            let timer = self.timers.entry(kind).or_default();
            timer.observe(true, now_ms);

            if !timer.is_confirmed(now_ms, policy.confirm_ms()) {
                continue;
            }

            let first = timer.mark_confirmed();
            let emit = match self.config.emission {
                EmissionPolicy::EveryObservation => true,
                EmissionPolicy::OncePerEpisode => first,
            };
            if !emit {
                continue;
            }

            if first {
                info!(
                    session_id = %self.session_id,
                    kind = kind.as_str(),
                    severity = policy.severity.as_str(),
                    onset_ms = timer.onset_ms(),
                    ts_ms = now_ms,
                    "violation confirmed"
                );
            }
            events.push(ViolationEvent::new(
                &self.session_id,
                kind,
                policy.severity,
                kind.default_description(),
                now_ms,
            ));
        }

        events
    }

    /// Client-reported violation: emitted immediately, timers untouched
    pub fn process_direct_violation(
        &self,
        kind: ViolationKind,
        description: Option<&str>,
        severity: Option<Severity>,
        now_ms: i64,
    ) -> ViolationEvent {
        let severity = severity.unwrap_or_else(|| self.config.policy(kind).severity);
        let description = description.unwrap_or_else(|| kind.default_description());
        info!(
            session_id = %self.session_id,
            kind = kind.as_str(),
            severity = severity.as_str(),
            "direct violation"
        );
        ViolationEvent::new(&self.session_id, kind, severity, description, now_ms)
    }
}
