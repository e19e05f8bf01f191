//! Session registry
//!
//! The only cross-session shared state: a concurrent map from session id to
//! a `SessionHandle`. Each handle serializes its own monitor behind an async
//! mutex, so sessions progress independently and a slow session never holds
//! a lock another session needs.

use crate::aggregator::Conditions;
use crate::config::EngineConfig;
use crate::effects::{spawn_worker, EffectJob, EffectSinks, SessionStats};
use crate::evidence::EvidenceMedia;
use crate::monitor::SessionMonitor;
use dashmap::DashMap;
use proctor_core::{Severity, ViolationEvent, ViolationKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct SessionSlot {
    monitor: SessionMonitor,
    effects: Option<mpsc::Sender<EffectJob>>,
}

/// One active session: its monitor plus the sender feeding its effects worker
pub struct SessionHandle {
    session_id: String,
    open: Arc<AtomicBool>,
    slot: tokio::sync::Mutex<SessionSlot>,
    worker: Mutex<Option<JoinHandle<SessionStats>>>,
}

impl SessionHandle {
    fn spawn(session_id: &str, config: Arc<EngineConfig>, sinks: EffectSinks) -> Self {
        let open = Arc::new(AtomicBool::new(true));
        let (tx, worker) = spawn_worker(
            session_id.to_string(),
            sinks,
            open.clone(),
            config.effect_queue_depth,
        );
        Self {
            session_id: session_id.to_string(),
            open,
            slot: tokio::sync::Mutex::new(SessionSlot {
                monitor: SessionMonitor::new(session_id, config),
                effects: Some(tx),
            }),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Reserve this session's next turn. Turns are granted in request order,
    /// so callers that take one before running detection keep arrival order.
    /// None once the session has stopped.
    pub async fn turn(&self) -> Option<SessionTurn<'_>> {
        let slot = self.slot.lock().await;
        if !self.is_open() {
            return None;
        }
        Some(SessionTurn { handle: self, slot })
    }

    pub async fn ingest_frame(
        &self,
        conditions: &Conditions,
        now_ms: i64,
        media: Option<EvidenceMedia>,
    ) -> Vec<ViolationEvent> {
        match self.turn().await {
            Some(mut turn) => turn.ingest_frame(conditions, now_ms, media).await,
            None => Vec::new(),
        }
    }

    pub async fn ingest_audio(
        &self,
        conditions: &Conditions,
        now_ms: i64,
        media: Option<EvidenceMedia>,
    ) -> Vec<ViolationEvent> {
        match self.turn().await {
            Some(mut turn) => turn.ingest_audio(conditions, now_ms, media).await,
            None => Vec::new(),
        }
    }

    pub async fn report_direct(
        &self,
        kind: ViolationKind,
        description: Option<&str>,
        severity: Option<Severity>,
        now_ms: i64,
    ) -> Option<ViolationEvent> {
        let turn = self.turn().await?;
        Some(turn.report_direct(kind, description, severity, now_ms).await)
    }

    /// Number of kinds with an episode in progress
    pub async fn active_timers(&self) -> usize {
        self.slot.lock().await.monitor.active_timers()
    }
}

/// Exclusive access to one session's monitor, held from before detection
/// until the resulting events are queued.
pub struct SessionTurn<'a> {
    handle: &'a SessionHandle,
    slot: tokio::sync::MutexGuard<'a, SessionSlot>,
}

impl SessionTurn<'_> {
    pub async fn ingest_frame(
        &mut self,
        conditions: &Conditions,
        now_ms: i64,
        media: Option<EvidenceMedia>,
    ) -> Vec<ViolationEvent> {
        let events = self.slot.monitor.ingest_frame_signals(conditions, now_ms);
        self.dispatch(&events, media).await;
        events
    }

    pub async fn ingest_audio(
        &mut self,
        conditions: &Conditions,
        now_ms: i64,
        media: Option<EvidenceMedia>,
    ) -> Vec<ViolationEvent> {
        let events = self.slot.monitor.ingest_audio_signals(conditions, now_ms);
        self.dispatch(&events, media).await;
        events
    }

    pub async fn report_direct(
        self,
        kind: ViolationKind,
        description: Option<&str>,
        severity: Option<Severity>,
        now_ms: i64,
    ) -> ViolationEvent {
        let event = self
            .slot
            .monitor
            .process_direct_violation(kind, description, severity, now_ms);
        self.dispatch(std::slice::from_ref(&event), None).await;
        event
    }

    // Enqueued while the turn is held so the worker sees events in decision order
    async fn dispatch(&self, events: &[ViolationEvent], media: Option<EvidenceMedia>) {
        if events.is_empty() {
            return;
        }
        let Some(tx) = self.slot.effects.as_ref() else {
            return;
        };
        let job = EffectJob {
            events: events.to_vec(),
            media,
        };
        if tx.send(job).await.is_err() {
            warn!(session_id = %self.handle.session_id, "effects worker gone; events not persisted");
        }
    }
}

/// Awaitable completion of a stopped session's effects
pub struct SessionDrain {
    session_id: String,
    worker: Option<JoinHandle<SessionStats>>,
}

impl SessionDrain {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Wait until every queued effect for the session has run
    pub async fn wait(self) -> SessionStats {
        let Some(worker) = self.worker else {
            return SessionStats::default();
        };
        match worker.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "effects worker aborted");
                SessionStats::default()
            }
        }
    }
}

pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionHandle>>,
    config: Arc<EngineConfig>,
    sinks: EffectSinks,
}

impl SessionRegistry {
    pub fn new(config: Arc<EngineConfig>, sinks: EffectSinks) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            sinks,
        }
    }

    /// Register a session, or return the one already registered under this id.
    ///
    /// Must be called from within a Tokio runtime (the effects worker is spawned here).
    pub fn start(&self, session_id: &str) -> Arc<SessionHandle> {
        if let Some(existing) = self.get(session_id) {
            debug!(session_id, "session already active");
            return existing;
        }

        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!(session_id, "session started");
                Arc::new(SessionHandle::spawn(
                    session_id,
                    self.config.clone(),
                    self.sinks.clone(),
                ))
            })
            .value()
            .clone()
    }

    /// Remove a session. Future ingestion for the id is a no-op immediately;
    /// effects already queued keep running and can be awaited via the drain.
    pub async fn stop(&self, session_id: &str) -> Option<SessionDrain> {
        let (_, handle) = self.sessions.remove(session_id)?;
        handle.open.store(false, Ordering::Release);

        // Waits out an in-flight turn, then closes the queue
        handle.slot.lock().await.effects.take();

        let worker = handle
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        info!(session_id, "session stopped");

        Some(SessionDrain {
            session_id: session_id.to_string(),
            worker,
        })
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(session_id).map(|h| h.value().clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Sorted ids of every active session
    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::TracingNotifier;
    use crate::violation_log::MemoryViolationLog;
    use std::collections::BTreeMap;

    fn registry() -> (SessionRegistry, Arc<MemoryViolationLog>) {
        let log = Arc::new(MemoryViolationLog::new());
        let sinks = EffectSinks {
            evidence: None,
            log: log.clone(),
            notifier: Arc::new(TracingNotifier),
        };
        (
            SessionRegistry::new(Arc::new(EngineConfig::default()), sinks),
            log,
        )
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (registry, _) = registry();
        let a = registry.start("s1");
        let b = registry.start("s1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_removes_and_closes() {
        let (registry, _) = registry();
        let handle = registry.start("s1");

        let drain = registry.stop("s1").await.unwrap();
        assert_eq!(drain.session_id(), "s1");
        assert!(!handle.is_open());
        assert!(registry.get("s1").is_none());
        assert!(registry.is_empty());

        // Stale handles cannot drive a stopped monitor
        let conditions = BTreeMap::from([(ViolationKind::NoPersonDetected, true)]);
        assert!(handle.ingest_frame(&conditions, 0, None).await.is_empty());
        assert_eq!(handle.active_timers().await, 0);

        drain.wait().await;
        assert!(registry.stop("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_direct_violation_reaches_log() {
        let (registry, log) = registry();
        let handle = registry.start("s1");
        let event = handle
            .report_direct(ViolationKind::TabSwitch, None, None, 10)
            .await
            .unwrap();
        assert_eq!(event.kind, ViolationKind::TabSwitch);

        let stats = registry.stop("s1").await.unwrap().wait().await;
        assert_eq!(stats.events_dispatched, 1);
        assert_eq!(log.events_for("s1").len(), 1);
    }

    #[tokio::test]
    async fn test_active_sessions_sorted() {
        let (registry, _) = registry();
        registry.start("b");
        registry.start("a");
        assert_eq!(registry.active_sessions(), vec!["a", "b"]);
        assert!(registry.contains("a"));
    }
}
