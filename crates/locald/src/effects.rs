//! Per-session effects worker
//!
//! Confirmed events leave the monitor as `EffectJob`s on a bounded channel.
//! One worker per session drains the channel in order and runs, for each job:
//!
//! ```text
//!   EffectJob ──► evidence capture ──► log append ──► publish
//!                 (optional)            (per event)    (per event)
//! ```
//!
//! Each stage logs and continues on failure. Blocking I/O runs on the
//! blocking pool so a slow disk only stalls its own session.

use crate::evidence::{EvidenceMedia, EvidenceStore};
use crate::notify::Notifier;
use crate::violation_log::ViolationLog;
use proctor_core::{EvidenceRef, ViolationEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Events confirmed by one ingest call, plus the media that triggered them
#[derive(Debug, Clone)]
pub struct EffectJob {
    pub events: Vec<ViolationEvent>,
    pub media: Option<EvidenceMedia>,
}

/// Shared collaborators every session worker writes to
#[derive(Clone)]
pub struct EffectSinks {
    pub evidence: Option<Arc<dyn EvidenceStore>>,
    pub log: Arc<dyn ViolationLog>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub events_dispatched: u64,
    pub evidence_failures: u64,
    pub log_failures: u64,
    /// Evidence written after the session stopped; never attached
    pub evidence_discarded: u64,
}

/// Start a session's worker. It exits once every sender is dropped and the
/// queue is drained.
pub fn spawn_worker(
    session_id: String,
    sinks: EffectSinks,
    open: Arc<AtomicBool>,
    queue_depth: usize,
) -> (
    mpsc::Sender<EffectJob>,
    tokio::task::JoinHandle<SessionStats>,
) {
    let (tx, mut rx) = mpsc::channel::<EffectJob>(queue_depth.max(1));

    let handle = tokio::spawn(async move {
        let mut stats = SessionStats::default();
        while let Some(job) = rx.recv().await {
            run_job(&session_id, &sinks, &open, job, &mut stats).await;
        }
        debug!(session_id = %session_id, ?stats, "effects worker drained");
        stats
    });

    (tx, handle)
}

async fn run_job(
    session_id: &str,
    sinks: &EffectSinks,
    open: &AtomicBool,
    job: EffectJob,
    stats: &mut SessionStats,
) {
    let evidence = match (&sinks.evidence, job.media) {
        (Some(store), Some(media)) if !job.events.is_empty() => {
            capture(session_id, store.clone(), media, stats).await
        }
        _ => None,
    };

    // Results that land after stop are never re-associated with the session
    let evidence = match evidence {
        Some(evidence) if !open.load(Ordering::Acquire) => {
            stats.evidence_discarded += 1;
            warn!(session_id, ?evidence, "session stopped; discarding evidence");
            None
        }
        other => other,
    };

    for event in job.events {
        let event = event.with_evidence(evidence.clone());

        let log = sinks.log.clone();
        let logged = {
            let event = event.clone();
            tokio::task::spawn_blocking(move || log.append(&event)).await
        };
        match logged {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                stats.log_failures += 1;
                warn!(session_id, code = e.code().as_str(), error = %e, "violation log append failed");
            }
            Err(e) => {
                stats.log_failures += 1;
                warn!(session_id, error = %e, "violation log append panicked");
            }
        }

        if let Err(e) = sinks.notifier.publish(session_id, &event) {
            warn!(session_id, error = %e, "publish failed");
        }
        stats.events_dispatched += 1;
    }
}

async fn capture(
    session_id: &str,
    store: Arc<dyn EvidenceStore>,
    media: EvidenceMedia,
    stats: &mut SessionStats,
) -> Option<EvidenceRef> {
    let sid = session_id.to_string();
    match tokio::task::spawn_blocking(move || store.capture(&sid, &media)).await {
        Ok(Ok(evidence)) => Some(evidence),
        Ok(Err(e)) => {
            stats.evidence_failures += 1;
            warn!(session_id, code = e.code().as_str(), error = %e, "evidence capture failed");
            None
        }
        Err(e) => {
            stats.evidence_failures += 1;
            warn!(session_id, error = %e, "evidence capture panicked");
            None
        }
    }
}
