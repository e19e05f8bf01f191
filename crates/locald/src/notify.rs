//! Live notification of confirmed violations
//!
//! Publishing is fire-and-forget: a session with no listeners is not an error,
//! and a failed publish never blocks logging or the next ingest.

use proctor_core::ViolationEvent;
use tokio::sync::broadcast;
use tracing::info;

/// Push a confirmed violation to whoever is watching the session
pub trait Notifier: Send + Sync {
    fn publish(&self, session_id: &str, event: &ViolationEvent) -> Result<(), String>;
}

/// Fan-out over a tokio broadcast channel
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ViolationEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViolationEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, _session_id: &str, event: &ViolationEvent) -> Result<(), String> {
        // Err only means nobody is subscribed right now
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// Emits each violation as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn publish(&self, session_id: &str, event: &ViolationEvent) -> Result<(), String> {
        info!(
            session_id,
            kind = event.kind.as_str(),
            severity = event.severity.as_str(),
            ts_ms = event.ts_ms,
            evidence = event.evidence.is_some(),
            "violation"
        );
        Ok(())
    }
}
