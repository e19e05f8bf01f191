//! Proctoring violation engine
//!
//! Turns noisy per-frame / per-chunk detector output into confirmed,
//! evidence-backed violation events and a per-session cheating score.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │                        ProctorEngine                         │
//!  │                                                              │
//!  │   ┌────────────┐    ┌─────────────┐    ┌─────────────────┐   │
//!  │   │ Detectors  │───▶│ Aggregator  │───▶│ SessionRegistry │   │
//!  │   │ (blocking) │    │ (conditions)│    │  └ SessionMonitor│  │
//!  │   └────────────┘    └─────────────┘    └────────┬────────┘   │
//!  │                                                 │ events     │
//!  │                                                 ▼            │
//!  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐     │
//!  │   │EvidenceStore │◀──│effects worker│──▶│ ViolationLog │     │
//!  │   └──────────────┘   └──────┬───────┘   └──────┬───────┘     │
//!  │                             ▼                  ▼             │
//!  │                        ┌──────────┐     ┌──────────────┐     │
//!  │                        │ Notifier │     │CheatingScorer│     │
//!  │                        └──────────┘     └──────────────┘     │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use proctor_locald::{EngineConfig, ProctorEngine};
//!
//! let engine = ProctorEngine::builder(EngineConfig::default()).build()?;
//! engine.start_session("s1");
//! let events = engine.ingest_frame("s1", frame_bytes, now_ms).await;
//! let score = engine.current_score("s1").await?;
//! ```

pub mod aggregator;
pub mod config;
pub mod detector;
pub mod timer;

// Per-session decision + lifecycle
pub mod monitor;
pub mod registry;

// Side effects of confirmed violations
pub mod effects;
pub mod evidence;
pub mod notify;
pub mod violation_log;

pub mod scoring;

pub mod engine;
pub mod replay;

pub use aggregator::{Conditions, SignalAggregator};
pub use config::{
    ConfigError, EmissionPolicy, EngineConfig, EvidenceConfig, ScoringConfig, Thresholds,
    ViolationPolicy,
};
pub use detector::{AudioDetector, DetectorError, FrameDetector, JsonSignalDetector};
pub use effects::{EffectSinks, SessionStats};
pub use engine::{EngineBuilder, EngineError, ProctorEngine};
pub use evidence::{
    DiskEvidenceStore, EvidenceError, EvidenceMedia, EvidenceStore, MediaKind,
    SqliteBlobEvidenceStore,
};
pub use monitor::SessionMonitor;
pub use notify::{BroadcastNotifier, Notifier, TracingNotifier};
pub use registry::{SessionDrain, SessionHandle, SessionRegistry, SessionTurn};
pub use replay::{run_replay, ReplaySummary};
pub use scoring::CheatingScorer;
pub use timer::ViolationTimer;
pub use violation_log::{
    JsonlViolationLog, LogError, MemoryViolationLog, SqliteViolationLog, ViolationLog,
};

// Re-export core types
pub use proctor_core::{
    AudioSignals, ErrorCode, ErrorReport, EvidenceRef, FrameSignals, Severity, ViolationEvent,
    ViolationKind, ViolationTally,
};
