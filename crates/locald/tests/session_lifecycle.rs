// Integration test: registry lifecycle, cancellation and cross-session isolation

use proctor_locald::{
    DetectorError, EngineConfig, EvidenceError, EvidenceMedia, EvidenceRef, EvidenceStore,
    FrameDetector, FrameSignals, JsonSignalDetector, MemoryViolationLog, ProctorEngine,
    ViolationEvent, ViolationKind,
};
use std::sync::Arc;

fn frame(persons: u32, faces: u32) -> Vec<u8> {
    format!(r#"{{"person_count": {}, "face_count": {}}}"#, persons, faces).into_bytes()
}

fn engine() -> Arc<ProctorEngine> {
    Arc::new(
        ProctorEngine::builder(EngineConfig::default())
            .build()
            .unwrap(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_yields_one_monitor() {
    let engine = engine();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move { engine.start_session("s1") }));
    }
    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap());
    }

    assert_eq!(engine.active_sessions(), vec!["s1".to_string()]);
    assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[tokio::test]
async fn test_stop_then_ingest_is_noop() {
    let engine = engine();
    engine.start_session("s1");
    engine.stop_session("s1").await.unwrap().wait().await;

    assert!(engine.ingest_frame("s1", frame(0, 0), 0).await.is_empty());
    assert!(engine.ingest_audio("s1", br#"{"voice_rms_energy": 1.0}"#.to_vec(), 0).await.is_empty());
    assert!(engine
        .report_direct("s1", ViolationKind::TabSwitch, None, 0)
        .await
        .is_none());
    assert!(engine.registry().get("s1").is_none());
    assert!(engine.active_sessions().is_empty());
}

#[tokio::test]
async fn test_restart_begins_fresh_episode() {
    let engine = engine();
    engine.start_session("s1");
    for i in 0..40 {
        engine.ingest_frame("s1", frame(0, 1), i * 100).await;
    }
    engine.stop_session("s1").await;

    engine.start_session("s1");
    // Prior onset is gone: needs a full 5s again
    assert!(engine.ingest_frame("s1", frame(0, 1), 4000).await.is_empty());
    assert!(engine.ingest_frame("s1", frame(0, 1), 8900).await.is_empty());
    assert!(!engine.ingest_frame("s1", frame(0, 1), 9000).await.is_empty());
}

fn confirmations(events: &[ViolationEvent]) -> Vec<(ViolationKind, i64)> {
    events.iter().map(|e| (e.kind, e.ts_ms)).collect()
}

#[tokio::test]
async fn test_interleaved_sessions_match_isolated_runs() {
    // a: nobody in frame; b: two people, with a gap at 1500ms
    let seq_a: Vec<(i64, Vec<u8>)> = (0..60).map(|i| (i * 100, frame(0, 0))).collect();
    let seq_b: Vec<(i64, Vec<u8>)> = (0..60)
        .map(|i| {
            let f = if i == 15 { frame(1, 1) } else { frame(2, 2) };
            (i * 100, f)
        })
        .collect();

    let alone = engine();
    alone.start_session("a");
    alone.start_session("b");
    let mut alone_a = Vec::new();
    for (ts, f) in &seq_a {
        alone_a.extend(alone.ingest_frame("a", f.clone(), *ts).await);
    }
    let mut alone_b = Vec::new();
    for (ts, f) in &seq_b {
        alone_b.extend(alone.ingest_frame("b", f.clone(), *ts).await);
    }

    let mixed = engine();
    mixed.start_session("a");
    mixed.start_session("b");
    let mut mixed_a = Vec::new();
    let mut mixed_b = Vec::new();
    for ((ts_a, fa), (ts_b, fb)) in seq_a.iter().zip(seq_b.iter()) {
        mixed_b.extend(mixed.ingest_frame("b", fb.clone(), *ts_b).await);
        mixed_a.extend(mixed.ingest_frame("a", fa.clone(), *ts_a).await);
    }

    assert!(!alone_a.is_empty());
    assert!(!alone_b.is_empty());
    assert_eq!(confirmations(&alone_a), confirmations(&mixed_a));
    assert_eq!(confirmations(&alone_b), confirmations(&mixed_b));
    assert!(mixed_a.iter().all(|e| e.session_id == "a"));
}

struct SlowStore {
    delay: std::time::Duration,
}

impl EvidenceStore for SlowStore {
    fn capture(&self, session_id: &str, _: &EvidenceMedia) -> Result<EvidenceRef, EvidenceError> {
        std::thread::sleep(self.delay);
        Ok(EvidenceRef::Path {
            path: format!("/evidence/{}/late.jpg", session_id),
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_discards_in_flight_evidence() {
    let log = Arc::new(MemoryViolationLog::new());
    let engine = ProctorEngine::builder(EngineConfig::default())
        .violation_log(log.clone())
        .evidence_store(Some(Arc::new(SlowStore {
            delay: std::time::Duration::from_millis(300),
        })))
        .build()
        .unwrap();

    engine.start_session("s1");
    engine
        .report_direct("s1", ViolationKind::TabSwitch, None, 0)
        .await;
    for i in 0..=50 {
        engine.ingest_frame("s1", frame(0, 1), i * 100).await;
    }

    // Stop takes effect before the capture finishes
    let drain = engine.stop_session("s1").await.unwrap();
    assert!(engine.ingest_frame("s1", frame(0, 1), 6000).await.is_empty());

    let stats = drain.wait().await;
    assert_eq!(stats.events_dispatched, 2);
    assert_eq!(stats.evidence_discarded, 1);

    let logged = log.events_for("s1");
    assert_eq!(logged.len(), 2);
    assert!(logged.iter().all(|e| e.evidence.is_none()));
}

/// Sleeps for the frame's `delay_ms` before decoding it
struct PacedDetector;

impl FrameDetector for PacedDetector {
    fn detect(&self, frame: &[u8]) -> Result<FrameSignals, DetectorError> {
        let delay = serde_json::from_slice::<serde_json::Value>(frame)
            .ok()
            .and_then(|v| v["delay_ms"].as_u64())
            .unwrap_or(0);
        std::thread::sleep(std::time::Duration::from_millis(delay));
        JsonSignalDetector.detect(frame)
    }
}

fn paced_frame(persons: u32, delay_ms: u64) -> Vec<u8> {
    format!(
        r#"{{"person_count": {p}, "face_count": {p}, "delay_ms": {d}}}"#,
        p = persons,
        d = delay_ms
    )
    .into_bytes()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_detection_keeps_session_arrival_order() {
    let engine = Arc::new(
        ProctorEngine::builder(EngineConfig::default())
            .frame_detector(Arc::new(PacedDetector))
            .build()
            .unwrap(),
    );
    engine.start_session("s1");
    engine.ingest_frame("s1", paced_frame(0, 0), 0).await;

    // A (person back, slow to decode) arrives before B (empty room, fast)
    let a = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.ingest_frame("s1", paced_frame(1, 300), 4900).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.ingest_frame("s1", paced_frame(0, 0), 5000).await })
    };

    let no_person = |events: &[ViolationEvent]| {
        events
            .iter()
            .any(|e| e.kind == ViolationKind::NoPersonDetected)
    };
    assert!(!no_person(&a.await.unwrap()));
    assert!(!no_person(&b.await.unwrap()));

    // A cleared the episode, so B opened a new one at 5000
    assert!(!no_person(&engine.ingest_frame("s1", paced_frame(0, 0), 9999).await));
    assert!(no_person(&engine.ingest_frame("s1", paced_frame(0, 0), 10000).await));
}
