//! End-to-end run: provider samples through the tracker into the offline queue.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{init_logging, RecordingBackend, ScriptedProvider};
use run_tracker::{
    persist_run, Clock, ConnectivityFlag, Coordinate, ManualClock, MemoryStore, OfflineActionQueue,
    QueueConfig, RunOutcome, RunTracker, SavePolicy, SessionState, TrackerConfig, TrackerError,
};

/// Roughly 3 m of latitude.
const STEP_DEG: f64 = 0.000027;

fn tracker() -> (RunTracker<ScriptedProvider, ManualClock>, Arc<ScriptedProvider>, ManualClock) {
    let provider = Arc::new(ScriptedProvider::new());
    let clock = ManualClock::new(1_700_000_000_000);
    let tracker = RunTracker::new(Arc::clone(&provider), clock.clone(), TrackerConfig::default());
    (tracker, provider, clock)
}

/// Emit `count` fixes one second apart, heading north.
async fn run_north(provider: &ScriptedProvider, clock: &ManualClock, from_step: u32, count: u32) {
    for step in from_step..from_step + count {
        clock.advance_secs(1);
        provider.emit(Coordinate::new(
            51.5 + step as f64 * STEP_DEG,
            -0.12,
            clock.now_millis(),
        ));
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn full_run_is_saved_when_online() {
    init_logging();
    let (tracker, provider, clock) = tracker();
    let backend = Arc::new(RecordingBackend::default());
    let queue = OfflineActionQueue::open(
        MemoryStore::new(),
        Arc::clone(&backend),
        ConnectivityFlag::new(true),
        QueueConfig::default(),
    )
    .unwrap();

    tracker.start().unwrap();
    run_north(&provider, &clock, 0, 30).await;
    tracker.pause().unwrap();
    clock.advance_secs(120);
    tracker.resume().unwrap();
    run_north(&provider, &clock, 30, 30).await;

    let record = tracker.stop();
    assert!(!provider.is_watching());
    assert_eq!(tracker.state(), SessionState::Stopped);
    assert_eq!(record.route.len(), 60);
    // Paused time is excluded
    assert_eq!(record.stats.duration_seconds, 60);
    assert!(record.stats.distance_km > 0.17 && record.stats.distance_km < 0.18);
    assert!(record.stats.max_speed_kmh >= record.stats.avg_speed_kmh);

    let outcome = persist_run(&queue, &record, &SavePolicy::default())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Delivered);

    let runs = backend.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].duration_seconds, 60);
    assert_eq!(runs[0].point_count, 60);
    assert!(!runs[0].route_polyline.is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_is_queued_offline_and_delivered_later() {
    init_logging();
    let (tracker, provider, clock) = tracker();
    let backend = Arc::new(RecordingBackend::default());
    let connectivity = ConnectivityFlag::new(false);
    let queue = OfflineActionQueue::open(
        MemoryStore::new(),
        Arc::clone(&backend),
        connectivity.clone(),
        QueueConfig::default(),
    )
    .unwrap();

    tracker.start().unwrap();
    run_north(&provider, &clock, 0, 20).await;
    let record = tracker.stop();

    let outcome = persist_run(&queue, &record, &SavePolicy::default())
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Queued(_)));
    assert_eq!(queue.len(), 1);

    // The periodic retry picks it up once the device is back online
    connectivity.set_online(true);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(queue.is_empty());
    assert_eq!(backend.runs().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn short_run_is_discarded() {
    init_logging();
    let (tracker, provider, clock) = tracker();
    let backend = Arc::new(RecordingBackend::default());
    let queue = OfflineActionQueue::open(
        MemoryStore::new(),
        Arc::clone(&backend),
        ConnectivityFlag::new(true),
        QueueConfig::default(),
    )
    .unwrap();

    tracker.start().unwrap();
    run_north(&provider, &clock, 0, 3).await;
    let record = tracker.stop();

    let outcome = persist_run(&queue, &record, &SavePolicy::default())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Discarded);
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn denied_permission_keeps_tracker_idle() {
    init_logging();
    let (tracker, provider, _clock) = tracker();
    provider.granted.store(false, Ordering::SeqCst);

    assert!(matches!(tracker.start(), Err(TrackerError::PermissionDenied)));
    assert_eq!(tracker.state(), SessionState::Idle);
    assert!(!provider.is_watching());
}
