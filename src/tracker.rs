//! # Run Tracker
//!
//! Async wiring of a [`LocationProvider`] to a [`TrackingSession`].
//!
//! - The provider callback only forwards samples over an unbounded channel,
//!   so it never blocks the platform location thread
//! - A pump task owns sample ingestion
//! - A ticker task refreshes the duration once per `tick_interval_ms` while
//!   the session is active
//!
//! Every change publishes a fresh [`StatsSnapshot`] on a `watch` channel.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::actions::{Action, RunPayload};
use crate::backend::{Backend, Connectivity};
use crate::clock::Clock;
use crate::config::{SavePolicy, TrackerConfig};
use crate::error::Result;
use crate::location::{LocationProvider, SampleCallback, SubscriptionHandle};
use crate::queue::{OfflineActionQueue, SubmitOutcome};
use crate::record::FinalRunRecord;
use crate::session::{SessionState, TrackingSession};
use crate::stats::StatsSnapshot;
use crate::storage::KeyValueStore;
use crate::Coordinate;

type SharedSession<P, C> = Arc<Mutex<TrackingSession<P, C>>>;

#[derive(Default)]
struct Tasks {
    ticker: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    subscription: Option<SubscriptionHandle>,
}

/// Live run tracking driven by a location provider.
///
/// Must be started from within a Tokio runtime.
pub struct RunTracker<P: LocationProvider, C: Clock> {
    session: SharedSession<P, C>,
    provider: Arc<P>,
    snapshots: Arc<watch::Sender<StatsSnapshot>>,
    tasks: Mutex<Tasks>,
    tick_interval: Duration,
}

impl<P: LocationProvider, C: Clock> RunTracker<P, C> {
    pub fn new(provider: Arc<P>, clock: C, config: TrackerConfig) -> Self {
        let tick_interval = Duration::from_millis(config.tick_interval_ms.max(1));
        let session = TrackingSession::new(Arc::clone(&provider), clock, config);
        let (snapshots, _) = watch::channel(session.snapshot());
        Self {
            session: Arc::new(Mutex::new(session)),
            provider,
            snapshots: Arc::new(snapshots),
            tasks: Mutex::new(Tasks::default()),
            tick_interval,
        }
    }

    /// Start the session, subscribe to positions and spawn the ticker.
    pub fn start(&self) -> Result<()> {
        lock(&self.session).start()?;

        let (tx, rx) = mpsc::unbounded_channel::<Coordinate>();
        let mut tasks = lock(&self.tasks);
        tasks.pump = Some(tokio::spawn(pump(
            Arc::clone(&self.session),
            rx,
            Arc::clone(&self.snapshots),
        )));

        let callback: SampleCallback = Box::new(move |sample| {
            // Receiver gone means the run was stopped
            let _ = tx.send(sample);
        });
        match self.provider.watch_position(callback) {
            Ok(handle) => tasks.subscription = Some(handle),
            Err(e) => {
                if let Some(pump) = tasks.pump.take() {
                    pump.abort();
                }
                lock(&self.session).reset();
                return Err(e);
            }
        }

        tasks.ticker = Some(self.spawn_ticker());
        drop(tasks);
        self.publish();
        Ok(())
    }

    /// Pause the session and stop the ticker. Samples arriving while paused
    /// are discarded.
    pub fn pause(&self) -> Result<()> {
        lock(&self.session).pause()?;
        abort(&mut lock(&self.tasks).ticker);
        self.publish();
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        lock(&self.session).resume()?;
        let mut tasks = lock(&self.tasks);
        abort(&mut tasks.ticker);
        tasks.ticker = Some(self.spawn_ticker());
        drop(tasks);
        self.publish();
        Ok(())
    }

    /// Tear down the subscription and tasks, then stop the session.
    ///
    /// Samples still in flight in the channel are dropped.
    pub fn stop(&self) -> FinalRunRecord {
        self.shutdown();
        let record = lock(&self.session).stop();
        self.publish();
        record
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        lock(&self.session).snapshot()
    }

    pub fn state(&self) -> SessionState {
        lock(&self.session).state()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.snapshots.subscribe()
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        let snapshots = Arc::clone(&self.snapshots);
        let tick_interval = self.tick_interval;

        tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let snapshot = {
                    let mut session = lock(&session);
                    if session.state() != SessionState::Active {
                        break;
                    }
                    session.refresh();
                    session.snapshot()
                };
                snapshots.send_replace(snapshot);
            }
        })
    }

    fn shutdown(&self) {
        let mut tasks = lock(&self.tasks);
        abort(&mut tasks.ticker);
        if let Some(handle) = tasks.subscription.take() {
            self.provider.unwatch(handle);
        }
        abort(&mut tasks.pump);
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

impl<P: LocationProvider, C: Clock> Drop for RunTracker<P, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn pump<P: LocationProvider, C: Clock>(
    session: SharedSession<P, C>,
    mut samples: mpsc::UnboundedReceiver<Coordinate>,
    snapshots: Arc<watch::Sender<StatsSnapshot>>,
) {
    while let Some(sample) = samples.recv().await {
        let snapshot = {
            let mut session = lock(&session);
            session.ingest(sample);
            session.snapshot()
        };
        snapshots.send_replace(snapshot);
    }
    debug!("Sample channel closed, pump exiting");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Session updates never panic halfway, so recover from poisoning
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn abort(handle: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = handle.take() {
        handle.abort();
    }
}

/// What happened to a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Too short to keep
    Discarded,
    Delivered,
    /// Waiting in the offline queue under this id
    Queued(String),
}

/// Save a finished run if it clears `policy`, writing through the queue.
pub async fn persist_run<S, B, N>(
    queue: &OfflineActionQueue<S, B, N>,
    record: &FinalRunRecord,
    policy: &SavePolicy,
) -> Result<RunOutcome>
where
    S: KeyValueStore,
    B: Backend,
    N: Connectivity,
{
    if !record.is_worth_saving(policy) {
        info!(
            "Discarding run: {:.3} km in {}s is below the save threshold",
            record.stats.distance_km, record.stats.duration_seconds
        );
        return Ok(RunOutcome::Discarded);
    }

    let action = Action::SaveRun(RunPayload::from_record(record));
    let outcome = match queue.submit(action).await? {
        SubmitOutcome::Delivered => RunOutcome::Delivered,
        SubmitOutcome::Queued(id) => RunOutcome::Queued(id),
    };
    info!("Run saved: {:?}", outcome);
    Ok(outcome)
}
