//! # Offline Action Queue
//!
//! Durable FIFO of backend writes that could not be delivered right away.
//!
//! ## Delivery rules
//!
//! 1. Items are attempted strictly in enqueue order
//! 2. The first failure ends the pass, so dependent writes never overtake
//!    each other (a goal update is never skipped in favour of its delete)
//! 3. An item that fails `max_retries` times is dropped, a
//!    [`QueueEvent::Dropped`] is broadcast, and the pass moves on
//! 4. Only one pass runs at a time; overlapping calls return immediately
//!
//! The whole queue is rewritten to the [`KeyValueStore`] after every change.
//! While items remain, a background Tokio task retries every
//! `retry_interval_ms` when the device is online.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::actions::{Action, ActionKind, QueuedAction};
use crate::backend::{self, Backend, Connectivity};
use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::error::{Result, TrackerError};
use crate::storage::KeyValueStore;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Diagnostic events emitted by the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Enqueued {
        id: String,
        kind: ActionKind,
    },
    Delivered {
        id: String,
        kind: ActionKind,
    },
    /// Delivery failed; the item stays at the head of the queue
    RetryScheduled {
        id: String,
        kind: ActionKind,
        retry_count: u32,
    },
    /// Delivery failed too often; the write is lost
    Dropped {
        id: String,
        kind: ActionKind,
        retry_count: u32,
        error: String,
    },
}

/// Summary of one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub delivered: u32,
    /// Failures that left the item queued for another attempt
    pub failed: u32,
    pub dropped: u32,
    /// The pass did not run (offline or another pass in progress)
    pub skipped: bool,
}

/// Result of [`OfflineActionQueue::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Written straight to the backend
    Delivered,
    /// Queued under this id for later delivery
    Queued(String),
}

/// Durable, ordered, retrying queue of backend writes.
///
/// Cheap to clone; clones share the same queue. The background retry timer
/// is only armed when the queue is used from within a Tokio runtime; without
/// one, delivery happens only on explicit passes.
pub struct OfflineActionQueue<S: KeyValueStore, B: Backend, N: Connectivity> {
    shared: Arc<Shared<S, B, N>>,
}

impl<S: KeyValueStore, B: Backend, N: Connectivity> Clone for OfflineActionQueue<S, B, N> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<S, B, N> {
    store: S,
    backend: B,
    connectivity: N,
    config: QueueConfig,
    now_millis: Box<dyn Fn() -> i64 + Send + Sync>,
    items: Mutex<VecDeque<QueuedAction>>,
    processing: AtomicBool,
    retry_task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<QueueEvent>,
}

impl<S, B, N> Drop for Shared<S, B, N> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.retry_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Clears the processing flag when a pass ends, even if it is cancelled.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<S: KeyValueStore, B: Backend, N: Connectivity> OfflineActionQueue<S, B, N> {
    /// Open the queue, restoring any items persisted by a previous process.
    ///
    /// Unreadable persisted data is logged and discarded. When called inside
    /// a Tokio runtime with restored items, the retry timer is armed.
    pub fn open(store: S, backend: B, connectivity: N, config: QueueConfig) -> Result<Self> {
        Self::open_with_clock(store, backend, connectivity, config, SystemClock)
    }

    /// Like [`OfflineActionQueue::open`], stamping items with `clock`.
    pub fn open_with_clock<C: Clock>(
        store: S,
        backend: B,
        connectivity: N,
        config: QueueConfig,
        clock: C,
    ) -> Result<Self> {
        let items = match store.get(&config.storage_key)? {
            Some(json) => match serde_json::from_str::<VecDeque<QueuedAction>>(&json) {
                Ok(items) => items,
                Err(e) => {
                    warn!("Discarding unreadable offline queue: {}", e);
                    store.remove(&config.storage_key)?;
                    VecDeque::new()
                }
            },
            None => VecDeque::new(),
        };
        if !items.is_empty() {
            info!("Restored {} queued actions", items.len());
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let queue = Self {
            shared: Arc::new(Shared {
                store,
                backend,
                connectivity,
                config,
                now_millis: Box::new(move || clock.now_millis()),
                items: Mutex::new(items),
                processing: AtomicBool::new(false),
                retry_task: Mutex::new(None),
                events,
            }),
        };

        if !queue.is_empty() {
            queue.arm_retry_timer();
        }
        Ok(queue)
    }

    /// Queue an action, then try to deliver immediately when online.
    ///
    /// Returns the new item's id. Fails only if the queue cannot be persisted,
    /// in which case the action is not queued.
    pub async fn enqueue(&self, action: Action) -> Result<String> {
        let id = self.push(action)?;
        if self.shared.connectivity.is_online() {
            self.process_queue().await;
        }
        Ok(id)
    }

    /// Write-through: deliver directly when online and nothing is waiting,
    /// otherwise (or on failure) queue for later.
    pub async fn submit(&self, action: Action) -> Result<SubmitOutcome> {
        if !self.shared.connectivity.is_online() || !self.is_empty() {
            return self.enqueue(action).await.map(SubmitOutcome::Queued);
        }

        match backend::dispatch(&self.shared.backend, &action).await {
            Ok(()) => {
                debug!("Delivered {} directly", action.kind());
                Ok(SubmitOutcome::Delivered)
            }
            Err(e) => {
                warn!("Direct {} failed, queueing: {}", action.kind(), e);
                self.push(action).map(SubmitOutcome::Queued)
            }
        }
    }

    /// Run one delivery pass over the queue.
    ///
    /// No-op while offline or while another pass is running.
    pub async fn process_queue(&self) -> ProcessReport {
        if !self.shared.connectivity.is_online() {
            return ProcessReport {
                skipped: true,
                ..ProcessReport::default()
            };
        }
        self.run_pass().await
    }

    /// React to a reachability change reported by the host.
    ///
    /// A `true` report runs a pass right away, even if the [`Connectivity`]
    /// source has not caught up yet.
    pub async fn on_connectivity_changed(&self, online: bool) -> ProcessReport {
        if online {
            info!("Connectivity restored, processing {} queued actions", self.len());
            self.run_pass().await
        } else {
            ProcessReport {
                skipped: true,
                ..ProcessReport::default()
            }
        }
    }

    async fn run_pass(&self) -> ProcessReport {
        let shared = &self.shared;
        let mut report = ProcessReport::default();

        if shared
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Queue pass already in progress");
            report.skipped = true;
            return report;
        }
        let _guard = ProcessingGuard(&shared.processing);

        while let Some(item) = self.front() {
            match backend::dispatch(&shared.backend, &item.action).await {
                Ok(()) => {
                    self.remove(&item.id);
                    report.delivered += 1;
                    debug!("Delivered queued {} ({})", item.kind(), item.id);
                    let _ = shared.events.send(QueueEvent::Delivered {
                        id: item.id.clone(),
                        kind: item.kind(),
                    });
                    self.persist_logged();
                }
                Err(e) => {
                    let Some(retry_count) = self.record_failure(&item.id) else {
                        // Cleared while the request was in flight
                        break;
                    };
                    if retry_count >= shared.config.max_retries {
                        self.remove(&item.id);
                        report.dropped += 1;
                        warn!(
                            "Dropping queued {} ({}) after {} failed attempts; the change is lost: {}",
                            item.kind(),
                            item.id,
                            retry_count,
                            e
                        );
                        let _ = shared.events.send(QueueEvent::Dropped {
                            id: item.id.clone(),
                            kind: item.kind(),
                            retry_count,
                            error: e.to_string(),
                        });
                        self.persist_logged();
                        continue;
                    }

                    report.failed += 1;
                    info!(
                        "Queued {} ({}) failed attempt {}: {}",
                        item.kind(),
                        item.id,
                        retry_count,
                        e
                    );
                    let _ = shared.events.send(QueueEvent::RetryScheduled {
                        id: item.id.clone(),
                        kind: item.kind(),
                        retry_count,
                    });
                    self.persist_logged();
                    break;
                }
            }
        }

        report
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Snapshot of the queued items in delivery order.
    pub fn pending(&self) -> Vec<QueuedAction> {
        self.items().iter().cloned().collect()
    }

    /// Drop every queued item, stop the retry timer and wipe storage.
    pub fn clear(&self) -> Result<()> {
        self.cancel_retry_timer();
        {
            let mut items = self.items();
            items.clear();
            self.shared.store.remove(&self.shared.config.storage_key)?;
        }
        info!("Offline queue cleared");
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn items(&self) -> MutexGuard<'_, VecDeque<QueuedAction>> {
        // Queue mutations never panic mid-update, so a poisoned lock still
        // guards consistent data
        self.shared
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append, persist and arm the timer. Rolled back if persisting fails.
    fn push(&self, action: Action) -> Result<String> {
        let item = QueuedAction::new(action, (self.shared.now_millis)());
        let id = item.id.clone();
        let kind = item.kind();
        let pending = {
            let mut items = self.items();
            items.push_back(item);
            if let Err(e) = self.write(&items) {
                items.pop_back();
                return Err(e);
            }
            items.len()
        };

        debug!("Queued {} ({}), {} pending", kind, id, pending);
        let _ = self.shared.events.send(QueueEvent::Enqueued {
            id: id.clone(),
            kind,
        });
        self.arm_retry_timer();
        Ok(id)
    }

    fn front(&self) -> Option<QueuedAction> {
        self.items().front().cloned()
    }

    fn remove(&self, id: &str) {
        self.items().retain(|queued| queued.id != id);
    }

    fn record_failure(&self, id: &str) -> Option<u32> {
        let mut items = self.items();
        let item = items.iter_mut().find(|queued| queued.id == id)?;
        item.retry_count += 1;
        Some(item.retry_count)
    }

    /// Write `items` to the store. Callers hold the items lock until the
    /// write completes so an older copy never lands after a newer one.
    fn write(&self, items: &VecDeque<QueuedAction>) -> Result<()> {
        let json = serde_json::to_string(items)?;
        self.shared
            .store
            .set(&self.shared.config.storage_key, &json)
            .map_err(|e| TrackerError::PersistenceFailure {
                message: format!("failed to persist offline queue: {}", e),
            })
    }

    fn persist_logged(&self) {
        let items = self.items();
        if let Err(e) = self.write(&items) {
            warn!("{}", e);
        }
    }

    /// Start the periodic retry task unless one is already running.
    fn arm_retry_timer(&self) {
        let mut slot = self
            .shared
            .retry_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No Tokio runtime, retry timer not armed");
            return;
        };

        let weak = Arc::downgrade(&self.shared);
        let interval = Duration::from_millis(self.shared.config.retry_interval_ms);
        *slot = Some(runtime.spawn(retry_loop(weak, interval)));
    }

    fn cancel_retry_timer(&self) {
        let mut slot = self
            .shared
            .retry_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

async fn retry_loop<S: KeyValueStore, B: Backend, N: Connectivity>(
    weak: Weak<Shared<S, B, N>>,
    interval: Duration,
) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(shared) = weak.upgrade() else {
            break;
        };
        let queue = OfflineActionQueue { shared };

        {
            // Checked under the slot lock so a concurrent push re-arms us
            let mut slot = queue
                .shared
                .retry_task
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if queue.is_empty() {
                *slot = None;
                debug!("Offline queue drained, retry timer stopped");
                break;
            }
        }

        if queue.shared.connectivity.is_online() {
            let report = queue.process_queue().await;
            debug!("Retry pass: {:?}", report);
        }
    }
}
