use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedSender};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::object::ObjectKey;
use crate::reconciler::{Action, Reconciler};

const QUEUE_CAPACITY: usize = 1024;

/// Tuning knobs for the work queue.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Upper bound on reconciles running at the same time across all keys.
    pub max_concurrent_reconciles: usize,
    /// Deadline for a single reconcile. Overruns count as failures.
    pub reconcile_timeout: Duration,
    /// First retry delay after a failure.
    pub backoff_base: Duration,
    /// Longest retry delay after repeated failures.
    pub backoff_cap: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_concurrent_reconciles: 4,
            reconcile_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(10),
            backoff_cap: Duration::from_secs(300),
        }
    }
}

/// Deduplicating queue of keys feeding a [`Reconciler`].
///
/// A key is never reconciled twice at the same time. Keys arriving while
/// their reconcile is running are remembered and run once more afterwards.
pub struct WorkQueue<R> {
    reconciler: Arc<R>,
    settings: Settings,
    tx: Sender<ObjectKey>,
    rx: Receiver<ObjectKey>,
}

impl<R: Reconciler> WorkQueue<R> {
    /// Create a queue for `reconciler`.
    pub fn new(reconciler: Arc<R>, settings: Settings) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        WorkQueue {
            reconciler,
            settings,
            tx,
            rx,
        }
    }

    /// Handle for enqueueing keys.
    pub fn sender(&self) -> Sender<ObjectKey> {
        self.tx.clone()
    }

    /// Process keys forever.
    pub async fn run(self) {
        let WorkQueue {
            reconciler,
            settings,
            tx,
            mut rx,
        } = self;
        info!(?settings, "Starting work queue.");

        let semaphore = Arc::new(Semaphore::new(settings.max_concurrent_reconciles.max(1)));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut in_flight: HashSet<ObjectKey> = HashSet::new();
        let mut dirty: HashSet<ObjectKey> = HashSet::new();
        let mut backoff = Backoff::new(settings.backoff_base, settings.backoff_cap);

        let start = |key: ObjectKey| {
            spawn_reconcile(
                Arc::clone(&reconciler),
                Arc::clone(&semaphore),
                settings.reconcile_timeout,
                key,
                done_tx.clone(),
            )
        };

        loop {
            tokio::select! {
                Some(key) = rx.recv() => {
                    if in_flight.contains(&key) {
                        debug!(%key, "Reconcile in progress, deferring.");
                        dirty.insert(key);
                        continue;
                    }
                    in_flight.insert(key.clone());
                    start(key);
                }
                Some((key, outcome)) = done_rx.recv() => {
                    in_flight.remove(&key);
                    let retry = match outcome {
                        Some(action) => {
                            backoff.succeeded(&key);
                            action.requeue_after()
                        }
                        None => Some(backoff.failed(&key)),
                    };
                    if dirty.remove(&key) {
                        in_flight.insert(key.clone());
                        start(key);
                    } else if let Some(delay) = retry {
                        debug!(%key, ?delay, "Scheduling requeue.");
                        schedule(tx.clone(), key, delay);
                    }
                }
                else => break,
            }
        }
    }
}

fn spawn_reconcile<R: Reconciler>(
    reconciler: Arc<R>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    key: ObjectKey,
    done: UnboundedSender<(ObjectKey, Option<Action>)>,
) {
    tokio::spawn(async move {
        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let outcome = match tokio::time::timeout(timeout, reconciler.reconcile(key.clone())).await
        {
            Ok(Ok(action)) => {
                debug!(%key, ?action, "Reconcile succeeded.");
                Some(action)
            }
            Ok(Err(error)) => {
                warn!(%key, ?error, "Reconcile failed.");
                None
            }
            Err(_) => {
                warn!(%key, ?timeout, "Reconcile exceeded deadline.");
                None
            }
        };
        let _ = done.send((key, outcome));
    });
}

fn schedule(tx: Sender<ObjectKey>, key: ObjectKey, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(key).await;
    });
}
