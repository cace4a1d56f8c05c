use std::time::Duration;

use crate::object::ObjectKey;

/// What the queue should do with a key after a successful reconcile.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    requeue_after: Option<Duration>,
}

impl Action {
    /// Nothing left to do until the next change notification.
    pub fn done() -> Self {
        Action {
            requeue_after: None,
        }
    }

    /// Run the key again after `duration`, even without a change notification.
    pub fn requeue(duration: Duration) -> Self {
        Action {
            requeue_after: Some(duration),
        }
    }

    /// The explicit requeue delay, if any.
    pub fn requeue_after(&self) -> Option<Duration> {
        self.requeue_after
    }
}

/// A step function converting desired state plus observed state into
/// corrective actions for a single object.
///
/// The runtime may call `reconcile` concurrently for different keys and
/// repeatedly for the same key, so every step must be idempotent. Returning
/// an error schedules a retry with backoff.
///
/// **Note**: this trait is defined using
/// [async-trait](https://crates.io/crates/async-trait).
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Bring the object named by `key` closer to its desired state.
    async fn reconcile(&self, key: ObjectKey) -> anyhow::Result<Action>;
}
