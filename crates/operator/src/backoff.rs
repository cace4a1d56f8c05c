//! Per-key retry delays of the work queue.
use std::collections::HashMap;
use std::time::Duration;

use crate::object::ObjectKey;

/// Tracks consecutive failures per key. The delay before the next retry of a
/// key doubles with every failure, starting at `base` and never exceeding
/// `cap`. A success forgets the key.
#[derive(Debug)]
pub(crate) struct Backoff {
    base: Duration,
    cap: Duration,
    failures: HashMap<ObjectKey, u32>,
}

impl Backoff {
    pub(crate) fn new(base: Duration, cap: Duration) -> Self {
        Backoff {
            base,
            cap,
            failures: HashMap::new(),
        }
    }

    /// Count a failed reconcile of `key` and return how long to wait before
    /// retrying it.
    pub(crate) fn failed(&mut self, key: &ObjectKey) -> Duration {
        let failures = self.failures.entry(key.clone()).or_insert(0);
        let delay = self
            .base
            .checked_mul(2u32.saturating_pow(*failures))
            .map_or(self.cap, |delay| delay.min(self.cap));
        *failures = failures.saturating_add(1);
        delay
    }

    /// `key` reconciled successfully, its next failure starts over at `base`.
    pub(crate) fn succeeded(&mut self, key: &ObjectKey) {
        self.failures.remove(key);
    }

    /// Number of keys currently backing off.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.failures.len()
    }
}
