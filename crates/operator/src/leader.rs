//! Single active replica election on top of [`LeaseLock`].

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::lock::{DistributedLock, LeaseLock, LockError};
use crate::object::ObjectKey;

/// Holds a single well known lease for as long as the process is leader.
pub struct LeaderElector {
    lock: LeaseLock,
    key: ObjectKey,
    lease_duration: Duration,
    retry_period: Duration,
}

impl LeaderElector {
    /// Elect over the lease named by `lock` and `key`. The lease is renewed
    /// every `retry_period` and lost after `lease_duration` without renewal.
    pub fn new(
        lock: LeaseLock,
        key: ObjectKey,
        lease_duration: Duration,
        retry_period: Duration,
    ) -> Self {
        LeaderElector {
            lock,
            key,
            lease_duration,
            retry_period,
        }
    }

    /// Wait until this process holds the lease.
    pub async fn acquire(&self) {
        info!(lease = %self.key, identity = %self.lock.identity(), "Waiting for leadership.");
        loop {
            match self.lock.acquire(&self.key).await {
                Ok(()) => {
                    info!(lease = %self.key, "Became leader.");
                    return;
                }
                Err(LockError::Held { holder, .. }) => {
                    info!(%holder, "Lease held by another replica.")
                }
                Err(error) => warn!(?error, "Failed to acquire leadership lease."),
            }
            tokio::time::sleep(self.retry_period).await;
        }
    }

    /// Keep renewing the lease. Returns an error once leadership is lost.
    pub async fn hold(&self) -> anyhow::Result<()> {
        let mut renewed = Instant::now();
        loop {
            tokio::time::sleep(self.retry_period).await;
            match self.lock.acquire(&self.key).await {
                Ok(()) => renewed = Instant::now(),
                Err(LockError::Held { holder, .. }) => {
                    anyhow::bail!("leadership taken over by {}", holder)
                }
                Err(error) => {
                    warn!(?error, "Failed to renew leadership lease.");
                    if renewed.elapsed() > self.lease_duration {
                        anyhow::bail!("leadership lease expired without renewal");
                    }
                }
            }
        }
    }
}
