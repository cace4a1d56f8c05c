//! Per-key mutual exclusion across controller replicas.
//!
//! The cluster backed implementation stores one coordination `Lease` per
//! locked key. A lease whose holder stopped renewing it can be taken over
//! once its duration has passed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{DeleteParams, PostParams, Preconditions};
use kube::error::ErrorResponse;
use kube::Api;
use tracing::{debug, warn};

use crate::object::ObjectKey;

/// Describes the ways taking or giving back a lock can fail.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Another holder owns an unexpired lease.
    #[error("lease {lease} is held by {holder}")]
    Held {
        /// Name of the contended lease.
        lease: String,
        /// Identity of the current holder.
        holder: String,
    },
    /// Talking to the API server failed.
    #[error(transparent)]
    Api(#[from] kube::Error),
}

/// A lock scoped to a single object key.
///
/// **Note**: this trait is defined using
/// [async-trait](https://crates.io/crates/async-trait).
#[async_trait::async_trait]
pub trait DistributedLock: Send + Sync {
    /// Take the lock for `key`, failing immediately if someone else holds it.
    async fn acquire(&self, key: &ObjectKey) -> Result<(), LockError>;

    /// Give the lock for `key` back. Releasing a lock held by someone else is
    /// a no-op.
    async fn release(&self, key: &ObjectKey) -> Result<(), LockError>;
}

/// Run `f` while holding the lock for `key`.
///
/// The lock is released whether `f` succeeds or fails. A failed release is
/// logged and does not override the result of `f`. If the returned future is
/// dropped before `f` completes, e.g. by a deadline, the release runs on a
/// spawned task instead.
pub async fn with_lock<L, F, Fut, T, E>(lock: Arc<L>, key: &ObjectKey, f: F) -> Result<T, E>
where
    L: DistributedLock + ?Sized + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    lock.acquire(key).await?;
    let mut guard = ReleaseGuard {
        lock: Some(lock),
        key: key.clone(),
    };
    let result = f().await;
    if let Some(lock) = guard.lock.take() {
        release_logged(lock.as_ref(), key).await;
    }
    result
}

async fn release_logged<L: DistributedLock + ?Sized>(lock: &L, key: &ObjectKey) {
    if let Err(error) = lock.release(key).await {
        warn!(%key, ?error, "Failed to release lock.");
    }
}

/// Releases a lock whose holder was dropped mid-flight.
struct ReleaseGuard<L: DistributedLock + ?Sized + 'static> {
    lock: Option<Arc<L>>,
    key: ObjectKey,
}

impl<L: DistributedLock + ?Sized + 'static> Drop for ReleaseGuard<L> {
    fn drop(&mut self) {
        let lock = match self.lock.take() {
            Some(lock) => lock,
            None => return,
        };
        let key = self.key.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(%key, "Lock holder dropped, releasing in the background.");
                handle.spawn(async move { release_logged(lock.as_ref(), &key).await });
            }
            Err(_) => warn!(%key, "No runtime to release lock on, leaving it to expire."),
        }
    }
}

/// [`DistributedLock`] backed by coordination.k8s.io/v1 Leases.
#[derive(Clone)]
pub struct LeaseLock {
    client: kube::Client,
    identity: String,
    prefix: String,
    lease_duration: Duration,
}

impl LeaseLock {
    /// Create a lock that records `identity` as holder on leases named
    /// `<prefix>-<key name>`, or just `<key name>` for an empty prefix.
    pub fn new(
        client: kube::Client,
        identity: impl Into<String>,
        prefix: impl Into<String>,
        lease_duration: Duration,
    ) -> Self {
        LeaseLock {
            client,
            identity: identity.into(),
            prefix: prefix.into(),
            lease_duration,
        }
    }

    /// Identity recorded as holder.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn lease_name(&self, key: &ObjectKey) -> String {
        if self.prefix.is_empty() {
            key.name().to_owned()
        } else {
            format!("{}-{}", self.prefix, key.name())
        }
    }

    fn api(&self, key: &ObjectKey) -> Api<Lease> {
        match key.namespace() {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::default_namespaced(self.client.clone()),
        }
    }
}

#[async_trait::async_trait]
impl DistributedLock for LeaseLock {
    async fn acquire(&self, key: &ObjectKey) -> Result<(), LockError> {
        let api = self.api(key);
        let name = self.lease_name(key);
        let now = Utc::now();
        match api.get(&name).await {
            Ok(mut lease) => {
                let current = lease.spec.clone().unwrap_or_default();
                if !lease_available(&current, &self.identity, now) {
                    return Err(LockError::Held {
                        lease: name,
                        holder: current.holder_identity.unwrap_or_default(),
                    });
                }
                lease.spec = Some(lease_spec(
                    &self.identity,
                    self.lease_duration,
                    now,
                    Some(&current),
                ));
                api.replace(&name, &PostParams::default(), &lease)
                    .await
                    .map_err(|error| contended(error, &name))?;
            }
            Err(kube::Error::Api(ErrorResponse { code: 404, .. })) => {
                let lease = Lease {
                    metadata: ObjectMeta {
                        name: Some(name.clone()),
                        namespace: key.namespace().map(str::to_owned),
                        ..Default::default()
                    },
                    spec: Some(lease_spec(&self.identity, self.lease_duration, now, None)),
                };
                api.create(&PostParams::default(), &lease)
                    .await
                    .map_err(|error| contended(error, &name))?;
            }
            Err(error) => return Err(error.into()),
        }
        debug!(lease = %name, identity = %self.identity, "Acquired lease.");
        Ok(())
    }

    async fn release(&self, key: &ObjectKey) -> Result<(), LockError> {
        let api = self.api(key);
        let name = self.lease_name(key);
        let lease = match api.get(&name).await {
            Ok(lease) => lease,
            Err(kube::Error::Api(ErrorResponse { code: 404, .. })) => return Ok(()),
            Err(error) => return Err(error.into()),
        };
        let holder = lease
            .spec
            .as_ref()
            .and_then(|spec| spec.holder_identity.as_deref());
        if holder != Some(self.identity.as_str()) {
            return Ok(());
        }
        match api.delete(&name, &release_params(&lease)).await {
            Ok(_) | Err(kube::Error::Api(ErrorResponse { code: 404, .. })) => {
                debug!(lease = %name, "Released lease.");
                Ok(())
            }
            // Someone took the lease over after it was read.
            Err(kube::Error::Api(ErrorResponse { code: 409, .. })) => {
                debug!(lease = %name, "Lease changed hands before release.");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}

/// Delete options that only remove `lease` as it was read.
pub fn release_params(lease: &Lease) -> DeleteParams {
    DeleteParams {
        preconditions: Some(Preconditions {
            resource_version: lease.metadata.resource_version.clone(),
            uid: lease.metadata.uid.clone(),
        }),
        ..Default::default()
    }
}

fn contended(error: kube::Error, lease: &str) -> LockError {
    match error {
        kube::Error::Api(ErrorResponse { code: 409, .. }) => LockError::Held {
            lease: lease.to_owned(),
            holder: "unknown".to_owned(),
        },
        error => error.into(),
    }
}

/// Whether `identity` may take or renew a lease in state `spec` at `now`.
pub fn lease_available(spec: &LeaseSpec, identity: &str, now: DateTime<Utc>) -> bool {
    match spec.holder_identity.as_deref() {
        None | Some("") => true,
        Some(holder) if holder == identity => true,
        Some(_) => is_expired(spec, now),
    }
}

/// Whether the holder of `spec` has failed to renew it within its duration.
pub fn is_expired(spec: &LeaseSpec, now: DateTime<Utc>) -> bool {
    let renewed = spec.renew_time.as_ref().or_else(|| spec.acquire_time.as_ref());
    match (renewed, spec.lease_duration_seconds) {
        (Some(MicroTime(renewed)), Some(seconds)) => {
            *renewed + chrono::Duration::seconds(i64::from(seconds)) < now
        }
        _ => true,
    }
}

/// Lease state after `identity` takes or renews it at `now`.
pub fn lease_spec(
    identity: &str,
    duration: Duration,
    now: DateTime<Utc>,
    previous: Option<&LeaseSpec>,
) -> LeaseSpec {
    let renewal = previous
        .filter(|previous| previous.holder_identity.as_deref() == Some(identity));
    let (acquire_time, transitions) = match (renewal, previous) {
        (Some(previous), _) => (
            previous.acquire_time.clone().unwrap_or(MicroTime(now)),
            previous.lease_transitions.unwrap_or(0),
        ),
        (None, Some(previous)) if previous.holder_identity.is_some() => {
            (MicroTime(now), previous.lease_transitions.unwrap_or(0) + 1)
        }
        (None, _) => (MicroTime(now), 0),
    };
    LeaseSpec {
        holder_identity: Some(identity.to_owned()),
        lease_duration_seconds: Some(i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)),
        acquire_time: Some(acquire_time),
        renew_time: Some(MicroTime(now)),
        lease_transitions: Some(transitions),
    }
}
