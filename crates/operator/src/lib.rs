//! Exposes a small runtime for building Kubernetes controllers around a
//! `(namespace, name)` reconcile step function.
//!
//! Watches registered with a [`Manager`] turn cluster change notifications
//! into [`ObjectKey`]s. The keys flow through a [`WorkQueue`] that runs at
//! most one reconcile per key at a time, bounds every run with a deadline and
//! retries failures with exponential backoff. All retry policy lives here so
//! a [`Reconciler`] can stay a pure function of current cluster state.

#![deny(missing_docs)]

mod backoff;
pub mod leader;
pub mod lock;
mod manager;
mod object;
mod reconciler;

pub use lock::{with_lock, DistributedLock, LeaseLock, LockError};
pub use manager::{controller_owner_key, Manager, Settings, WorkQueue};
pub use object::ObjectKey;
pub use reconciler::{Action, Reconciler};
