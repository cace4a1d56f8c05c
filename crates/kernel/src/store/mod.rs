//! Access to cluster objects.
//!
//! The reconciler only talks to the cluster through [`ResourceStore`].
//! [`KubeStore`] forwards to the API server, [`MemoryStore`] keeps objects in
//! memory for tests.

use std::fmt::Debug;

use kube::error::ErrorResponse;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::{MemoryStore, Mutation, Verb};

/// Bounds every object kept in a store satisfies.
pub trait StoreObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> StoreObject for T where
    T: Resource<DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Describes the ways a store operation can fail.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// An object with the same name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// The object was modified since it was read.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The object cannot be stored as given.
    #[error("invalid object: {0}")]
    Invalid(String),
    /// Any other API server error.
    #[error(transparent)]
    Api(kube::Error),
    /// The object could not be (de)serialized.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ErrorResponse {
                code: 404, message, ..
            }) => StoreError::NotFound(message),
            kube::Error::Api(ErrorResponse {
                code: 409,
                message,
                reason,
                ..
            }) => {
                if reason == "AlreadyExists" {
                    StoreError::AlreadyExists(message)
                } else {
                    StoreError::Conflict(message)
                }
            }
            error => StoreError::Api(error),
        }
    }
}

/// Namespaced object storage with optimistic concurrency.
///
/// Getters return `Ok(None)` for missing objects. `replace` and `delete`
/// report a missing object as [`StoreError::NotFound`]. `replace` and
/// `replace_status` reject objects whose resource version is stale with
/// [`StoreError::Conflict`]. `replace` never changes the status and
/// `replace_status` never changes anything but the status.
///
/// **Note**: this trait is defined using
/// [async-trait](https://crates.io/crates/async-trait).
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    /// Fetch a single object.
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// List objects in `namespace`, or in every namespace.
    async fn list<K: StoreObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError>;

    /// Create `object` in its namespace.
    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError>;

    /// Replace an existing object.
    async fn replace<K: StoreObject>(&self, object: &K) -> Result<K, StoreError>;

    /// Replace the status subresource of an existing object.
    async fn replace_status<K: StoreObject>(&self, object: &K) -> Result<K, StoreError>;

    /// Delete an object. Objects it controls are garbage collected.
    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

pub(crate) fn namespace_and_name<K: Resource>(object: &K) -> Result<(String, String), StoreError> {
    let meta = object.meta();
    let namespace = meta
        .namespace
        .clone()
        .ok_or_else(|| StoreError::Invalid("metadata.namespace is unset".to_owned()))?;
    let name = meta
        .name
        .clone()
        .ok_or_else(|| StoreError::Invalid("metadata.name is unset".to_owned()))?;
    Ok((namespace, name))
}
