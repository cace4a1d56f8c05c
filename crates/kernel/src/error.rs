use operator::LockError;

use crate::store::StoreError;

/// Describes the ways a Kernel reconcile can fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// An event's involved object does not resolve to a Kernel.
    #[error("object isn't related to a Kernel")]
    NotRelated,
    /// The owner reference to the Kernel could not be established.
    #[error("cannot set owner reference: {0}")]
    OwnerReference(String),
    /// The Kernel's pod template has no container to run the kernel in.
    #[error("kernel {0} has no containers in its pod template")]
    MissingKernelContainer(String),
    /// A required metadata field is unset.
    #[error("object is missing metadata.{0}")]
    MissingMetadata(&'static str),
    /// Connection info could not be encoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    /// The per-Kernel lock could not be taken.
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Result alias defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
