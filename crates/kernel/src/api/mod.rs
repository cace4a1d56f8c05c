//! Kernel custom resource types and the ownership contract between a Kernel
//! and the objects generated for it.

use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;

use crate::error::{Error, Result};

pub mod v1;
pub mod v1beta1;

#[doc(inline)]
pub use v1::{Kernel, KernelCondition, KernelPhase, KernelSpec, KernelStatus};

/// Label tying generated pods and services to their Kernel by name.
pub const KERNEL_NAME_LABEL: &str = "jupyter.org/kernel-name";
/// Label the monitor sidecar sets on a Kernel it considers idle.
pub const KERNEL_IDLE_LABEL: &str = "jupyrator.org/kernel-idle";
/// Value of [`KERNEL_IDLE_LABEL`] that triggers culling.
pub const KERNEL_IDLE_VALUE: &str = "true";

/// Whether the monitor marked `kernel` idle.
pub fn is_idle(kernel: &Kernel) -> bool {
    kernel
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(KERNEL_IDLE_LABEL))
        .map(|value| value == KERNEL_IDLE_VALUE)
        .unwrap_or(false)
}

/// Controller owner reference pointing at `kernel`.
pub fn owner_reference(kernel: &Kernel) -> Result<OwnerReference> {
    let name = kernel
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::OwnerReference("kernel has no name".to_owned()))?;
    let uid = kernel
        .metadata
        .uid
        .clone()
        .ok_or_else(|| Error::OwnerReference(format!("kernel {} has no uid", name)))?;
    Ok(OwnerReference {
        api_version: Kernel::api_version(&()).into_owned(),
        kind: Kernel::kind(&()).into_owned(),
        name,
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// Make `kernel` the controller of the object described by `meta`.
///
/// Fails if the object is already controlled by something else.
pub fn set_controller_reference(meta: &mut ObjectMeta, kernel: &Kernel) -> Result<()> {
    let owner = owner_reference(kernel)?;
    let references = meta.owner_references.get_or_insert_with(Vec::new);
    if let Some(other) = references
        .iter()
        .find(|reference| reference.controller == Some(true) && reference.uid != owner.uid)
    {
        return Err(Error::OwnerReference(format!(
            "object is already controlled by {} {}",
            other.kind, other.name
        )));
    }
    references.retain(|reference| reference.uid != owner.uid);
    references.push(owner);
    Ok(())
}

/// Reference to `kernel` suitable for an event's involved object.
pub fn kernel_reference(kernel: &Kernel) -> ObjectReference {
    ObjectReference {
        api_version: Some(Kernel::api_version(&()).into_owned()),
        kind: Some(Kernel::kind(&()).into_owned()),
        name: kernel.metadata.name.clone(),
        namespace: kernel.metadata.namespace.clone(),
        uid: kernel.metadata.uid.clone(),
        resource_version: kernel.metadata.resource_version.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;

    fn kernel(labels: Option<BTreeMap<String, String>>) -> Kernel {
        let mut kernel = Kernel::new("k1", KernelSpec::default());
        kernel.metadata.namespace = Some("default".to_owned());
        kernel.metadata.uid = Some("uid-1".to_owned());
        kernel.metadata.labels = labels;
        kernel
    }

    #[test]
    fn test_idle_label_must_be_true() {
        let mut labels = BTreeMap::new();
        assert!(!is_idle(&kernel(None)));
        labels.insert(KERNEL_IDLE_LABEL.to_owned(), "false".to_owned());
        assert!(!is_idle(&kernel(Some(labels.clone()))));
        labels.insert(KERNEL_IDLE_LABEL.to_owned(), "true".to_owned());
        assert!(is_idle(&kernel(Some(labels))));
    }

    #[test]
    fn test_owner_reference_requires_uid() {
        let mut kernel = kernel(None);
        kernel.metadata.uid = None;
        assert!(matches!(
            owner_reference(&kernel),
            Err(Error::OwnerReference(_))
        ));
    }

    #[test]
    fn test_set_controller_reference_is_idempotent() {
        let kernel = kernel(None);
        let mut meta = ObjectMeta::default();
        set_controller_reference(&mut meta, &kernel).unwrap();
        set_controller_reference(&mut meta, &kernel).unwrap();
        let references = meta.owner_references.unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].api_version, "jupyter.org/v1");
        assert_eq!(references[0].kind, "Kernel");
        assert_eq!(references[0].controller, Some(true));
    }

    #[test]
    fn test_set_controller_reference_rejects_foreign_controller() {
        let kernel = kernel(None);
        let mut meta = ObjectMeta {
            owner_references: Some(vec![OwnerReference {
                api_version: "apps/v1".to_owned(),
                kind: "ReplicaSet".to_owned(),
                name: "rs".to_owned(),
                uid: "uid-rs".to_owned(),
                controller: Some(true),
                ..Default::default()
            }]),
            ..Default::default()
        };
        assert!(set_controller_reference(&mut meta, &kernel).is_err());
    }
}
