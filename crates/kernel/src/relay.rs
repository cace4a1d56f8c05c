//! Resolves cluster events to the Kernel they concern.

use k8s_openapi::api::core::v1::{Event, ObjectReference, Pod};

use crate::api::KERNEL_NAME_LABEL;
use crate::error::{Error, Result};
use crate::store::ResourceStore;

/// Name of the Kernel `object` belongs to.
///
/// Only pods resolve, through the kernel name label. Any other kind, a pod
/// that no longer exists or a pod without the label is [`Error::NotRelated`].
pub async fn kernel_name_from_involved_object<S: ResourceStore>(
    store: &S,
    object: &ObjectReference,
) -> Result<String> {
    if object.kind.as_deref() != Some("Pod") {
        return Err(Error::NotRelated);
    }
    let (namespace, name) = match (object.namespace.as_deref(), object.name.as_deref()) {
        (Some(namespace), Some(name)) => (namespace, name),
        _ => return Err(Error::NotRelated),
    };
    let pod: Pod = store.get(namespace, name).await?.ok_or(Error::NotRelated)?;
    pod.metadata
        .labels
        .and_then(|mut labels| labels.remove(KERNEL_NAME_LABEL))
        .ok_or(Error::NotRelated)
}

/// Message of the event re-emitted on the Kernel.
pub fn reissued_message(event: &Event) -> String {
    format!(
        "Reissued from {}/{}: {}",
        event
            .involved_object
            .kind
            .as_deref()
            .unwrap_or_default()
            .to_lowercase(),
        event.involved_object.name.as_deref().unwrap_or_default(),
        event.message.as_deref().unwrap_or_default()
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn pod(name: &str, label: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("default".to_owned()),
                labels: label.map(|value| {
                    let mut labels = BTreeMap::new();
                    labels.insert(KERNEL_NAME_LABEL.to_owned(), value.to_owned());
                    labels
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn reference(kind: &str, name: &str) -> ObjectReference {
        ObjectReference {
            kind: Some(kind.to_owned()),
            name: Some(name.to_owned()),
            namespace: Some("default".to_owned()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_labeled_pod_resolves() {
        let store = MemoryStore::new();
        store.insert(&pod("foo", Some("foo"))).await.unwrap();
        let name = kernel_name_from_involved_object(&store, &reference("Pod", "foo"))
            .await
            .unwrap();
        assert_eq!(name, "foo");
    }

    #[tokio::test]
    async fn test_unrelated_objects_do_not_resolve() {
        let store = MemoryStore::new();
        store.insert(&pod("bare", None)).await.unwrap();

        for reference in [
            reference("Pod", "bare"),
            reference("Pod", "missing"),
            reference("Node", "foo"),
        ] {
            let error = kernel_name_from_involved_object(&store, &reference)
                .await
                .unwrap_err();
            assert!(matches!(error, Error::NotRelated));
            assert_eq!(error.to_string(), "object isn't related to a Kernel");
        }
    }

    #[test]
    fn test_reissued_message() {
        let event = Event {
            involved_object: reference("Pod", "foo"),
            message: Some("Pulling image".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            reissued_message(&event),
            "Reissued from pod/foo: Pulling image"
        );
    }
}
