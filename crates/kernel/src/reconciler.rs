use std::sync::Arc;

use chrono::Utc;
use k8s_openapi::api::core::v1::{Event, Pod, Service};
use operator::{with_lock, Action, DistributedLock, ObjectKey, Reconciler};
use tracing::{debug, error, info, instrument, warn};

use crate::api::{is_idle, set_controller_reference, Kernel};
use crate::config::ControllerConfig;
use crate::connection::publish_connection_info;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::pod::generate_pod;
use crate::recorder::{EventRecorder, EventType};
use crate::relay::{kernel_name_from_involved_object, reissued_message};
use crate::service::{copy_service_fields, generate_service};
use crate::status::{project_status, status_changed};
use crate::store::{ResourceStore, StoreError};

/// Reason of the warning recorded when a kernel pod cannot be created.
pub const POD_CREATION_FAILED: &str = "PodCreationFailed";

/// Reconciles Kernels, and relays events about their pods.
///
/// Every pass is a step function of the current cluster state: it fetches
/// what exists, creates what is missing and writes the status last. Errors
/// are logged and returned to the work queue, which retries with backoff.
pub struct KernelReconciler<S, E> {
    store: Arc<S>,
    recorder: Arc<E>,
    metrics: Arc<Metrics>,
    config: ControllerConfig,
    lock: Option<Arc<dyn DistributedLock>>,
}

impl<S: ResourceStore, E: EventRecorder> KernelReconciler<S, E> {
    /// Create a reconciler.
    pub fn new(
        store: Arc<S>,
        recorder: Arc<E>,
        metrics: Arc<Metrics>,
        config: ControllerConfig,
    ) -> Self {
        KernelReconciler {
            store,
            recorder,
            metrics,
            config,
            lock: None,
        }
    }

    /// Hold `lock` for the Kernel while reconciling it.
    pub fn with_lock(mut self, lock: Arc<dyn DistributedLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Reconcile whatever `key` names.
    ///
    /// An Event with that name is relayed to its Kernel. Otherwise the
    /// Kernel with that name, if any, is reconciled.
    #[instrument(level = "info", skip(self, key), fields(key = %key))]
    pub async fn reconcile_key(&self, key: &ObjectKey) -> Result<Action> {
        let namespace = match key.namespace() {
            Some(namespace) => namespace,
            None => {
                debug!("Ignoring cluster scoped key.");
                return Ok(Action::done());
            }
        };

        let event: Option<Event> = self
            .store
            .get(namespace, key.name())
            .await
            .map_err(|e| log_store_error(e, "fetch event"))?;
        if let Some(event) = event {
            return self.relay_event(namespace, &event).await;
        }

        let kernel: Option<Kernel> = self
            .store
            .get(namespace, key.name())
            .await
            .map_err(|e| log_store_error(e, "fetch kernel"))?;
        let kernel = match kernel {
            Some(kernel) => kernel,
            None => {
                debug!("Kernel not found, nothing to do.");
                return Ok(Action::done());
            }
        };

        match &self.lock {
            Some(lock) => {
                with_lock(Arc::clone(lock), key, || self.reconcile_kernel(kernel)).await
            }
            None => self.reconcile_kernel(kernel).await,
        }
    }

    async fn relay_event(&self, namespace: &str, event: &Event) -> Result<Action> {
        info!("Found event for Kernel. Re-emitting.");
        let kernel_name =
            kernel_name_from_involved_object(self.store.as_ref(), &event.involved_object).await?;
        let kernel: Option<Kernel> = self
            .store
            .get(namespace, &kernel_name)
            .await
            .map_err(|e| log_store_error(e, "fetch kernel of event"))?;
        match kernel {
            Some(kernel) => {
                self.recorder
                    .record(
                        &kernel,
                        EventType::from_type(event.type_.as_deref()),
                        event.reason.as_deref().unwrap_or_default(),
                        &reissued_message(event),
                    )
                    .await;
            }
            None => debug!(kernel = %kernel_name, "Kernel of event not found."),
        }
        Ok(Action::done())
    }

    async fn reconcile_kernel(&self, mut kernel: Kernel) -> Result<Action> {
        let name = kernel
            .metadata
            .name
            .clone()
            .ok_or(Error::MissingMetadata("name"))?;
        let namespace = kernel
            .metadata
            .namespace
            .clone()
            .ok_or(Error::MissingMetadata("namespace"))?;

        if is_idle(&kernel) {
            info!(kernel = %name, "Kernel is idle, culling it.");
            match self.store.delete::<Kernel>(&namespace, &name).await {
                Ok(()) => self.metrics.record_culling(&namespace, &name, Utc::now()),
                Err(StoreError::NotFound(_)) => debug!(kernel = %name, "Kernel already gone."),
                Err(e) => return Err(log_store_error(e, "delete idle kernel").into()),
            }
            return Ok(Action::done());
        }

        // The connection info points at the service, so it is only published
        // when there is one.
        if self.config.create_service
            && publish_connection_info(&mut kernel, &self.config.ports, || {
                uuid::Uuid::new_v4().to_string()
            })?
        {
            info!(kernel = %name, "Publishing connection info.");
            kernel = self
                .store
                .replace(&kernel)
                .await
                .map_err(|e| log_store_error(e, "publish connection info"))?;
        }

        let mut desired = generate_pod(&kernel, &self.config)?;
        set_controller_reference(&mut desired.metadata, &kernel)?;

        let found: Option<Pod> = self
            .store
            .get(&namespace, &name)
            .await
            .map_err(|e| log_store_error(e, "fetch pod"))?;
        let pod = match found {
            Some(pod) => pod,
            None => {
                info!(kernel = %name, "Creating pod.");
                match self.store.create(&desired).await {
                    Ok(pod) => {
                        self.metrics.record_creation(&namespace);
                        pod
                    }
                    Err(e) => {
                        let e = log_store_error(e, "create pod");
                        self.metrics.record_failed_creation(&namespace);
                        self.recorder
                            .record(
                                &kernel,
                                EventType::Warning,
                                POD_CREATION_FAILED,
                                &format!("Failed to create pod {}: {}", name, e),
                            )
                            .await;
                        return Err(e.into());
                    }
                }
            }
        };

        if self.config.create_service {
            self.reconcile_service(&kernel, &desired).await?;
        }

        let status = project_status(&kernel, &pod);
        if status_changed(kernel.status.as_ref(), &status) {
            debug!(kernel = %name, phase = ?status.phase, "Updating status.");
            kernel.status = Some(status);
            self.store
                .replace_status(&kernel)
                .await
                .map_err(|e| log_store_error(e, "update kernel status"))?;
        }

        Ok(Action::done())
    }

    async fn reconcile_service(&self, kernel: &Kernel, pod: &Pod) -> Result<()> {
        let mut desired = generate_service(kernel, pod)?;
        set_controller_reference(&mut desired.metadata, kernel)?;
        let (namespace, name) = (
            desired.metadata.namespace.clone().unwrap_or_default(),
            desired.metadata.name.clone().unwrap_or_default(),
        );

        let found: Option<Service> = self
            .store
            .get(&namespace, &name)
            .await
            .map_err(|e| log_store_error(e, "fetch service"))?;
        match found {
            None => {
                info!(service = %name, "Creating service.");
                self.store
                    .create(&desired)
                    .await
                    .map_err(|e| log_store_error(e, "create service"))?;
            }
            Some(mut found) => {
                if copy_service_fields(&desired, &mut found) {
                    info!(service = %name, "Updating service.");
                    self.store
                        .replace(&found)
                        .await
                        .map_err(|e| log_store_error(e, "update service"))?;
                }
            }
        }
        Ok(())
    }
}

fn log_store_error(error: StoreError, operation: &str) -> StoreError {
    match &error {
        StoreError::Conflict(_) => warn!(%error, "Unable to {}.", operation),
        _ => error!(%error, "Unable to {}.", operation),
    }
    error
}

#[async_trait::async_trait]
impl<S: ResourceStore, E: EventRecorder> Reconciler for KernelReconciler<S, E> {
    async fn reconcile(&self, key: ObjectKey) -> anyhow::Result<Action> {
        Ok(self.reconcile_key(&key).await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::{KernelSpec, KERNEL_IDLE_LABEL, KERNEL_NAME_LABEL};
    use crate::connection::{kernel_id, ConnectionInfo, CONNECTION_INFO_ANNOTATION};
    use crate::recorder::MemoryRecorder;
    use crate::store::{MemoryStore, Verb};
    use k8s_openapi::api::core::v1::{
        Container, ObjectReference, PodSpec, PodStatus, PodTemplateSpec,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use operator::LockError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        store: Arc<MemoryStore>,
        recorder: Arc<MemoryRecorder>,
        metrics: Arc<Metrics>,
        reconciler: KernelReconciler<MemoryStore, MemoryRecorder>,
    }

    fn harness(config: ControllerConfig) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let recorder = Arc::new(MemoryRecorder::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let reconciler =
            KernelReconciler::new(store.clone(), recorder.clone(), metrics.clone(), config);
        Harness {
            store,
            recorder,
            metrics,
            reconciler,
        }
    }

    fn kernel(name: &str) -> Kernel {
        let mut kernel = Kernel::new(
            name,
            KernelSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "main".to_owned(),
                            image: Some("jupyter/base-notebook".to_owned()),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            },
        );
        kernel.metadata.namespace = Some("default".to_owned());
        kernel
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::namespaced("default", name)
    }

    #[tokio::test]
    async fn test_missing_kernel_is_done() {
        let h = harness(ControllerConfig::default());
        let action = h.reconciler.reconcile_key(&key("ghost")).await.unwrap();
        assert_eq!(action, Action::done());
        assert!(h.store.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_creates_pod_service_and_status() {
        let h = harness(ControllerConfig::default());
        h.store.create(&kernel("k1")).await.unwrap();
        h.store.clear_mutations().await;

        h.reconciler.reconcile_key(&key("k1")).await.unwrap();

        let verbs: Vec<_> = h
            .store
            .mutations()
            .await
            .into_iter()
            .map(|m| (m.verb, m.kind))
            .collect();
        assert_eq!(
            verbs,
            vec![
                (Verb::Replace, "Kernel".to_owned()),
                (Verb::Create, "Pod".to_owned()),
                (Verb::Create, "Service".to_owned()),
                (Verb::ReplaceStatus, "Kernel".to_owned()),
            ]
        );
        assert_eq!(h.metrics.created("default"), 1);

        let pod: Pod = h.store.get("default", "k1").await.unwrap().unwrap();
        let owner = &pod.metadata.owner_references.unwrap()[0];
        assert_eq!(owner.kind, "Kernel");
        assert_eq!(owner.controller, Some(true));
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing() {
        let h = harness(ControllerConfig::default());
        h.store.create(&kernel("k1")).await.unwrap();
        h.reconciler.reconcile_key(&key("k1")).await.unwrap();
        h.store.clear_mutations().await;

        h.reconciler.reconcile_key(&key("k1")).await.unwrap();
        assert!(h.store.mutations().await.is_empty());
        assert_eq!(h.metrics.created("default"), 1);
    }

    #[tokio::test]
    async fn test_status_follows_pod() {
        let h = harness(ControllerConfig {
            create_service: false,
            ..Default::default()
        });
        h.store.create(&kernel("k1")).await.unwrap();
        h.reconciler.reconcile_key(&key("k1")).await.unwrap();

        let mut pod: Pod = h.store.get("default", "k1").await.unwrap().unwrap();
        pod.status = Some(PodStatus {
            phase: Some("Running".to_owned()),
            pod_ip: Some("10.0.0.7".to_owned()),
            ..Default::default()
        });
        h.store.insert(&pod).await.unwrap();

        h.reconciler.reconcile_key(&key("k1")).await.unwrap();
        let kernel: Kernel = h.store.get("default", "k1").await.unwrap().unwrap();
        assert_eq!(kernel.status.unwrap().ip, "10.0.0.7");
    }

    #[tokio::test]
    async fn test_idle_kernel_is_culled() {
        let h = harness(ControllerConfig::default());
        let mut idle = kernel("k1");
        idle.metadata.labels = Some(
            [(KERNEL_IDLE_LABEL.to_owned(), "true".to_owned())]
                .into_iter()
                .collect(),
        );
        h.store.create(&idle).await.unwrap();
        h.store.clear_mutations().await;

        h.reconciler.reconcile_key(&key("k1")).await.unwrap();

        let mutations = h.store.mutations().await;
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].verb, Verb::Delete);
        assert_eq!(mutations[0].kind, "Kernel");
        assert_eq!(h.metrics.culled("default", "k1"), 1);
        assert!(h.metrics.last_culling("default", "k1") > 0.0);
    }

    #[tokio::test]
    async fn test_failed_pod_creation_is_reported() {
        let h = harness(ControllerConfig::default());
        h.store.create(&kernel("k1")).await.unwrap();
        h.store.inject_failure(Verb::Create, "Pod").await;

        let error = h.reconciler.reconcile_key(&key("k1")).await.unwrap_err();
        assert!(matches!(error, Error::Store(StoreError::Api(_))));
        assert_eq!(h.metrics.failed("default"), 1);
        assert_eq!(h.metrics.created("default"), 0);

        let events = h.recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].type_, EventType::Warning);
        assert_eq!(events[0].reason, POD_CREATION_FAILED);
        assert!(events[0].message.starts_with("Failed to create pod k1: "));
    }

    #[tokio::test]
    async fn test_pod_event_is_relayed() {
        let h = harness(ControllerConfig::default());
        h.store.create(&kernel("k1")).await.unwrap();
        h.reconciler.reconcile_key(&key("k1")).await.unwrap();
        h.store
            .insert(&Event {
                metadata: ObjectMeta {
                    name: Some("k1.16c2b".to_owned()),
                    namespace: Some("default".to_owned()),
                    ..Default::default()
                },
                involved_object: ObjectReference {
                    kind: Some("Pod".to_owned()),
                    name: Some("k1".to_owned()),
                    namespace: Some("default".to_owned()),
                    ..Default::default()
                },
                type_: Some("Normal".to_owned()),
                reason: Some("Pulled".to_owned()),
                message: Some("Successfully pulled image".to_owned()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.store.clear_mutations().await;

        h.reconciler.reconcile_key(&key("k1.16c2b")).await.unwrap();

        let events = h.recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kernel, "k1");
        assert_eq!(events[0].reason, "Pulled");
        assert_eq!(
            events[0].message,
            "Reissued from pod/k1: Successfully pulled image"
        );
        assert!(h.store.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_unrelated_event_is_an_error() {
        let h = harness(ControllerConfig::default());
        let mut pod = Pod {
            metadata: ObjectMeta {
                name: Some("plain".to_owned()),
                namespace: Some("default".to_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        pod.metadata.labels = Some(
            [("app".to_owned(), "web".to_owned())]
                .into_iter()
                .collect(),
        );
        h.store.insert(&pod).await.unwrap();
        h.store
            .insert(&Event {
                metadata: ObjectMeta {
                    name: Some("plain.1".to_owned()),
                    namespace: Some("default".to_owned()),
                    ..Default::default()
                },
                involved_object: ObjectReference {
                    kind: Some("Pod".to_owned()),
                    name: Some("plain".to_owned()),
                    namespace: Some("default".to_owned()),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();

        let error = h.reconciler.reconcile_key(&key("plain.1")).await.unwrap_err();
        assert!(matches!(error, Error::NotRelated));
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_connection_info_is_published() {
        let h = harness(ControllerConfig::default());
        h.store.create(&kernel("k1")).await.unwrap();
        h.reconciler.reconcile_key(&key("k1")).await.unwrap();

        let stored: Kernel = h.store.get("default", "k1").await.unwrap().unwrap();
        let id = kernel_id(&stored).unwrap().to_owned();
        let info: ConnectionInfo = serde_json::from_str(
            &stored.metadata.annotations.as_ref().unwrap()[CONNECTION_INFO_ANNOTATION],
        )
        .unwrap();
        assert_eq!(info.key, id);
        assert_eq!(info.ip, "k1.default.svc.cluster.local");
        assert!(stored.status.is_some());

        let pod: Pod = h.store.get("default", "k1").await.unwrap().unwrap();
        let env = pod.spec.unwrap().containers[0].env.clone().unwrap();
        let kernel_id_env = env.iter().find(|var| var.name == "KERNEL_ID").unwrap();
        assert_eq!(kernel_id_env.value.as_deref(), Some(id.as_str()));
        // The Kernel's template is left alone.
        assert!(stored.spec.template.spec.unwrap().containers[0].env.is_none());
    }

    #[tokio::test]
    async fn test_no_connection_info_without_service() {
        let h = harness(ControllerConfig {
            create_service: false,
            ..Default::default()
        });
        h.store.create(&kernel("k1")).await.unwrap();
        h.reconciler.reconcile_key(&key("k1")).await.unwrap();

        let stored: Kernel = h.store.get("default", "k1").await.unwrap().unwrap();
        assert!(kernel_id(&stored).is_none());
    }

    #[tokio::test]
    async fn test_failed_event_fetch_is_surfaced() {
        let h = harness(ControllerConfig::default());
        h.store.create(&kernel("k1")).await.unwrap();
        h.store.inject_failure(Verb::Get, "Event").await;
        h.store.clear_mutations().await;

        let error = h.reconciler.reconcile_key(&key("k1")).await.unwrap_err();
        assert!(matches!(error, Error::Store(StoreError::Api(_))));
        assert!(h.store.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_kernel_fetch_is_surfaced() {
        let h = harness(ControllerConfig::default());
        h.store.create(&kernel("k1")).await.unwrap();
        h.store.inject_failure(Verb::Get, "Kernel").await;
        h.store.clear_mutations().await;

        let error = h.reconciler.reconcile_key(&key("k1")).await.unwrap_err();
        assert!(matches!(error, Error::Store(StoreError::Api(_))));
        assert!(h.store.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_pod_fetch_is_surfaced() {
        let h = harness(ControllerConfig {
            create_service: false,
            ..Default::default()
        });
        h.store.create(&kernel("k1")).await.unwrap();
        h.store.inject_failure(Verb::Get, "Pod").await;
        h.store.clear_mutations().await;

        let error = h.reconciler.reconcile_key(&key("k1")).await.unwrap_err();
        assert!(matches!(error, Error::Store(StoreError::Api(_))));
        assert!(h.store.mutations().await.is_empty());
        assert_eq!(h.metrics.created("default"), 0);
        assert_eq!(h.metrics.failed("default"), 0);
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_event_of_deleted_kernel_is_done() {
        let h = harness(ControllerConfig::default());
        h.store
            .insert(&Pod {
                metadata: ObjectMeta {
                    name: Some("gone".to_owned()),
                    namespace: Some("default".to_owned()),
                    labels: Some(
                        [(KERNEL_NAME_LABEL.to_owned(), "gone".to_owned())]
                            .into_iter()
                            .collect(),
                    ),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();
        h.store
            .insert(&Event {
                metadata: ObjectMeta {
                    name: Some("gone.1".to_owned()),
                    namespace: Some("default".to_owned()),
                    ..Default::default()
                },
                involved_object: ObjectReference {
                    kind: Some("Pod".to_owned()),
                    name: Some("gone".to_owned()),
                    namespace: Some("default".to_owned()),
                    ..Default::default()
                },
                reason: Some("Killing".to_owned()),
                ..Default::default()
            })
            .await
            .unwrap();

        let action = h.reconciler.reconcile_key(&key("gone.1")).await.unwrap();
        assert_eq!(action, Action::done());
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_status_conflict_is_surfaced() {
        let h = harness(ControllerConfig::default());
        h.store.create(&kernel("k1")).await.unwrap();
        h.store.inject_conflict(Verb::ReplaceStatus, "Kernel").await;

        let error = h.reconciler.reconcile_key(&key("k1")).await.unwrap_err();
        assert!(matches!(error, Error::Store(StoreError::Conflict(_))));

        h.store.clear_failures().await;
        h.reconciler.reconcile_key(&key("k1")).await.unwrap();
        let stored: Kernel = h.store.get("default", "k1").await.unwrap().unwrap();
        assert!(stored.status.is_some());
        assert_eq!(h.metrics.created("default"), 1);
    }

    #[tokio::test]
    async fn test_failed_cull_is_surfaced_and_not_counted() {
        let h = harness(ControllerConfig::default());
        let mut idle = kernel("k1");
        idle.metadata.labels = Some(
            [(KERNEL_IDLE_LABEL.to_owned(), "true".to_owned())]
                .into_iter()
                .collect(),
        );
        h.store.create(&idle).await.unwrap();
        h.store.inject_failure(Verb::Delete, "Kernel").await;

        let error = h.reconciler.reconcile_key(&key("k1")).await.unwrap_err();
        assert!(matches!(error, Error::Store(StoreError::Api(_))));
        assert_eq!(h.metrics.culled("default", "k1"), 0);
        assert!(h
            .store
            .get::<Kernel>("default", "k1")
            .await
            .unwrap()
            .is_some());
    }

    #[derive(Default)]
    struct CountingLock {
        acquired: AtomicUsize,
        released: AtomicUsize,
        contended: bool,
    }

    #[async_trait::async_trait]
    impl DistributedLock for CountingLock {
        async fn acquire(&self, key: &ObjectKey) -> std::result::Result<(), LockError> {
            if self.contended {
                return Err(LockError::Held {
                    lease: key.name().to_owned(),
                    holder: "other".to_owned(),
                });
            }
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn release(&self, _key: &ObjectKey) -> std::result::Result<(), LockError> {
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lock_wraps_kernel_reconcile() {
        let lock = Arc::new(CountingLock::default());
        let h = harness(ControllerConfig::default());
        let reconciler = KernelReconciler::new(
            h.store.clone(),
            h.recorder.clone(),
            h.metrics.clone(),
            ControllerConfig::default(),
        )
        .with_lock(lock.clone());
        h.store.create(&kernel("k1")).await.unwrap();

        reconciler.reconcile_key(&key("k1")).await.unwrap();
        assert_eq!(lock.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(lock.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_contended_lock_fails_without_writes() {
        let lock = Arc::new(CountingLock {
            contended: true,
            ..Default::default()
        });
        let h = harness(ControllerConfig::default());
        let reconciler = KernelReconciler::new(
            h.store.clone(),
            h.recorder.clone(),
            h.metrics.clone(),
            ControllerConfig::default(),
        )
        .with_lock(lock);
        h.store.create(&kernel("k1")).await.unwrap();
        h.store.clear_mutations().await;

        let error = reconciler.reconcile_key(&key("k1")).await.unwrap_err();
        assert!(matches!(error, Error::Lock(LockError::Held { .. })));
        assert!(h.store.mutations().await.is_empty());
    }
}
