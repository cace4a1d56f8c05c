//! Emits Kubernetes events about Kernels.

use std::sync::Mutex;

use chrono::Utc;
use k8s_openapi::api::core::v1::{Event, EventSource};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::PostParams;
use kube::Api;
use tracing::{debug, warn};

use crate::api::{kernel_reference, Kernel};

/// Component reported as the source of emitted events.
pub const REPORTING_COMPONENT: &str = "kernel-controller";

/// Severity of an event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventType {
    /// Routine information.
    Normal,
    /// Something went wrong.
    Warning,
}

impl EventType {
    /// The value of `Event.type` for this severity.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        }
    }

    /// Parse the `type` of an observed event. Anything but `Warning` is
    /// treated as `Normal`.
    pub fn from_type(type_: Option<&str>) -> Self {
        match type_ {
            Some("Warning") => EventType::Warning,
            _ => EventType::Normal,
        }
    }
}

/// Records events against a Kernel.
///
/// Recording is best effort. Implementations log failures instead of
/// returning them so a lost event never fails a reconcile.
#[async_trait::async_trait]
pub trait EventRecorder: Send + Sync + 'static {
    /// Emit an event with `reason` and `message` involving `kernel`.
    async fn record(&self, kernel: &Kernel, type_: EventType, reason: &str, message: &str);
}

/// Writes core/v1 events through the API server.
#[derive(Clone)]
pub struct KubeRecorder {
    client: kube::Client,
}

impl KubeRecorder {
    /// Create a recorder using `client`.
    pub fn new(client: kube::Client) -> Self {
        KubeRecorder { client }
    }
}

#[async_trait::async_trait]
impl EventRecorder for KubeRecorder {
    async fn record(&self, kernel: &Kernel, type_: EventType, reason: &str, message: &str) {
        let event = build_event(kernel, type_, reason, message);
        let namespace = event.metadata.namespace.clone().unwrap_or_default();
        let api: Api<Event> = Api::namespaced(self.client.clone(), &namespace);
        match api.create(&PostParams::default(), &event).await {
            Ok(_) => debug!(kernel = ?kernel.metadata.name, %reason, "Recorded event."),
            Err(error) => warn!(
                kernel = ?kernel.metadata.name,
                %reason,
                %error,
                "Unable to record event."
            ),
        }
    }
}

/// The core/v1 event [`KubeRecorder`] writes.
pub fn build_event(kernel: &Kernel, type_: EventType, reason: &str, message: &str) -> Event {
    let now = Utc::now();
    let kernel_name = kernel.metadata.name.clone().unwrap_or_default();
    Event {
        metadata: ObjectMeta {
            name: Some(format!(
                "{}.{:x}",
                kernel_name,
                now.timestamp_nanos()
            )),
            namespace: kernel.metadata.namespace.clone(),
            ..Default::default()
        },
        involved_object: kernel_reference(kernel),
        type_: Some(type_.as_str().to_owned()),
        reason: Some(reason.to_owned()),
        message: Some(message.to_owned()),
        first_timestamp: Some(Time(now)),
        last_timestamp: Some(Time(now)),
        count: Some(1),
        source: Some(EventSource {
            component: Some(REPORTING_COMPONENT.to_owned()),
            host: None,
        }),
        reporting_component: Some(REPORTING_COMPONENT.to_owned()),
        ..Default::default()
    }
}

/// An event captured by [`MemoryRecorder`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedEvent {
    /// Namespace of the involved Kernel.
    pub namespace: String,
    /// Name of the involved Kernel.
    pub kernel: String,
    /// Severity.
    pub type_: EventType,
    /// Machine readable reason.
    pub reason: String,
    /// Human readable message.
    pub message: String,
}

/// Keeps recorded events in memory for tests.
#[derive(Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryRecorder {
    /// Create a recorder with no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event recorded so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait::async_trait]
impl EventRecorder for MemoryRecorder {
    async fn record(&self, kernel: &Kernel, type_: EventType, reason: &str, message: &str) {
        let event = RecordedEvent {
            namespace: kernel.metadata.namespace.clone().unwrap_or_default(),
            kernel: kernel.metadata.name.clone().unwrap_or_default(),
            type_,
            reason: reason.to_owned(),
            message: message.to_owned(),
        };
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::KernelSpec;

    fn kernel() -> Kernel {
        let mut kernel = Kernel::new("k1", KernelSpec::default());
        kernel.metadata.namespace = Some("default".to_owned());
        kernel.metadata.uid = Some("uid-1".to_owned());
        kernel
    }

    #[test]
    fn test_event_type() {
        assert_eq!(EventType::from_type(Some("Warning")), EventType::Warning);
        assert_eq!(EventType::from_type(Some("Normal")), EventType::Normal);
        assert_eq!(EventType::from_type(None), EventType::Normal);
        assert_eq!(EventType::Warning.as_str(), "Warning");
    }

    #[test]
    fn test_build_event_involves_kernel() {
        let event = build_event(&kernel(), EventType::Warning, "PodCreationFailed", "boom");
        assert!(event.metadata.name.unwrap().starts_with("k1."));
        assert_eq!(event.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(event.involved_object.kind.as_deref(), Some("Kernel"));
        assert_eq!(event.involved_object.uid.as_deref(), Some("uid-1"));
        assert_eq!(event.type_.as_deref(), Some("Warning"));
        assert_eq!(event.count, Some(1));
        assert_eq!(
            event.reporting_component.as_deref(),
            Some(REPORTING_COMPONENT)
        );
    }

    #[tokio::test]
    async fn test_memory_recorder_keeps_events() {
        let recorder = MemoryRecorder::new();
        recorder
            .record(&kernel(), EventType::Normal, "Pulled", "image pulled")
            .await;
        assert_eq!(
            recorder.events(),
            vec![RecordedEvent {
                namespace: "default".to_owned(),
                kernel: "k1".to_owned(),
                type_: EventType::Normal,
                reason: "Pulled".to_owned(),
                message: "image pulled".to_owned(),
            }]
        );
    }
}
