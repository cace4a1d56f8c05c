//! The legacy `jupyter.org/v1beta1` Kernel schema and its conversion to and
//! from [`v1`](super::v1).
//!
//! The legacy template holds a bare pod spec and the status reports a ready
//! replica count instead of a phase and IP. Fields one side lacks are
//! dropped during conversion.

use k8s_openapi::api::core::v1::{ContainerState, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::v1;

/// Desired state of a legacy Kernel.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "jupyter.org",
    version = "v1beta1",
    kind = "Kernel",
    namespaced,
    status = "KernelStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct KernelSpec {
    /// Pod the kernel runs in.
    #[serde(default)]
    pub template: KernelTemplateSpec,
}

/// Legacy template: only a pod spec.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct KernelTemplateSpec {
    /// Pod spec. The first container is the kernel.
    #[serde(default)]
    pub spec: PodSpec,
}

/// Observed state of a legacy Kernel.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelStatus {
    /// Conditions of the kernel pod.
    #[serde(default)]
    pub conditions: Vec<KernelCondition>,
    /// 1 while the pod is ready, 0 otherwise.
    #[serde(default)]
    pub ready_replicas: i32,
    /// State of the kernel container.
    #[serde(default)]
    pub container_state: ContainerState,
}

/// Legacy condition record. Same shape as the v1 one.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[allow(missing_docs)]
#[serde(rename_all = "camelCase")]
pub struct KernelCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<v1::KernelCondition> for KernelCondition {
    fn from(c: v1::KernelCondition) -> Self {
        KernelCondition {
            type_: c.type_,
            status: c.status,
            last_probe_time: c.last_probe_time,
            last_transition_time: c.last_transition_time,
            reason: c.reason,
            message: c.message,
        }
    }
}

impl From<KernelCondition> for v1::KernelCondition {
    fn from(c: KernelCondition) -> Self {
        v1::KernelCondition {
            type_: c.type_,
            status: c.status,
            last_probe_time: c.last_probe_time,
            last_transition_time: c.last_transition_time,
            reason: c.reason,
            message: c.message,
        }
    }
}

impl From<v1::KernelStatus> for KernelStatus {
    fn from(status: v1::KernelStatus) -> Self {
        let ready = status
            .conditions
            .iter()
            .any(|c| c.type_ == "Ready" && c.status == "True");
        KernelStatus {
            conditions: status.conditions.into_iter().map(Into::into).collect(),
            ready_replicas: if ready { 1 } else { 0 },
            container_state: status.container_state,
        }
    }
}

impl From<KernelStatus> for v1::KernelStatus {
    fn from(status: KernelStatus) -> Self {
        v1::KernelStatus {
            conditions: status.conditions.into_iter().map(Into::into).collect(),
            container_state: status.container_state,
            phase: None,
            ip: String::new(),
        }
    }
}

impl From<v1::Kernel> for Kernel {
    fn from(kernel: v1::Kernel) -> Self {
        let spec = KernelSpec {
            template: KernelTemplateSpec {
                spec: kernel.spec.template.spec.unwrap_or_default(),
            },
        };
        let mut converted = Kernel::new("", spec);
        converted.metadata = kernel.metadata;
        converted.status = kernel.status.map(Into::into);
        converted
    }
}

impl From<Kernel> for v1::Kernel {
    fn from(kernel: Kernel) -> Self {
        let spec = v1::KernelSpec {
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(kernel.spec.template.spec),
            },
            idle_timeout_seconds: None,
            culling_interval_seconds: None,
        };
        let mut converted = v1::Kernel::new("", spec);
        converted.metadata = kernel.metadata;
        converted.status = kernel.status.map(Into::into);
        converted
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, ContainerStateRunning};

    fn v1_kernel() -> v1::Kernel {
        let mut kernel = v1::Kernel::new(
            "k1",
            v1::KernelSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "main".to_owned(),
                            image: Some("python:3".to_owned()),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                idle_timeout_seconds: Some(600),
                culling_interval_seconds: Some(30),
            },
        );
        kernel.status = Some(v1::KernelStatus {
            conditions: vec![
                v1::KernelCondition {
                    type_: "Ready".to_owned(),
                    status: "True".to_owned(),
                    reason: Some("PodReady".to_owned()),
                    ..Default::default()
                },
                v1::KernelCondition {
                    type_: "PodScheduled".to_owned(),
                    status: "True".to_owned(),
                    ..Default::default()
                },
            ],
            container_state: ContainerState {
                running: Some(ContainerStateRunning { started_at: None }),
                ..Default::default()
            },
            phase: Some(v1::KernelPhase::Running),
            ip: "10.0.0.7".to_owned(),
        });
        kernel
    }

    #[test]
    fn test_v1_to_v1beta1_derives_ready_replicas() {
        let legacy = Kernel::from(v1_kernel());
        let status = legacy.status.unwrap();
        assert_eq!(status.ready_replicas, 1);
        assert_eq!(status.conditions.len(), 2);
        assert_eq!(status.conditions[0].reason.as_deref(), Some("PodReady"));
        assert!(status.container_state.running.is_some());
        assert_eq!(legacy.spec.template.spec.containers[0].name, "main");
    }

    #[test]
    fn test_not_ready_kernel_has_no_ready_replicas() {
        let mut kernel = v1_kernel();
        if let Some(status) = kernel.status.as_mut() {
            status.conditions[0].status = "False".to_owned();
        }
        assert_eq!(Kernel::from(kernel).status.unwrap().ready_replicas, 0);
    }

    #[test]
    fn test_v1beta1_to_v1_drops_fields_missing_from_legacy_schema() {
        let original = v1_kernel();
        let converted = v1::Kernel::from(Kernel::from(original.clone()));
        assert_eq!(converted.metadata, original.metadata);
        assert_eq!(converted.spec.template.spec, original.spec.template.spec);
        assert_eq!(converted.spec.idle_timeout_seconds, None);
        let status = converted.status.unwrap();
        assert_eq!(status.phase, None);
        assert_eq!(status.ip, "");
        assert_eq!(
            status.conditions,
            original.status.unwrap().conditions
        );
    }
}
