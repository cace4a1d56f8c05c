//! The canonical `jupyter.org/v1` Kernel schema.

use k8s_openapi::api::core::v1::{ContainerState, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state of a Kernel.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "jupyter.org",
    version = "v1",
    kind = "Kernel",
    namespaced,
    status = "KernelStatus",
    derive = "PartialEq",
    shortname = "krl",
    printcolumn = r#"{"name":"IP","type":"string","jsonPath":".status.ip"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KernelSpec {
    /// Pod template the kernel runs in. The first container is the kernel.
    pub template: PodTemplateSpec,
    /// Seconds without activity before the monitor marks the kernel idle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_seconds: Option<i32>,
    /// Seconds between the monitor's idleness checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culling_interval_seconds: Option<i32>,
}

/// Observed state of a Kernel, mirrored from its pod.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelStatus {
    /// Conditions of the kernel pod.
    #[serde(default)]
    pub conditions: Vec<KernelCondition>,
    /// State of the kernel container.
    #[serde(default)]
    pub container_state: ContainerState,
    /// Phase of the kernel pod. Unset until the pod reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<KernelPhase>,
    /// IP of the kernel pod.
    #[serde(default)]
    pub ip: String,
}

/// A pod condition as seen on the Kernel.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelCondition {
    /// Condition type, e.g. `Ready`.
    #[serde(rename = "type")]
    pub type_: String,
    /// `True`, `False` or `Unknown`.
    pub status: String,
    /// Last time the condition was probed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<Time>,
    /// Last time the condition changed status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
    /// Machine readable reason of the last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human readable details of the last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Lifecycle phase, following the pod phase.
#[derive(Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[allow(missing_docs)]
pub enum KernelPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl KernelPhase {
    /// Map a pod phase string. Unrecognized values become `Unknown`.
    pub fn from_pod_phase(phase: &str) -> Self {
        match phase {
            "Pending" => KernelPhase::Pending,
            "Running" => KernelPhase::Running,
            "Succeeded" => KernelPhase::Succeeded,
            "Failed" => KernelPhase::Failed,
            _ => KernelPhase::Unknown,
        }
    }
}
