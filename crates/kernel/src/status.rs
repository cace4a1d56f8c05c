//! Projects an observed Pod status onto a Kernel status.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Pod, PodCondition, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use tracing::{debug, warn};

use crate::api::{Kernel, KernelCondition, KernelPhase, KernelStatus};

/// Kernel status mirroring `pod`, stamped with the current time.
pub fn project_status(kernel: &Kernel, pod: &Pod) -> KernelStatus {
    project_status_at(kernel, pod, Utc::now())
}

/// Kernel status mirroring `pod`.
///
/// Phase and IP are copied from the pod. The container state is taken from
/// the pod container named after the Kernel; without such a container the
/// Kernel keeps its previous container state. Conditions are mirrored one to
/// one with unset timestamps replaced by `now`. A pod that has not reported
/// any status yet only contributes its (empty) phase and IP.
pub fn project_status_at(kernel: &Kernel, pod: &Pod, now: DateTime<Utc>) -> KernelStatus {
    let name = kernel.metadata.name.as_deref().unwrap_or_default();
    let previous = kernel
        .status
        .as_ref()
        .map(|status| status.container_state.clone())
        .unwrap_or_default();
    let pod_status = pod.status.clone().unwrap_or_default();

    let mut status = KernelStatus {
        conditions: vec![],
        container_state: previous,
        phase: pod_status
            .phase
            .as_deref()
            .map(KernelPhase::from_pod_phase),
        ip: pod_status.pod_ip.clone().unwrap_or_default(),
    };

    if pod_status == PodStatus::default() {
        debug!(kernel = %name, "Pod has no status yet.");
        return status;
    }

    let kernel_container = pod_status
        .container_statuses
        .iter()
        .flatten()
        .find(|container| container.name == name);
    match kernel_container {
        Some(container) => {
            status.container_state = container.state.clone().unwrap_or_default();
        }
        None => warn!(
            kernel = %name,
            "No container named after the Kernel in pod status, keeping previous container state."
        ),
    }

    status.conditions = pod_status
        .conditions
        .iter()
        .flatten()
        .map(|condition| mirror_condition(condition, now))
        .collect();

    status
}

/// A pod condition as a Kernel condition.
pub fn mirror_condition(condition: &PodCondition, now: DateTime<Utc>) -> KernelCondition {
    KernelCondition {
        type_: condition.type_.clone(),
        status: condition.status.clone(),
        last_probe_time: Some(or_now(condition.last_probe_time.as_ref(), now)),
        last_transition_time: Some(or_now(condition.last_transition_time.as_ref(), now)),
        reason: condition.reason.clone().filter(|reason| !reason.is_empty()),
        message: condition.message.clone().filter(|message| !message.is_empty()),
    }
}

fn or_now(time: Option<&Time>, now: DateTime<Utc>) -> Time {
    match time {
        Some(Time(time)) if time.timestamp() > 0 => Time(*time),
        _ => Time(now),
    }
}

/// Whether `new` differs from `old` in anything other than timestamps.
///
/// Projection stamps unset times with the current time, so comparing them
/// would report a change on every pass.
pub fn status_changed(old: Option<&KernelStatus>, new: &KernelStatus) -> bool {
    let old = match old {
        Some(old) => old,
        None => return true,
    };
    old.phase != new.phase
        || old.ip != new.ip
        || old.container_state != new.container_state
        || old.conditions.len() != new.conditions.len()
        || old
            .conditions
            .iter()
            .zip(&new.conditions)
            .any(|(a, b)| {
                a.type_ != b.type_
                    || a.status != b.status
                    || a.reason != b.reason
                    || a.message != b.message
            })
}
