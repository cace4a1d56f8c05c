//! Generates the desired Pod for a Kernel.

use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, ObjectFieldSelector, Pod, PodSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::api::Kernel;
use crate::config::{ControllerConfig, MonitorConfig};
use crate::connection::{kernel_id, KERNEL_ID_ENV};
use crate::error::{Error, Result};
use crate::meta::{generated_annotations, generated_labels};
use crate::ports::{KernelPorts, KernelSocket};

/// Idle timeout handed to the monitor when the Kernel leaves it unset.
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: i32 = 3600;
/// Culling interval handed to the monitor when the Kernel leaves it unset.
pub const DEFAULT_CULLING_INTERVAL_SECONDS: i32 = 60;
/// Name of the monitor sidecar container.
pub const MONITOR_CONTAINER_NAME: &str = "monitor";
/// Address the monitor answers the kernel's readiness handshake on.
pub const MONITOR_RESPONSE_ADDRESS: &str = "127.0.0.1:65432";

const RESTART_POLICY_NEVER: &str = "Never";
const BOOTSTRAP_SCRIPT: &str = "until (echo -n > /dev/tcp/127.0.0.1/65432) 2>/dev/null; do sleep 1; done; exec /usr/local/bin/bootstrap-kernel.sh";

/// Build the Pod a Kernel should run in.
///
/// The Pod spec is an owned copy of the Kernel's template. The first
/// container is the kernel container: it is renamed after the Kernel and
/// receives every socket port the template does not set, plus `KERNEL_ID`
/// once an id was published on the Kernel. With a monitor
/// configured the kernel container waits for the sidecar before
/// bootstrapping. Kernels never restart.
///
/// The owner reference is not set here.
pub fn generate_pod(kernel: &Kernel, config: &ControllerConfig) -> Result<Pod> {
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

    let mut spec: PodSpec = kernel.spec.template.spec.clone().unwrap_or_default();
    let container = spec
        .containers
        .first_mut()
        .ok_or_else(|| Error::MissingKernelContainer(name.clone()))?;
    container.name = name.clone();
    inject_port_env(container, &config.ports);
    if let Some(id) = kernel_id(kernel) {
        inject_env(container, KERNEL_ID_ENV, id);
    }

    if let Some(monitor) = &config.monitor {
        wait_for_monitor(container, monitor);
        spec.containers.push(monitor_container(
            monitor,
            effective_seconds(
                kernel.spec.idle_timeout_seconds,
                DEFAULT_IDLE_TIMEOUT_SECONDS,
            ),
            effective_seconds(
                kernel.spec.culling_interval_seconds,
                DEFAULT_CULLING_INTERVAL_SECONDS,
            ),
        ));
    }
    spec.restart_policy = Some(RESTART_POLICY_NEVER.to_owned());

    Ok(Pod {
        metadata: ObjectMeta {
            labels: Some(generated_labels(&name, kernel.metadata.labels.as_ref())),
            annotations: Some(generated_annotations(
                kernel.metadata.annotations.as_ref(),
            )),
            name: Some(name),
            namespace: Some(namespace),
            ..Default::default()
        },
        spec: Some(spec),
        status: None,
    })
}

/// `value` when it is set and positive, `default` otherwise.
pub fn effective_seconds(value: Option<i32>, default: i32) -> i32 {
    match value {
        Some(seconds) if seconds > 0 => seconds,
        _ => default,
    }
}

/// Append an env var for every socket port the container does not define.
/// Values already present are left alone.
pub fn inject_port_env(container: &mut Container, ports: &KernelPorts) {
    for socket in KernelSocket::ALL {
        inject_env(container, socket.env_name(), &ports.port(socket).to_string());
    }
}

fn inject_env(container: &mut Container, name: &str, value: &str) {
    let env = container.env.get_or_insert_with(Vec::new);
    if env.iter().any(|var| var.name == name) {
        return;
    }
    env.push(EnvVar {
        name: name.to_owned(),
        value: Some(value.to_owned()),
        value_from: None,
    });
}

fn wait_for_monitor(container: &mut Container, monitor: &MonitorConfig) {
    container.command = Some(vec![
        "/bin/bash".to_owned(),
        "-c".to_owned(),
        BOOTSTRAP_SCRIPT.to_owned(),
    ]);
    let env = container.env.get_or_insert_with(Vec::new);
    env.push(EnvVar {
        name: "PUBLIC_KEY".to_owned(),
        value: Some(monitor.public_key.clone()),
        value_from: None,
    });
    env.push(EnvVar {
        name: "RESPONSE_ADDRESS".to_owned(),
        value: Some(MONITOR_RESPONSE_ADDRESS.to_owned()),
        value_from: None,
    });
}

fn monitor_container(monitor: &MonitorConfig, idle_timeout: i32, culling_interval: i32) -> Container {
    Container {
        name: MONITOR_CONTAINER_NAME.to_owned(),
        image: Some(monitor.image.clone()),
        args: Some(vec![
            "--idle-timeout".to_owned(),
            idle_timeout.to_string(),
            "--culling-interval".to_owned(),
            culling_interval.to_string(),
            "--private-key".to_owned(),
            monitor.private_key.clone(),
        ]),
        env: Some(vec![
            field_ref_env("NAME", "metadata.name"),
            field_ref_env("NAMESPACE", "metadata.namespace"),
            field_ref_env("IP", "status.podIP"),
        ]),
        ..Default::default()
    }
}

fn field_ref_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: None,
                field_path: field_path.to_owned(),
            }),
            ..Default::default()
        }),
    }
}
