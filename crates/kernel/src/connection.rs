//! Connection info published on Kernels that are reachable through a
//! service.
//!
//! Clients read the [`CONNECTION_INFO_ANNOTATION`] off the Kernel to reach
//! its sockets. The kernel id doubles as the message signing key and is
//! handed to the kernel container as `KERNEL_ID`.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::EnvVar;
use serde::{Deserialize, Serialize};

use crate::api::Kernel;
use crate::error::{Error, Result};
use crate::ports::{KernelPorts, KernelSocket};

/// Annotation holding the kernel id.
pub const KERNEL_ID_ANNOTATION: &str = "jupyter.org/kernel-id";
/// Annotation holding the JSON encoded [`ConnectionInfo`].
pub const CONNECTION_INFO_ANNOTATION: &str = "jupyter.org/kernel-connection-info";
/// Environment variable carrying the kernel id into the kernel container.
pub const KERNEL_ID_ENV: &str = "KERNEL_ID";

const TRANSPORT: &str = "tcp";
const SIGNATURE_SCHEME: &str = "hmac-sha256";

/// How to connect to a running kernel, in the layout of a Jupyter
/// connection file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct ConnectionInfo {
    pub shell_port: u16,
    pub stdin_port: u16,
    pub iopub_port: u16,
    pub control_port: u16,
    pub hb_port: u16,
    /// Cluster DNS name of the Kernel's service.
    pub ip: String,
    /// Signing key, the kernel id.
    pub key: String,
    pub transport: String,
    pub signature_scheme: String,
    pub kernel_name: String,
}

/// The kernel id recorded on `kernel`, if any.
pub fn kernel_id(kernel: &Kernel) -> Option<&str> {
    kernel
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(KERNEL_ID_ANNOTATION))
        .map(String::as_str)
        .filter(|id| !id.is_empty())
}

/// Connection info of `kernel` signed with `key`.
///
/// Ports come from the kernel container's environment, falling back to
/// `ports` for sockets the template leaves unset, the same way the pod
/// generator injects them. A value that is not a port is published as 0.
pub fn connection_info(kernel: &Kernel, ports: &KernelPorts, key: &str) -> Result<ConnectionInfo> {
    let name = kernel
        .metadata
        .name
        .as_deref()
        .ok_or(Error::MissingMetadata("name"))?;
    let namespace = kernel
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingMetadata("namespace"))?;
    let env: &[EnvVar] = kernel
        .spec
        .template
        .spec
        .as_ref()
        .and_then(|spec| spec.containers.first())
        .ok_or_else(|| Error::MissingKernelContainer(name.to_owned()))?
        .env
        .as_deref()
        .unwrap_or_default();

    let port = |socket: KernelSocket| match env.iter().find(|var| var.name == socket.env_name()) {
        Some(var) => var
            .value
            .as_deref()
            .and_then(|value| value.parse().ok())
            .unwrap_or(0),
        None => ports.port(socket),
    };

    Ok(ConnectionInfo {
        shell_port: port(KernelSocket::Shell),
        stdin_port: port(KernelSocket::Stdin),
        iopub_port: port(KernelSocket::IoPub),
        control_port: port(KernelSocket::Control),
        hb_port: port(KernelSocket::Heartbeat),
        ip: format!("{}.{}.svc.cluster.local", name, namespace),
        key: key.to_owned(),
        transport: TRANSPORT.to_owned(),
        signature_scheme: SIGNATURE_SCHEME.to_owned(),
        kernel_name: String::new(),
    })
}

/// Record the kernel id and connection info on `kernel`.
///
/// An id already on the Kernel is kept, `new_id` is only called for Kernels
/// without one. Returns whether any annotation changed, so callers only
/// write the Kernel back when needed.
pub fn publish_connection_info(
    kernel: &mut Kernel,
    ports: &KernelPorts,
    new_id: impl FnOnce() -> String,
) -> Result<bool> {
    let id = kernel_id(kernel).map(str::to_owned).unwrap_or_else(new_id);
    let info = serde_json::to_string(&connection_info(kernel, ports, &id)?)?;

    let annotations = kernel
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in [(KERNEL_ID_ANNOTATION, id), (CONNECTION_INFO_ANNOTATION, info)] {
        if annotations.get(key) != Some(&value) {
            annotations.insert(key.to_owned(), value);
            changed = true;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::KernelSpec;
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};

    fn kernel(env: Vec<EnvVar>) -> Kernel {
        let mut kernel = Kernel::new(
            "k1",
            KernelSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "main".to_owned(),
                            env: Some(env),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            },
        );
        kernel.metadata.namespace = Some("team-a".to_owned());
        kernel
    }

    fn var(name: &str, value: &str) -> EnvVar {
        EnvVar {
            name: name.to_owned(),
            value: Some(value.to_owned()),
            value_from: None,
        }
    }

    #[test]
    fn test_info_uses_service_dns_and_effective_ports() {
        let kernel = kernel(vec![
            var("KERNEL_SHELL_PORT", "6000"),
            var("KERNEL_HB_PORT", "beat"),
        ]);
        let info = connection_info(&kernel, &KernelPorts::default(), "abc").unwrap();
        assert_eq!(info.ip, "k1.team-a.svc.cluster.local");
        assert_eq!(info.shell_port, 6000);
        assert_eq!(info.hb_port, 0);
        assert_eq!(info.iopub_port, 52318);
        assert_eq!(info.key, "abc");
        assert_eq!(info.transport, "tcp");
        assert_eq!(info.signature_scheme, "hmac-sha256");
    }

    #[test]
    fn test_info_serializes_as_connection_file() {
        let info = connection_info(&kernel(vec![]), &KernelPorts::default(), "abc").unwrap();
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["shell_port"], 52317);
        assert_eq!(value["signature_scheme"], "hmac-sha256");
        assert_eq!(value["kernel_name"], "");
    }

    #[test]
    fn test_publish_generates_id_once() {
        let mut kernel = kernel(vec![]);
        let ports = KernelPorts::default();
        assert!(publish_connection_info(&mut kernel, &ports, || "first".to_owned()).unwrap());
        assert_eq!(kernel_id(&kernel), Some("first"));

        assert!(!publish_connection_info(&mut kernel, &ports, || "second".to_owned()).unwrap());
        assert_eq!(kernel_id(&kernel), Some("first"));
        let info: ConnectionInfo = serde_json::from_str(
            &kernel.metadata.annotations.as_ref().unwrap()[CONNECTION_INFO_ANNOTATION],
        )
        .unwrap();
        assert_eq!(info.key, "first");
    }

    #[test]
    fn test_publish_follows_port_changes() {
        let mut kernel = kernel(vec![]);
        let ports = KernelPorts::default();
        publish_connection_info(&mut kernel, &ports, || "id".to_owned()).unwrap();

        kernel.spec.template.spec.as_mut().unwrap().containers[0].env =
            Some(vec![var("KERNEL_SHELL_PORT", "7000")]);
        assert!(publish_connection_info(&mut kernel, &ports, || "other".to_owned()).unwrap());
        assert_eq!(kernel_id(&kernel), Some("id"));
    }

    #[test]
    fn test_user_supplied_id_is_kept() {
        let mut kernel = kernel(vec![]);
        kernel.metadata.annotations = Some(
            [(KERNEL_ID_ANNOTATION.to_owned(), "mine".to_owned())]
                .into_iter()
                .collect(),
        );
        publish_connection_info(&mut kernel, &KernelPorts::default(), || "new".to_owned())
            .unwrap();
        assert_eq!(kernel_id(&kernel), Some("mine"));
    }
}
