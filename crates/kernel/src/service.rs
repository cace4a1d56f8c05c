//! Generates the desired Service for a Kernel and merges it into the one
//! found in the cluster.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Pod, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::warn;

use crate::api::{Kernel, KERNEL_NAME_LABEL};
use crate::error::{Error, Result};
use crate::meta::{generated_annotations, generated_labels};
use crate::ports::KernelSocket;

/// Build the Service exposing the kernel sockets of `pod`.
///
/// One port is generated per socket env var found on the kernel container.
/// Values that are not valid ports are skipped.
pub fn generate_service(kernel: &Kernel, pod: &Pod) -> Result<Service> {
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
    let container = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.containers.first())
        .ok_or_else(|| Error::MissingKernelContainer(name.clone()))?;
    let env = container.env.as_deref().unwrap_or_default();

    let mut ports = vec![];
    for socket in KernelSocket::ALL {
        let value = env
            .iter()
            .find(|var| var.name == socket.env_name())
            .and_then(|var| var.value.as_deref());
        let value = match value {
            Some(value) => value,
            None => continue,
        };
        match value.parse::<u16>() {
            Ok(port) => ports.push(ServicePort {
                name: Some(socket.port_name().to_owned()),
                port: i32::from(port),
                protocol: Some("TCP".to_owned()),
                target_port: Some(IntOrString::Int(i32::from(port))),
                ..Default::default()
            }),
            Err(error) => warn!(
                kernel = %name,
                env = socket.env_name(),
                %value,
                %error,
                "Skipping socket with invalid port."
            ),
        }
    }

    let mut selector = BTreeMap::new();
    selector.insert(KERNEL_NAME_LABEL.to_owned(), name.clone());

    Ok(Service {
        metadata: ObjectMeta {
            labels: Some(generated_labels(&name, kernel.metadata.labels.as_ref())),
            annotations: Some(generated_annotations(
                kernel.metadata.annotations.as_ref(),
            )),
            name: Some(name),
            namespace: Some(namespace),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_owned()),
            selector: Some(selector),
            ports: Some(ports),
            ..Default::default()
        }),
        status: None,
    })
}

/// Copy the fields the controller manages from `from` onto `to`.
///
/// Labels, annotations, selector and ports are copied. Cluster assigned
/// fields such as the cluster IP are left alone. Returns whether `to`
/// changed.
pub fn copy_service_fields(from: &Service, to: &mut Service) -> bool {
    let mut changed = false;

    let labels = non_empty(from.metadata.labels.clone());
    if non_empty(to.metadata.labels.clone()) != labels {
        to.metadata.labels = labels;
        changed = true;
    }

    let annotations = non_empty(from.metadata.annotations.clone());
    if non_empty(to.metadata.annotations.clone()) != annotations {
        to.metadata.annotations = annotations;
        changed = true;
    }

    let desired = from.spec.clone().unwrap_or_default();
    let found = to.spec.get_or_insert_with(Default::default);
    if found.selector != desired.selector {
        found.selector = desired.selector;
        changed = true;
    }
    if found.ports != desired.ports {
        found.ports = desired.ports;
        changed = true;
    }

    changed
}

fn non_empty(map: Option<BTreeMap<String, String>>) -> Option<BTreeMap<String, String>> {
    map.filter(|map| !map.is_empty())
}
