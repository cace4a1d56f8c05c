use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Event, Pod, Service};
use kube::api::ListParams;
use kube::CustomResourceExt;
use operator::{LeaseLock, Manager, ObjectKey};
use tracing::{error, info};

use kernel::api::{Kernel, KERNEL_NAME_LABEL};
use kernel::config::Config;
use kernel::metrics::Metrics;
use kernel::recorder::KubeRecorder;
use kernel::store::KubeStore;
use kernel::{webserver, KernelReconciler};
use operator::leader::LeaderElector;

const LEADER_LEASE_NAME: &str = "kernel-controller";
const LEADER_LEASE_DURATION: Duration = Duration::from_secs(15);
const LEADER_RETRY_PERIOD: Duration = Duration::from_secs(2);
const KERNEL_LOCK_PREFIX: &str = "kernel-lock";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::new_from_flags(env!("CARGO_PKG_VERSION"))?;

    if config.print_crd {
        print!("{}", serde_yaml::to_string(&Kernel::crd())?);
        return Ok(());
    }

    // Tries a KubeConfig file first, then falls back on an in-cluster
    // configuration.
    let kubeconfig = kube::Config::infer().await?;
    let default_namespace = kubeconfig.default_namespace.clone();
    let client = kube::Client::try_from(kubeconfig)?;
    let identity = format!(
        "{}-{}",
        hostname::get()?.to_string_lossy(),
        uuid::Uuid::new_v4()
    );

    let elector = if config.enable_leader_election {
        let namespace = config
            .leader_election_namespace
            .clone()
            .unwrap_or(default_namespace);
        let lock = LeaseLock::new(
            client.clone(),
            identity.clone(),
            "",
            LEADER_LEASE_DURATION,
        );
        let elector = LeaderElector::new(
            lock,
            ObjectKey::namespaced(namespace, LEADER_LEASE_NAME),
            LEADER_LEASE_DURATION,
            LEADER_RETRY_PERIOD,
        );
        elector.acquire().await;
        Some(elector)
    } else {
        None
    };

    let store = Arc::new(KubeStore::new(client.clone()));
    let recorder = Arc::new(KubeRecorder::new(client.clone()));
    let metrics = Arc::new(Metrics::new()?);
    let mut reconciler = KernelReconciler::new(
        store.clone(),
        recorder,
        metrics.clone(),
        config.controller.clone(),
    );
    if let Some(duration) = config.kernel_lock_duration {
        reconciler = reconciler.with_lock(Arc::new(LeaseLock::new(
            client.clone(),
            identity.clone(),
            KERNEL_LOCK_PREFIX,
            duration,
        )));
    }

    let namespace = config.namespace.as_deref();
    let manager = Manager::new(client, Arc::new(reconciler), config.settings())
        .manages::<Kernel>(namespace, ListParams::default())
        .owns::<Pod>(namespace, ListParams::default().labels(KERNEL_NAME_LABEL))
        .owns::<Service>(namespace, ListParams::default().labels(KERNEL_NAME_LABEL))
        .watches::<Event, _>(
            namespace,
            ListParams::default().fields("involvedObject.kind=Pod"),
            |event: &Event| Some(ObjectKey::from(event)),
        );

    info!(%identity, namespace = ?config.namespace, "Starting kernel controller.");
    let leadership = async {
        match &elector {
            Some(elector) => elector.hold().await,
            None => futures::future::pending().await,
        }
    };

    tokio::select! {
        _ = manager.start() => {
            info!("Manager exited.");
        }
        result = webserver::serve_probes(config.probe_addr) => {
            result?;
        }
        result = webserver::serve_metrics(config.metrics_addr, metrics, store) => {
            result?;
        }
        result = leadership => {
            if let Err(e) = &result {
                error!(error = %e, "Lost leadership, shutting down.");
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down.");
        }
    }
    Ok(())
}
