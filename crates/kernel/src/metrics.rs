//! Prometheus metrics of the kernel controller.
//!
//! Creation and culling counters are updated by the reconciler as it goes.
//! The running gauge is rebuilt from the pods in the cluster on every
//! scrape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::api::KERNEL_NAME_LABEL;
use crate::store::{ResourceStore, StoreError};

/// Metrics recorded by the controller, in a registry of their own.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    running: IntGaugeVec,
    created: IntCounterVec,
    failed: IntCounterVec,
    culled: IntCounterVec,
    last_culling: GaugeVec,
}

impl Metrics {
    /// Create and register every metric.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let running = IntGaugeVec::new(
            Opts::new("kernel_running", "Current running kernels in the cluster"),
            &["namespace"],
        )?;
        let created = IntCounterVec::new(
            Opts::new("kernel_create_total", "Total times of creating kernels"),
            &["namespace"],
        )?;
        let failed = IntCounterVec::new(
            Opts::new(
                "kernel_create_failed_total",
                "Total failure times of creating kernels",
            ),
            &["namespace"],
        )?;
        let culled = IntCounterVec::new(
            Opts::new("kernel_culling_total", "Total times of culling kernels"),
            &["namespace", "name"],
        )?;
        let last_culling = GaugeVec::new(
            Opts::new(
                "last_kernel_culling_timestamp_seconds",
                "Timestamp of the last kernel culling in seconds",
            ),
            &["namespace", "name"],
        )?;

        registry.register(Box::new(running.clone()))?;
        registry.register(Box::new(created.clone()))?;
        registry.register(Box::new(failed.clone()))?;
        registry.register(Box::new(culled.clone()))?;
        registry.register(Box::new(last_culling.clone()))?;

        Ok(Metrics {
            registry,
            running,
            created,
            failed,
            culled,
            last_culling,
        })
    }

    /// The registry holding every controller metric.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A kernel pod was created in `namespace`.
    pub fn record_creation(&self, namespace: &str) {
        self.created.with_label_values(&[namespace]).inc();
    }

    /// Creating a kernel pod in `namespace` failed.
    pub fn record_failed_creation(&self, namespace: &str) {
        self.failed.with_label_values(&[namespace]).inc();
    }

    /// The Kernel `namespace/name` was culled at `at`.
    pub fn record_culling(&self, namespace: &str, name: &str, at: DateTime<Utc>) {
        self.culled.with_label_values(&[namespace, name]).inc();
        self.last_culling
            .with_label_values(&[namespace, name])
            .set(at.timestamp() as f64);
    }

    /// Rebuild the running gauge from `pods`.
    ///
    /// A pod counts as a running kernel when its kernel name label equals its
    /// own name. Namespaces without kernels are dropped from the gauge.
    pub fn update_running(&self, pods: &[Pod]) {
        let mut running: BTreeMap<&str, i64> = BTreeMap::new();
        for pod in pods {
            let name = pod.metadata.name.as_deref();
            let label = pod
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(KERNEL_NAME_LABEL))
                .map(String::as_str);
            if name.is_some() && name == label {
                *running
                    .entry(pod.metadata.namespace.as_deref().unwrap_or_default())
                    .or_default() += 1;
            }
        }

        self.running.reset();
        for (namespace, count) in running {
            self.running.with_label_values(&[namespace]).set(count);
        }
    }

    /// List every pod through `store` and rebuild the running gauge.
    ///
    /// On failure the gauge keeps its previous values.
    pub async fn scrape<S: ResourceStore>(&self, store: &S) -> Result<(), StoreError> {
        match store.list::<Pod>(None).await {
            Ok(pods) => {
                self.update_running(&pods);
                Ok(())
            }
            Err(error) => {
                warn!(%error, "Unable to list pods for kernel metrics.");
                Err(error)
            }
        }
    }

    /// Prometheus text exposition of every metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = vec![];
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|error| prometheus::Error::Msg(error.to_string()))
    }

    /// Current value of the running gauge for `namespace`.
    pub fn running(&self, namespace: &str) -> i64 {
        self.running.with_label_values(&[namespace]).get()
    }

    /// Current value of the creation counter for `namespace`.
    pub fn created(&self, namespace: &str) -> u64 {
        self.created.with_label_values(&[namespace]).get()
    }

    /// Current value of the failed creation counter for `namespace`.
    pub fn failed(&self, namespace: &str) -> u64 {
        self.failed.with_label_values(&[namespace]).get()
    }

    /// Current value of the culling counter for `namespace/name`.
    pub fn culled(&self, namespace: &str, name: &str) -> u64 {
        self.culled.with_label_values(&[namespace, name]).get()
    }

    /// Time of the last culling of `namespace/name` in seconds.
    pub fn last_culling(&self, namespace: &str, name: &str) -> f64 {
        self.last_culling.with_label_values(&[namespace, name]).get()
    }
}
