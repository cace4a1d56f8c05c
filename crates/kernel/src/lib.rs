//! A crate for running Jupyter kernels as Kubernetes resources.
//!
//! A [`Kernel`](api::Kernel) custom resource describes a pod template plus
//! idle culling knobs. The [`KernelReconciler`] turns each Kernel into a pod
//! (optionally with a monitor sidecar) and a backing service, mirrors the pod
//! status onto the Kernel, relays pod events to the Kernel and deletes
//! Kernels that the monitor marked idle.
//!
//! The reconciler is driven by the `operator` crate's work queue and talks
//! to the cluster only through the [`ResourceStore`](store::ResourceStore)
//! and [`EventRecorder`](recorder::EventRecorder) abstractions, so it can be
//! exercised against the in-memory implementations in tests.

#![warn(missing_docs)]
#![cfg_attr(feature = "docs", feature(doc_cfg))]

pub mod api;
pub mod config;
pub mod connection;
mod error;
pub mod meta;
pub mod metrics;
pub mod pod;
pub mod ports;
mod reconciler;
pub mod recorder;
pub mod relay;
pub mod service;
pub mod status;
pub mod store;
pub mod webserver;

pub use error::{Error, Result};
pub use reconciler::KernelReconciler;
