//! Configuration for the kernel controller
//!
//! The library consumes a plain [`Config`]. Binaries turn on the "cli"
//! feature and use [`Config::new_from_flags`] to build one from flags and
//! environment variables.

use std::net::SocketAddr;
use std::time::Duration;

#[cfg(feature = "cli")]
use anyhow::Context;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};
#[cfg(feature = "cli")]
use structopt::StructOpt;

use crate::ports::KernelPorts;

/// Image of the idle monitor sidecar.
pub const DEFAULT_MONITOR_IMAGE: &str = "ghcr.io/weekenthralling/kernel-monitor:latest";

/// Everything the Pod/Service generator and the reconciler need.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Ports injected for sockets the template leaves unset.
    pub ports: KernelPorts,
    /// Monitor sidecar settings. `None` runs kernels without a monitor.
    pub monitor: Option<MonitorConfig>,
    /// Whether a service is created for every kernel.
    pub create_service: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            ports: KernelPorts::default(),
            monitor: Some(MonitorConfig::default()),
            create_service: true,
        }
    }
}

/// The idle monitor sidecar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Sidecar image.
    pub image: String,
    /// Key the monitor signs its readiness response with.
    pub private_key: String,
    /// Key the kernel container verifies the response with.
    pub public_key: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            image: DEFAULT_MONITOR_IMAGE.to_owned(),
            private_key: String::new(),
            public_key: String::new(),
        }
    }
}

/// Process level configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address of the `/metrics` endpoint.
    pub metrics_addr: SocketAddr,
    /// Address of the `/healthz` and `/readyz` endpoints.
    pub probe_addr: SocketAddr,
    /// Whether to wait for the leader lease before reconciling.
    pub enable_leader_election: bool,
    /// Namespace of the leader lease. Defaults to the client's namespace.
    pub leader_election_namespace: Option<String>,
    /// Namespace to watch. `None` watches all namespaces.
    pub namespace: Option<String>,
    /// Upper bound on concurrently running reconciles.
    pub max_concurrent_reconciles: usize,
    /// Deadline for a single reconcile.
    pub reconcile_timeout: Duration,
    /// Lease duration of the per-Kernel lock. `None` disables the lock.
    pub kernel_lock_duration: Option<Duration>,
    /// Print the CustomResourceDefinition and exit.
    pub print_crd: bool,
    /// Generator and reconciler settings.
    pub controller: ControllerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            probe_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            enable_leader_election: false,
            leader_election_namespace: None,
            namespace: None,
            max_concurrent_reconciles: 4,
            reconcile_timeout: Duration::from_secs(30),
            kernel_lock_duration: None,
            print_crd: false,
            controller: ControllerConfig::default(),
        }
    }
}

impl Config {
    /// Work queue settings derived from this configuration.
    pub fn settings(&self) -> operator::Settings {
        operator::Settings {
            max_concurrent_reconciles: self.max_concurrent_reconciles,
            reconcile_timeout: self.reconcile_timeout,
            ..Default::default()
        }
    }

    /// Parses all command line flags and environment variables. The version
    /// of your application should be passed to set the proper version for
    /// the CLI.
    #[cfg(any(feature = "cli", feature = "docs"))]
    #[cfg_attr(feature = "docs", doc(cfg(feature = "cli")))]
    pub fn new_from_flags(version: &str) -> anyhow::Result<Self> {
        let app = Opts::clap().version(version);
        let opts = Opts::from_clap(&app.get_matches());
        opts.into_config()
    }
}

/// CLI options that can be configured for the controller
#[derive(StructOpt, Clone, Debug)]
#[cfg(any(feature = "cli", feature = "docs"))]
#[cfg_attr(feature = "docs", doc(cfg(feature = "cli")))]
#[structopt(
    name = "kernel-controller",
    about = "Runs Jupyter kernels as Kubernetes resources"
)]
pub struct Opts {
    #[structopt(
        long = "metrics-addr",
        default_value = "0.0.0.0:8080",
        env = "METRICS_ADDR",
        help = "The address the metric endpoint binds to"
    )]
    metrics_addr: SocketAddr,

    #[structopt(
        long = "probe-addr",
        default_value = "0.0.0.0:8081",
        env = "PROBE_ADDR",
        help = "The address the health endpoint binds to"
    )]
    probe_addr: SocketAddr,

    #[structopt(
        long = "enable-leader-election",
        help = "Enable leader election so only one active controller reconciles at a time"
    )]
    enable_leader_election: bool,

    #[structopt(
        long = "leader-election-namespace",
        env = "LEADER_ELECTION_NAMESPACE",
        help = "Namespace of the leader election lease. Defaults to the namespace of the kubeconfig context"
    )]
    leader_election_namespace: Option<String>,

    #[structopt(
        long = "namespace",
        env = "WATCH_NAMESPACE",
        help = "Only watch Kernels in this namespace. Defaults to all namespaces"
    )]
    namespace: Option<String>,

    #[structopt(
        long = "max-concurrent-reconciles",
        default_value = "4",
        help = "The maximum number of reconciles running at once"
    )]
    max_concurrent_reconciles: usize,

    #[structopt(
        long = "reconcile-timeout-seconds",
        default_value = "30",
        help = "Deadline for a single reconcile"
    )]
    reconcile_timeout_seconds: u64,

    #[structopt(
        long = "enable-kernel-lock",
        help = "Hold a lease per Kernel while reconciling it"
    )]
    enable_kernel_lock: bool,

    #[structopt(
        long = "kernel-lock-duration-seconds",
        default_value = "15",
        help = "Lifetime of a per-Kernel lease that is not renewed"
    )]
    kernel_lock_duration_seconds: u64,

    #[structopt(long = "disable-service", help = "Do not create a service per Kernel")]
    disable_service: bool,

    #[structopt(long = "disable-monitor", help = "Do not add the idle monitor sidecar")]
    disable_monitor: bool,

    #[structopt(
        long = "monitor-image",
        default_value = DEFAULT_MONITOR_IMAGE,
        env = "KERNEL_MONITOR_IMAGE",
        help = "Image of the idle monitor sidecar"
    )]
    monitor_image: String,

    #[structopt(
        long = "monitor-private-key-file",
        env = "KERNEL_MONITOR_PRIVATE_KEY_FILE",
        help = "File holding the key handed to the monitor sidecar"
    )]
    monitor_private_key_file: Option<PathBuf>,

    #[structopt(
        long = "monitor-public-key-file",
        env = "KERNEL_MONITOR_PUBLIC_KEY_FILE",
        help = "File holding the key handed to the kernel container"
    )]
    monitor_public_key_file: Option<PathBuf>,

    #[structopt(
        long = "shell-port",
        default_value = "52317",
        env = "KERNEL_SHELL_PORT",
        help = "Shell port injected when the template leaves it unset"
    )]
    shell_port: u16,

    #[structopt(
        long = "iopub-port",
        default_value = "52318",
        env = "KERNEL_IOPUB_PORT",
        help = "IOPub port injected when the template leaves it unset"
    )]
    iopub_port: u16,

    #[structopt(
        long = "hb-port",
        default_value = "52319",
        env = "KERNEL_HB_PORT",
        help = "Heartbeat port injected when the template leaves it unset"
    )]
    hb_port: u16,

    #[structopt(
        long = "control-port",
        default_value = "52320",
        env = "KERNEL_CONTROL_PORT",
        help = "Control port injected when the template leaves it unset"
    )]
    control_port: u16,

    #[structopt(
        long = "stdin-port",
        default_value = "52321",
        env = "KERNEL_STDIN_PORT",
        help = "Stdin port injected when the template leaves it unset"
    )]
    stdin_port: u16,

    #[structopt(long = "print-crd", help = "Print the Kernel CRD as YAML and exit")]
    print_crd: bool,
}

#[cfg(any(feature = "cli", feature = "docs"))]
impl Opts {
    fn into_config(self) -> anyhow::Result<Config> {
        let monitor = if self.disable_monitor {
            None
        } else {
            Some(MonitorConfig {
                image: self.monitor_image,
                private_key: read_key(
                    self.monitor_private_key_file.as_deref(),
                    "--monitor-private-key-file",
                )?,
                public_key: read_key(
                    self.monitor_public_key_file.as_deref(),
                    "--monitor-public-key-file",
                )?,
            })
        };
        let kernel_lock_duration = if self.enable_kernel_lock {
            Some(Duration::from_secs(self.kernel_lock_duration_seconds))
        } else {
            None
        };
        Ok(Config {
            metrics_addr: self.metrics_addr,
            probe_addr: self.probe_addr,
            enable_leader_election: self.enable_leader_election,
            leader_election_namespace: self.leader_election_namespace,
            namespace: self.namespace,
            max_concurrent_reconciles: self.max_concurrent_reconciles,
            reconcile_timeout: Duration::from_secs(self.reconcile_timeout_seconds),
            kernel_lock_duration,
            print_crd: self.print_crd,
            controller: ControllerConfig {
                ports: KernelPorts {
                    shell: self.shell_port,
                    iopub: self.iopub_port,
                    stdin: self.stdin_port,
                    heartbeat: self.hb_port,
                    control: self.control_port,
                },
                monitor,
                create_service: !self.disable_service,
            },
        })
    }
}

/// Reads a monitor key. The monitor cannot decrypt connection info without
/// its key pair, so a missing or empty key is an error.
#[cfg(any(feature = "cli", feature = "docs"))]
fn read_key(path: Option<&Path>, flag: &str) -> anyhow::Result<String> {
    let path = path.with_context(|| {
        format!(
            "{} is required unless the monitor is disabled with --disable-monitor",
            flag
        )
    })?;
    let key = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read key file {}", path.display()))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("key file {} is empty", path.display());
    }
    Ok(key.to_owned())
}
