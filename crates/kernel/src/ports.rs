//! The kernel sockets that get a port threaded through the kernel
//! container's environment and the Kernel's service.

/// One of the sockets a Jupyter kernel listens on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KernelSocket {
    /// Request/reply channel for execution.
    Shell,
    /// Broadcast channel for outputs.
    IoPub,
    /// Input requests from the kernel.
    Stdin,
    /// Heartbeat.
    Heartbeat,
    /// Control channel for shutdown and interrupts.
    Control,
}

impl KernelSocket {
    /// Every socket, in the order service ports are generated.
    pub const ALL: [KernelSocket; 5] = [
        KernelSocket::Shell,
        KernelSocket::IoPub,
        KernelSocket::Stdin,
        KernelSocket::Heartbeat,
        KernelSocket::Control,
    ];

    /// Environment variable carrying this socket's port.
    pub fn env_name(self) -> &'static str {
        match self {
            KernelSocket::Shell => "KERNEL_SHELL_PORT",
            KernelSocket::IoPub => "KERNEL_IOPUB_PORT",
            KernelSocket::Stdin => "KERNEL_STDIN_PORT",
            KernelSocket::Heartbeat => "KERNEL_HB_PORT",
            KernelSocket::Control => "KERNEL_CONTROL_PORT",
        }
    }

    /// Name of the service port exposing this socket.
    pub fn port_name(self) -> &'static str {
        match self {
            KernelSocket::Shell => "shell-port",
            KernelSocket::IoPub => "iopub-port",
            KernelSocket::Stdin => "stdin-port",
            KernelSocket::Heartbeat => "hb-port",
            KernelSocket::Control => "control-port",
        }
    }
}

/// Port numbers injected for sockets the pod template leaves unset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelPorts {
    /// Port of [`KernelSocket::Shell`].
    pub shell: u16,
    /// Port of [`KernelSocket::IoPub`].
    pub iopub: u16,
    /// Port of [`KernelSocket::Stdin`].
    pub stdin: u16,
    /// Port of [`KernelSocket::Heartbeat`].
    pub heartbeat: u16,
    /// Port of [`KernelSocket::Control`].
    pub control: u16,
}

impl KernelPorts {
    /// Configured port for `socket`.
    pub fn port(&self, socket: KernelSocket) -> u16 {
        match socket {
            KernelSocket::Shell => self.shell,
            KernelSocket::IoPub => self.iopub,
            KernelSocket::Stdin => self.stdin,
            KernelSocket::Heartbeat => self.heartbeat,
            KernelSocket::Control => self.control,
        }
    }
}

impl Default for KernelPorts {
    fn default() -> Self {
        KernelPorts {
            shell: 52317,
            iopub: 52318,
            heartbeat: 52319,
            control: 52320,
            stdin: 52321,
        }
    }
}
