//! Container runtime collaborator
//!
//! The lifecycle manager only decides *what* to ask of the runtime; the
//! [`WorkloadRuntime`] implementation decides how. One long-lived instance is
//! injected into the manager and shared across requests.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::errors::RuntimeError;

/// Opaque identifier assigned by the runtime on create
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkloadHandle(String);

impl WorkloadHandle {
    pub fn new(id: impl Into<String>) -> Self {
        WorkloadHandle(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Host directory mounted into the workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
}

/// Published port, container side to host side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: Protocol,
}

/// Everything the runtime needs to create one workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<BindMount>,
    pub ports: Vec<PortBinding>,
    pub restart_policy: String,
    pub log_driver: String,
}

impl WorkloadSpec {
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    pub force: bool,
    pub remove_volumes: bool,
}

impl RemoveOptions {
    /// Kill if running and drop anonymous volumes
    pub const FORCED: RemoveOptions = RemoveOptions {
        force: true,
        remove_volumes: true,
    };
}

/// Runtime operations used by the lifecycle manager
///
/// Implementations must be `Send + Sync`; the manager calls them from
/// request threads. No call is retried by the manager.
pub trait WorkloadRuntime: Send + Sync {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Create (but do not start) a workload; a name already in use is a
    /// [`RuntimeError::Conflict`]
    fn create_workload(&self, spec: &WorkloadSpec) -> Result<WorkloadHandle, RuntimeError>;

    fn start_workload(&self, handle: &WorkloadHandle) -> Result<(), RuntimeError>;

    /// Whether a workload with this name exists, running or not
    fn inspect_workload(&self, name: &str) -> Result<bool, RuntimeError>;

    fn remove_workload(&self, name: &str, options: RemoveOptions) -> Result<(), RuntimeError>;
}
