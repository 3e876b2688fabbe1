use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::PersistFailure;
use crate::tenant::TenantId;

/// Filesystem failures under the storage base
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to inspect {}: {source}", .path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures reported by the container runtime collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Workload '{name}' already exists")]
    Conflict { name: String },

    #[error("Runtime {operation} failed for '{target}' (exit {status:?}): {stderr}")]
    Failed {
        operation: &'static str,
        target: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Runtime {operation} for '{target}' timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        target: String,
        seconds: u64,
    },
}

/// Errors surfaced by [`crate::WorkloadManager`]
#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("No workload found for tenant {tenant}: {reason}")]
    NotFound { tenant: TenantId, reason: String },

    #[error("Primary plugin '{name}' could not be persisted; workload was not created")]
    PrimaryNotPersisted {
        name: String,
        failures: Vec<PersistFailure>,
    },

    #[error("Invalid workload settings: {0}")]
    InvalidSettings(String),

    #[error("Expected exactly one primary artifact, got {primaries}")]
    InvalidArtifacts { primaries: usize },
}

impl WorkloadError {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkloadError::Storage(_) => "storage_error",
            WorkloadError::Runtime(RuntimeError::Conflict { .. }) => "workload_conflict",
            WorkloadError::Runtime(_) => "runtime_error",
            WorkloadError::NotFound { .. } => "not_found",
            WorkloadError::PrimaryNotPersisted { .. } => "storage_error",
            WorkloadError::InvalidSettings(_) => "invalid_settings",
            WorkloadError::InvalidArtifacts { .. } => "invalid_artifacts",
        }
    }
}
