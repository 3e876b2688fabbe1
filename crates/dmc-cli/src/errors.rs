//! Errors at the provisioning boundary
//!
//! Every failure leaves the process as an [`ErrorReport`]: a machine-readable
//! `kind`, a human message and whatever counts or names explain it.

use dmc_config::ConfigError;
use dmc_manifest::ResolutionError;
use dmc_workload::{PersistFailure, TenantIdError, WorkloadError};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    InvalidTenant(#[from] TenantIdError),

    #[error("Archive '{archive}' is {size} bytes, over the {limit} byte upload limit")]
    UploadTooLarge {
        archive: String,
        size: u64,
        limit: u64,
    },

    #[error("Failed to read archive {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Workload(#[from] WorkloadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ProvisionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::InvalidTenant(_) => "invalid_tenant",
            ProvisionError::UploadTooLarge { .. } => "upload_too_large",
            ProvisionError::Io { .. } => "io_error",
            ProvisionError::Resolution(e) => e.kind(),
            ProvisionError::Workload(e) => e.kind(),
            ProvisionError::Config(_) => "config_error",
        }
    }
}

/// Structured error payload handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<PersistFailure>>,
}

impl From<&ProvisionError> for ErrorReport {
    fn from(error: &ProvisionError) -> Self {
        let mut report = ErrorReport {
            kind: error.kind(),
            message: error.to_string(),
            required: None,
            found: None,
            missing: None,
            failures: None,
        };
        match error {
            ProvisionError::Resolution(ResolutionError::UnsatisfiedHardDependency {
                required,
                found,
                missing,
            }) => {
                report.required = Some(*required);
                report.found = Some(*found);
                report.missing = Some(missing.clone());
            }
            ProvisionError::Workload(WorkloadError::PrimaryNotPersisted { failures, .. }) => {
                report.failures = Some(failures.clone());
            }
            _ => {}
        }
        report
    }
}
