//! Create and stop requests, as the transport layer hands them over

use dmc_config::Config;
use dmc_manifest::{resolve, ArchiveUpload, OmittedCandidate};
use dmc_workload::{PersistFailure, TenantId, WorkloadManager};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::ProvisionError;

/// Already-decoded create request
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Caller-chosen tenant id; a fresh one is generated when absent
    pub tenant_hint: Option<String>,
    pub primary: ArchiveUpload,
    pub dependencies: Vec<ArchiveUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateResponse {
    pub tenant_id: TenantId,
    pub resolved_names: Vec<String>,
    pub hard_required: Vec<String>,
    pub soft_declared: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub omitted: Vec<OmittedCandidate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persist_failures: Vec<PersistFailure>,
}

#[derive(Debug, Clone)]
pub struct StopRequest {
    pub tenant_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    pub tenant_id: TenantId,
    pub status: &'static str,
}

/// Read an archive from disk, refusing anything over `limit` bytes
pub fn read_upload(path: &Path, limit: u64) -> Result<ArchiveUpload, ProvisionError> {
    let io_err = |source| ProvisionError::Io {
        path: path.to_path_buf(),
        source,
    };
    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let file = File::open(path).map_err(io_err)?;
    let size = file.metadata().map_err(io_err)?.len();
    if size > limit {
        return Err(ProvisionError::UploadTooLarge {
            archive: display_name,
            size,
            limit,
        });
    }

    // The file may grow between stat and read
    let mut bytes = Vec::with_capacity(size as usize);
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(io_err)?;
    if bytes.len() as u64 > limit {
        return Err(ProvisionError::UploadTooLarge {
            archive: display_name,
            size: bytes.len() as u64,
            limit,
        });
    }

    Ok(ArchiveUpload::new(display_name, bytes))
}

/// Runs create and stop requests against one long-lived workload manager
pub struct Provisioner {
    manager: WorkloadManager,
    max_archive_bytes: u64,
}

impl Provisioner {
    pub fn new(manager: WorkloadManager, max_archive_bytes: u64) -> Self {
        Provisioner {
            manager,
            max_archive_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ProvisionError> {
        let manager = WorkloadManager::from_config(config)?;
        Ok(Provisioner::new(manager, config.get_max_archive_bytes()))
    }

    pub fn max_archive_bytes(&self) -> u64 {
        self.max_archive_bytes
    }

    pub fn create(&self, request: CreateRequest) -> Result<CreateResponse, ProvisionError> {
        for upload in std::iter::once(&request.primary).chain(&request.dependencies) {
            let size = upload.size() as u64;
            if size > self.max_archive_bytes {
                return Err(ProvisionError::UploadTooLarge {
                    archive: upload.display_name.clone(),
                    size,
                    limit: self.max_archive_bytes,
                });
            }
        }

        let tenant = match request.tenant_hint.as_deref() {
            Some(hint) => TenantId::parse(hint)?,
            None => TenantId::generate(),
        };
        dmc_logger::set_current_tenant(Some(tenant.to_string()));
        debug!(
            tenant = %tenant,
            primary = %request.primary.display_name,
            dependencies = request.dependencies.len(),
            "Resolving create request"
        );

        let report = resolve(request.primary, request.dependencies)?;
        let resolved_names = report.resolved_names();
        info!(
            tenant = %tenant,
            resolved = resolved_names.len(),
            hard_found = report.hard_found,
            "Dependencies resolved"
        );

        let outcome = self.manager.create(tenant, report.resolved)?;

        Ok(CreateResponse {
            tenant_id: outcome.tenant,
            resolved_names,
            hard_required: report.hard_dependencies,
            soft_declared: report.soft_dependencies,
            omitted: report.omitted,
            persist_failures: outcome.persist_failures,
        })
    }

    pub fn stop(&self, request: StopRequest) -> Result<StopResponse, ProvisionError> {
        let tenant = TenantId::parse(&request.tenant_id)?;
        dmc_logger::set_current_tenant(Some(tenant.to_string()));

        let outcome = self.manager.stop(tenant)?;
        Ok(StopResponse {
            tenant_id: outcome.tenant,
            status: "stopped",
        })
    }
}
