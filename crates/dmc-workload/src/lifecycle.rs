//! Create and stop tenant workloads
//!
//! Create persists every resolved artifact under the tenant's storage root,
//! then asks the runtime to create and start a workload with that root
//! mounted. Stop removes the storage root and then the workload.
//!
//! An existing storage root belongs to a live workload until the runtime says
//! otherwise, so create never writes into one that has a workload behind it.
//! A create that fails before the runtime holds a workload removes the root
//! it wrote.

use ahash::AHashMap;
use dmc_config::Config;
use dmc_manifest::Artifact;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::docker::DockerCli;
use crate::errors::{RuntimeError, StorageError, WorkloadError};
use crate::runtime::{RemoveOptions, WorkloadHandle, WorkloadRuntime};
use crate::settings::WorkloadSettings;
use crate::storage::{LocalStorage, Storage, StorageLayout};
use crate::tenant::TenantId;

/// An artifact written to the tenant's plugins directory
#[derive(Debug, Clone, Serialize)]
pub struct PersistedArtifact {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub is_primary: bool,
}

/// An artifact that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistFailure {
    pub name: String,
    pub version: String,
    pub is_primary: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    pub tenant: TenantId,
    pub workload_name: String,
    pub handle: WorkloadHandle,
    pub storage_root: PathBuf,
    pub persisted: Vec<PersistedArtifact>,
    /// Non-primary artifacts that failed to persist; the workload still started
    pub persist_failures: Vec<PersistFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopOutcome {
    pub tenant: TenantId,
    pub workload_name: String,
    pub storage_root: PathBuf,
}

/// One mutex per tenant id seen by this process
#[derive(Debug, Default)]
struct TenantLocks {
    table: Mutex<AHashMap<TenantId, Arc<Mutex<()>>>>,
}

impl TenantLocks {
    fn for_tenant(&self, tenant: TenantId) -> Arc<Mutex<()>> {
        Arc::clone(self.table.lock().entry(tenant).or_default())
    }
}

/// Owns the create/stop lifecycle of tenant workloads
///
/// The runtime and storage collaborators are long-lived and shared across
/// requests. Create and stop on the same tenant are serialized in-process;
/// across processes the runtime's name conflict is the only guard.
pub struct WorkloadManager {
    runtime: Arc<dyn WorkloadRuntime>,
    storage: Arc<dyn Storage>,
    layout: StorageLayout,
    settings: WorkloadSettings,
    locks: TenantLocks,
}

impl WorkloadManager {
    pub fn new(
        runtime: Arc<dyn WorkloadRuntime>,
        storage: Arc<dyn Storage>,
        layout: StorageLayout,
        settings: WorkloadSettings,
    ) -> Self {
        WorkloadManager {
            runtime,
            storage,
            layout,
            settings,
            locks: TenantLocks::default(),
        }
    }

    /// Docker CLI runtime on local storage, both taken from `config`
    pub fn from_config(config: &Config) -> Result<Self, WorkloadError> {
        let settings = WorkloadSettings::from_config(config)?;
        let base = absolute(config.get_storage_path())?;
        Ok(WorkloadManager::new(
            Arc::new(DockerCli::from_config(config)),
            Arc::new(LocalStorage),
            StorageLayout::new(base),
            settings,
        ))
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn create(
        &self,
        tenant: TenantId,
        artifacts: Vec<Artifact>,
    ) -> Result<CreateOutcome, WorkloadError> {
        let primaries = artifacts.iter().filter(|a| a.is_primary).count();
        if primaries != 1 {
            return Err(WorkloadError::InvalidArtifacts { primaries });
        }

        let lock = self.locks.for_tenant(tenant);
        let _guard = lock.lock();

        let storage_root = self.layout.tenant_root(&tenant);
        let workload_name = self.settings.workload_name(&tenant);
        if self.storage.exists(&storage_root)? && self.runtime.inspect_workload(&workload_name)? {
            warn!(tenant = %tenant, workload = %workload_name, "Workload already running, storage untouched");
            return Err(RuntimeError::Conflict {
                name: workload_name,
            }
            .into());
        }

        let plugins_dir = self.layout.plugins_dir(&tenant);
        self.storage.ensure_dir(&plugins_dir)?;
        info!(
            tenant = %tenant,
            root = %storage_root.display(),
            artifacts = artifacts.len(),
            "Persisting artifacts"
        );

        let (persisted, persist_failures) = self.persist_all(&plugins_dir, artifacts);

        let failed_primary = persist_failures
            .iter()
            .find(|failure| failure.is_primary)
            .map(|failure| failure.name.clone());
        if let Some(name) = failed_primary {
            error!(tenant = %tenant, plugin = %name, "Primary plugin not persisted, workload not created");
            self.discard_storage(&tenant, &storage_root);
            return Err(WorkloadError::PrimaryNotPersisted {
                name,
                failures: persist_failures,
            });
        }
        for failure in &persist_failures {
            warn!(
                tenant = %tenant,
                plugin = %failure.name,
                reason = %failure.reason,
                "Dependency not persisted, continuing"
            );
        }

        let spec = self.settings.build_spec(&tenant, &storage_root);
        let handle = match self.runtime.create_workload(&spec) {
            Ok(handle) => handle,
            Err(e) => {
                error!(tenant = %tenant, workload = %spec.name, error = %e, "Workload not created");
                self.discard_storage(&tenant, &storage_root);
                return Err(e.into());
            }
        };
        debug!(tenant = %tenant, workload = %spec.name, handle = %handle, "Workload created");
        if let Err(e) = self.runtime.start_workload(&handle) {
            error!(tenant = %tenant, workload = %spec.name, error = %e, "Workload created but not started");
            return Err(e.into());
        }
        info!(tenant = %tenant, workload = %spec.name, runtime = self.runtime.name(), "Workload started");

        Ok(CreateOutcome {
            tenant,
            workload_name: spec.name,
            handle,
            storage_root,
            persisted,
            persist_failures,
        })
    }

    /// Remove a storage root no workload refers to; failures are only logged
    fn discard_storage(&self, tenant: &TenantId, storage_root: &Path) {
        match self.storage.remove_tree(storage_root) {
            Ok(()) => debug!(tenant = %tenant, root = %storage_root.display(), "Storage discarded"),
            Err(e) => warn!(tenant = %tenant, error = %e, "Failed to discard storage"),
        }
    }

    fn persist_all(
        &self,
        plugins_dir: &Path,
        artifacts: Vec<Artifact>,
    ) -> (Vec<PersistedArtifact>, Vec<PersistFailure>) {
        let (claimed, mut failures) = claim_file_names(artifacts);
        let storage = self.storage.as_ref();
        let results: Vec<Result<PersistedArtifact, PersistFailure>> = claimed
            .into_par_iter()
            .map(|(file_name, artifact)| persist_one(storage, &plugins_dir.join(file_name), artifact))
            .collect();

        let mut persisted = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(artifact) => persisted.push(artifact),
                Err(failure) => failures.push(failure),
            }
        }
        (persisted, failures)
    }

    pub fn stop(&self, tenant: TenantId) -> Result<StopOutcome, WorkloadError> {
        let lock = self.locks.for_tenant(tenant);
        let _guard = lock.lock();

        let storage_root = self.layout.tenant_root(&tenant);
        if !self.storage.exists(&storage_root)? {
            return Err(WorkloadError::NotFound {
                tenant,
                reason: "no storage root".to_string(),
            });
        }

        let workload_name = self.settings.workload_name(&tenant);
        if !self.runtime.inspect_workload(&workload_name)? {
            warn!(
                tenant = %tenant,
                workload = %workload_name,
                root = %storage_root.display(),
                "Storage exists without a workload; left in place"
            );
            return Err(WorkloadError::NotFound {
                tenant,
                reason: format!("runtime has no workload named '{}'", workload_name),
            });
        }

        self.storage.remove_tree(&storage_root)?;
        debug!(tenant = %tenant, root = %storage_root.display(), "Storage removed");

        if let Err(e) = self
            .runtime
            .remove_workload(&workload_name, RemoveOptions::FORCED)
        {
            error!(
                tenant = %tenant,
                workload = %workload_name,
                error = %e,
                "Workload orphaned without storage; operator cleanup required"
            );
            return Err(e.into());
        }
        info!(tenant = %tenant, workload = %workload_name, "Workload stopped");

        Ok(StopOutcome {
            tenant,
            workload_name,
            storage_root,
        })
    }
}

/// Give each file name to one artifact, primary first
///
/// Sanitizing can map distinct plugin names to the same file; later claimants
/// are reported as failures instead of racing on one path.
fn claim_file_names(mut artifacts: Vec<Artifact>) -> (Vec<(String, Artifact)>, Vec<PersistFailure>) {
    artifacts.sort_by_key(|artifact| !artifact.is_primary);

    let mut owners: AHashMap<String, String> = AHashMap::with_capacity(artifacts.len());
    let mut claimed = Vec::with_capacity(artifacts.len());
    let mut rejected = Vec::new();
    for artifact in artifacts {
        let file_name = artifact.file_name();
        if let Some(owner) = owners.get(&file_name) {
            rejected.push(PersistFailure {
                name: artifact.manifest.name,
                version: artifact.manifest.version,
                is_primary: artifact.is_primary,
                reason: format!("file name '{}' already taken by '{}'", file_name, owner),
            });
            continue;
        }
        owners.insert(file_name.clone(), artifact.manifest.name.clone());
        claimed.push((file_name, artifact));
    }
    (claimed, rejected)
}

fn persist_one(
    storage: &dyn Storage,
    path: &Path,
    artifact: Artifact,
) -> Result<PersistedArtifact, PersistFailure> {
    let Artifact {
        manifest,
        upload,
        is_primary,
    } = artifact;
    let bytes = upload.into_bytes();

    match storage.write_stream(path, &mut bytes.as_slice()) {
        Ok(written) => Ok(PersistedArtifact {
            name: manifest.name,
            version: manifest.version,
            path: path.to_path_buf(),
            bytes: written,
            is_primary,
        }),
        Err(e) => Err(PersistFailure {
            name: manifest.name,
            version: manifest.version,
            is_primary,
            reason: e.to_string(),
        }),
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf, StorageError> {
    if path.is_absolute() {
        return Ok(path);
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&path))
        .map_err(|source| StorageError::Inspect { path, source })
}
