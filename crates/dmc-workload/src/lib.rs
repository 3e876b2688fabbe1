//! Tenant workload lifecycle for dmc
//!
//! Takes the artifacts a resolution produced, writes them under a per-tenant
//! storage root and runs one container workload per tenant with that root
//! mounted. The container runtime and the filesystem sit behind the
//! [`WorkloadRuntime`] and [`Storage`] traits.

pub mod docker;
pub mod errors;
pub mod lifecycle;
pub mod runtime;
pub mod settings;
pub mod storage;
pub mod tenant;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use docker::DockerCli;
pub use errors::{RuntimeError, StorageError, WorkloadError};
pub use lifecycle::{CreateOutcome, PersistFailure, PersistedArtifact, StopOutcome, WorkloadManager};
pub use runtime::{
    BindMount, PortBinding, Protocol, RemoveOptions, WorkloadHandle, WorkloadRuntime, WorkloadSpec,
};
pub use settings::{GameMode, WorkloadSettings};
pub use storage::{LocalStorage, Storage, StorageLayout, PLUGINS_DIR};
pub use tenant::{TenantId, TenantIdError};
