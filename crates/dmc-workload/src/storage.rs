//! Per-tenant storage
//!
//! Layout under the storage base:
//!
//! ```text
//! <base>/
//! └── <tenant uuid>/          bind-mounted into the workload's data path
//!     └── plugins/
//!         ├── Core-1.0.jar
//!         └── Lib-2.3.jar
//! ```
//!
//! Nothing in-process reads this tree back; the runtime mounts it directly.

use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::StorageError;
use crate::tenant::TenantId;

pub const PLUGINS_DIR: &str = "plugins";

const WRITE_BUFFER_CAPACITY: usize = 64 * 1024;

/// Maps tenants to their storage paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    base: PathBuf,
}

impl StorageLayout {
    /// `base` should be absolute; it becomes the bind-mount source prefix
    pub fn new(base: impl Into<PathBuf>) -> Self {
        StorageLayout { base: base.into() }
    }

    pub fn tenant_root(&self, tenant: &TenantId) -> PathBuf {
        self.base.join(tenant.to_string())
    }

    pub fn plugins_dir(&self, tenant: &TenantId) -> PathBuf {
        self.tenant_root(tenant).join(PLUGINS_DIR)
    }
}

/// Filesystem operations the lifecycle manager needs
pub trait Storage: Send + Sync {
    /// Create `path` and all missing parents
    fn ensure_dir(&self, path: &Path) -> Result<(), StorageError>;

    /// Write the whole of `reader` to `path`, returning the byte count
    fn write_stream(&self, path: &Path, reader: &mut dyn Read) -> Result<u64, StorageError>;

    /// Remove `path` and everything beneath it
    fn remove_tree(&self, path: &Path) -> Result<(), StorageError>;

    fn exists(&self, path: &Path) -> Result<bool, StorageError>;
}

/// [`Storage`] on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn ensure_dir(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path).map_err(|source| StorageError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_stream(&self, path: &Path, reader: &mut dyn Read) -> Result<u64, StorageError> {
        let write_err = |source: io::Error| StorageError::Write {
            path: path.to_path_buf(),
            source,
        };

        // Write to a sibling then rename, so a half-written jar is never visible
        let temp_path = partial_path(path);
        let result = copy_to(&temp_path, reader)
            .and_then(|written| fs::rename(&temp_path, path).map(|()| written));
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        let written = result.map_err(write_err)?;

        debug!(path = %path.display(), bytes = written, "Wrote artifact");
        Ok(written)
    }

    fn remove_tree(&self, path: &Path) -> Result<(), StorageError> {
        fs::remove_dir_all(path).map_err(|source| StorageError::Remove {
            path: path.to_path_buf(),
            source,
        })
    }

    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        path.try_exists().map_err(|source| StorageError::Inspect {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn copy_to(path: &Path, reader: &mut dyn Read) -> io::Result<u64> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_CAPACITY, file);
    let written = io::copy(reader, &mut writer)?;
    writer.flush()?;
    Ok(written)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_dir() -> TempDir {
        match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("failed to create temp dir: {err}"),
        }
    }

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::new("/srv/dmc/storage");
        let Ok(tenant) = TenantId::parse("0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11") else {
            panic!("valid uuid");
        };
        assert_eq!(
            layout.tenant_root(&tenant),
            PathBuf::from("/srv/dmc/storage/0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11")
        );
        assert_eq!(
            layout.plugins_dir(&tenant),
            PathBuf::from("/srv/dmc/storage/0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11/plugins")
        );
    }

    #[test]
    fn test_write_stream_leaves_no_partial_file() {
        let dir = temp_dir();
        let target = dir.path().join("Core-1.0.jar");
        let payload = vec![7u8; 200_000];

        let written = LocalStorage.write_stream(&target, &mut payload.as_slice());
        assert!(written.is_ok_and(|n| n == 200_000));
        assert_eq!(fs::read(&target).unwrap_or_default(), payload);
        assert!(!dir.path().join("Core-1.0.jar.part").exists());
    }

    #[test]
    fn test_write_stream_onto_directory_fails_and_cleans_up() {
        let dir = temp_dir();
        let target = dir.path().join("Lib-1.0.jar");
        assert!(fs::create_dir(&target).is_ok());

        let result = LocalStorage.write_stream(&target, &mut &b"jar"[..]);
        assert!(matches!(result, Err(StorageError::Write { .. })));
        assert!(!dir.path().join("Lib-1.0.jar.part").exists());
    }

    #[test]
    fn test_ensure_exists_and_remove_tree() {
        let dir = temp_dir();
        let nested = dir.path().join("tenant").join("plugins");
        assert!(LocalStorage.ensure_dir(&nested).is_ok());
        assert!(LocalStorage.exists(&nested).is_ok_and(|e| e));

        let root = dir.path().join("tenant");
        assert!(LocalStorage.remove_tree(&root).is_ok());
        assert!(LocalStorage.exists(&root).is_ok_and(|e| !e));
    }

    #[test]
    fn test_ensure_dir_under_a_file_fails() {
        let dir = temp_dir();
        let file = dir.path().join("occupied");
        assert!(fs::write(&file, b"x").is_ok());
        let result = LocalStorage.ensure_dir(&file.join("plugins"));
        assert!(matches!(result, Err(StorageError::CreateDir { .. })));
    }
}
