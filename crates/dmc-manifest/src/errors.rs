use thiserror::Error;

use crate::extract::MANIFEST_FILE_NAME;

/// Errors raised while reading the manifest out of a single plugin archive
///
/// All variants are recoverable for dependency candidates; only a failure on
/// the primary archive aborts a request.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("{file} not found in archive '{archive}'", file = MANIFEST_FILE_NAME)]
    NotFound { archive: String },

    #[error("Malformed {file} in archive '{archive}': {source}", file = MANIFEST_FILE_NAME)]
    Malformed {
        archive: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid archive '{archive}': {reason}")]
    InvalidArchive { archive: String, reason: String },
}

impl ManifestError {
    /// Display name of the archive that failed
    pub fn archive(&self) -> &str {
        match self {
            ManifestError::NotFound { archive }
            | ManifestError::Malformed { archive, .. }
            | ManifestError::InvalidArchive { archive, .. } => archive,
        }
    }

    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            ManifestError::NotFound { .. } => "manifest_not_found",
            ManifestError::Malformed { .. } => "manifest_malformed",
            ManifestError::InvalidArchive { .. } => "invalid_archive",
        }
    }
}

/// Errors that fail a whole resolution request
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Primary plugin could not be read: {0}")]
    Primary(#[from] ManifestError),

    #[error("Primary plugin in archive '{archive}' does not declare a name")]
    InvalidPrimary { archive: String },

    #[error(
        "Plugin requires {required} hard dependencies, but only {found} were provided (missing: {missing})",
        missing = .missing.join(", ")
    )]
    UnsatisfiedHardDependency {
        required: usize,
        found: usize,
        missing: Vec<String>,
    },
}

impl ResolutionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionError::Primary(inner) => inner.kind(),
            ResolutionError::InvalidPrimary { .. } => "invalid_primary",
            ResolutionError::UnsatisfiedHardDependency { .. } => "unsatisfied_hard_dependency",
        }
    }
}
