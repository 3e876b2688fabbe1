//! Plugin manifest handling for dmc
//!
//! Reads `plugin.yml` out of uploaded plugin archives and resolves the
//! declared hard/soft dependency names against the uploaded set. The output,
//! a [`ResolutionReport`], is what the workload layer persists.

pub mod errors;
pub mod extract;
pub mod resolver;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use errors::{ManifestError, ResolutionError};
pub use extract::{extract_manifest, MANIFEST_FILE_NAME};
pub use resolver::{resolve, resolve_extracted};
pub use types::{ArchiveUpload, Artifact, OmittedCandidate, PluginManifest, ResolutionReport};
