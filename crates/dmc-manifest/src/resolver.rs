//! Dependency resolution over an uploaded plugin set
//!
//! Candidate archives are extracted in parallel; results are handed back to
//! the calling thread, which alone owns the resolved list and the name sets.
//! Acceptance runs to a fixed point so candidate order never decides whether a
//! valid set resolves.

use ahash::AHashSet;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::errors::{ManifestError, ResolutionError};
use crate::types::{ArchiveUpload, Artifact, OmittedCandidate, ResolutionReport};

/// Insertion-ordered set of dependency names
#[derive(Debug, Default, Clone)]
struct NameSet {
    order: Vec<String>,
    members: AHashSet<String>,
}

impl NameSet {
    fn from_names<'a>(names: impl IntoIterator<Item = &'a String>) -> Self {
        let mut set = NameSet::default();
        set.extend(names);
        set
    }

    fn insert(&mut self, name: &str) -> bool {
        if self.members.contains(name) {
            return false;
        }
        self.members.insert(name.to_string());
        self.order.push(name.to_string());
        true
    }

    fn extend<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) -> bool {
        let mut grew = false;
        for name in names {
            grew |= self.insert(name);
        }
        grew
    }

    fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    fn into_vec(self) -> Vec<String> {
        self.order
    }
}

/// Extract the primary and every candidate, then resolve
///
/// A primary that cannot be read aborts immediately. Candidate failures are
/// recorded in [`ResolutionReport::omitted`] and otherwise ignored.
pub fn resolve(
    primary: ArchiveUpload,
    candidates: Vec<ArchiveUpload>,
) -> Result<ResolutionReport, ResolutionError> {
    let primary = Artifact::extract(primary, true)?;

    let extracted: Vec<Result<Artifact, ManifestError>> = candidates
        .into_par_iter()
        .map(|upload| Artifact::extract(upload, false))
        .collect();

    resolve_extracted(primary, extracted)
}

/// Resolve an already-extracted primary against extracted candidates
pub fn resolve_extracted(
    primary: Artifact,
    candidates: Vec<Result<Artifact, ManifestError>>,
) -> Result<ResolutionReport, ResolutionError> {
    if primary.manifest.name.is_empty() {
        return Err(ResolutionError::InvalidPrimary {
            archive: primary.upload.display_name.clone(),
        });
    }

    let mut hard = NameSet::from_names(&primary.manifest.hard_dependencies);
    let soft = NameSet::from_names(&primary.manifest.soft_dependencies);
    let mut accepted: AHashSet<String> = AHashSet::new();
    accepted.insert(primary.manifest.name.clone());

    let mut omitted = Vec::new();
    let mut pending = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match candidate {
            Ok(artifact) if artifact.manifest.name.is_empty() => {
                warn!(archive = %artifact.upload.display_name, "Dependency declares no name, skipping");
                omitted.push(OmittedCandidate {
                    archive: artifact.upload.display_name,
                    reason: "plugin.yml does not declare a name".to_string(),
                });
            }
            Ok(artifact) => pending.push(artifact),
            Err(e) => {
                warn!(archive = %e.archive(), error = %e, "Skipping unreadable dependency");
                omitted.push(OmittedCandidate {
                    archive: e.archive().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let mut resolved = vec![primary];
    // Accepted dependencies whose own hard dependencies were merged into `hard`
    let mut expanded: AHashSet<String> = AHashSet::new();

    loop {
        let mut progressed = false;

        for artifact in resolved.iter().skip(1) {
            let name = &artifact.manifest.name;
            if hard.contains(name) && expanded.insert(name.clone()) {
                progressed |= hard.extend(&artifact.manifest.hard_dependencies);
            }
        }

        let mut still_pending = Vec::with_capacity(pending.len());
        for artifact in pending {
            let name = artifact.manifest.name.as_str();
            if accepted.contains(name) {
                debug!(
                    archive = %artifact.upload.display_name,
                    plugin = name,
                    "Duplicate plugin name, keeping the first accepted archive"
                );
                continue;
            }
            if hard.contains(name) || soft.contains(name) {
                debug!(plugin = name, hard = hard.contains(name), "Accepted dependency");
                accepted.insert(name.to_string());
                resolved.push(artifact);
                progressed = true;
            } else {
                still_pending.push(artifact);
            }
        }
        pending = still_pending;

        if !progressed {
            break;
        }
    }

    for artifact in &pending {
        debug!(
            archive = %artifact.upload.display_name,
            plugin = %artifact.manifest.name,
            "Plugin is not a dependency of the requested set, discarding"
        );
    }

    let missing: Vec<String> = hard
        .iter()
        .filter(|name| !accepted.contains(name.as_str()))
        .cloned()
        .collect();
    let hard_found = hard.len() - missing.len();

    if !missing.is_empty() {
        return Err(ResolutionError::UnsatisfiedHardDependency {
            required: hard.len(),
            found: hard_found,
            missing,
        });
    }

    info!(
        resolved = resolved.len(),
        hard = hard.len(),
        soft = soft.len(),
        omitted = omitted.len(),
        "Resolved plugin dependencies"
    );

    Ok(ResolutionReport {
        resolved,
        hard_dependencies: hard.into_vec(),
        soft_dependencies: soft.into_vec(),
        hard_found,
        omitted,
    })
}
