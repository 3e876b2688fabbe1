//! Data model shared by the extractor, the resolver and the workload layer
//!
//! - `PluginManifest`: decoded `plugin.yml`, immutable once extracted
//! - `ArchiveUpload`: raw archive bytes plus the name they were uploaded under
//! - `Artifact`: a manifest paired with the upload it came from
//! - `ResolutionReport`: the accepted artifact set and the dependency name sets

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use smallvec::SmallVec;
use std::path::Path;

/// Extension used when the upload's display name carries none
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "jar";

// =============================================================================
// MANIFEST
// =============================================================================

/// Plugin descriptor embedded in an archive
///
/// Unknown keys are ignored. Missing `name`/`version` decode as empty strings;
/// the resolver rejects an empty name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default, deserialize_with = "scalar_string")]
    pub name: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,
    #[serde(default, rename = "depend", deserialize_with = "name_list")]
    pub hard_dependencies: SmallVec<[String; 4]>,
    #[serde(default, rename = "softdepend", deserialize_with = "name_list")]
    pub soft_dependencies: SmallVec<[String; 4]>,
}

/// Accept any YAML scalar; `version: 2.1` is a float to YAML but a label to us
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(other) => scalar_to_string(other).map_err(serde::de::Error::custom),
    }
}

/// Accept a sequence of names, a single name, or nothing
fn name_list<'de, D>(deserializer: D) -> Result<SmallVec<[String; 4]>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(SmallVec::new()),
        Some(Value::Sequence(items)) => items
            .into_iter()
            .map(scalar_to_string)
            .collect::<Result<_, _>>()
            .map_err(serde::de::Error::custom),
        Some(other) => scalar_to_string(other)
            .map(|name| SmallVec::from_iter([name]))
            .map_err(serde::de::Error::custom),
    }
}

fn scalar_to_string(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
            Err("expected a plain scalar value".to_string())
        }
    }
}

// =============================================================================
// UPLOAD / ARTIFACT
// =============================================================================

/// An uploaded plugin archive, already size-checked by the caller
#[derive(Debug, Clone)]
pub struct ArchiveUpload {
    pub display_name: String,
    bytes: Vec<u8>,
}

impl ArchiveUpload {
    pub fn new(display_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        ArchiveUpload {
            display_name: display_name.into(),
            bytes,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Extension of the display name, or `jar`
    pub fn extension(&self) -> &str {
        Path::new(&self.display_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(DEFAULT_ARCHIVE_EXTENSION)
    }

    /// Consume the upload, yielding its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A manifest and the archive it was read from
#[derive(Debug, Clone)]
pub struct Artifact {
    pub manifest: PluginManifest,
    pub upload: ArchiveUpload,
    pub is_primary: bool,
}

impl Artifact {
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// `<name>-<version>.<ext>` with path-unsafe characters replaced
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.{}",
            sanitize_component(&self.manifest.name),
            sanitize_component(&self.manifest.version),
            self.upload.extension()
        )
    }
}

/// Keep `[A-Za-z0-9._-]`, map everything else to `_`, and never yield `.`/`..`
fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_")
    } else {
        cleaned
    }
}

// =============================================================================
// RESOLUTION REPORT
// =============================================================================

/// A dependency archive that could not be read and was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmittedCandidate {
    pub archive: String,
    pub reason: String,
}

/// Outcome of a successful resolution
#[derive(Debug, Clone)]
pub struct ResolutionReport {
    /// Primary first, then dependencies in acceptance order
    pub resolved: Vec<Artifact>,
    /// Final, transitively expanded hard dependency names
    pub hard_dependencies: Vec<String>,
    pub soft_dependencies: Vec<String>,
    pub hard_found: usize,
    pub omitted: Vec<OmittedCandidate>,
}

impl ResolutionReport {
    pub fn resolved_names(&self) -> Vec<String> {
        self.resolved.iter().map(|a| a.manifest.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Option<PluginManifest> {
        serde_yaml::from_str(yaml).ok()
    }

    #[test]
    fn test_numeric_version_is_kept_as_text() {
        let manifest = parse("name: Essentials\nversion: 2.1\nmain: com.earth2me.Essentials\n");
        assert_eq!(
            manifest,
            Some(PluginManifest {
                name: "Essentials".to_string(),
                version: "2.1".to_string(),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_dependency_forms() {
        let Some(manifest) = parse("name: Core\ndepend: Lib\nsoftdepend:\n") else {
            panic!("manifest should decode");
        };
        assert_eq!(manifest.hard_dependencies.as_slice(), ["Lib".to_string()]);
        assert!(manifest.soft_dependencies.is_empty());
        assert_eq!(manifest.version, "");

        let Some(manifest) = parse("name: Core\ndepend: [Lib, Vault]\nsoftdepend: [Maps]\n") else {
            panic!("manifest should decode");
        };
        assert_eq!(manifest.hard_dependencies.len(), 2);
        assert_eq!(manifest.soft_dependencies.as_slice(), ["Maps".to_string()]);
    }

    #[test]
    fn test_nested_dependency_entry_is_rejected() {
        assert!(parse("name: Core\ndepend:\n  - {name: Lib}\n").is_none());
    }

    #[test]
    fn test_file_name_uses_name_version_and_extension() {
        let artifact = Artifact {
            manifest: PluginManifest {
                name: "Essentials".to_string(),
                version: "2.1".to_string(),
                ..Default::default()
            },
            upload: ArchiveUpload::new("EssentialsX.jar", Vec::new()),
            is_primary: true,
        };
        assert_eq!(artifact.file_name(), "Essentials-2.1.jar");
    }

    #[test]
    fn test_file_name_cannot_escape_directory() {
        let artifact = Artifact {
            manifest: PluginManifest {
                name: "../../etc".to_string(),
                version: "..".to_string(),
                ..Default::default()
            },
            upload: ArchiveUpload::new("upload", Vec::new()),
            is_primary: false,
        };
        let file_name = artifact.file_name();
        assert!(!file_name.contains('/'));
        assert_eq!(file_name, ".._.._etc-__.jar");
    }
}
