//! Manifest extraction from plugin archives
//!
//! Archives are zip files (`.jar`). The manifest is the root entry named
//! [`MANIFEST_FILE_NAME`]. Entries are scanned in central-directory order and
//! the first match wins; an archive carrying duplicate manifests is read as if
//! only the first existed.

use flate2::read::DeflateDecoder;
use std::io::Read;
use tracing::debug;

use crate::errors::ManifestError;
use crate::types::{ArchiveUpload, Artifact, PluginManifest};

pub const MANIFEST_FILE_NAME: &str = "plugin.yml";

/// Decompressed manifests above this size are refused
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// Read and decode the manifest of a single archive
pub fn extract_manifest(upload: &ArchiveUpload) -> Result<PluginManifest, ManifestError> {
    let raw = read_manifest_entry(upload)?;
    let manifest: PluginManifest =
        serde_yaml::from_slice(&raw).map_err(|source| ManifestError::Malformed {
            archive: upload.display_name.clone(),
            source,
        })?;

    debug!(
        archive = %upload.display_name,
        name = %manifest.name,
        version = %manifest.version,
        hard = manifest.hard_dependencies.len(),
        soft = manifest.soft_dependencies.len(),
        "Extracted plugin manifest"
    );
    Ok(manifest)
}

impl Artifact {
    /// Extract the manifest and pair it with the upload
    pub fn extract(upload: ArchiveUpload, is_primary: bool) -> Result<Self, ManifestError> {
        let manifest = extract_manifest(&upload)?;
        Ok(Artifact {
            manifest,
            upload,
            is_primary,
        })
    }
}

fn read_manifest_entry(upload: &ArchiveUpload) -> Result<Vec<u8>, ManifestError> {
    let invalid = |reason: String| ManifestError::InvalidArchive {
        archive: upload.display_name.clone(),
        reason,
    };

    let archive = rawzip::ZipArchive::from_slice(upload.bytes())
        .map_err(|e| invalid(format!("not a zip archive: {:?}", e)))?;

    for entry in archive.entries() {
        let entry = entry.map_err(|e| invalid(format!("zip entry error: {:?}", e)))?;
        if entry.is_dir() {
            continue;
        }

        // Entries with unrepresentable paths cannot be the manifest
        let Ok(path) = entry.file_path().try_normalize() else {
            continue;
        };
        let name: &str = path.as_ref();
        if name != MANIFEST_FILE_NAME {
            continue;
        }

        let slice_entry = archive
            .get_entry(entry.wayfinder())
            .map_err(|e| invalid(format!("failed to get entry data: {:?}", e)))?;
        let data: &[u8] = slice_entry.data();

        let mut raw = Vec::new();
        let limit = MAX_MANIFEST_BYTES + 1;
        match entry.compression_method() {
            rawzip::CompressionMethod::Store => {
                data.take(limit)
                    .read_to_end(&mut raw)
                    .map_err(|e| invalid(format!("failed to read {}: {}", name, e)))?;
            }
            rawzip::CompressionMethod::Deflate => {
                DeflateDecoder::new(data)
                    .take(limit)
                    .read_to_end(&mut raw)
                    .map_err(|e| invalid(format!("failed to inflate {}: {}", name, e)))?;
            }
            method => {
                return Err(invalid(format!(
                    "unsupported compression method: {:?}",
                    method
                )));
            }
        }

        if raw.len() as u64 > MAX_MANIFEST_BYTES {
            return Err(invalid(format!(
                "{} exceeds {} bytes",
                name, MAX_MANIFEST_BYTES
            )));
        }
        return Ok(raw);
    }

    Err(ManifestError::NotFound {
        archive: upload.display_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{plugin_upload, plugin_yaml, PluginArchiveBuilder};

    #[test]
    fn test_extracts_stored_manifest() {
        let upload = plugin_upload("Essentials", "2.1", &[], &[]);
        let manifest = extract_manifest(&upload);
        assert!(manifest.is_ok_and(|m| m.name == "Essentials" && m.version == "2.1"));
    }

    #[test]
    fn test_extracts_deflated_manifest() {
        let bytes = PluginArchiveBuilder::new()
            .deflated_entry("com/example/Core.class", &[0xCA, 0xFE, 0xBA, 0xBE])
            .deflated_entry(MANIFEST_FILE_NAME, plugin_yaml("Core", "1.4.0", &["Lib"], &["Maps"]).as_bytes())
            .build();
        let upload = ArchiveUpload::new("Core.jar", bytes);

        let Ok(manifest) = extract_manifest(&upload) else {
            panic!("deflated manifest should decode");
        };
        assert_eq!(manifest.name, "Core");
        assert_eq!(manifest.hard_dependencies.as_slice(), ["Lib".to_string()]);
        assert_eq!(manifest.soft_dependencies.as_slice(), ["Maps".to_string()]);
    }

    #[test]
    fn test_missing_manifest_is_not_found() {
        let bytes = PluginArchiveBuilder::new()
            .entry("com/example/Main.class", b"\x00\x01")
            .entry("config.yml", b"enabled: true\n")
            .build();
        let upload = ArchiveUpload::new("NoManifest.jar", bytes);

        let result = extract_manifest(&upload);
        assert!(matches!(
            result,
            Err(ManifestError::NotFound { ref archive }) if archive == "NoManifest.jar"
        ));
    }

    #[test]
    fn test_nested_manifest_does_not_match() {
        let bytes = PluginArchiveBuilder::new()
            .entry("resources/plugin.yml", plugin_yaml("Nested", "1", &[], &[]).as_bytes())
            .build();
        let upload = ArchiveUpload::new("Nested.jar", bytes);
        assert!(matches!(
            extract_manifest(&upload),
            Err(ManifestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_empty_archive_is_not_found() {
        let upload = ArchiveUpload::new("Empty.jar", PluginArchiveBuilder::new().build());
        assert!(matches!(
            extract_manifest(&upload),
            Err(ManifestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_garbage_bytes_do_not_panic() {
        for bytes in [Vec::new(), b"PK".to_vec(), vec![0xFF; 512], b"name: Core\n".to_vec()] {
            let upload = ArchiveUpload::new("garbage.jar", bytes);
            assert!(matches!(
                extract_manifest(&upload),
                Err(ManifestError::InvalidArchive { .. } | ManifestError::NotFound { .. })
            ));
        }
    }

    #[test]
    fn test_malformed_yaml_is_reported() {
        let bytes = PluginArchiveBuilder::new()
            .entry(MANIFEST_FILE_NAME, b"name: [unterminated\nversion: 1\n")
            .build();
        let upload = ArchiveUpload::new("Broken.jar", bytes);
        assert!(matches!(
            extract_manifest(&upload),
            Err(ManifestError::Malformed { ref archive, .. }) if archive == "Broken.jar"
        ));
    }

    /// A manifest padded with a trailing comment to exactly `len` bytes
    fn padded_manifest(len: usize) -> Vec<u8> {
        let mut yaml = plugin_yaml("Padded", "1.0", &[], &[]).into_bytes();
        yaml.push(b'#');
        yaml.resize(len, b'x');
        yaml
    }

    #[test]
    fn test_manifest_at_cap_is_accepted() {
        let cap = usize::try_from(MAX_MANIFEST_BYTES).unwrap_or(usize::MAX);
        let bytes = PluginArchiveBuilder::new()
            .deflated_entry(MANIFEST_FILE_NAME, &padded_manifest(cap))
            .build();
        let upload = ArchiveUpload::new("Padded.jar", bytes);
        assert!(extract_manifest(&upload).is_ok_and(|m| m.name == "Padded"));
    }

    #[test]
    fn test_oversized_deflated_manifest_is_refused() {
        let cap = usize::try_from(MAX_MANIFEST_BYTES).unwrap_or(usize::MAX);
        let bytes = PluginArchiveBuilder::new()
            .deflated_entry(MANIFEST_FILE_NAME, &padded_manifest(cap + 1))
            .build();
        // Compresses to a few KiB, so only the inflated size trips the cap
        assert!(bytes.len() < cap / 16);
        let upload = ArchiveUpload::new("Bomb.jar", bytes);

        let result = extract_manifest(&upload);
        let Err(ManifestError::InvalidArchive { reason, .. }) = result else {
            panic!("oversized manifest should be an invalid archive");
        };
        assert!(reason.contains("exceeds"));
    }

    #[test]
    fn test_oversized_stored_manifest_is_refused() {
        let cap = usize::try_from(MAX_MANIFEST_BYTES).unwrap_or(usize::MAX);
        let bytes = PluginArchiveBuilder::new()
            .entry(MANIFEST_FILE_NAME, &padded_manifest(cap + 1))
            .build();
        let upload = ArchiveUpload::new("Big.jar", bytes);
        assert!(matches!(
            extract_manifest(&upload),
            Err(ManifestError::InvalidArchive { .. })
        ));
    }

    #[test]
    fn test_unsupported_compression_method_is_invalid() {
        let yaml = plugin_yaml("Core", "1.0", &[], &[]);
        let bytes = PluginArchiveBuilder::new()
            .raw_entry(MANIFEST_FILE_NAME, rawzip::CompressionMethod::Bzip2, yaml.as_bytes())
            .build();
        let upload = ArchiveUpload::new("Bzip.jar", bytes);

        let result = extract_manifest(&upload);
        let Err(ManifestError::InvalidArchive { archive, reason }) = result else {
            panic!("bzip2 manifest should be an invalid archive");
        };
        assert_eq!(archive, "Bzip.jar");
        assert!(reason.contains("unsupported compression method"));
    }

    #[test]
    fn test_first_manifest_entry_wins() {
        let bytes = PluginArchiveBuilder::new()
            .entry(MANIFEST_FILE_NAME, plugin_yaml("First", "1", &[], &[]).as_bytes())
            .entry(MANIFEST_FILE_NAME, plugin_yaml("Second", "2", &[], &[]).as_bytes())
            .build();
        let upload = ArchiveUpload::new("Twice.jar", bytes);
        assert!(extract_manifest(&upload).is_ok_and(|m| m.name == "First"));
    }

    #[test]
    fn test_missing_name_and_version_decode_empty() {
        let bytes = PluginArchiveBuilder::new()
            .entry(MANIFEST_FILE_NAME, b"main: com.example.Anonymous\n")
            .build();
        let upload = ArchiveUpload::new("Anonymous.jar", bytes);
        assert!(extract_manifest(&upload).is_ok_and(|m| m.name.is_empty() && m.version.is_empty()));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let upload = plugin_upload("Core", "3.0", &["Lib", "Vault"], &["Maps"]);
        let first = extract_manifest(&upload).ok();
        let second = extract_manifest(&upload).ok();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_artifact_keeps_upload_bytes() {
        let upload = plugin_upload("Lib", "1.0", &[], &[]);
        let size = upload.size();
        let Ok(artifact) = Artifact::extract(upload, false) else {
            panic!("artifact should extract");
        };
        assert_eq!(artifact.upload.size(), size);
        assert!(!artifact.is_primary);
        assert_eq!(artifact.file_name(), "Lib-1.0.jar");
    }
}
