//! In-memory plugin archive builder for tests
//!
//! Entries are written with `rawzip::ZipArchiveWriter` in insertion order;
//! the same name may be added more than once.

use flate2::write::DeflateEncoder;
use flate2::Compression;
use rawzip::{CompressionMethod, ZipArchiveWriter, ZipDataWriter};
use std::io::Write;

use crate::extract::MANIFEST_FILE_NAME;
use crate::types::ArchiveUpload;

enum Payload {
    Stored(Vec<u8>),
    Deflated(Vec<u8>),
    /// Bytes written as-is under a declared method
    Raw(CompressionMethod, Vec<u8>),
}

#[derive(Default)]
pub struct PluginArchiveBuilder {
    entries: Vec<(String, Payload)>,
}

impl PluginArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, name: &str, contents: &[u8]) -> Self {
        self.entries
            .push((name.to_string(), Payload::Stored(contents.to_vec())));
        self
    }

    pub fn deflated_entry(mut self, name: &str, contents: &[u8]) -> Self {
        self.entries
            .push((name.to_string(), Payload::Deflated(contents.to_vec())));
        self
    }

    /// An entry declaring `method` whose data is `bytes` unchanged
    pub fn raw_entry(mut self, name: &str, method: CompressionMethod, bytes: &[u8]) -> Self {
        self.entries
            .push((name.to_string(), Payload::Raw(method, bytes.to_vec())));
        self
    }

    /// Add `plugin.yml` with the given YAML text
    pub fn manifest(self, yaml: &str) -> Self {
        self.entry(MANIFEST_FILE_NAME, yaml.as_bytes())
    }

    pub fn build(self) -> Vec<u8> {
        // Writes into a Vec only fail on malformed names, which tests never pass
        self.write().unwrap_or_default()
    }

    pub fn upload(self, display_name: &str) -> ArchiveUpload {
        ArchiveUpload::new(display_name, self.build())
    }

    fn write(self) -> Result<Vec<u8>, rawzip::Error> {
        let mut archive = ZipArchiveWriter::new(Vec::new());
        for (name, payload) in self.entries {
            match payload {
                Payload::Stored(contents) => {
                    let mut file = archive.new_file(&name).create()?;
                    let mut writer = ZipDataWriter::new(&mut file);
                    writer.write_all(&contents)?;
                    let (_, output) = writer.finish()?;
                    file.finish(output)?;
                }
                Payload::Deflated(contents) => {
                    let mut file = archive
                        .new_file(&name)
                        .compression_method(CompressionMethod::Deflate)
                        .create()?;
                    let encoder = DeflateEncoder::new(&mut file, Compression::default());
                    let mut writer = ZipDataWriter::new(encoder);
                    writer.write_all(&contents)?;
                    let (encoder, output) = writer.finish()?;
                    encoder.finish()?;
                    file.finish(output)?;
                }
                Payload::Raw(method, bytes) => {
                    let mut file = archive
                        .new_file(&name)
                        .compression_method(method)
                        .create()?;
                    let mut writer = ZipDataWriter::new(&mut file);
                    writer.write_all(&bytes)?;
                    let (_, output) = writer.finish()?;
                    file.finish(output)?;
                }
            }
        }
        archive.finish()
    }
}

/// Render a `plugin.yml` body
pub fn plugin_yaml(name: &str, version: &str, depend: &[&str], softdepend: &[&str]) -> String {
    let mut yaml = format!(
        "name: {}\nversion: '{}'\nmain: com.example.{}\n",
        name, version, name
    );
    if !depend.is_empty() {
        yaml.push_str(&format!("depend: [{}]\n", depend.join(", ")));
    }
    if !softdepend.is_empty() {
        yaml.push_str(&format!("softdepend: [{}]\n", softdepend.join(", ")));
    }
    yaml
}

/// A stored archive named `<name>.jar` carrying a class file and `plugin.yml`
pub fn plugin_upload(name: &str, version: &str, depend: &[&str], softdepend: &[&str]) -> ArchiveUpload {
    PluginArchiveBuilder::new()
        .entry(&format!("com/example/{}.class", name), &[0xCA, 0xFE, 0xBA, 0xBE])
        .manifest(&plugin_yaml(name, version, depend, softdepend))
        .upload(&format!("{}.jar", name))
}
