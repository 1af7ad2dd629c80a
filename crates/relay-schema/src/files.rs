//! Capability document persistence
//!
//! The store does not know where documents live; it reads and writes them
//! through [`CapabilityFileStore`]. Two implementations ship here: a
//! directory of YAML files and an in-memory map for tests.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use url::form_urlencoded;
use tracing::{debug, warn};

use crate::error::SchemaResult;

/// A capability document as read from storage, not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct RawCapabilityDocument {
    /// Where the document came from (file path or key), for log messages
    pub source: String,
    pub document: serde_yaml::Value,
}

/// Storage backend for capability documents
pub trait CapabilityFileStore: Send + Sync {
    /// Read every stored document
    fn load_capability_files(&self) -> SchemaResult<Vec<RawCapabilityDocument>>;

    /// Create or replace the document for a device type
    fn save_capability_file(&self, device_type: &str, document: &serde_yaml::Value)
        -> SchemaResult<()>;

    /// Remove the document for a device type; returns whether one existed
    fn delete_capability_file(&self, device_type: &str) -> SchemaResult<bool>;
}

/// One `<device_type>.yaml` file per capability in a directory
#[derive(Debug, Clone)]
pub struct YamlCapabilityFiles {
    dir: PathBuf,
}

impl YamlCapabilityFiles {
    /// The directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, device_type: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", file_stem(device_type)))
    }
}

/// Percent-encode a device type into a file name
///
/// Only ASCII letters, digits and `-._*` survive as is, so distinct device
/// types never share a file.
fn file_stem(device_type: &str) -> String {
    form_urlencoded::byte_serialize(device_type.as_bytes()).collect()
}

impl CapabilityFileStore for YamlCapabilityFiles {
    fn load_capability_files(&self) -> SchemaResult<Vec<RawCapabilityDocument>> {
        if !self.dir.exists() {
            debug!(dir = %self.dir.display(), "Capability directory does not exist yet");
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let source = path.display().to_string();
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %source, error = %e, "Skipping unreadable capability file");
                    continue;
                }
            };
            match serde_yaml::from_str(&content) {
                Ok(document) => documents.push(RawCapabilityDocument { source, document }),
                Err(e) => warn!(file = %source, error = %e, "Skipping unparsable capability file"),
            }
        }
        Ok(documents)
    }

    fn save_capability_file(
        &self,
        device_type: &str,
        document: &serde_yaml::Value,
    ) -> SchemaResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_yaml::to_string(document)?;

        // Write to a sibling temp file and rename so readers never see a partial document
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.path_for(device_type))?;
        Ok(())
    }

    fn delete_capability_file(&self, device_type: &str) -> SchemaResult<bool> {
        let path = self.path_for(device_type);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory documents keyed by device type
#[derive(Debug, Default)]
pub struct MemoryCapabilityFiles {
    documents: RwLock<BTreeMap<String, serde_yaml::Value>>,
}

impl MemoryCapabilityFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document as-is, bypassing validation
    pub fn insert_raw(&self, key: impl Into<String>, document: serde_yaml::Value) {
        self.documents.write().insert(key.into(), document);
    }

    pub fn get_raw(&self, key: &str) -> Option<serde_yaml::Value> {
        self.documents.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl CapabilityFileStore for MemoryCapabilityFiles {
    fn load_capability_files(&self) -> SchemaResult<Vec<RawCapabilityDocument>> {
        Ok(self
            .documents
            .read()
            .iter()
            .map(|(key, document)| RawCapabilityDocument {
                source: key.clone(),
                document: document.clone(),
            })
            .collect())
    }

    fn save_capability_file(
        &self,
        device_type: &str,
        document: &serde_yaml::Value,
    ) -> SchemaResult<()> {
        self.insert_raw(device_type, document.clone());
        Ok(())
    }

    fn delete_capability_file(&self, device_type: &str) -> SchemaResult<bool> {
        Ok(self.documents.write().remove(device_type).is_some())
    }
}
