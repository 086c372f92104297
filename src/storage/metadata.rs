//! Metadata stores recording which attributes have spatial indexes.

use super::MetadataStore;
use crate::error::{GeoError, Result};
use geofacts_types::Attribute;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metadata kept in memory. Counts writes so callers can observe how often the
/// attribute set was persisted.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    attributes: Mutex<BTreeSet<Attribute>>,
    writes: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already recorded attribute set.
    pub fn with_attributes<I, A>(attributes: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        Self {
            attributes: Mutex::new(attributes.into_iter().map(Into::into).collect()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `store_known_attributes` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn read_known_attributes(&self) -> Result<BTreeSet<Attribute>> {
        Ok(self.attributes.lock().clone())
    }

    fn store_known_attributes(&self, attributes: &BTreeSet<Attribute>) -> Result<()> {
        *self.attributes.lock() = attributes.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Metadata persisted as a JSON array of attribute names.
///
/// Writes go to a sibling temp file which is then renamed over the target, so
/// a crash mid-write leaves the previous set intact. A missing file reads as
/// an empty set.
#[derive(Debug, Clone)]
pub struct JsonFileMetadataStore {
    path: PathBuf,
}

impl JsonFileMetadataStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl MetadataStore for JsonFileMetadataStore {
    fn read_known_attributes(&self) -> Result<BTreeSet<Attribute>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            GeoError::Metadata(format!(
                "Failed to parse attribute set in {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn store_known_attributes(&self, attributes: &BTreeSet<Attribute>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(attributes)?;
        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        log::debug!(
            "Stored {} indexed attributes to {}",
            attributes.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn attrs(names: &[&str]) -> BTreeSet<Attribute> {
        names.iter().map(|n| Attribute::from(*n)).collect()
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let store = MemoryMetadataStore::with_attributes(["loc"]);
        assert_eq!(store.read_known_attributes().unwrap(), attrs(&["loc"]));
        assert_eq!(store.write_count(), 0);

        store.store_known_attributes(&attrs(&["loc", "area"])).unwrap();
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.read_known_attributes().unwrap(), attrs(&["area", "loc"]));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileMetadataStore::new(dir.path().join("geo-attrs.json"));
        assert!(store.read_known_attributes().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta").join("geo-attrs.json");

        JsonFileMetadataStore::new(&path)
            .store_known_attributes(&attrs(&["loc", "route"]))
            .unwrap();

        let reopened = JsonFileMetadataStore::new(&path);
        assert_eq!(reopened.read_known_attributes().unwrap(), attrs(&["loc", "route"]));
        assert!(!reopened.temp_path().exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geo-attrs.json");
        fs::write(&path, b"{not json").unwrap();

        let err = JsonFileMetadataStore::new(&path)
            .read_known_attributes()
            .unwrap_err();
        assert!(matches!(err, GeoError::Metadata(_)));
    }
}
