//! Registry of per-attribute spatial indexes.
//!
//! An attribute gets an index the first time a geometry is committed under it.
//! Creation is insert-if-absent: concurrent callers racing on the same
//! attribute all receive the same index, and the attribute is recorded in the
//! metadata store before the index becomes visible. If that write fails the
//! index is not published and the caller sees the error.
//!
//! The metadata write runs under the registry's own attribute lock, never
//! under a map shard lock, so lookups keep running while it is in flight.

use crate::compute::codec;
use crate::compute::spatial::{IndexedGeometry, SpatialIndex};
use crate::error::Result;
use crate::storage::{DocumentStore, MetadataStore};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use geofacts_types::Attribute;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Index counts across the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub index_count: usize,
    pub total_geometries: usize,
}

/// Outcome of rebuilding indexes at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructStats {
    pub attributes: usize,
    pub geometries: usize,
    /// Values found under indexed attributes that did not decode.
    pub skipped: usize,
}

pub struct IndexRegistry {
    indexes: DashMap<Attribute, Arc<SpatialIndex>>,
    /// Attributes known to the metadata store. Guards metadata writes.
    known: Mutex<BTreeSet<Attribute>>,
    metadata: Arc<dyn MetadataStore>,
}

impl IndexRegistry {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            indexes: DashMap::new(),
            known: Mutex::new(BTreeSet::new()),
            metadata,
        }
    }

    /// Index for `attribute`, if one exists. Never creates.
    pub fn get(&self, attribute: &Attribute) -> Option<Arc<SpatialIndex>> {
        self.indexes
            .get(attribute)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Index for `attribute`, creating and recording it on first use.
    pub fn get_or_create(&self, attribute: &Attribute) -> Result<Arc<SpatialIndex>> {
        if let Some(index) = self.get(attribute) {
            return Ok(index);
        }

        self.record_attribute(attribute)?;
        match self.indexes.entry(attribute.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let index = Arc::new(SpatialIndex::new(attribute.clone()));
                entry.insert(Arc::clone(&index));
                log::debug!("Created spatial index for attribute '{}'", attribute);
                Ok(index)
            }
        }
    }

    /// Add `attribute` to the metadata store unless it is already there.
    fn record_attribute(&self, attribute: &Attribute) -> Result<()> {
        let mut known = self.known.lock();
        if known.contains(attribute) {
            return Ok(());
        }

        let mut next = known.clone();
        next.insert(attribute.clone());
        if let Err(e) = self.metadata.store_known_attributes(&next) {
            log::warn!(
                "Failed to record indexed attribute '{}': {}",
                attribute,
                e
            );
            return Err(e);
        }
        *known = next;
        Ok(())
    }

    /// Rebuild an index for every attribute recorded in metadata by replaying
    /// the stored values through the codec.
    ///
    /// Meant to run once at startup before any commit is delivered.
    pub fn reconstruct(&self, documents: &dyn DocumentStore) -> Result<ReconstructStats> {
        let attributes = self.metadata.read_known_attributes()?;
        self.known.lock().extend(attributes.iter().cloned());

        let mut stats = ReconstructStats::default();
        for attribute in attributes {
            let values = documents.attribute_values(&attribute)?;

            let mut entries: Vec<IndexedGeometry> = Vec::with_capacity(values.len());
            for value in values.iter().flat_map(codec::field_values) {
                match IndexedGeometry::from_value(value) {
                    Some(entry) => entries.push(entry),
                    None => stats.skipped += 1,
                }
            }

            log::debug!(
                "Rebuilt index for '{}' with {} geometries",
                attribute,
                entries.len()
            );
            stats.attributes += 1;
            stats.geometries += entries.len();

            match self.indexes.entry(attribute.clone()) {
                Entry::Occupied(entry) => entry.get().extend(entries),
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(SpatialIndex::bulk_load(attribute, entries)));
                }
            }
        }

        Ok(stats)
    }

    /// Indexed attributes, sorted.
    pub fn attributes(&self) -> Vec<Attribute> {
        let mut attributes: Vec<Attribute> =
            self.indexes.iter().map(|entry| entry.key().clone()).collect();
        attributes.sort();
        attributes
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for entry in self.indexes.iter() {
            stats.index_count += 1;
            stats.total_geometries += entry.value().len();
        }
        stats
    }
}

impl fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("attributes", &self.attributes())
            .finish_non_exhaustive()
    }
}
