//! Keeps spatial indexes in step with committed and evicted documents.

use super::registry::IndexRegistry;
use crate::compute::codec;
use crate::compute::spatial::IndexedGeometry;
use crate::error::Result;
use crate::storage::{Document, DocumentStore, TransactionListener};
use geofacts_types::EntityId;
use std::fmt;
use std::sync::Arc;

/// Transaction listener that feeds the index registry.
///
/// On commit every geometry-valued pair is inserted into its attribute's
/// index, creating the index on first use. On eviction only pairs no longer
/// held by any surviving entity are removed, together with every index entry
/// committed from them.
#[derive(Clone)]
pub struct GeoIndexer {
    registry: Arc<IndexRegistry>,
    documents: Arc<dyn DocumentStore>,
}

impl GeoIndexer {
    pub fn new(registry: Arc<IndexRegistry>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            registry,
            documents,
        }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }
}

impl TransactionListener for GeoIndexer {
    fn on_commit(&self, documents: &[Document]) -> Result<()> {
        let mut indexed = 0usize;
        for doc in documents {
            for (attribute, value) in doc.attribute_values() {
                let Some(entry) = IndexedGeometry::from_value(value) else {
                    if value.get(codec::TYPE_KEY).is_some() {
                        log::trace!("Skipping malformed geometry under '{}' on {}", attribute, doc.id);
                    }
                    continue;
                };
                self.registry.get_or_create(attribute)?.insert(entry);
                indexed += 1;
            }
        }

        if indexed > 0 {
            log::debug!(
                "Indexed {} geometries from {} committed documents",
                indexed,
                documents.len()
            );
        }
        Ok(())
    }

    fn on_evict(&self, entities: &[EntityId]) -> Result<()> {
        let pairs = self.documents.exclusive_attribute_values(entities)?;

        let mut removed = 0usize;
        for (attribute, value) in &pairs {
            let Some(index) = self.registry.get(attribute) else {
                continue;
            };
            for value in codec::field_values(value) {
                let Some(geometry) = codec::decode(value) else {
                    continue;
                };
                let dropped = index.remove_all(&geometry, value);
                if dropped > 0 {
                    removed += dropped;
                } else {
                    log::trace!(
                        "No '{}' index entry for evicted {}",
                        attribute,
                        geometry.kind()
                    );
                }
            }
        }

        if removed > 0 {
            log::debug!(
                "Removed {} geometries for {} evicted entities",
                removed,
                entities.len()
            );
        }
        Ok(())
    }
}

impl fmt::Debug for GeoIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoIndexer")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryDocumentStore, MemoryMetadataStore};
    use geo::Point;
    use geofacts_types::{Attribute, Geometry};
    use serde_json::{Value, json};

    fn loc(x: f64, y: f64) -> Value {
        json!({"type": "Point", "coordinates": [x, y]})
    }

    fn setup() -> (Arc<MemoryDocumentStore>, GeoIndexer) {
        let documents = Arc::new(MemoryDocumentStore::new());
        let registry = Arc::new(IndexRegistry::new(Arc::new(MemoryMetadataStore::new())));
        let indexer = GeoIndexer::new(registry, documents.clone());
        (documents, indexer)
    }

    #[test]
    fn test_commit_indexes_geometry_values_only() {
        let (documents, indexer) = setup();
        documents
            .commit(
                vec![
                    Document::new("a")
                        .with("loc", loc(1.0, 1.0))
                        .with("name", json!("cafe"))
                        .with("tags", json!(["x", loc(2.0, 2.0)])),
                ],
                &indexer,
            )
            .unwrap();

        let registry = indexer.registry();
        assert_eq!(registry.attributes(), vec![Attribute::from("loc"), Attribute::from("tags")]);
        assert_eq!(registry.get(&Attribute::from("tags")).unwrap().len(), 1);
        assert!(registry.get(&Attribute::from("name")).is_none());
    }

    #[test]
    fn test_evict_keeps_shared_values() {
        let (documents, indexer) = setup();
        documents
            .commit(
                vec![
                    Document::new("a").with("loc", loc(1.0, 1.0)),
                    Document::new("b").with("loc", loc(1.0, 1.0)),
                    Document::new("c").with("loc", loc(3.0, 3.0)),
                ],
                &indexer,
            )
            .unwrap();
        let index = indexer.registry().get(&Attribute::from("loc")).unwrap();
        assert_eq!(index.len(), 3);

        // (1, 1) is still held by b.
        documents.evict(&[EntityId::from("a")], &indexer).unwrap();
        assert_eq!(index.len(), 3);

        documents.evict(&[EntityId::from("c")], &indexer).unwrap();
        assert_eq!(index.len(), 2);
        assert!(!index.contains(&Geometry::Point(Point::new(3.0, 3.0))));

        // The last holder takes every copy of the value with it.
        documents.evict(&[EntityId::from("b")], &indexer).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_evict_removes_superseded_values() {
        let (documents, indexer) = setup();
        documents
            .commit(vec![Document::new("a").with("loc", loc(1.0, 0.0))], &indexer)
            .unwrap();
        documents
            .commit(
                vec![
                    Document::new("a").with("loc", loc(5.0, 0.0)),
                    Document::new("c").with("loc", loc(3.0, 0.0)),
                ],
                &indexer,
            )
            .unwrap();
        let index = indexer.registry().get(&Attribute::from("loc")).unwrap();
        assert_eq!(index.len(), 3);

        documents.evict(&[EntityId::from("a")], &indexer).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains(&Geometry::Point(Point::new(3.0, 0.0))));
    }

    #[test]
    fn test_evict_leaves_other_spellings_held_elsewhere() {
        let (documents, indexer) = setup();
        documents
            .commit(
                vec![
                    Document::new("a").with("loc", loc(1.0, 1.0)),
                    Document::new("b").with("loc", json!({"type": "Point", "coordinates": [1, 1]})),
                ],
                &indexer,
            )
            .unwrap();
        let index = indexer.registry().get(&Attribute::from("loc")).unwrap();

        documents.evict(&[EntityId::from("a")], &indexer).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains(&Geometry::Point(Point::new(1.0, 1.0))));
    }

    #[test]
    fn test_evict_unknown_entity_is_noop() {
        let (documents, indexer) = setup();
        documents
            .commit(vec![Document::new("a").with("loc", loc(0.0, 0.0))], &indexer)
            .unwrap();
        assert_eq!(documents.evict(&[EntityId::from("ghost")], &indexer).unwrap(), 0);
        assert_eq!(indexer.registry().stats().total_geometries, 1);
    }
}
