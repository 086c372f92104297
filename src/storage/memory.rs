//! In-memory document store.

use super::{Document, DocumentStore, Snapshot, TransactionListener};
use crate::error::Result;
use geofacts_types::{Attribute, EntityId};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

type Documents = BTreeMap<EntityId, Document>;

/// Document store holding the latest document per entity in memory.
///
/// Also acts as a synchronous transaction notifier: [`commit`](Self::commit)
/// and [`evict`](Self::evict) apply a change and deliver it to a
/// [`TransactionListener`] on the calling thread. Writers are serialized by
/// an internal lock so listener delivery is never reentrant.
///
/// Re-committing an entity keeps the replaced document as a superseded
/// version until the entity is removed, so eviction can account for every
/// value the entity ever committed. Committed values are also kept in a
/// per-attribute history that [`DocumentStore::attribute_values`] replays to
/// rebuild an index; a value leaves the history once no live entity holds it.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<Arc<Documents>>,
    superseded: RwLock<BTreeMap<EntityId, Vec<Document>>>,
    history: RwLock<BTreeMap<Attribute, Vec<Value>>>,
    writer: parking_lot::Mutex<()>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store documents without notifying anyone.
    pub fn put(&self, documents: &[Document]) {
        let mut current = self.documents.write();
        let mut superseded = self.superseded.write();
        let mut history = self.history.write();

        let next = Arc::make_mut(&mut *current);
        for doc in documents {
            for (attribute, value) in doc.attribute_values() {
                history.entry(attribute.clone()).or_default().push(value.clone());
            }
            if let Some(previous) = next.insert(doc.id.clone(), doc.clone()) {
                superseded.entry(doc.id.clone()).or_default().push(previous);
            }
        }
    }

    /// Remove documents and their superseded versions without notifying
    /// anyone. Returns how many existed.
    ///
    /// Values no longer held by any remaining entity are dropped from the
    /// attribute history.
    pub fn remove(&self, entities: &[EntityId]) -> usize {
        let unheld = self.unheld_pairs(entities);

        let mut current = self.documents.write();
        let mut superseded = self.superseded.write();
        let mut history = self.history.write();

        let next = Arc::make_mut(&mut *current);
        let removed = entities.iter().filter(|id| next.remove(*id).is_some()).count();
        for id in entities {
            superseded.remove(id);
        }

        for (attribute, value) in &unheld {
            if let Some(values) = history.get_mut(attribute) {
                values.retain(|v| v != value);
                if values.is_empty() {
                    history.remove(attribute);
                }
            }
        }
        removed
    }

    /// Store documents, then deliver them to `listener`.
    pub fn commit(&self, documents: Vec<Document>, listener: &dyn TransactionListener) -> Result<()> {
        let _writer = self.writer.lock();
        self.put(&documents);
        listener.on_commit(&documents)
    }

    /// Deliver the eviction to `listener`, then remove the documents.
    ///
    /// The listener runs first so it can still see which pairs the evicted
    /// entities held exclusively.
    pub fn evict(&self, entities: &[EntityId], listener: &dyn TransactionListener) -> Result<usize> {
        let _writer = self.writer.lock();
        listener.on_evict(entities)?;
        Ok(self.remove(entities))
    }

    pub fn get(&self, id: &EntityId) -> Option<Document> {
        self.documents.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Point-in-time view for query evaluation.
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            documents: Arc::clone(&self.documents.read()),
        }
    }
}

impl MemoryDocumentStore {
    /// Pairs held by any version of `entities` and by no live entity outside
    /// that set. Current documents come first, then superseded versions.
    fn unheld_pairs(&self, entities: &[EntityId]) -> Vec<(Attribute, Value)> {
        let documents = self.documents.read();
        let superseded = self.superseded.read();
        let evicted: FxHashSet<&EntityId> = entities.iter().collect();

        let mut pairs: Vec<(Attribute, Value)> = Vec::new();
        for id in entities {
            let versions = documents
                .get(id)
                .into_iter()
                .chain(superseded.get(id).into_iter().flatten());
            for doc in versions {
                for (attribute, value) in doc.attribute_values() {
                    if pairs.iter().any(|(a, v)| a == attribute && v == value) {
                        continue;
                    }
                    let held_elsewhere = documents
                        .values()
                        .any(|other| !evicted.contains(&other.id) && other.holds(attribute, value));
                    if !held_elsewhere {
                        pairs.push((attribute.clone(), value.clone()));
                    }
                }
            }
        }
        pairs
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn exclusive_attribute_values(&self, entities: &[EntityId]) -> Result<Vec<(Attribute, Value)>> {
        Ok(self.unheld_pairs(entities))
    }

    fn attribute_values(&self, attribute: &Attribute) -> Result<Vec<Value>> {
        Ok(self
            .history
            .read()
            .get(attribute)
            .cloned()
            .unwrap_or_default())
    }
}

/// Immutable view of a [`MemoryDocumentStore`] at one point in time.
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    documents: Arc<Documents>,
}

impl MemorySnapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Snapshot for MemorySnapshot {
    fn resolve_entities(&self, attribute: &Attribute, value: &Value) -> Result<Vec<EntityId>> {
        Ok(self
            .documents
            .values()
            .filter(|doc| doc.holds(attribute, value))
            .map(|doc| doc.id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loc(x: f64, y: f64) -> Value {
        json!({"type": "Point", "coordinates": [x, y]})
    }

    #[test]
    fn test_put_get_remove() {
        let store = MemoryDocumentStore::new();
        store.put(&[Document::new("a").with("loc", loc(0.0, 0.0))]);
        assert_eq!(store.len(), 1);
        assert!(store.get(&EntityId::from("a")).is_some());

        assert_eq!(store.remove(&[EntityId::from("a"), EntityId::from("zz")]), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_exclusive_pairs_skip_shared_values() {
        let store = MemoryDocumentStore::new();
        store.put(&[
            Document::new("a").with("loc", loc(1.0, 1.0)).with("home", loc(5.0, 5.0)),
            Document::new("b").with("loc", loc(1.0, 1.0)),
        ]);

        let pairs = store.exclusive_attribute_values(&[EntityId::from("a")]).unwrap();
        assert_eq!(pairs, vec![(Attribute::from("home"), loc(5.0, 5.0))]);

        let pairs = store
            .exclusive_attribute_values(&[EntityId::from("a"), EntityId::from("b")])
            .unwrap();
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let store = MemoryDocumentStore::new();
        store.put(&[Document::new("a").with("loc", loc(1.0, 1.0))]);
        let before = store.snapshot();

        store.put(&[Document::new("b").with("loc", loc(1.0, 1.0))]);
        store.remove(&[EntityId::from("a")]);

        let attr = Attribute::from("loc");
        assert_eq!(
            before.resolve_entities(&attr, &loc(1.0, 1.0)).unwrap(),
            vec![EntityId::from("a")]
        );
        assert_eq!(
            store.snapshot().resolve_entities(&attr, &loc(1.0, 1.0)).unwrap(),
            vec![EntityId::from("b")]
        );
    }

    #[test]
    fn test_superseded_versions_count_as_exclusive() {
        let store = MemoryDocumentStore::new();
        store.put(&[Document::new("a").with("loc", loc(1.0, 0.0))]);
        store.put(&[
            Document::new("a").with("loc", loc(5.0, 0.0)),
            Document::new("c").with("loc", loc(3.0, 0.0)),
        ]);
        assert_eq!(store.len(), 2);

        let pairs = store.exclusive_attribute_values(&[EntityId::from("a")]).unwrap();
        let attr = Attribute::from("loc");
        assert_eq!(
            pairs,
            vec![(attr.clone(), loc(5.0, 0.0)), (attr.clone(), loc(1.0, 0.0))]
        );

        assert_eq!(store.remove(&[EntityId::from("a")]), 1);
        assert_eq!(store.attribute_values(&attr).unwrap(), vec![loc(3.0, 0.0)]);
        assert!(store.exclusive_attribute_values(&[EntityId::from("a")]).unwrap().is_empty());
    }

    #[test]
    fn test_history_drops_unheld_values() {
        let store = MemoryDocumentStore::new();
        store.put(&[
            Document::new("a").with("loc", json!([loc(0.0, 0.0), loc(1.0, 1.0)])),
            Document::new("b").with("loc", loc(1.0, 1.0)),
        ]);
        let attr = Attribute::from("loc");

        // (1, 1) is still held by b, so both of its copies stay.
        store.remove(&[EntityId::from("a")]);
        assert_eq!(store.attribute_values(&attr).unwrap(), vec![loc(1.0, 1.0), loc(1.0, 1.0)]);

        store.remove(&[EntityId::from("b")]);
        assert!(store.attribute_values(&attr).unwrap().is_empty());
        assert!(store.attribute_values(&Attribute::from("none")).unwrap().is_empty());
    }
}
