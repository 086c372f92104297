//! Collaborator contracts and bundled store implementations.
//!
//! The spatial index never owns documents. It reads them through the traits in
//! this module, which the host document store implements:
//!
//! - [`MetadataStore`]: durable set of attributes that have spatial indexes
//! - [`DocumentStore`]: exclusive-pair scans for eviction, full value scans
//!   for startup reconstruction
//! - [`Snapshot`]: read-consistent entity resolution during queries
//! - [`TransactionListener`]: the commit / eviction callbacks the index
//!   registers with the host's transaction notifier
//!
//! In-memory and file-backed implementations are bundled for embedding and
//! tests.

use crate::compute::codec;
use crate::error::Result;
use geofacts_types::{Attribute, EntityId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

mod memory;
mod metadata;

pub use memory::{MemoryDocumentStore, MemorySnapshot};
pub use metadata::{JsonFileMetadataStore, MemoryMetadataStore};

/// Durable record of which attributes have spatial indexes.
pub trait MetadataStore: Send + Sync {
    fn read_known_attributes(&self) -> Result<BTreeSet<Attribute>>;

    /// Replace the recorded set.
    fn store_known_attributes(&self, attributes: &BTreeSet<Attribute>) -> Result<()>;
}

/// Document store scans used to keep indexes in step with stored data.
pub trait DocumentStore: Send + Sync {
    /// (attribute, value) pairs held by the given entities and by no entity
    /// outside that set.
    fn exclusive_attribute_values(&self, entities: &[EntityId]) -> Result<Vec<(Attribute, Value)>>;

    /// Committed values for `attribute` still held by some live entity, one
    /// per commit, used to rebuild its index.
    fn attribute_values(&self, attribute: &Attribute) -> Result<Vec<Value>>;
}

/// Read-consistent view of the document store for one query.
pub trait Snapshot {
    /// Live entities holding `value` under `attribute`.
    fn resolve_entities(&self, attribute: &Attribute, value: &Value) -> Result<Vec<EntityId>>;
}

/// Handlers the index registers with the host's transaction notifier.
///
/// Delivery must be synchronous and non-reentrant: the notifier calls these on
/// a single thread and waits for them to return before notifying the next
/// transaction. Indexes are only consistent with the store once `on_commit`
/// has returned. `on_evict` must run while the evicted documents are still
/// readable, so the store can compute which pairs become unreferenced.
pub trait TransactionListener: Send + Sync {
    fn on_commit(&self, documents: &[Document]) -> Result<()>;

    fn on_evict(&self, entities: &[EntityId]) -> Result<()>;
}

/// A committed document: an entity and its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: EntityId,
    #[serde(default)]
    pub fields: BTreeMap<Attribute, Value>,
}

impl Document {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field, builder style.
    pub fn with(mut self, attribute: impl Into<Attribute>, value: Value) -> Self {
        self.fields.insert(attribute.into(), value);
        self
    }

    /// Every (attribute, value) pair, with array fields flattened into their
    /// elements.
    pub fn attribute_values(&self) -> impl Iterator<Item = (&Attribute, &Value)> {
        self.fields.iter().flat_map(|(attribute, value)| {
            codec::field_values(value)
                .into_iter()
                .map(move |value| (attribute, value))
        })
    }

    /// `true` when this document holds `value` under `attribute`.
    pub fn holds(&self, attribute: &Attribute, value: &Value) -> bool {
        self.fields
            .get(attribute)
            .is_some_and(|field| codec::field_values(field).contains(&value))
    }
}
