//! Per-attribute R*-tree over geometry envelopes.
//!
//! Each [`SpatialIndex`] holds a multiset of [`IndexedGeometry`] entries keyed
//! by their axis-aligned envelope. The tree lives behind a reader-writer lock:
//! queries share the read side while commit and eviction take the write side,
//! so a query running during a mutation always sees a consistent tree.
//!
//! Distances used by nearest-neighbour search are Euclidean, measured from a
//! query point to each entry's envelope. For point entries that is plain
//! point-to-point distance.

use crate::compute::codec;
use geofacts_types::{Attribute, Geometry};
use parking_lot::RwLock;
use rstar::{AABB, PointDistance, RTree, RTreeObject};
use serde_json::Value;
use std::ops::ControlFlow;

/// Envelope type used by the tree.
pub type Envelope = AABB<[f64; 2]>;

/// Envelope of a geometry, `None` for empty shapes.
pub fn envelope_of(geometry: &Geometry) -> Option<Envelope> {
    let rect = geometry.bounding_rect()?;
    Some(AABB::from_corners(
        [rect.min().x, rect.min().y],
        [rect.max().x, rect.max().y],
    ))
}

/// A geometry stored in a spatial index.
///
/// `source` keeps the document value the geometry was decoded from, so query
/// results can be resolved against the exact value the document store holds.
/// Equality only looks at the geometry.
#[derive(Debug, Clone)]
pub struct IndexedGeometry {
    pub geometry: Geometry,
    pub source: Value,
    envelope: Envelope,
}

impl IndexedGeometry {
    pub fn new(geometry: Geometry, source: Value) -> Option<Self> {
        let envelope = envelope_of(&geometry)?;
        Some(Self {
            geometry,
            source,
            envelope,
        })
    }

    /// Decode a document value, `None` if it is not a geometry.
    pub fn from_value(value: &Value) -> Option<Self> {
        let geometry = codec::decode(value)?;
        Self::new(geometry, value.clone())
    }

    pub fn envelope(&self) -> Envelope {
        self.envelope
    }
}

impl PartialEq for IndexedGeometry {
    fn eq(&self, other: &Self) -> bool {
        self.geometry == other.geometry
    }
}

impl RTreeObject for IndexedGeometry {
    type Envelope = Envelope;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for IndexedGeometry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

/// Spatial index for one attribute.
#[derive(Debug)]
pub struct SpatialIndex {
    attribute: Attribute,
    tree: RwLock<RTree<IndexedGeometry>>,
}

impl SpatialIndex {
    pub fn new(attribute: Attribute) -> Self {
        Self {
            attribute,
            tree: RwLock::new(RTree::new()),
        }
    }

    /// Build an index from a batch of entries in one bulk load.
    pub fn bulk_load(attribute: Attribute, entries: Vec<IndexedGeometry>) -> Self {
        Self {
            attribute,
            tree: RwLock::new(RTree::bulk_load(entries)),
        }
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    pub fn len(&self) -> usize {
        self.tree.read().size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, entry: IndexedGeometry) {
        self.tree.write().insert(entry);
    }

    /// Add a batch of entries, rebuilding the tree with a bulk load.
    pub fn extend(&self, entries: Vec<IndexedGeometry>) {
        if entries.is_empty() {
            return;
        }
        let mut tree = self.tree.write();
        let mut all: Vec<IndexedGeometry> = tree.iter().cloned().collect();
        all.extend(entries);
        *tree = RTree::bulk_load(all);
    }

    /// Remove every entry structurally equal to `geometry` that was decoded
    /// from `source`. Returns how many entries were dropped.
    ///
    /// Entries with an equal geometry but a different source value (another
    /// spelling of the same shape) are left in place.
    pub fn remove_all(&self, geometry: &Geometry, source: &Value) -> usize {
        let Some(target) = IndexedGeometry::new(geometry.clone(), Value::Null) else {
            return 0;
        };

        let mut tree = self.tree.write();
        let mut removed = 0;
        let mut kept = Vec::new();
        while let Some(entry) = tree.remove(&target) {
            if entry.source == *source {
                removed += 1;
            } else {
                kept.push(entry);
            }
        }
        for entry in kept {
            tree.insert(entry);
        }
        removed
    }

    pub fn contains(&self, geometry: &Geometry) -> bool {
        let Some(target) = IndexedGeometry::new(geometry.clone(), Value::Null) else {
            return false;
        };
        self.tree.read().contains(&target)
    }

    /// Entries whose envelope overlaps `envelope`, in tree order.
    ///
    /// This is a broad-phase test only: overlapping envelopes do not imply the
    /// shapes themselves intersect.
    pub fn intersecting(&self, envelope: &Envelope) -> Vec<IndexedGeometry> {
        self.tree
            .read()
            .locate_in_envelope_intersecting(envelope)
            .cloned()
            .collect()
    }

    /// Visit entries in ascending distance from `origin` until `visit` breaks.
    ///
    /// The read lock is held for the whole walk, so `visit` must not mutate
    /// this index.
    pub fn visit_nearest<F>(&self, origin: [f64; 2], mut visit: F)
    where
        F: FnMut(&IndexedGeometry, f64) -> ControlFlow<()>,
    {
        let tree = self.tree.read();
        for (entry, distance_2) in tree.nearest_neighbor_iter_with_distance_2(&origin) {
            if visit(entry, distance_2.sqrt()).is_break() {
                break;
            }
        }
    }
}
