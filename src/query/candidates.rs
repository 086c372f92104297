//! Candidate geometries and their resolution to live entities.

use super::PredicateMatch;
use crate::compute::codec;
use crate::compute::spatial::{Envelope, IndexedGeometry};
use crate::error::Result;
use crate::storage::Snapshot;
use geofacts_types::{Attribute, EntityId, Geometry};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

/// A distinct matching geometry with every document value it was indexed
/// from.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub geometry: Geometry,
    pub sources: Vec<Value>,
    pub distance: Option<f64>,
}

/// Candidates in acceptance order, merged by structural equality.
#[derive(Debug, Default)]
pub(crate) struct CandidateSet {
    candidates: Vec<Candidate>,
    by_envelope: FxHashMap<[u64; 4], Vec<usize>>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Fold `entry` into an already accepted candidate with the same
    /// geometry. Returns `false` if there is none.
    pub fn merge(&mut self, entry: &IndexedGeometry) -> bool {
        let Some(slots) = self.by_envelope.get(&envelope_key(&entry.envelope())) else {
            return false;
        };
        let Some(&slot) = slots
            .iter()
            .find(|&&slot| self.candidates[slot].geometry == entry.geometry)
        else {
            return false;
        };

        let sources = &mut self.candidates[slot].sources;
        if !sources.contains(&entry.source) {
            sources.push(entry.source.clone());
        }
        true
    }

    pub fn push(&mut self, entry: &IndexedGeometry, distance: Option<f64>) {
        let slot = self.candidates.len();
        self.candidates.push(Candidate {
            geometry: entry.geometry.clone(),
            sources: vec![entry.source.clone()],
            distance,
        });
        self.by_envelope
            .entry(envelope_key(&entry.envelope()))
            .or_default()
            .push(slot);
    }

    /// Distance of the most recently accepted candidate.
    pub fn last_distance(&self) -> Option<f64> {
        self.candidates.last().and_then(|c| c.distance)
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.candidates
    }
}

/// Equal geometries have equal envelopes, so envelopes bucket the equality
/// checks. `+ 0.0` folds `-0.0` into `0.0`.
fn envelope_key(envelope: &Envelope) -> [u64; 4] {
    let lower = envelope.lower();
    let upper = envelope.upper();
    [
        (lower[0] + 0.0).to_bits(),
        (lower[1] + 0.0).to_bits(),
        (upper[0] + 0.0).to_bits(),
        (upper[1] + 0.0).to_bits(),
    ]
}

/// Resolve each candidate to the live entities holding it and emit one match
/// per (entity, geometry), in candidate order.
///
/// Entities are looked up through every value the geometry was indexed from
/// and through its canonical encoding, since the store may hold the same
/// shape written differently.
pub(crate) fn resolve<S, F>(
    attribute: &Attribute,
    candidates: Vec<Candidate>,
    snapshot: &S,
    mut emit: F,
) -> Result<usize>
where
    S: Snapshot + ?Sized,
    F: FnMut(PredicateMatch),
{
    let mut emitted = 0usize;
    for candidate in candidates {
        let mut values = candidate.sources;
        let canonical = codec::encode(&candidate.geometry);
        if !values.contains(&canonical) {
            values.push(canonical);
        }

        let mut seen: FxHashSet<EntityId> = FxHashSet::default();
        for value in values {
            let entities = snapshot.resolve_entities(attribute, &value)?;
            for entity in entities {
                if !seen.insert(entity.clone()) {
                    continue;
                }
                emit(PredicateMatch {
                    entity,
                    geometry: candidate.geometry.clone(),
                    value: value.clone(),
                    distance: candidate.distance,
                });
                emitted += 1;
            }
        }
    }
    Ok(emitted)
}
