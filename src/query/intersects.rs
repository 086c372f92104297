//! Envelope-overlap candidates.

use super::candidates::{Candidate, CandidateSet};
use crate::compute::spatial::{SpatialIndex, envelope_of};
use geofacts_types::Geometry;

/// Distinct geometries whose envelope overlaps the envelope of `query`.
///
/// Broad phase only: an overlapping envelope does not mean the shapes
/// intersect.
pub(crate) fn candidates(index: &SpatialIndex, query: &Geometry) -> Vec<Candidate> {
    let mut found = CandidateSet::default();
    let Some(envelope) = envelope_of(query) else {
        return found.into_vec();
    };

    for entry in index.intersecting(&envelope) {
        if entry.geometry == *query || found.merge(&entry) {
            continue;
        }
        found.push(&entry, None);
    }
    found.into_vec()
}
