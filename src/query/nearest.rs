//! k-nearest-neighbour candidates.

use super::candidates::{Candidate, CandidateSet};
use crate::compute::spatial::SpatialIndex;
use geofacts_types::Geometry;
use std::ops::ControlFlow;

/// The `k` distinct geometries closest to `query`, nearest first.
///
/// The index is walked lazily in ascending distance, so geometries equal to
/// the query and repeated entries never eat into `k`. Once `k` geometries are
/// accepted the walk continues only while distances tie with the last one,
/// to collect the remaining copies of accepted geometries.
pub(crate) fn candidates(index: &SpatialIndex, query: &Geometry, k: usize) -> Vec<Candidate> {
    let mut accepted = CandidateSet::default();
    let Some(origin) = query.representative_point() else {
        return accepted.into_vec();
    };
    if k == 0 {
        return accepted.into_vec();
    }

    index.visit_nearest([origin.x(), origin.y()], |entry, distance| {
        if entry.geometry == *query || accepted.merge(entry) {
            return ControlFlow::Continue(());
        }
        if accepted.len() < k {
            accepted.push(entry, Some(distance));
            return ControlFlow::Continue(());
        }
        match accepted.last_distance() {
            Some(last) if distance > last => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    });

    accepted.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::spatial::IndexedGeometry;
    use geo::Point;
    use geofacts_types::Attribute;
    use serde_json::json;

    fn index_with(points: &[(f64, f64)]) -> SpatialIndex {
        let index = SpatialIndex::new(Attribute::from("loc"));
        for (x, y) in points {
            let value = json!({"type": "Point", "coordinates": [x, y]});
            index.insert(IndexedGeometry::from_value(&value).unwrap());
        }
        index
    }

    fn xs(candidates: &[Candidate]) -> Vec<f64> {
        candidates
            .iter()
            .map(|c| match &c.geometry {
                Geometry::Point(p) => p.x(),
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_excludes_query_and_keeps_k() {
        // Several copies of the query point must not crowd out real results.
        let index = index_with(&[(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        let query = Geometry::Point(Point::new(0.0, 0.0));

        let found = candidates(&index, &query, 2);
        assert_eq!(xs(&found), vec![1.0, 2.0]);
        assert_eq!(found[0].distance, Some(1.0));
        assert_eq!(found[1].distance, Some(2.0));
    }

    #[test]
    fn test_duplicates_merge_into_one_candidate() {
        let index = index_with(&[(1.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let query = Geometry::Point(Point::new(0.0, 0.0));

        let found = candidates(&index, &query, 1);
        assert_eq!(xs(&found), vec![1.0]);

        let found = candidates(&index, &query, 2);
        assert_eq!(xs(&found), vec![1.0, 2.0]);
    }

    #[test]
    fn test_fewer_than_k_available() {
        let index = index_with(&[(5.0, 0.0)]);
        let found = candidates(&index, &Geometry::Point(Point::new(0.0, 0.0)), 3);
        assert_eq!(xs(&found), vec![5.0]);

        let empty = SpatialIndex::new(Attribute::from("loc"));
        assert!(candidates(&empty, &Geometry::Point(Point::new(0.0, 0.0)), 3).is_empty());
    }

    #[test]
    fn test_polygon_query_uses_centroid() {
        let index = index_with(&[(0.0, 0.0), (10.0, 10.0)]);
        let query = crate::compute::codec::decode(&json!({
            "type": "Polygon",
            "coordinates": [[[8, 8], [12, 8], [12, 12], [8, 12], [8, 8]]]
        }))
        .unwrap();

        let found = candidates(&index, &query, 1);
        assert_eq!(xs(&found), vec![10.0]);
        assert_eq!(found[0].distance, Some(0.0));
    }
}
