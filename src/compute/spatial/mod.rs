//! Spatial indexing.

pub mod rtree;

pub use rtree::{Envelope, IndexedGeometry, SpatialIndex, envelope_of};
