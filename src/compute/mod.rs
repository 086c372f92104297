//! Compute layer: geometry decoding and spatial indexing.
//!
//! This module holds the pieces that do not depend on any storage
//! collaborator:
//! - Geometry codec between document values and [`Geometry`](geofacts_types::Geometry)
//! - Per-attribute R*-tree index with nearest and envelope queries

pub mod codec;
pub mod spatial;
