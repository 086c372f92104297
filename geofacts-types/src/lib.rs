//! # geofacts-types
//!
//! Core data types for the geofacts spatial index.
//!
//! - **Geometry**: [`Geometry`], a closed set of shapes (point, multi-point,
//!   line string, polygon, multi-polygon) backed by `geo` primitives
//! - **Identifiers**: [`Attribute`] and [`EntityId`], the keys the document
//!   store uses for fields and entities
//!
//! All types are serializable with Serde.
//!
//! ## Examples
//!
//! ```rust
//! use geofacts_types::{Attribute, Geometry};
//! use geo::Point;
//!
//! let loc = Attribute::new("loc");
//! let point = Geometry::Point(Point::new(-74.0060, 40.7128));
//!
//! assert_eq!(loc.as_str(), "loc");
//! assert_eq!(point.kind().name(), "Point");
//! ```

pub mod geometry;
pub mod ids;

pub use geometry::{Geometry, GeometryKind};
pub use ids::{Attribute, EntityId};
