//! Geometry values recognised by the spatial index.
//!
//! A [`Geometry`] is one of five shapes backed by `geo` primitives. Equality is
//! structural: two geometries are equal when they are the same variant and
//! their coordinate sequences are identical. The index uses this equality both
//! to remove entries on eviction and to drop the query geometry from predicate
//! results, so it must stay coordinate based rather than identity based.

use geo::{BoundingRect, Centroid, LineString, MultiPoint, MultiPolygon, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// The shape tag of a [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    /// All kinds, in declaration order.
    pub const ALL: [GeometryKind; 5] = [
        GeometryKind::Point,
        GeometryKind::MultiPoint,
        GeometryKind::LineString,
        GeometryKind::Polygon,
        GeometryKind::MultiPolygon,
    ];

    /// Canonical GeoJSON type name.
    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPolygon => "MultiPolygon",
        }
    }

    /// Resolve a type tag, ignoring ASCII case.
    ///
    /// ```
    /// use geofacts_types::GeometryKind;
    ///
    /// assert_eq!(GeometryKind::from_tag("point"), Some(GeometryKind::Point));
    /// assert_eq!(GeometryKind::from_tag("MULTIPOLYGON"), Some(GeometryKind::MultiPolygon));
    /// assert_eq!(GeometryKind::from_tag("GeometryCollection"), None);
    /// ```
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(tag))
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A shape stored in, or used to query, a spatial index.
///
/// # Examples
///
/// ```
/// use geofacts_types::Geometry;
/// use geo::{polygon, Point};
///
/// let square = Geometry::Polygon(polygon![
///     (x: 0.0, y: 0.0),
///     (x: 2.0, y: 0.0),
///     (x: 2.0, y: 2.0),
///     (x: 0.0, y: 2.0),
/// ]);
///
/// let rect = square.bounding_rect().unwrap();
/// assert_eq!(rect.max().x, 2.0);
/// assert_eq!(square.representative_point(), Some(Point::new(1.0, 1.0)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Point<f64>),
    MultiPoint(MultiPoint<f64>),
    LineString(LineString<f64>),
    /// Exterior ring first, then holes. Rings are closed.
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// Axis-aligned bounding rectangle, `None` for an empty shape.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Geometry::Point(point) => Some(point.bounding_rect()),
            Geometry::MultiPoint(points) => points.bounding_rect(),
            Geometry::LineString(line) => line.bounding_rect(),
            Geometry::Polygon(polygon) => polygon.bounding_rect(),
            Geometry::MultiPolygon(polygons) => polygons.bounding_rect(),
        }
    }

    /// Point used as the origin of nearest-neighbour searches.
    ///
    /// The point itself for a `Point`, otherwise the centroid. Degenerate
    /// shapes without a centroid fall back to the centre of their bounds.
    pub fn representative_point(&self) -> Option<Point<f64>> {
        let centroid = match self {
            Geometry::Point(point) => Some(*point),
            Geometry::MultiPoint(points) => points.centroid(),
            Geometry::LineString(line) => line.centroid(),
            Geometry::Polygon(polygon) => polygon.centroid(),
            Geometry::MultiPolygon(polygons) => polygons.centroid(),
        };
        centroid.or_else(|| self.bounding_rect().map(|rect| rect.center().into()))
    }
}

impl From<Point<f64>> for Geometry {
    fn from(point: Point<f64>) -> Self {
        Geometry::Point(point)
    }
}

impl From<MultiPoint<f64>> for Geometry {
    fn from(points: MultiPoint<f64>) -> Self {
        Geometry::MultiPoint(points)
    }
}

impl From<LineString<f64>> for Geometry {
    fn from(line: LineString<f64>) -> Self {
        Geometry::LineString(line)
    }
}

impl From<Polygon<f64>> for Geometry {
    fn from(polygon: Polygon<f64>) -> Self {
        Geometry::Polygon(polygon)
    }
}

impl From<MultiPolygon<f64>> for Geometry {
    fn from(polygons: MultiPolygon<f64>) -> Self {
        Geometry::MultiPolygon(polygons)
    }
}
