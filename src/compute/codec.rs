//! GeoJSON-shaped document values to and from [`Geometry`].
//!
//! A geometry travels through the document store as a JSON object with a
//! `"type"` tag and a `"coordinates"` array, e.g.
//! `{"type": "Point", "coordinates": [1.0, 1.0]}`. Decoding is total: anything
//! that is not a well formed point, multi-point, line string, polygon or
//! multi-polygon is reported as `None`, never as an error.

use geo::{Coord, LineString, MultiPoint, MultiPolygon, Point, Polygon};
use geofacts_types::{Geometry, GeometryKind};
use geojson::{JsonObject, PolygonType, Position};
use serde_json::Value;

/// Key holding the shape tag.
pub const TYPE_KEY: &str = "type";

/// Key holding the coordinate array.
pub const COORDINATES_KEY: &str = "coordinates";

/// Decode a document value into a geometry.
///
/// The type tag is matched ignoring ASCII case. Polygon rings missing their
/// closing coordinate are closed. Extra keys, and coordinates beyond the
/// second dimension, are ignored.
///
/// ```rust
/// use geofacts::codec::decode;
/// use serde_json::json;
///
/// assert!(decode(&json!({"type": "point", "coordinates": [1, 1]})).is_some());
/// assert!(decode(&json!({"type": "Circle", "coordinates": [1, 1]})).is_none());
/// assert!(decode(&json!("POINT (1 1)")).is_none());
/// ```
pub fn decode(value: &Value) -> Option<Geometry> {
    let object = value.as_object()?;
    let kind = object
        .get(TYPE_KEY)
        .and_then(Value::as_str)
        .and_then(GeometryKind::from_tag)?;
    let coordinates = object.get(COORDINATES_KEY)?;

    let mut canonical = JsonObject::new();
    canonical.insert(TYPE_KEY.to_string(), Value::from(kind.name()));
    canonical.insert(COORDINATES_KEY.to_string(), coordinates.clone());

    let parsed = geojson::Geometry::from_json_object(canonical).ok()?;
    from_geojson(parsed.value)
}

/// Parse GeoJSON text and decode it.
pub fn decode_str(geojson: &str) -> Option<Geometry> {
    let value: Value = serde_json::from_str(geojson).ok()?;
    decode(&value)
}

/// `true` when `value` decodes to a geometry.
pub fn is_geometry(value: &Value) -> bool {
    decode(value).is_some()
}

/// Encode a geometry as its canonical GeoJSON object.
///
/// Polygons always emit the exterior ring first, followed by the holes.
pub fn encode(geometry: &Geometry) -> Value {
    let value = match geometry {
        Geometry::Point(point) => geojson::Value::Point(position(point.0)),
        Geometry::MultiPoint(points) => {
            geojson::Value::MultiPoint(points.iter().map(|point| position(point.0)).collect())
        }
        Geometry::LineString(line) => geojson::Value::LineString(line_positions(line)),
        Geometry::Polygon(polygon) => geojson::Value::Polygon(polygon_positions(polygon)),
        Geometry::MultiPolygon(polygons) => {
            geojson::Value::MultiPolygon(polygons.iter().map(polygon_positions).collect())
        }
    };

    Value::Object(JsonObject::from(&geojson::Geometry::new(value)))
}

/// Individual values of a document field.
///
/// A JSON array field is multi-valued: each element is a separate value and is
/// indexed on its own. Any other value is a single value.
pub fn field_values(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn from_geojson(value: geojson::Value) -> Option<Geometry> {
    match value {
        geojson::Value::Point(pos) => to_coord(&pos).map(|c| Geometry::Point(Point(c))),
        geojson::Value::MultiPoint(positions) => {
            if positions.is_empty() {
                return None;
            }
            let points = positions
                .iter()
                .map(|pos| to_coord(pos).map(Point))
                .collect::<Option<Vec<_>>>()?;
            Some(Geometry::MultiPoint(MultiPoint::new(points)))
        }
        geojson::Value::LineString(positions) => {
            let coords = to_coords(&positions)?;
            if coords.len() < 2 {
                return None;
            }
            Some(Geometry::LineString(LineString::new(coords)))
        }
        geojson::Value::Polygon(rings) => to_polygon(&rings).map(Geometry::Polygon),
        geojson::Value::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                return None;
            }
            let polygons = polygons
                .iter()
                .map(|rings| to_polygon(rings))
                .collect::<Option<Vec<_>>>()?;
            Some(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        geojson::Value::MultiLineString(_) | geojson::Value::GeometryCollection(_) => None,
    }
}

fn to_coord(pos: &[f64]) -> Option<Coord<f64>> {
    match pos {
        [x, y, ..] if x.is_finite() && y.is_finite() => Some(Coord { x: *x, y: *y }),
        _ => None,
    }
}

fn to_coords(positions: &[Position]) -> Option<Vec<Coord<f64>>> {
    positions.iter().map(|pos| to_coord(pos)).collect()
}

fn to_ring(positions: &[Position]) -> Option<LineString<f64>> {
    let mut coords = to_coords(positions)?;
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied())
        && first != last
    {
        coords.push(first);
    }
    // A closed ring needs three distinct corners plus the closing point.
    if coords.len() < 4 {
        return None;
    }
    Some(LineString::new(coords))
}

fn to_polygon(rings: &PolygonType) -> Option<Polygon<f64>> {
    let (exterior, holes) = rings.split_first()?;
    let exterior = to_ring(exterior)?;
    let holes = holes
        .iter()
        .map(|ring| to_ring(ring))
        .collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, holes))
}

fn position(coord: Coord<f64>) -> Position {
    vec![coord.x, coord.y]
}

fn line_positions(line: &LineString<f64>) -> Vec<Position> {
    line.coords().map(|c| position(*c)).collect()
}

fn polygon_positions(polygon: &Polygon<f64>) -> PolygonType {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(line_positions)
        .collect()
}
