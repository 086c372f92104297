//! Geospatial query predicates.
//!
//! Two predicates are available to the host query engine:
//!
//! - `nearest(attribute, geometry, k?)`: the `k` (default 1) indexed
//!   geometries closest to the query geometry, in ascending distance
//! - `intersects(attribute, geometry)`: indexed geometries whose envelope
//!   overlaps the query geometry's envelope
//!
//! A [`PredicateClause`] is validated once when the engine registers it and
//! can then be evaluated any number of times. Evaluation resolves every
//! matching geometry to the live entities holding it and emits one
//! [`PredicateMatch`] per (entity, geometry). Geometries structurally equal to
//! the query are never returned.
//!
//! Nothing here is an error at evaluation time except a failing snapshot: an
//! undecodable query, an attribute without an index or a stale index entry
//! simply contribute no matches.

use crate::compute::codec;
use crate::error::{GeoError, Result};
use crate::index::IndexRegistry;
use crate::storage::Snapshot;
use geofacts_types::{Attribute, EntityId, Geometry};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

mod candidates;
mod intersects;
mod nearest;

/// Neighbour count used when `nearest` is given no count.
pub const DEFAULT_NEAREST_COUNT: usize = 1;

/// The closed set of geospatial predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryPredicate {
    Nearest,
    Intersects,
}

impl GeometryPredicate {
    pub const ALL: [GeometryPredicate; 2] = [GeometryPredicate::Nearest, GeometryPredicate::Intersects];

    pub fn name(&self) -> &'static str {
        match self {
            GeometryPredicate::Nearest => "nearest",
            GeometryPredicate::Intersects => "intersects",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Argument shape, for registration with a query engine.
    pub fn signature(&self) -> &'static str {
        match self {
            GeometryPredicate::Nearest => "(attribute, geometry | ?variable, count?)",
            GeometryPredicate::Intersects => "(attribute, geometry | ?variable)",
        }
    }

    fn max_args(&self) -> usize {
        match self {
            GeometryPredicate::Nearest => 3,
            GeometryPredicate::Intersects => 2,
        }
    }
}

impl fmt::Display for GeometryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeometryPredicate {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| GeoError::UnknownPredicate(s.to_string()))
    }
}

/// A raw predicate argument as supplied by the query engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateArg {
    Attribute(Attribute),
    /// Literal geometry value.
    Geometry(Value),
    /// Query variable, bound to a value at evaluation time.
    Variable(String),
    Integer(i64),
}

impl PredicateArg {
    pub fn attribute(name: impl Into<Attribute>) -> Self {
        PredicateArg::Attribute(name.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        PredicateArg::Variable(name.into())
    }

    fn describe(&self) -> &'static str {
        match self {
            PredicateArg::Attribute(_) => "attribute",
            PredicateArg::Geometry(_) => "geometry",
            PredicateArg::Variable(_) => "variable",
            PredicateArg::Integer(_) => "integer",
        }
    }
}

/// The geometry argument of a validated clause.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryGeometry {
    Literal(Geometry),
    Variable(String),
}

/// Variable names a match is bound to in the result tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultBinding {
    pub entity: Option<String>,
    pub geometry: Option<String>,
    pub distance: Option<String>,
}

impl ResultBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, variable: impl Into<String>) -> Self {
        self.entity = Some(variable.into());
        self
    }

    pub fn geometry(mut self, variable: impl Into<String>) -> Self {
        self.geometry = Some(variable.into());
        self
    }

    pub fn distance(mut self, variable: impl Into<String>) -> Self {
        self.distance = Some(variable.into());
        self
    }

    fn variables(&self) -> impl Iterator<Item = &str> {
        [&self.entity, &self.geometry, &self.distance]
            .into_iter()
            .filter_map(|v| v.as_deref())
    }

    /// Bind a match into a tuple keyed by variable name.
    ///
    /// The geometry is bound to the document value it was resolved through.
    /// A distance variable stays unbound for matches that carry no distance.
    pub fn bind(&self, found: &PredicateMatch) -> BTreeMap<String, Value> {
        let mut tuple = BTreeMap::new();
        if let Some(var) = &self.entity {
            tuple.insert(var.clone(), Value::String(found.entity.as_str().to_string()));
        }
        if let Some(var) = &self.geometry {
            tuple.insert(var.clone(), found.value.clone());
        }
        if let (Some(var), Some(distance)) = (&self.distance, found.distance)
            && let Some(number) = serde_json::Number::from_f64(distance)
        {
            tuple.insert(var.clone(), Value::Number(number));
        }
        tuple
    }
}

/// A predicate with validated arguments, ready to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateClause {
    predicate: GeometryPredicate,
    attribute: Attribute,
    query: QueryGeometry,
    k: usize,
    binding: Option<ResultBinding>,
}

impl PredicateClause {
    /// Validate raw arguments against the predicate's shape.
    pub fn new(
        predicate: GeometryPredicate,
        args: Vec<PredicateArg>,
        binding: Option<ResultBinding>,
    ) -> Result<Self> {
        if args.len() < 2 || args.len() > predicate.max_args() {
            return Err(GeoError::InvalidPredicate(format!(
                "{} expects {}, got {} arguments",
                predicate,
                predicate.signature(),
                args.len()
            )));
        }

        let mut args = args.into_iter();
        let attribute = match args.next() {
            Some(PredicateArg::Attribute(attribute)) => attribute,
            other => return Err(unexpected(predicate, "attribute", 1, other.as_ref())),
        };

        let query = match args.next() {
            Some(PredicateArg::Geometry(value)) => match codec::decode(&value) {
                Some(geometry) => QueryGeometry::Literal(geometry),
                None => {
                    return Err(GeoError::InvalidPredicate(format!(
                        "{}: argument 2 is not a geometry: {}",
                        predicate, value
                    )));
                }
            },
            Some(PredicateArg::Variable(name)) => QueryGeometry::Variable(name),
            other => return Err(unexpected(predicate, "geometry or variable", 2, other.as_ref())),
        };

        let k = match args.next() {
            None => DEFAULT_NEAREST_COUNT,
            Some(PredicateArg::Integer(n)) if n > 0 => usize::try_from(n).map_err(|_| {
                GeoError::InvalidPredicate(format!("{}: count {} is too large", predicate, n))
            })?,
            Some(PredicateArg::Integer(n)) => {
                return Err(GeoError::InvalidPredicate(format!(
                    "{}: count must be positive, got {}",
                    predicate, n
                )));
            }
            other => return Err(unexpected(predicate, "integer count", 3, other.as_ref())),
        };

        if let Some(binding) = &binding {
            let mut seen: Vec<&str> = Vec::new();
            for var in binding.variables() {
                if seen.contains(&var) {
                    return Err(GeoError::InvalidPredicate(format!(
                        "{}: variable '{}' bound twice",
                        predicate, var
                    )));
                }
                seen.push(var);
            }
        }

        Ok(Self {
            predicate,
            attribute,
            query,
            k,
            binding,
        })
    }

    pub fn nearest(attribute: impl Into<Attribute>, query: Value, k: usize) -> Result<Self> {
        let count = i64::try_from(k).unwrap_or(i64::MAX);
        Self::new(
            GeometryPredicate::Nearest,
            vec![
                PredicateArg::Attribute(attribute.into()),
                PredicateArg::Geometry(query),
                PredicateArg::Integer(count),
            ],
            None,
        )
    }

    pub fn intersects(attribute: impl Into<Attribute>, query: Value) -> Result<Self> {
        Self::new(
            GeometryPredicate::Intersects,
            vec![
                PredicateArg::Attribute(attribute.into()),
                PredicateArg::Geometry(query),
            ],
            None,
        )
    }

    pub fn predicate(&self) -> GeometryPredicate {
        self.predicate
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    pub fn query(&self) -> &QueryGeometry {
        &self.query
    }

    /// Neighbour count. Always 1 or more; unused by `intersects`.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn binding(&self) -> Option<&ResultBinding> {
        self.binding.as_ref()
    }

    /// The query variable, if the geometry comes from one.
    pub fn variable(&self) -> Option<&str> {
        match &self.query {
            QueryGeometry::Variable(name) => Some(name),
            QueryGeometry::Literal(_) => None,
        }
    }
}

fn unexpected(
    predicate: GeometryPredicate,
    expected: &str,
    position: usize,
    found: Option<&PredicateArg>,
) -> GeoError {
    let found = found.map_or("nothing", PredicateArg::describe);
    GeoError::InvalidPredicate(format!(
        "{}: argument {} must be {}, got {}",
        predicate, position, expected, found
    ))
}

/// One result row: an entity holding a matching geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateMatch {
    pub entity: EntityId,
    pub geometry: Geometry,
    /// The document value the entity was resolved through.
    pub value: Value,
    /// Distance from the query, `nearest` only.
    pub distance: Option<f64>,
}

/// Evaluate `clause` against the registry.
///
/// `bound` is the value of the clause's query variable; it is ignored for
/// clauses with a literal geometry. Returns the number of emitted matches.
pub fn evaluate<S, F>(
    registry: &IndexRegistry,
    clause: &PredicateClause,
    bound: Option<&Value>,
    snapshot: &S,
    emit: F,
) -> Result<usize>
where
    S: Snapshot + ?Sized,
    F: FnMut(PredicateMatch),
{
    let query = match &clause.query {
        QueryGeometry::Literal(geometry) => Some(geometry.clone()),
        QueryGeometry::Variable(_) => bound.and_then(codec::decode),
    };
    let Some(query) = query else {
        log::trace!("{}: query value is not a geometry", clause.predicate);
        return Ok(0);
    };
    let Some(index) = registry.get(&clause.attribute) else {
        return Ok(0);
    };

    let found = match clause.predicate {
        GeometryPredicate::Nearest => nearest::candidates(&index, &query, clause.k),
        GeometryPredicate::Intersects => intersects::candidates(&index, &query),
    };
    candidates::resolve(&clause.attribute, found, snapshot, emit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point() -> Value {
        json!({"type": "Point", "coordinates": [1, 1]})
    }

    #[test]
    fn test_predicate_names() {
        assert_eq!(GeometryPredicate::from_name("nearest"), Some(GeometryPredicate::Nearest));
        assert_eq!(
            "intersects".parse::<GeometryPredicate>().unwrap(),
            GeometryPredicate::Intersects
        );
        assert!(matches!(
            "within".parse::<GeometryPredicate>(),
            Err(GeoError::UnknownPredicate(_))
        ));
    }

    #[test]
    fn test_nearest_defaults_to_one() {
        let clause = PredicateClause::new(
            GeometryPredicate::Nearest,
            vec![PredicateArg::attribute("loc"), PredicateArg::Geometry(point())],
            None,
        )
        .unwrap();
        assert_eq!(clause.k(), DEFAULT_NEAREST_COUNT);
        assert!(matches!(clause.query(), QueryGeometry::Literal(Geometry::Point(_))));
        assert_eq!(clause.variable(), None);
    }

    #[test]
    fn test_variable_query() {
        let clause = PredicateClause::new(
            GeometryPredicate::Intersects,
            vec![PredicateArg::attribute("area"), PredicateArg::variable("?shape")],
            Some(ResultBinding::new().entity("?e")),
        )
        .unwrap();
        assert_eq!(clause.variable(), Some("?shape"));
        assert_eq!(clause.attribute().as_str(), "area");
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let cases = vec![
            (GeometryPredicate::Nearest, vec![PredicateArg::attribute("loc")]),
            (
                GeometryPredicate::Intersects,
                vec![
                    PredicateArg::attribute("loc"),
                    PredicateArg::Geometry(point()),
                    PredicateArg::Integer(2),
                ],
            ),
            (
                GeometryPredicate::Nearest,
                vec![PredicateArg::Geometry(point()), PredicateArg::attribute("loc")],
            ),
            (
                GeometryPredicate::Nearest,
                vec![PredicateArg::attribute("loc"), PredicateArg::Geometry(json!("nope"))],
            ),
            (
                GeometryPredicate::Nearest,
                vec![PredicateArg::attribute("loc"), PredicateArg::Integer(3)],
            ),
            (
                GeometryPredicate::Nearest,
                vec![
                    PredicateArg::attribute("loc"),
                    PredicateArg::Geometry(point()),
                    PredicateArg::Integer(0),
                ],
            ),
            (
                GeometryPredicate::Nearest,
                vec![
                    PredicateArg::attribute("loc"),
                    PredicateArg::variable("?p"),
                    PredicateArg::variable("?k"),
                ],
            ),
        ];

        for (predicate, args) in cases {
            let err = PredicateClause::new(predicate, args.clone(), None).unwrap_err();
            assert!(
                matches!(err, GeoError::InvalidPredicate(_)),
                "{:?} {:?}",
                predicate,
                args
            );
        }
    }

    #[test]
    fn test_rejects_duplicate_binding_variables() {
        let err = PredicateClause::new(
            GeometryPredicate::Nearest,
            vec![PredicateArg::attribute("loc"), PredicateArg::variable("?p")],
            Some(ResultBinding::new().entity("?x").geometry("?x")),
        )
        .unwrap_err();
        assert!(matches!(err, GeoError::InvalidPredicate(_)));
    }

    #[test]
    fn test_bind() {
        let found = PredicateMatch {
            entity: EntityId::from("cafe"),
            geometry: codec::decode(&point()).unwrap(),
            value: point(),
            distance: Some(2.5),
        };

        let tuple = ResultBinding::new()
            .entity("?e")
            .geometry("?g")
            .distance("?d")
            .bind(&found);
        assert_eq!(tuple["?e"], json!("cafe"));
        assert_eq!(tuple["?g"], point());
        assert_eq!(tuple["?d"], json!(2.5));

        let tuple = ResultBinding::new()
            .distance("?d")
            .bind(&PredicateMatch {
                distance: None,
                ..found
            });
        assert!(tuple.is_empty());
    }
}
