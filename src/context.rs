//! The geospatial context a host retains for its lifetime.
//!
//! [`GeoContext::start`] validates configuration, rebuilds the indexes for
//! every attribute recorded in the metadata store, and returns a handle that
//! exposes the transaction listener and the two query predicates.

use crate::builder::GeoContextBuilder;
use crate::config::Config;
use crate::error::{GeoError, Result};
use crate::index::{GeoIndexer, IndexRegistry, RegistryStats};
use crate::query::{self, GeometryPredicate, PredicateArg, PredicateClause, PredicateMatch, ResultBinding};
use crate::storage::{DocumentStore, MetadataStore, Snapshot};
use geofacts_types::Attribute;
use serde_json::Value;
use std::sync::Arc;

/// Handle to the spatial index registry and its maintenance hooks.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone)]
pub struct GeoContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    config: Config,
    registry: Arc<IndexRegistry>,
    indexer: GeoIndexer,
}

impl GeoContext {
    pub fn builder() -> GeoContextBuilder {
        GeoContextBuilder::new()
    }

    /// Start the context, rebuilding indexes from stored documents.
    pub fn start(
        config: Config,
        metadata: Arc<dyn MetadataStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        config.validate().map_err(GeoError::InvalidConfig)?;

        let registry = Arc::new(IndexRegistry::new(metadata));
        let rebuilt = registry.reconstruct(documents.as_ref())?;
        log::info!(
            "Spatial indexing started (srid {}, {:?} precision): {} attributes, {} geometries rebuilt",
            config.srid,
            config.precision_model,
            rebuilt.attributes,
            rebuilt.geometries
        );
        if rebuilt.skipped > 0 {
            log::debug!("Skipped {} non-geometry values during rebuild", rebuilt.skipped);
        }

        let indexer = GeoIndexer::new(Arc::clone(&registry), documents);
        Ok(Self {
            inner: Arc::new(ContextInner {
                config,
                registry,
                indexer,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.inner.registry
    }

    /// Listener to register with the host's transaction notifier.
    pub fn indexer(&self) -> &GeoIndexer {
        &self.inner.indexer
    }

    /// Predicates this context can evaluate.
    pub fn predicates(&self) -> [GeometryPredicate; 2] {
        GeometryPredicate::ALL
    }

    /// Validate a predicate invocation by name.
    pub fn register_predicate(
        &self,
        name: &str,
        args: Vec<PredicateArg>,
        binding: Option<ResultBinding>,
    ) -> Result<PredicateClause> {
        let predicate: GeometryPredicate = name.parse()?;
        let clause = PredicateClause::new(predicate, args, binding)?;
        log::trace!("Registered {} on '{}'", predicate, clause.attribute());
        Ok(clause)
    }

    /// Evaluate a clause, emitting one match per (entity, geometry).
    ///
    /// `bound` supplies the value of the clause's query variable. Returns the
    /// number of matches emitted.
    pub fn evaluate<S, F>(
        &self,
        clause: &PredicateClause,
        bound: Option<&Value>,
        snapshot: &S,
        emit: F,
    ) -> Result<usize>
    where
        S: Snapshot + ?Sized,
        F: FnMut(PredicateMatch),
    {
        query::evaluate(&self.inner.registry, clause, bound, snapshot, emit)
    }

    /// The `k` nearest entities to `query` under `attribute`, nearest first.
    pub fn nearest<S: Snapshot + ?Sized>(
        &self,
        attribute: impl Into<Attribute>,
        query: &Value,
        k: usize,
        snapshot: &S,
    ) -> Result<Vec<PredicateMatch>> {
        let clause = match PredicateClause::nearest(attribute, query.clone(), k) {
            Ok(clause) => clause,
            // An undecodable query matches nothing.
            Err(GeoError::InvalidPredicate(_)) if k > 0 => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        self.collect(&clause, snapshot)
    }

    /// Entities under `attribute` whose envelope overlaps that of `query`.
    pub fn intersects<S: Snapshot + ?Sized>(
        &self,
        attribute: impl Into<Attribute>,
        query: &Value,
        snapshot: &S,
    ) -> Result<Vec<PredicateMatch>> {
        let clause = match PredicateClause::intersects(attribute, query.clone()) {
            Ok(clause) => clause,
            Err(GeoError::InvalidPredicate(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        self.collect(&clause, snapshot)
    }

    fn collect<S: Snapshot + ?Sized>(
        &self,
        clause: &PredicateClause,
        snapshot: &S,
    ) -> Result<Vec<PredicateMatch>> {
        let mut matches = Vec::new();
        self.evaluate(clause, None, snapshot, |m| matches.push(m))?;
        Ok(matches)
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.registry.stats()
    }
}
