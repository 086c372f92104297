//! Geospatial indexing for a transactional document store.
//!
//! Document values shaped like GeoJSON geometries are decoded, kept in one
//! R*-tree per attribute, maintained as documents are committed and evicted,
//! and queried through the `nearest` and `intersects` predicates.
//!
//! ```rust
//! use geofacts::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let documents = Arc::new(MemoryDocumentStore::new());
//! let ctx = GeoContext::builder().documents(documents.clone()).build()?;
//!
//! documents.commit(
//!     vec![
//!         Document::new("cafe").with("loc", json!({"type": "Point", "coordinates": [1, 0]})),
//!         Document::new("park").with("loc", json!({"type": "Point", "coordinates": [5, 0]})),
//!     ],
//!     ctx.indexer(),
//! )?;
//!
//! let here = json!({"type": "Point", "coordinates": [0, 0]});
//! let nearest = ctx.nearest("loc", &here, 1, &documents.snapshot())?;
//! assert_eq!(nearest[0].entity.as_str(), "cafe");
//! # Ok::<(), geofacts::GeoError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod context;
pub mod error;
pub mod index;
pub mod query;
pub mod storage;

pub use compute::codec;
pub use compute::spatial::{IndexedGeometry, SpatialIndex};

pub use builder::GeoContextBuilder;
pub use config::{Config, PrecisionModel};
pub use context::GeoContext;
pub use error::{GeoError, Result};

pub use index::{GeoIndexer, IndexRegistry, RegistryStats};

pub use query::{
    GeometryPredicate, PredicateArg, PredicateClause, PredicateMatch, QueryGeometry, ResultBinding,
};

pub use storage::{
    Document, DocumentStore, JsonFileMetadataStore, MemoryDocumentStore, MemoryMetadataStore,
    MemorySnapshot, MetadataStore, Snapshot, TransactionListener,
};

pub use geofacts_types::{Attribute, EntityId, Geometry, GeometryKind};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeoContext, GeoContextBuilder, GeoError, Result};

    pub use crate::{Attribute, EntityId, Geometry};

    pub use crate::{Config, PrecisionModel};

    pub use crate::{GeometryPredicate, PredicateArg, PredicateClause, PredicateMatch, ResultBinding};

    pub use crate::{Document, MemoryDocumentStore, MemoryMetadataStore, Snapshot, TransactionListener};
}
