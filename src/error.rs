//! Error types for geofacts.

use thiserror::Error;

/// Errors surfaced by the index, the collaborators it calls, and predicate
/// validation.
///
/// Geometry decode failures are not errors: a value that does not decode is
/// simply not a geometry.
#[derive(Error, Debug)]
pub enum GeoError {
    /// Predicate arguments have the wrong shape.
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    /// No predicate is registered under this name.
    #[error("Unknown predicate: {0}")]
    UnknownPredicate(String),

    /// Startup configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The durable metadata store failed to read or write.
    #[error("Metadata store error: {0}")]
    Metadata(String),

    /// The document store or a snapshot failed.
    #[error("Document store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for geofacts operations.
pub type Result<T> = std::result::Result<T, GeoError>;
