//! Spatial index registry and its maintenance hooks.

mod maintenance;
mod registry;

pub use maintenance::GeoIndexer;
pub use registry::{IndexRegistry, ReconstructStats, RegistryStats};
