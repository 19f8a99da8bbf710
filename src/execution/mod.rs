//! Lazy, pull-driven execution.
//!
//! This module turns operator instances into on-demand tile producers:
//! binding, lazy initialization, per-context tile caches, progress and
//! cancellation, lineage metadata and bulk materialization.

pub mod binding;
pub mod cache;
pub mod context;
pub mod materialize;
pub mod pass;
pub mod progress;
pub mod provenance;

pub use binding::{ParameterMap, Sources};
pub use cache::{CacheStats, TileCache, TileKey};
pub use context::OperatorContext;
pub use materialize::{materialize, materialize_all, MaterializeStats};
pub use progress::{ProgressMonitor, ProgressUpdate};
