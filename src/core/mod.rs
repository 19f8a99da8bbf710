//! Core types and traits of the raster operator engine.
//!
//! This module contains the foundational pieces every operator works with:
//! - Raster data model (rasters, bands, metadata)
//! - Rectangles and tiles
//! - Parameter values and types
//! - The `Operator` trait and operator descriptors
//! - Error types
//! - Initialization and compute contexts

pub mod context;
pub mod error;
pub mod metadata;
pub mod node;
pub mod port;
pub mod raster;
pub mod rect;
pub mod tile;
pub mod types;

// Re-export commonly used types
pub use context::{ComputeContext, InitContext, ParameterSet};
pub use error::{BandId, ContextId, ErrorKind, OperatorError, OperatorResult, RasterId};
pub use metadata::{MetadataAttribute, MetadataElement};
pub use node::{Category, ComputeMode, Operator, OperatorDescriptor, TileStack};
pub use port::{Constraint, ParameterDescriptor, SourcePortDescriptor, TargetPropertyDescriptor};
pub use raster::{Band, Raster, SampleReader};
pub use rect::{Rectangle, TileGrid};
pub use tile::{Tile, TileData};
pub use types::{ParamType, PixelType, Value};
