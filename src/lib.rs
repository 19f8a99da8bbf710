//! # Rastergraph - Lazy Tile-based Raster Operators
//!
//! Rastergraph computes derived raster products on demand by composing a
//! graph of operators. Nothing is computed when a product is created; reading
//! a tile of a target band walks backward through the graph, computing and
//! caching only the rectangles that are needed.
//!
//! ## Features
//!
//! - **Lazy initialization**: an operator builds its target structure the
//!   first time the target is requested, exactly once
//! - **Pull scheduling**: tiles are computed only when a consumer reads them
//! - **Tile caching**: each operator instance memoizes `(band, rectangle)` results
//! - **Declarative binding**: parameter defaults, type conversion and source
//!   port multiplicity are checked against a descriptor schema
//! - **Provenance**: every target records the processing graph that produced it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rastergraph::prelude::*;
//!
//! let engine = Engine::with_builtins();
//!
//! let mut params = ParameterMap::new();
//! params.insert("value".to_string(), Value::Float(5.2));
//! let a = engine.create_product("Constant", params, Sources::new())?;
//!
//! let mut params = ParameterMap::new();
//! params.insert("factor".to_string(), Value::Float(2.5));
//! let scaled = engine.create_product("Scale", params, Sources::from(a))?;
//!
//! let tile = scaled.band("band_1")?.read_tile(Rectangle::new(0, 0, 64, 64))?;
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: rasters, tiles, values, the `Operator` trait and errors
//! - [`execution`]: operator contexts, tile cache, binding, provenance
//! - [`operators`]: registry, engine facade and built-in operators
//! - [`config`]: engine configuration
//!
//! ## Writing Operators
//!
//! Implement [`Operator`](core::node::Operator) and describe it with an
//! [`OperatorDescriptor`](core::node::OperatorDescriptor):
//!
//! ```rust,ignore
//! use rastergraph::prelude::*;
//!
//! #[derive(Default)]
//! struct Invert {
//!     source: Option<Arc<Band>>,
//! }
//!
//! impl Operator for Invert {
//!     fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
//!         let source = ctx.source("source")?;
//!         let band = source.band("b1")?;
//!         let target = Raster::new("inverted", source.raster_type(), source.width(), source.height());
//!         target.add_band("b1", band.pixel_type())?;
//!         self.source = Some(band);
//!         ctx.set_target(target);
//!         Ok(())
//!     }
//!
//!     fn compute_tile(&self, ctx: &ComputeContext<'_>, band: &Band, tile: &mut Tile) -> OperatorResult<()> {
//!         let source = self.source.as_ref().ok_or_else(|| ctx.error(band, tile.rectangle(), "not initialized"))?;
//!         let src = ctx.source_tile(source, tile.rectangle())?;
//!         for i in 0..src.data().len() {
//!             tile.set_f64(i, -src.get_f64(i));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut engine = Engine::with_builtins();
//! engine.register_operator(
//!     OperatorDescriptor::builder::<Invert>()
//!         .alias("Invert")
//!         .source(SourcePortDescriptor::single("source"))
//!         .build(),
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod execution;
pub mod operators;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use rastergraph::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Data model
    pub use crate::core::metadata::{MetadataAttribute, MetadataElement};
    pub use crate::core::raster::{Band, Raster, SampleReader, SampleSourceKind};
    pub use crate::core::rect::{Rectangle, TileGrid};
    pub use crate::core::tile::{Tile, TileData};
    pub use crate::core::types::{ParamType, PixelType, Value};

    // Operators
    pub use crate::core::context::{ComputeContext, InitContext, ParameterSet};
    pub use crate::core::node::{Category, ComputeMode, Operator, OperatorDescriptor, TileStack};
    pub use crate::core::port::{
        Constraint, ParameterDescriptor, SourceKind, SourcePortDescriptor, TargetPropertyDescriptor,
    };

    // Errors
    pub use crate::core::error::{
        BandId, ConfigError, ContextId, ErrorKind, OperatorError, OperatorResult, RasterId,
    };

    // Execution
    pub use crate::execution::binding::{ParameterMap, Sources};
    pub use crate::execution::cache::CacheStats;
    pub use crate::execution::context::OperatorContext;
    pub use crate::execution::materialize::{materialize, materialize_all, MaterializeStats};
    pub use crate::execution::progress::{ProgressCallback, ProgressMonitor, ProgressUpdate};
    pub use crate::execution::provenance::{processing_graph, PROCESSING_GRAPH};

    // Facade
    pub use crate::config::EngineConfig;
    pub use crate::operators::engine::Engine;
    pub use crate::operators::registry::OperatorRegistry;
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
