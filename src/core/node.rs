//! The `Operator` trait and operator descriptors.
//!
//! An operator is a computation node with a two-phase life:
//!
//! 1. **Initialization** (`initialize`): runs at most once, lazily, the first
//!    time the target raster or a target property is requested. It reads
//!    bound parameters and the *structure* of its sources, and builds the
//!    target raster (bands, sizes, pixel types) without computing pixels.
//!
//! 2. **Computation** (`compute_tile` or `compute_tile_stack`): called by the
//!    pull scheduler only, for tiles that are not cached yet. Source pixels are
//!    obtained exclusively through [`ComputeContext::source_tile`].
//!
//! An [`OperatorDescriptor`] carries everything known about an operator type
//! before an instance exists: names, parameter and port schema, and a factory.

use crate::core::context::{ComputeContext, InitContext};
use crate::core::error::{OperatorError, OperatorResult};
use crate::core::port::{ParameterDescriptor, SourcePortDescriptor, TargetPropertyDescriptor};
use crate::core::raster::Band;
use crate::core::rect::Rectangle;
use crate::core::tile::Tile;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tiles of several bands covering the same rectangle, keyed by band name.
pub type TileStack = IndexMap<String, Tile>;

/// Category for organizing operators in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Operators producing rasters from parameters alone
    Input,
    /// Band arithmetic
    Arithmetic,
    /// Subsetting, resampling and other geometric operations
    Geometric,
    /// Spectral indices and classification
    Analysis,
    /// Utility operators
    Utility,
    /// Custom/user-defined
    #[default]
    Custom,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Input => "Input",
            Category::Arithmetic => "Arithmetic",
            Category::Geometric => "Geometric",
            Category::Analysis => "Analysis",
            Category::Utility => "Utility",
            Category::Custom => "Custom",
        }
    }
}

/// How an operator fills its target bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeMode {
    /// One band, one tile per call.
    #[default]
    Tile,
    /// All computed bands of one rectangle per call.
    TileStack,
}

/// The core trait for raster operators.
///
/// `Send + Sync` lets a host evaluate independent targets on different
/// threads.
///
/// An operator may keep its source rasters and bands. It must not keep its
/// target raster: the target owns the operator's context, so holding it
/// would keep the whole graph alive.
///
/// # Example Implementation
///
/// ```ignore
/// #[derive(Default)]
/// struct Negate {
///     source: Option<Arc<Band>>,
/// }
///
/// impl Operator for Negate {
///     fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
///         let source = ctx.source("source")?;
///         let target = Raster::new("negated", source.raster_type(), source.width(), source.height());
///         let band = source.band("b1")?;
///         target.add_band("b1", band.pixel_type())?;
///         self.source = Some(band);
///         ctx.set_target(target);
///         Ok(())
///     }
///
///     fn compute_tile(&self, ctx: &ComputeContext<'_>, _band: &Band, tile: &mut Tile) -> OperatorResult<()> {
///         let src = ctx.source_tile(self.source.as_ref().unwrap(), tile.rectangle())?;
///         for i in 0..src.data().len() {
///             tile.set_f64(i, -src.get_f64(i));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Operator: Send + Sync {
    /// Build the target raster structure.
    ///
    /// Must call [`InitContext::set_target`]. May mutate bound parameters and
    /// set declared target properties.
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()>;

    /// Which compute entry point the scheduler calls.
    fn compute_mode(&self) -> ComputeMode {
        ComputeMode::Tile
    }

    /// Fill `tile` for `band`.
    ///
    /// The tile arrives zero-filled and sized to the request.
    fn compute_tile(
        &self,
        ctx: &ComputeContext<'_>,
        band: &Band,
        tile: &mut Tile,
    ) -> OperatorResult<()> {
        let _ = tile;
        Err(OperatorError::NotImplemented {
            operator: ctx.operator_name().to_string(),
            band: band.name().to_string(),
        })
    }

    /// Fill the tiles of every computed band for `rect`.
    fn compute_tile_stack(
        &self,
        ctx: &ComputeContext<'_>,
        rect: Rectangle,
        tiles: &mut TileStack,
    ) -> OperatorResult<()> {
        let _ = rect;
        Err(OperatorError::NotImplemented {
            operator: ctx.operator_name().to_string(),
            band: tiles.keys().cloned().collect::<Vec<_>>().join(","),
        })
    }

    /// Release operator resources.
    ///
    /// Default implementation does nothing.
    fn dispose(&mut self) {}
}

/// Factory function for creating operator instances.
pub type OperatorFactory = Arc<dyn Fn() -> Box<dyn Operator> + Send + Sync>;

/// Static description of an operator type.
#[derive(Clone)]
pub struct OperatorDescriptor {
    /// Class identity (short type name, e.g., "ScaleOp")
    pub name: String,
    /// Alternative names; the first one is the display name
    pub aliases: Vec<String>,
    /// Category for listings
    pub category: Category,
    /// Purpose of the operator
    pub description: String,
    /// Authors
    pub authors: String,
    /// Version string
    pub version: String,
    /// Copyright notice
    pub copyright: String,
    /// Parameter schema
    pub parameters: Vec<ParameterDescriptor>,
    /// Source port schema
    pub source_ports: Vec<SourcePortDescriptor>,
    /// Target property schema
    pub target_properties: Vec<TargetPropertyDescriptor>,
    factory: OperatorFactory,
}

impl OperatorDescriptor {
    /// Start a descriptor for an operator type constructible with `Default`.
    ///
    /// The class identity is the type's short name.
    pub fn builder<T>() -> OperatorDescriptorBuilder
    where
        T: Operator + Default + 'static,
    {
        OperatorDescriptorBuilder::new(short_type_name::<T>(), Arc::new(|| Box::new(T::default())))
    }

    /// Start a descriptor with an explicit name and factory.
    pub fn builder_with<F>(name: impl Into<String>, factory: F) -> OperatorDescriptorBuilder
    where
        F: Fn() -> Box<dyn Operator> + Send + Sync + 'static,
    {
        OperatorDescriptorBuilder::new(name.into(), Arc::new(factory))
    }

    /// Name shown in listings and lineage records.
    pub fn display_name(&self) -> &str {
        self.aliases.first().map(String::as_str).unwrap_or(&self.name)
    }

    /// Class name followed by every alias.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Create a fresh operator instance.
    pub fn create(&self) -> Box<dyn Operator> {
        (self.factory)()
    }

    /// Look up a parameter declaration.
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Look up a source port by name or alias.
    pub fn source_port(&self, name: &str) -> Option<&SourcePortDescriptor> {
        self.source_ports.iter().find(|p| p.answers_to(name))
    }
}

impl std::fmt::Debug for OperatorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("category", &self.category)
            .field("parameters", &self.parameters.len())
            .field("source_ports", &self.source_ports.len())
            .finish()
    }
}

/// Builder for [`OperatorDescriptor`].
pub struct OperatorDescriptorBuilder {
    descriptor: OperatorDescriptor,
}

impl OperatorDescriptorBuilder {
    fn new(name: String, factory: OperatorFactory) -> Self {
        Self {
            descriptor: OperatorDescriptor {
                name,
                aliases: Vec::new(),
                category: Category::default(),
                description: String::new(),
                authors: String::new(),
                version: "1.0".to_string(),
                copyright: String::new(),
                parameters: Vec::new(),
                source_ports: Vec::new(),
                target_properties: Vec::new(),
                factory,
            },
        }
    }

    /// Add an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.descriptor.aliases.push(alias.into());
        self
    }

    /// Set the category.
    pub fn category(mut self, category: Category) -> Self {
        self.descriptor.category = category;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = description.into();
        self
    }

    /// Set the authors.
    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.descriptor.authors = authors.into();
        self
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.descriptor.version = version.into();
        self
    }

    /// Set the copyright notice.
    pub fn copyright(mut self, copyright: impl Into<String>) -> Self {
        self.descriptor.copyright = copyright.into();
        self
    }

    /// Declare a parameter.
    pub fn parameter(mut self, param: ParameterDescriptor) -> Self {
        self.descriptor.parameters.push(param);
        self
    }

    /// Declare a source port.
    pub fn source(mut self, port: SourcePortDescriptor) -> Self {
        self.descriptor.source_ports.push(port);
        self
    }

    /// Declare a target property.
    pub fn target_property(mut self, property: TargetPropertyDescriptor) -> Self {
        self.descriptor.target_properties.push(property);
        self
    }

    /// Build the descriptor.
    pub fn build(self) -> OperatorDescriptor {
        self.descriptor
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
