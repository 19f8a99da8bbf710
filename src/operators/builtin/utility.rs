//! Utility operators.

use crate::core::context::{ComputeContext, InitContext};
use crate::core::error::OperatorResult;
use crate::core::node::{Category, Operator, OperatorDescriptor};
use crate::core::port::{ParameterDescriptor, SourcePortDescriptor};
use crate::core::raster::Band;
use crate::core::tile::Tile;
use crate::core::types::ParamType;
use std::sync::Arc;

/// Returns its source unchanged, optionally adding a copy of one band.
///
/// The target is the source raster itself, so the context is pass-through:
/// existing bands keep their samples and only the added copy is computed.
#[derive(Default)]
pub struct PassThroughOp {
    original: Option<Arc<Band>>,
}

impl PassThroughOp {
    /// Descriptor of this operator.
    pub fn descriptor() -> OperatorDescriptor {
        OperatorDescriptor::builder::<PassThroughOp>()
            .alias("PassThrough")
            .category(Category::Utility)
            .description("Passes the source through, optionally adding a band copy")
            .authors("Rastergraph")
            .version("1.0")
            .source(SourcePortDescriptor::single("source").with_alias("sourceProduct"))
            .parameter(
                ParameterDescriptor::new("copy_band", ParamType::String)
                    .with_description("Band to duplicate as '<name>_copy'"),
            )
            .build()
    }
}

impl Operator for PassThroughOp {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        let source = ctx.source("source")?;
        self.original = None;
        if ctx.parameters().contains("copy_band") {
            let band = source.band(ctx.parameters().get_string("copy_band")?)?;
            source.add_band(format!("{}_copy", band.name()), band.pixel_type())?;
            self.original = Some(band);
        }
        ctx.set_target(source);
        Ok(())
    }

    fn compute_tile(
        &self,
        ctx: &ComputeContext<'_>,
        band: &Band,
        tile: &mut Tile,
    ) -> OperatorResult<()> {
        let original = self
            .original
            .as_ref()
            .ok_or_else(|| ctx.error(band, tile.rectangle(), "no band to copy"))?;
        let src = ctx.source_tile(original, tile.rectangle())?;
        tile.copy_from(&src);
        Ok(())
    }
}
