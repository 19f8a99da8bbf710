//! Spectral index operators.

use crate::core::context::{ComputeContext, InitContext};
use crate::core::error::{OperatorError, OperatorResult};
use crate::core::node::{Category, ComputeMode, Operator, OperatorDescriptor, TileStack};
use crate::core::port::{ParameterDescriptor, SourcePortDescriptor};
use crate::core::raster::{Band, Raster};
use crate::core::rect::Rectangle;
use crate::core::types::{ParamType, PixelType};
use std::sync::Arc;

/// Name of the index band.
pub const NDI_BAND: &str = "ndi";
/// Name of the flag band.
pub const NDI_FLAGS_BAND: &str = "ndi_flags";

/// Flag: `a + b` was zero or a sample was not a number.
pub const FLAG_INVALID: u8 = 0x01;
/// Flag: the index is negative.
pub const FLAG_NEGATIVE: u8 = 0x02;

/// Normalized difference `(a - b) / (a + b)` of two bands, with a flag band.
///
/// Both target bands are computed together, one rectangle at a time.
#[derive(Default)]
pub struct NormalizedDifferenceOp {
    a: Option<Arc<Band>>,
    b: Option<Arc<Band>>,
    invalid_value: f64,
}

impl NormalizedDifferenceOp {
    /// Descriptor of this operator.
    pub fn descriptor() -> OperatorDescriptor {
        OperatorDescriptor::builder::<NormalizedDifferenceOp>()
            .alias("NormalizedDifference")
            .alias("NDI")
            .category(Category::Analysis)
            .description("Computes (a - b) / (a + b) and a flag band")
            .authors("Rastergraph")
            .version("1.0")
            .source(SourcePortDescriptor::single("source").with_alias("sourceProduct"))
            .parameter(ParameterDescriptor::new("a_band", ParamType::String).required())
            .parameter(ParameterDescriptor::new("b_band", ParamType::String).required())
            .parameter(
                ParameterDescriptor::new("invalid_value", ParamType::Float)
                    .with_default("NaN")
                    .with_description("Index value written where the index is undefined"),
            )
            .build()
    }
}

impl Operator for NormalizedDifferenceOp {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        let source = ctx.source("source")?;
        let params = ctx.parameters();
        let a = source.band(params.get_string("a_band")?)?;
        let b = source.band(params.get_string("b_band")?)?;
        self.invalid_value = params.get_float("invalid_value")?;

        let target = Raster::new(
            format!("{}_ndi", source.name()),
            source.raster_type(),
            source.width(),
            source.height(),
        );
        target.add_band(NDI_BAND, PixelType::Float32)?;
        target.add_band(NDI_FLAGS_BAND, PixelType::UInt8)?;
        self.a = Some(a);
        self.b = Some(b);
        ctx.set_target(target);
        Ok(())
    }

    fn compute_mode(&self) -> ComputeMode {
        ComputeMode::TileStack
    }

    fn compute_tile_stack(
        &self,
        ctx: &ComputeContext<'_>,
        rect: Rectangle,
        tiles: &mut TileStack,
    ) -> OperatorResult<()> {
        let (a, b) = match (&self.a, &self.b) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(OperatorError::computation(
                    ctx.operator_name(),
                    tiles_band(tiles),
                    rect,
                    "not initialized",
                ))
            }
        };
        let a = ctx.source_tile(a, rect)?;
        let b = ctx.source_tile(b, rect)?;

        let mut values = Vec::with_capacity(a.data().len());
        for i in 0..a.data().len() {
            let (va, vb) = (a.get_f64(i), b.get_f64(i));
            let sum = va + vb;
            if sum == 0.0 || va.is_nan() || vb.is_nan() {
                values.push((self.invalid_value, FLAG_INVALID));
            } else {
                let ndi = (va - vb) / sum;
                values.push((ndi, if ndi < 0.0 { FLAG_NEGATIVE } else { 0 }));
            }
        }

        if let Some(tile) = tiles.get_mut(NDI_BAND) {
            for (i, (ndi, _)) in values.iter().enumerate() {
                tile.set_f64(i, *ndi);
            }
        }
        if let Some(tile) = tiles.get_mut(NDI_FLAGS_BAND) {
            for (i, (_, flags)) in values.iter().enumerate() {
                tile.set_f64(i, *flags as f64);
            }
        }
        Ok(())
    }
}

fn tiles_band(tiles: &TileStack) -> &str {
    tiles.keys().next().map(String::as_str).unwrap_or(NDI_BAND)
}
