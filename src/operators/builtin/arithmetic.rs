//! Band arithmetic operators.

use crate::core::context::{ComputeContext, InitContext};
use crate::core::error::OperatorResult;
use crate::core::node::{Category, Operator, OperatorDescriptor};
use crate::core::port::{ParameterDescriptor, SourcePortDescriptor};
use crate::core::raster::{Band, Raster};
use crate::core::tile::Tile;
use crate::core::types::{ParamType, PixelType};
use indexmap::IndexMap;
use std::sync::Arc;

/// Pixel-wise sum of same-named bands across any number of sources.
#[derive(Default)]
pub struct AddOp {
    inputs: IndexMap<String, Vec<Arc<Band>>>,
}

impl AddOp {
    /// Descriptor of this operator.
    pub fn descriptor() -> OperatorDescriptor {
        OperatorDescriptor::builder::<AddOp>()
            .alias("Add")
            .category(Category::Arithmetic)
            .description("Adds the same-named bands of all sources")
            .authors("Rastergraph")
            .version("1.0")
            .source(SourcePortDescriptor::variadic("sourceProducts"))
            .parameter(
                ParameterDescriptor::new("raster_name", ParamType::String).with_default("sum"),
            )
            .build()
    }
}

impl Operator for AddOp {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        let sources = ctx.sources("sourceProducts");
        let first = match sources.first() {
            Some(first) => Arc::clone(first),
            None => return Err(ctx.error("at least one source is required")),
        };
        if let Some(other) = sources
            .iter()
            .find(|s| s.width() != first.width() || s.height() != first.height())
        {
            return Err(ctx.error(format!(
                "source '{}' is {}x{}, expected {}x{}",
                other.name(),
                other.width(),
                other.height(),
                first.width(),
                first.height()
            )));
        }

        let target = Raster::new(
            ctx.parameters().get_string("raster_name")?,
            first.raster_type(),
            first.width(),
            first.height(),
        );
        self.inputs.clear();
        for band in first.bands() {
            let inputs = sources
                .iter()
                .map(|s| s.band(band.name()))
                .collect::<OperatorResult<Vec<_>>>()?;
            target.add_band(band.name(), band.pixel_type())?;
            self.inputs.insert(band.name().to_string(), inputs);
        }
        ctx.set_target(target);
        Ok(())
    }

    fn compute_tile(
        &self,
        ctx: &ComputeContext<'_>,
        band: &Band,
        tile: &mut Tile,
    ) -> OperatorResult<()> {
        let inputs = self
            .inputs
            .get(band.name())
            .ok_or_else(|| ctx.error(band, tile.rectangle(), "band has no inputs"))?;
        let mut sums = vec![0.0; tile.data().len()];
        for input in inputs {
            ctx.check_cancelled()?;
            let src = ctx.source_tile(input, tile.rectangle())?;
            for (i, sum) in sums.iter_mut().enumerate() {
                *sum += src.get_f64(i);
            }
        }
        for (i, sum) in sums.into_iter().enumerate() {
            tile.set_f64(i, sum);
        }
        Ok(())
    }
}

/// Linear rescaling `factor * x + offset` of selected bands.
#[derive(Default)]
pub struct ScaleOp {
    factor: f64,
    offset: f64,
    inputs: IndexMap<String, Arc<Band>>,
}

impl ScaleOp {
    /// Descriptor of this operator.
    pub fn descriptor() -> OperatorDescriptor {
        OperatorDescriptor::builder::<ScaleOp>()
            .alias("Scale")
            .category(Category::Arithmetic)
            .description("Computes factor * x + offset for each selected band")
            .authors("Rastergraph")
            .version("1.0")
            .source(SourcePortDescriptor::single("source").with_alias("sourceProduct"))
            .parameter(ParameterDescriptor::new("factor", ParamType::Float).with_default("1.0"))
            .parameter(ParameterDescriptor::new("offset", ParamType::Float).with_default("0.0"))
            .parameter(
                ParameterDescriptor::new("band_names", ParamType::array_of(ParamType::String))
                    .with_description("Bands to scale; all bands when unset"),
            )
            .build()
    }
}

impl Operator for ScaleOp {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        let source = ctx.source("source")?;
        let params = ctx.parameters();
        self.factor = params.get_float("factor")?;
        self.offset = params.get_float("offset")?;
        let selected = match params.get("band_names") {
            Some(_) => params
                .get_string_array("band_names")?
                .iter()
                .map(|name| source.band(name.trim()))
                .collect::<OperatorResult<Vec<_>>>()?,
            None => source.bands(),
        };

        let target = Raster::new(
            format!("{}_scaled", source.name()),
            source.raster_type(),
            source.width(),
            source.height(),
        );
        self.inputs.clear();
        for band in selected {
            let pixel_type = match band.pixel_type() {
                PixelType::Float64 => PixelType::Float64,
                _ => PixelType::Float32,
            };
            target.add_band(band.name(), pixel_type)?;
            self.inputs.insert(band.name().to_string(), band);
        }
        ctx.set_target(target);
        Ok(())
    }

    fn compute_tile(
        &self,
        ctx: &ComputeContext<'_>,
        band: &Band,
        tile: &mut Tile,
    ) -> OperatorResult<()> {
        let input = self
            .inputs
            .get(band.name())
            .ok_or_else(|| ctx.error(band, tile.rectangle(), "band has no input"))?;
        let src = ctx.source_tile(input, tile.rectangle())?;
        for i in 0..src.data().len() {
            tile.set_f64(i, self.factor * src.get_f64(i) + self.offset);
        }
        Ok(())
    }
}
