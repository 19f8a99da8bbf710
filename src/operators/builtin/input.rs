//! Operators producing rasters from parameters alone.

use crate::core::context::{ComputeContext, InitContext};
use crate::core::error::OperatorResult;
use crate::core::node::{Category, Operator, OperatorDescriptor};
use crate::core::port::{Constraint, ParameterDescriptor};
use crate::core::raster::{Band, Raster};
use crate::core::tile::Tile;
use crate::core::types::{ParamType, PixelType};

/// Raster whose bands all hold one constant value.
#[derive(Debug, Default)]
pub struct ConstantOp {
    value: f64,
}

impl ConstantOp {
    /// Descriptor of this operator.
    pub fn descriptor() -> OperatorDescriptor {
        OperatorDescriptor::builder::<ConstantOp>()
            .alias("Constant")
            .category(Category::Input)
            .description("Creates a raster whose bands hold a single constant value")
            .authors("Rastergraph")
            .version("1.0")
            .parameter(
                ParameterDescriptor::new("width", ParamType::Integer)
                    .with_default("512")
                    .with_constraint(Constraint::Positive),
            )
            .parameter(
                ParameterDescriptor::new("height", ParamType::Integer)
                    .with_default("512")
                    .with_constraint(Constraint::Positive),
            )
            .parameter(
                ParameterDescriptor::new("value", ParamType::Float)
                    .with_default("0.0")
                    .with_description("Sample value of every pixel"),
            )
            .parameter(
                ParameterDescriptor::new("band_names", ParamType::array_of(ParamType::String))
                    .with_default("band_1")
                    .with_constraint(Constraint::NotEmpty),
            )
            .parameter(
                ParameterDescriptor::new("pixel_type", ParamType::String)
                    .with_default("float32")
                    .with_value_set(PixelType::all().iter().map(PixelType::name)),
            )
            .parameter(
                ParameterDescriptor::new("raster_name", ParamType::String)
                    .with_default("constant"),
            )
            .build()
    }
}

impl Operator for ConstantOp {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        let params = ctx.parameters();
        let width = u32::try_from(params.get_integer("width")?)
            .map_err(|_| ctx.error("width does not fit into 32 bits"))?;
        let height = u32::try_from(params.get_integer("height")?)
            .map_err(|_| ctx.error("height does not fit into 32 bits"))?;
        let pixel_type: PixelType = params
            .get_string("pixel_type")?
            .parse()
            .map_err(|m: String| ctx.error(m))?;
        self.value = params.get_float("value")?;

        let target = Raster::new(params.get_string("raster_name")?, "CONSTANT", width, height);
        for name in params.get_string_array("band_names")? {
            target.add_band(name.trim(), pixel_type)?;
        }
        ctx.set_target(target);
        Ok(())
    }

    fn compute_tile(
        &self,
        _ctx: &ComputeContext<'_>,
        _band: &Band,
        tile: &mut Tile,
    ) -> OperatorResult<()> {
        tile.fill_f64(self.value);
        Ok(())
    }
}
