//! Geometric operators.

use crate::core::context::{ComputeContext, InitContext};
use crate::core::error::OperatorResult;
use crate::core::node::{Category, Operator, OperatorDescriptor};
use crate::core::port::{Constraint, ParameterDescriptor, SourcePortDescriptor, TargetPropertyDescriptor};
use crate::core::raster::{Band, Raster};
use crate::core::rect::Rectangle;
use crate::core::tile::Tile;
use crate::core::types::{ParamType, Value};
use indexmap::IndexMap;
use std::sync::Arc;

/// Spatial and band subset of a source raster.
#[derive(Default)]
pub struct SubsetOp {
    region: Rectangle,
    inputs: IndexMap<String, Arc<Band>>,
}

impl SubsetOp {
    /// Descriptor of this operator.
    pub fn descriptor() -> OperatorDescriptor {
        OperatorDescriptor::builder::<SubsetOp>()
            .alias("Subset")
            .category(Category::Geometric)
            .description("Extracts a rectangular region and a selection of bands")
            .authors("Rastergraph")
            .version("1.0")
            .source(SourcePortDescriptor::single("source").with_alias("sourceProduct"))
            .parameter(
                ParameterDescriptor::new("region", ParamType::array_of(ParamType::Integer))
                    .with_description("x,y,width,height in source pixels; whole raster when unset")
                    .with_constraint(Constraint::Length(4))
                    .with_range(0.0, u32::MAX as f64),
            )
            .parameter(
                ParameterDescriptor::new("band_names", ParamType::array_of(ParamType::String))
                    .with_description("Bands to keep; all bands when unset"),
            )
            .target_property(
                TargetPropertyDescriptor::new("effective_region").with_alias("region"),
            )
            .build()
    }
}

impl Operator for SubsetOp {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        let source = ctx.source("source")?;
        let params = ctx.parameters();

        let requested = match params.get("region") {
            Some(_) => {
                let r: Vec<u32> = params
                    .get_integer_array("region")?
                    .into_iter()
                    .map(|v| v as u32)
                    .collect();
                Rectangle::new(r[0], r[1], r[2], r[3])
            }
            None => source.bounds(),
        };
        let region = requested.clamp_to(source.width(), source.height());
        if region.is_empty() {
            return Err(ctx.error(format!(
                "region {} does not intersect the source raster",
                requested
            )));
        }

        let selected = match params.get("band_names") {
            Some(_) => params
                .get_string_array("band_names")?
                .iter()
                .map(|name| source.band(name.trim()))
                .collect::<OperatorResult<Vec<_>>>()?,
            None => source.bands(),
        };

        let target = Raster::new(
            format!("{}_subset", source.name()),
            source.raster_type(),
            region.width,
            region.height,
        );
        self.inputs.clear();
        for band in selected {
            target.add_band(band.name(), band.pixel_type())?;
            self.inputs.insert(band.name().to_string(), band);
        }
        self.region = region;

        ctx.set_target_property(
            "effective_region",
            Value::Array(
                [region.x, region.y, region.width, region.height]
                    .iter()
                    .map(|&v| Value::Integer(v as i64))
                    .collect(),
            ),
        )?;
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
        let rect = tile.rectangle();
        let src = ctx.source_tile(
            input,
            rect.translate(self.region.x as i64, self.region.y as i64),
        )?;
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let value = src.sample_f64(x + self.region.x, y + self.region.y);
                tile.set_sample_f64(x, y, value);
            }
        }
        Ok(())
    }
}
