//! Built-in operator implementations.
//!
//! This module contains the standard operators that ship with rastergraph.

mod analysis;
mod arithmetic;
mod geometric;
mod input;
mod utility;

use crate::operators::registry::OperatorRegistry;

/// Register all built-in operators.
pub fn register_all(registry: &mut OperatorRegistry) {
    registry.register(ConstantOp::descriptor());
    registry.register(AddOp::descriptor());
    registry.register(ScaleOp::descriptor());
    registry.register(SubsetOp::descriptor());
    registry.register(PassThroughOp::descriptor());
    registry.register(NormalizedDifferenceOp::descriptor());
}

// Re-export for direct access
pub use analysis::{
    NormalizedDifferenceOp, FLAG_INVALID, FLAG_NEGATIVE, NDI_BAND, NDI_FLAGS_BAND,
};
pub use arithmetic::{AddOp, ScaleOp};
pub use geometric::SubsetOp;
pub use input::ConstantOp;
pub use utility::PassThroughOp;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rect::Rectangle;
    use crate::core::types::Value;
    use crate::execution::binding::{ParameterMap, Sources};
    use crate::operators::engine::Engine;

    fn params(pairs: &[(&str, Value)]) -> ParameterMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_all_registered() {
        let registry = OperatorRegistry::with_builtins();
        for name in ["Constant", "Add", "Scale", "Subset", "PassThrough", "NDI"] {
            assert!(registry.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_constant_defaults() {
        let engine = Engine::with_builtins();
        let raster = engine
            .create_product("Constant", params(&[("value", Value::Float(3.0))]), Sources::new())
            .unwrap();
        assert_eq!((raster.width(), raster.height()), (512, 512));
        assert_eq!(raster.band_names(), vec!["band_1"]);
        let tile = raster.band("band_1").unwrap().read_tile(Rectangle::new(0, 0, 2, 2)).unwrap();
        assert_eq!(tile.samples_f64(), vec![3.0; 4]);
    }

    #[test]
    fn test_subset_region_and_property() {
        let engine = Engine::with_builtins();
        let source = crate::core::raster::Raster::new("grid", "TEST", 6, 4);
        source
            .add_band("b1", crate::core::types::PixelType::Int32)
            .unwrap()
            .fill_with(|x, y| (y * 6 + x) as f64)
            .unwrap();

        let context = engine
            .create_operator(
                "Subset",
                params(&[("region", Value::from("2,1,10,10"))]),
                Sources::from(source),
            )
            .unwrap();
        let target = context.target_raster().unwrap();
        assert_eq!((target.width(), target.height()), (4, 3));
        assert_eq!(
            context.target_property("region").unwrap(),
            Some(Value::Array(vec![
                Value::Integer(2),
                Value::Integer(1),
                Value::Integer(4),
                Value::Integer(3)
            ]))
        );
        let samples = target
            .band("b1")
            .unwrap()
            .read_samples_f64(Rectangle::new(0, 0, 2, 1))
            .unwrap();
        assert_eq!(samples, vec![8.0, 9.0]);
    }

    #[test]
    fn test_normalized_difference_flags() {
        let engine = Engine::with_builtins();
        let source = crate::core::raster::Raster::new("scene", "TEST", 3, 1);
        let nir = source.add_band("nir", crate::core::types::PixelType::Float32).unwrap();
        let red = source.add_band("red", crate::core::types::PixelType::Float32).unwrap();
        nir.set_samples_f64(&[3.0, 0.0, 1.0]).unwrap();
        red.set_samples_f64(&[1.0, 0.0, 3.0]).unwrap();

        let target = engine
            .create_product(
                "NormalizedDifference",
                params(&[("a_band", Value::from("nir")), ("b_band", Value::from("red"))]),
                Sources::from(source),
            )
            .unwrap();
        let ndi = target.band(NDI_BAND).unwrap().read_samples_f64(target.bounds()).unwrap();
        let flags = target.band(NDI_FLAGS_BAND).unwrap().read_samples_f64(target.bounds()).unwrap();
        assert_eq!(ndi[0], 0.5);
        assert!(ndi[1].is_nan());
        assert_eq!(ndi[2], -0.5);
        assert_eq!(
            flags,
            vec![0.0, FLAG_INVALID as f64, FLAG_NEGATIVE as f64]
        );
    }
}
