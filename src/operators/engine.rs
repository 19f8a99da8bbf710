//! The engine facade.
//!
//! [`Engine`] owns an [`OperatorRegistry`] and an [`EngineConfig`] and is the
//! entry point for creating products:
//!
//! ```ignore
//! let engine = Engine::with_builtins();
//! let mut params = ParameterMap::new();
//! params.insert("factor".into(), Value::Float(2.5));
//! let scaled = engine.create_product("Scale", params, Sources::from(input))?;
//! let tile = scaled.band("b1")?.read_tile(Rectangle::new(0, 0, 256, 256))?;
//! ```

use crate::config::EngineConfig;
use crate::core::error::{OperatorError, OperatorResult};
use crate::core::node::OperatorDescriptor;
use crate::core::raster::Raster;
use crate::execution::binding::{bind_parameters, ParameterMap, Sources};
use crate::execution::context::OperatorContext;
use crate::operators::registry::OperatorRegistry;
use std::sync::Arc;

/// Creates operator instances and their target products.
pub struct Engine {
    registry: OperatorRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine with an empty registry and default configuration.
    pub fn new() -> Self {
        Self::with_registry(OperatorRegistry::new(), EngineConfig::default())
    }

    /// Create an engine with the built-in operators registered.
    pub fn with_builtins() -> Self {
        Self::with_registry(OperatorRegistry::with_builtins(), EngineConfig::default())
    }

    /// Create an engine from a registry and a configuration.
    pub fn with_registry(registry: OperatorRegistry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The operator registry.
    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Mutable access to the operator registry.
    pub fn registry_mut(&mut self) -> &mut OperatorRegistry {
        &mut self.registry
    }

    /// The current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register an operator type.
    pub fn register_operator(&mut self, descriptor: OperatorDescriptor) -> Arc<OperatorDescriptor> {
        self.registry.register(descriptor)
    }

    /// Unregister an operator type by class name or alias.
    pub fn remove_operator(&mut self, name: &str) -> Option<Arc<OperatorDescriptor>> {
        self.registry.remove(name)
    }

    /// Look up an operator type by class name or alias.
    pub fn lookup_operator(&self, name: &str) -> OperatorResult<Arc<OperatorDescriptor>> {
        self.registry
            .lookup(name)
            .ok_or_else(|| OperatorError::NoSuchOperator {
                name: name.to_string(),
            })
    }

    /// Disable or re-enable tile caching for contexts created from now on.
    pub fn set_tile_cache_disabled(&mut self, disabled: bool) {
        self.config.disable_tile_cache = disabled;
    }

    /// Create an operator instance without initializing it.
    ///
    /// Parameters are bound and defaults applied here; sources are bound
    /// when the operator initializes.
    pub fn create_operator(
        &self,
        name: &str,
        parameters: ParameterMap,
        sources: impl Into<Sources>,
    ) -> OperatorResult<Arc<OperatorContext>> {
        let descriptor = self.lookup_operator(name)?;
        let bound = bind_parameters(&descriptor, &parameters)?;
        let operator = descriptor.create();
        Ok(OperatorContext::new(
            descriptor,
            operator,
            bound,
            sources.into(),
            &self.config,
        ))
    }

    /// Create an operator instance and return its (initialized) target raster.
    ///
    /// No pixel is computed until a band of the target is read.
    pub fn create_product(
        &self,
        name: &str,
        parameters: ParameterMap,
        sources: impl Into<Sources>,
    ) -> OperatorResult<Arc<Raster>> {
        self.create_operator(name, parameters, sources)?.target_raster()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_builtins()
    }
}
