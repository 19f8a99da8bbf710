//! Contexts handed to operators.
//!
//! - [`InitContext`] during initialization: bound parameters, bound sources,
//!   and the slots for the target raster and target properties.
//! - [`ComputeContext`] during computation: source tile access and the
//!   progress monitor of the current read.
//!
//! [`ParameterSet`] holds bound parameter values with typed getters.

use crate::core::error::{OperatorError, OperatorResult};
use crate::core::port::TargetPropertyDescriptor;
use crate::core::raster::{Band, Raster};
use crate::core::rect::Rectangle;
use crate::core::tile::Tile;
use crate::core::types::Value;
use crate::execution::binding::BoundSources;
use crate::execution::pass::ReadPass;
use crate::execution::progress::ProgressMonitor;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Bound parameter values of one operator instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    operator: String,
    values: IndexMap<String, Value>,
}

impl ParameterSet {
    /// Create a parameter set for an operator.
    pub fn new(operator: impl Into<String>, values: IndexMap<String, Value>) -> Self {
        Self {
            operator: operator.into(),
            values,
        }
    }

    fn invalid(&self, name: &str, message: impl Into<String>) -> OperatorError {
        OperatorError::InvalidParameter {
            operator: self.operator.clone(),
            parameter: name.to_string(),
            message: message.into(),
        }
    }

    /// Value of a parameter, if set.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Value of a parameter, failing if unset.
    pub fn value(&self, name: &str) -> OperatorResult<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| self.invalid(name, "not set"))
    }

    /// Get an integer parameter.
    pub fn get_integer(&self, name: &str) -> OperatorResult<i64> {
        self.value(name)?
            .as_integer()
            .ok_or_else(|| self.invalid(name, "expected integer"))
    }

    /// Get a float parameter.
    pub fn get_float(&self, name: &str) -> OperatorResult<f64> {
        self.value(name)?
            .as_float()
            .ok_or_else(|| self.invalid(name, "expected float"))
    }

    /// Get a string parameter.
    pub fn get_string(&self, name: &str) -> OperatorResult<&str> {
        self.value(name)?
            .as_string()
            .ok_or_else(|| self.invalid(name, "expected string"))
    }

    /// Get a boolean parameter.
    pub fn get_bool(&self, name: &str) -> OperatorResult<bool> {
        self.value(name)?
            .as_bool()
            .ok_or_else(|| self.invalid(name, "expected boolean"))
    }

    /// Get a character parameter.
    pub fn get_char(&self, name: &str) -> OperatorResult<char> {
        self.value(name)?
            .as_char()
            .ok_or_else(|| self.invalid(name, "expected character"))
    }

    /// Get a date parameter.
    pub fn get_date(&self, name: &str) -> OperatorResult<NaiveDateTime> {
        self.value(name)?
            .as_date()
            .ok_or_else(|| self.invalid(name, "expected date"))
    }

    /// Get a path parameter.
    pub fn get_path(&self, name: &str) -> OperatorResult<PathBuf> {
        self.value(name)?
            .as_path()
            .cloned()
            .ok_or_else(|| self.invalid(name, "expected path"))
    }

    /// Get a string array parameter.
    pub fn get_string_array(&self, name: &str) -> OperatorResult<Vec<String>> {
        self.array(name, |v| v.as_string().map(str::to_string), "string")
    }

    /// Get an integer array parameter.
    pub fn get_integer_array(&self, name: &str) -> OperatorResult<Vec<i64>> {
        self.array(name, Value::as_integer, "integer")
    }

    /// Get a float array parameter.
    pub fn get_float_array(&self, name: &str) -> OperatorResult<Vec<f64>> {
        self.array(name, Value::as_float, "float")
    }

    fn array<T>(
        &self,
        name: &str,
        convert: impl Fn(&Value) -> Option<T>,
        what: &str,
    ) -> OperatorResult<Vec<T>> {
        let items = self
            .value(name)?
            .as_array()
            .ok_or_else(|| self.invalid(name, format!("expected {} array", what)))?;
        items
            .iter()
            .map(|v| convert(v).ok_or_else(|| self.invalid(name, format!("expected {} array", what))))
            .collect()
    }

    /// Set or replace a parameter value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Check if a parameter is set.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate over `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameter is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Context passed to [`Operator::initialize`](crate::core::node::Operator::initialize).
pub struct InitContext<'a> {
    operator: &'a str,
    parameters: &'a mut ParameterSet,
    sources: &'a BoundSources,
    properties: &'a [TargetPropertyDescriptor],
    target: Option<Arc<Raster>>,
    property_values: IndexMap<String, Value>,
}

impl<'a> InitContext<'a> {
    pub(crate) fn new(
        operator: &'a str,
        parameters: &'a mut ParameterSet,
        sources: &'a BoundSources,
        properties: &'a [TargetPropertyDescriptor],
    ) -> Self {
        Self {
            operator,
            parameters,
            sources,
            properties,
            target: None,
            property_values: IndexMap::new(),
        }
    }

    /// Display name of the operator being initialized.
    pub fn operator_name(&self) -> &str {
        self.operator
    }

    /// Bound parameters.
    pub fn parameters(&self) -> &ParameterSet {
        self.parameters
    }

    /// Mutable bound parameters. Changes are kept after initialization.
    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        self.parameters
    }

    /// The raster bound to a single port.
    pub fn source(&self, port: &str) -> OperatorResult<Arc<Raster>> {
        self.sources
            .source(port)
            .cloned()
            .ok_or_else(|| OperatorError::InvalidSource {
                operator: self.operator.to_string(),
                port: port.to_string(),
                message: "no source bound".to_string(),
            })
    }

    /// The raster bound to an optional single port.
    pub fn optional_source(&self, port: &str) -> Option<Arc<Raster>> {
        self.sources.source(port).cloned()
    }

    /// All rasters bound to a port.
    pub fn sources(&self, port: &str) -> Vec<Arc<Raster>> {
        self.sources.sources(port).to_vec()
    }

    /// Every distinct source raster, in binding order.
    pub fn all_sources(&self) -> Vec<Arc<Raster>> {
        self.sources.all()
    }

    /// Set the target raster.
    ///
    /// Passing one of the sources makes the operator pass-through.
    pub fn set_target(&mut self, target: Arc<Raster>) {
        self.target = Some(target);
    }

    /// The target raster set so far.
    pub fn target(&self) -> Option<&Arc<Raster>> {
        self.target.as_ref()
    }

    /// Set a declared target property.
    pub fn set_target_property(&mut self, name: &str, value: Value) -> OperatorResult<()> {
        let declared = self
            .properties
            .iter()
            .find(|p| p.name == name || p.alias.as_deref() == Some(name))
            .ok_or_else(|| {
                OperatorError::config(self.operator, format!("undeclared target property '{}'", name))
            })?;
        self.property_values.insert(declared.name.clone(), value);
        Ok(())
    }

    /// A configuration error attributed to this operator.
    pub fn error(&self, message: impl Into<String>) -> OperatorError {
        OperatorError::config(self.operator, message)
    }

    pub(crate) fn into_parts(self) -> (Option<Arc<Raster>>, IndexMap<String, Value>) {
        (self.target, self.property_values)
    }
}

/// Context passed to the compute methods of an operator.
pub struct ComputeContext<'a> {
    operator: &'a str,
    pass: &'a ReadPass<'a>,
}

impl<'a> ComputeContext<'a> {
    pub(crate) fn new(operator: &'a str, pass: &'a ReadPass<'a>) -> Self {
        Self { operator, pass }
    }

    /// Display name of the operator computing.
    pub fn operator_name(&self) -> &str {
        self.operator
    }

    /// Samples of a source band covering `rect`, clamped to the band bounds.
    ///
    /// Engine-managed bands are pulled through their own context (and cache);
    /// other bands are read directly.
    pub fn source_tile(&self, band: &Band, rect: Rectangle) -> OperatorResult<Arc<Tile>> {
        band.read_tile_in(rect, self.pass)
    }

    /// The progress monitor of the current read.
    pub fn monitor(&self) -> &ProgressMonitor {
        self.pass.monitor()
    }

    /// Return `Err(Cancelled)` if the current read was cancelled.
    pub fn check_cancelled(&self) -> OperatorResult<()> {
        self.pass.monitor().check_cancelled()
    }

    /// A computation error attributed to this operator.
    pub fn error(&self, band: &Band, rect: Rectangle, message: impl Into<String>) -> OperatorError {
        OperatorError::computation(self.operator, band.name(), rect, message)
    }
}
