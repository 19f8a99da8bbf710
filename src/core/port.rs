//! Declarative schema of operator parameters, source ports and target properties.
//!
//! These descriptors replace runtime field introspection: every operator type
//! lists what it accepts, and the binding routine in
//! [`execution::binding`](crate::execution::binding) checks and fills values
//! against them before the operator is initialized.

use crate::core::types::{ParamType, Value};
use serde::{Deserialize, Serialize};

/// Declaration of one operator parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Parameter name (e.g., "scale_factor")
    pub name: String,
    /// Human-readable label
    pub label: String,
    /// Declared type
    pub param_type: ParamType,
    /// Default value as a literal, converted on binding
    pub default_literal: Option<String>,
    /// Whether a value must be present after defaults are applied
    pub required: bool,
    /// Description for help output
    pub description: String,
    /// Constraints checked on binding
    pub constraints: Vec<Constraint>,
}

impl ParameterDescriptor {
    /// Create a new optional parameter without default.
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        let name = name.into();
        Self {
            label: name_to_label(&name),
            name,
            param_type,
            default_literal: None,
            required: false,
            description: String::new(),
            constraints: Vec::new(),
        }
    }

    /// Set the default literal.
    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.default_literal = Some(literal.into());
        self
    }

    /// Mark the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a range constraint.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }

    /// Restrict the value to a set of literals.
    pub fn with_value_set<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .filter_map(|literal| self.param_type.parse_literal(&literal.into()).ok())
            .collect();
        self.constraints.push(Constraint::OneOf(values));
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Check a bound value against all constraints.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if !self.param_type.matches(value) {
            return Err(format!(
                "expected {}, got {}",
                self.param_type,
                value.get_type()
            ));
        }
        for constraint in &self.constraints {
            constraint.validate(value)?;
        }
        Ok(())
    }
}

/// Constraints on parameter values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Constraint {
    /// Numeric value must be within range [min, max]
    Range { min: f64, max: f64 },
    /// Numeric value must be > 0
    Positive,
    /// String or array must not be empty
    NotEmpty,
    /// Array length must equal the given count
    Length(usize),
    /// Value must be one of the specified options
    OneOf(Vec<Value>),
}

impl Constraint {
    /// Validate a value against this constraint.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            Constraint::Range { min, max } => {
                let values: Vec<f64> = match value {
                    Value::Array(items) => items.iter().filter_map(Value::as_float).collect(),
                    other => other.as_float().into_iter().collect(),
                };
                for num in values {
                    if num < *min || num > *max {
                        return Err(format!("value {} is out of range [{}, {}]", num, min, max));
                    }
                }
            }
            Constraint::Positive => {
                if let Some(num) = value.as_float() {
                    if num <= 0.0 {
                        return Err(format!("value {} must be positive", num));
                    }
                }
            }
            Constraint::NotEmpty => {
                let empty = match value {
                    Value::String(s) => s.trim().is_empty(),
                    Value::Array(arr) => arr.is_empty(),
                    _ => false,
                };
                if empty {
                    return Err("value must not be empty".to_string());
                }
            }
            Constraint::Length(len) => {
                if let Value::Array(arr) = value {
                    if arr.len() != *len {
                        return Err(format!("expected {} elements, got {}", len, arr.len()));
                    }
                }
            }
            Constraint::OneOf(options) => {
                let accept = |v: &Value| options.iter().any(|o| o == v);
                let ok = match value {
                    Value::Array(items) => items.iter().all(accept),
                    other => accept(other),
                };
                if !ok {
                    let listed: Vec<String> = options.iter().map(|o| o.to_string()).collect();
                    return Err(format!("value '{}' is not one of [{}]", value, listed.join(", ")));
                }
            }
        }
        Ok(())
    }
}

/// Multiplicity of a source port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Exactly one raster
    Single,
    /// Named list: at least one raster, or exactly `count` when given
    List { count: Option<usize> },
    /// Unnamed variadic: any number of rasters
    Variadic,
}

/// Declaration of one source port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePortDescriptor {
    /// Port name
    pub name: String,
    /// Alternative name accepted when binding
    pub alias: Option<String>,
    /// Multiplicity
    pub kind: SourceKind,
    /// Whether a single port may stay unbound
    pub optional: bool,
    /// Bands every bound raster must contain
    pub required_bands: Vec<String>,
    /// Raster type every bound raster must have (case-insensitive)
    pub raster_type: Option<String>,
    /// Description for help output
    pub description: String,
}

impl SourcePortDescriptor {
    fn with_kind(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            alias: None,
            kind,
            optional: false,
            required_bands: Vec::new(),
            raster_type: None,
            description: String::new(),
        }
    }

    /// A port taking exactly one raster.
    pub fn single(name: impl Into<String>) -> Self {
        Self::with_kind(name, SourceKind::Single)
    }

    /// A named list port taking one or more rasters.
    pub fn list(name: impl Into<String>) -> Self {
        Self::with_kind(name, SourceKind::List { count: None })
    }

    /// A named list port taking exactly `count` rasters.
    pub fn list_of(name: impl Into<String>, count: usize) -> Self {
        Self::with_kind(name, SourceKind::List { count: Some(count) })
    }

    /// An unnamed variadic port taking any number of rasters.
    pub fn variadic(name: impl Into<String>) -> Self {
        Self::with_kind(name, SourceKind::Variadic)
    }

    /// Set the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Allow a single port to stay unbound.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Require bound rasters to contain the named bands.
    pub fn with_bands<I, S>(mut self, bands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_bands.extend(bands.into_iter().map(Into::into));
        self
    }

    /// Require bound rasters to have the given type.
    pub fn with_raster_type(mut self, raster_type: impl Into<String>) -> Self {
        self.raster_type = Some(raster_type.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether `name` is this port's name or alias.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.alias.as_deref() == Some(name)
    }
}

/// Declaration of a named target property computed during initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetPropertyDescriptor {
    /// Property name
    pub name: String,
    /// External name, if different from `name`
    pub alias: Option<String>,
    /// Description for help output
    pub description: String,
}

impl TargetPropertyDescriptor {
    /// Create a property declaration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            description: String::new(),
        }
    }

    /// Expose the property under a different external name.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name under which the property is published.
    pub fn external_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Convert snake_case name to Title Case label.
fn name_to_label(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
