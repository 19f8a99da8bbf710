//! Binding of caller-supplied parameters and sources against an operator's schema.
//!
//! Parameters are bound once, when an operator context is created:
//! explicit values first (type-checked and coerced), then each declared
//! default literal converted to a typed value. Sources are bound when the
//! operator initializes, so a missing source fails before any pixel is read.

use crate::core::context::ParameterSet;
use crate::core::error::{OperatorError, OperatorResult};
use crate::core::node::OperatorDescriptor;
use crate::core::port::{SourceKind, SourcePortDescriptor};
use crate::core::raster::Raster;
use crate::core::types::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Caller-supplied parameter values.
pub type ParameterMap = IndexMap<String, Value>;

/// Prefix of the ids given to positional sources.
pub const POSITIONAL_SOURCE_PREFIX: &str = "sourceProduct";

/// Bind caller values and defaults against the descriptor's parameter schema.
pub fn bind_parameters(
    descriptor: &OperatorDescriptor,
    supplied: &ParameterMap,
) -> OperatorResult<ParameterSet> {
    let operator = descriptor.display_name();

    if let Some(unknown) = supplied.keys().find(|k| descriptor.parameter(k).is_none()) {
        return Err(OperatorError::UnknownParameter {
            operator: operator.to_string(),
            parameter: unknown.clone(),
        });
    }

    let invalid = |parameter: &str, message: String| OperatorError::InvalidParameter {
        operator: operator.to_string(),
        parameter: parameter.to_string(),
        message,
    };

    let mut values = IndexMap::new();
    for param in &descriptor.parameters {
        let value = match supplied.get(&param.name).filter(|v| !v.is_none()) {
            Some(explicit) => Some(
                param
                    .param_type
                    .coerce(explicit.clone())
                    .map_err(|m| invalid(&param.name, m))?,
            ),
            None => match &param.default_literal {
                Some(literal) => Some(
                    param
                        .param_type
                        .parse_literal(literal)
                        .map_err(|m| invalid(&param.name, format!("bad default: {}", m)))?,
                ),
                None => None,
            },
        };

        match value {
            Some(value) => {
                param.validate(&value).map_err(|m| invalid(&param.name, m))?;
                values.insert(param.name.clone(), value);
            }
            None if param.required => {
                return Err(invalid(&param.name, "a value is required".to_string()));
            }
            None => {}
        }
    }

    log::trace!("Bound {} parameters for '{}'", values.len(), operator);
    Ok(ParameterSet::new(operator, values))
}

/// Caller-supplied sources: named (by port name or alias) and positional.
#[derive(Clone, Default)]
pub struct Sources {
    named: IndexMap<String, Vec<Arc<Raster>>>,
    positional: Vec<Arc<Raster>>,
}

impl Sources {
    /// No sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional sources, in order.
    pub fn positional<I>(rasters: I) -> Self
    where
        I: IntoIterator<Item = Arc<Raster>>,
    {
        Self {
            named: IndexMap::new(),
            positional: rasters.into_iter().collect(),
        }
    }

    /// Bind a raster to the port with the given name or alias.
    pub fn with(mut self, name: impl Into<String>, raster: Arc<Raster>) -> Self {
        self.named.insert(name.into(), vec![raster]);
        self
    }

    /// Bind several rasters to a list port.
    pub fn with_list(mut self, name: impl Into<String>, rasters: Vec<Arc<Raster>>) -> Self {
        self.named.insert(name.into(), rasters);
        self
    }

    /// Append a positional source.
    pub fn push(mut self, raster: Arc<Raster>) -> Self {
        self.positional.push(raster);
        self
    }

    /// Total number of supplied rasters.
    pub fn len(&self) -> usize {
        self.named.values().map(Vec::len).sum::<usize>() + self.positional.len()
    }

    /// Whether no raster was supplied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source ids in binding order: named sources first, then positional
    /// ones as `sourceProduct.<n>`. Lists get a `.<n>` suffix per element.
    fn source_ids(&self) -> Vec<(String, Arc<Raster>)> {
        let mut ids: Vec<(String, Arc<Raster>)> = Vec::new();
        let mut push = |id: String, raster: &Arc<Raster>| {
            if !ids.iter().any(|(_, r)| Arc::ptr_eq(r, raster)) {
                ids.push((id, Arc::clone(raster)));
            }
        };
        for (name, rasters) in &self.named {
            if rasters.len() == 1 {
                push(name.clone(), &rasters[0]);
            } else {
                for (i, raster) in rasters.iter().enumerate() {
                    push(format!("{}.{}", name, i + 1), raster);
                }
            }
        }
        for (i, raster) in self.positional.iter().enumerate() {
            push(format!("{}.{}", POSITIONAL_SOURCE_PREFIX, i + 1), raster);
        }
        ids
    }

    fn named_for(&self, port: &SourcePortDescriptor) -> Option<&Vec<Arc<Raster>>> {
        self.named
            .iter()
            .find(|(name, _)| port.answers_to(name))
            .map(|(_, rasters)| rasters)
    }
}

impl From<Vec<Arc<Raster>>> for Sources {
    fn from(rasters: Vec<Arc<Raster>>) -> Self {
        Self::positional(rasters)
    }
}

impl From<Arc<Raster>> for Sources {
    fn from(raster: Arc<Raster>) -> Self {
        Self::positional([raster])
    }
}

/// Sources resolved against an operator's port schema.
#[derive(Debug, Clone, Default)]
pub struct BoundSources {
    ports: IndexMap<String, Vec<Arc<Raster>>>,
    ids: Vec<(String, Arc<Raster>)>,
}

impl BoundSources {
    /// First raster bound to a port.
    pub fn source(&self, port: &str) -> Option<&Arc<Raster>> {
        self.ports.get(port).and_then(|rasters| rasters.first())
    }

    /// All rasters bound to a port.
    pub fn sources(&self, port: &str) -> &[Arc<Raster>] {
        self.ports.get(port).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every distinct source raster, in binding order.
    pub fn all(&self) -> Vec<Arc<Raster>> {
        self.ids.iter().map(|(_, r)| Arc::clone(r)).collect()
    }

    /// `(source id, raster)` pairs in binding order.
    pub fn source_ids(&self) -> &[(String, Arc<Raster>)] {
        &self.ids
    }

    /// Id under which `raster` was bound.
    pub fn source_id(&self, raster: &Arc<Raster>) -> Option<&str> {
        self.ids
            .iter()
            .find(|(_, r)| Arc::ptr_eq(r, raster))
            .map(|(id, _)| id.as_str())
    }

    /// Whether `raster` (by identity) is one of the sources.
    pub fn contains(&self, raster: &Arc<Raster>) -> bool {
        self.ids.iter().any(|(_, r)| Arc::ptr_eq(r, raster))
    }

    /// Number of distinct sources.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether there are no sources.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolve supplied sources against the descriptor's ports.
pub fn bind_sources(
    descriptor: &OperatorDescriptor,
    supplied: &Sources,
) -> OperatorResult<BoundSources> {
    let operator = descriptor.display_name();
    let invalid = |port: &str, message: String| OperatorError::InvalidSource {
        operator: operator.to_string(),
        port: port.to_string(),
        message,
    };

    let ids = supplied.source_ids();
    let mut ports: IndexMap<String, Vec<Arc<Raster>>> = IndexMap::new();
    let mut consumed: Vec<Arc<Raster>> = Vec::new();
    let mut cursor = 0;

    for port in descriptor
        .source_ports
        .iter()
        .filter(|p| p.kind == SourceKind::Single)
    {
        let named = supplied.named_for(port).and_then(|rasters| rasters.first().cloned());
        let found = named.or_else(|| {
            while cursor < supplied.positional.len() {
                let candidate = &supplied.positional[cursor];
                cursor += 1;
                if !consumed.iter().any(|c| Arc::ptr_eq(c, candidate)) {
                    return Some(Arc::clone(candidate));
                }
            }
            None
        });
        match found {
            Some(raster) => {
                consumed.push(Arc::clone(&raster));
                ports.insert(port.name.clone(), vec![raster]);
            }
            None if port.optional => {}
            None => return Err(invalid(&port.name, "mandatory source not set".to_string())),
        }
    }

    for port in descriptor
        .source_ports
        .iter()
        .filter(|p| p.kind != SourceKind::Single)
    {
        let rasters: Vec<Arc<Raster>> = match supplied.named_for(port) {
            Some(list) => list.clone(),
            None => ids
                .iter()
                .filter(|(_, r)| !consumed.iter().any(|c| Arc::ptr_eq(c, r)))
                .map(|(_, r)| Arc::clone(r))
                .collect(),
        };
        match port.kind {
            SourceKind::List { count: Some(n) } if rasters.len() != n => {
                return Err(invalid(
                    &port.name,
                    format!("wrong number of sources: required {}, found {}", n, rasters.len()),
                ));
            }
            SourceKind::List { count: None } if rasters.is_empty() => {
                return Err(invalid(&port.name, "at least one source expected".to_string()));
            }
            _ => {}
        }
        ports.insert(port.name.clone(), rasters);
    }

    for port in &descriptor.source_ports {
        for raster in ports.get(&port.name).into_iter().flatten() {
            check_contract(port, raster).map_err(|m| invalid(&port.name, m))?;
        }
    }

    Ok(BoundSources { ports, ids })
}

fn check_contract(port: &SourcePortDescriptor, raster: &Raster) -> Result<(), String> {
    if let Some(expected) = &port.raster_type {
        if !expected.eq_ignore_ascii_case(raster.raster_type()) {
            return Err(format!(
                "raster '{}' has type '{}', expected '{}'",
                raster.name(),
                raster.raster_type(),
                expected
            ));
        }
    }
    for band in &port.required_bands {
        if !raster.contains_band(band) {
            return Err(format!(
                "raster '{}' does not contain the band '{}'",
                raster.name(),
                band
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::InitContext;
    use crate::core::node::Operator;
    use crate::core::port::ParameterDescriptor;
    use crate::core::types::{ParamType, PixelType};

    #[derive(Default)]
    struct Dummy;

    impl Operator for Dummy {
        fn initialize(&mut self, _ctx: &mut InitContext<'_>) -> OperatorResult<()> {
            Ok(())
        }
    }

    fn raster(name: &str) -> Arc<Raster> {
        let r = Raster::new(name, "TEST", 2, 2);
        r.add_band("b1", PixelType::Float32).unwrap();
        r
    }

    #[test]
    fn test_defaults_and_explicit_values() {
        let descriptor = OperatorDescriptor::builder::<Dummy>()
            .parameter(ParameterDescriptor::new("factor", ParamType::Float).with_default("1.5"))
            .parameter(
                ParameterDescriptor::new("bands", ParamType::array_of(ParamType::String))
                    .with_default("a,b"),
            )
            .parameter(ParameterDescriptor::new("label", ParamType::String))
            .build();

        let mut supplied = ParameterMap::new();
        supplied.insert("factor".to_string(), Value::Integer(3));
        let bound = bind_parameters(&descriptor, &supplied).unwrap();

        assert_eq!(bound.get("factor"), Some(&Value::Float(3.0)));
        assert_eq!(bound.get_string_array("bands").unwrap(), vec!["a", "b"]);
        assert!(!bound.contains("label"));
    }

    #[test]
    fn test_bad_default_names_parameter() {
        let descriptor = OperatorDescriptor::builder::<Dummy>()
            .parameter(ParameterDescriptor::new("count", ParamType::Integer).with_default("many"))
            .build();
        match bind_parameters(&descriptor, &ParameterMap::new()) {
            Err(OperatorError::InvalidParameter { parameter, .. }) => assert_eq!(parameter, "count"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_and_required_parameters() {
        let descriptor = OperatorDescriptor::builder::<Dummy>()
            .parameter(ParameterDescriptor::new("expr", ParamType::String).required())
            .build();

        let err = bind_parameters(&descriptor, &ParameterMap::new()).unwrap_err();
        assert!(matches!(err, OperatorError::InvalidParameter { .. }));

        let mut supplied = ParameterMap::new();
        supplied.insert("expr".to_string(), Value::from("x"));
        supplied.insert("typo".to_string(), Value::from("y"));
        let err = bind_parameters(&descriptor, &supplied).unwrap_err();
        assert!(matches!(err, OperatorError::UnknownParameter { .. }));
    }

    #[test]
    fn test_positional_sources_fill_single_ports_in_order() {
        let descriptor = OperatorDescriptor::builder::<Dummy>()
            .source(SourcePortDescriptor::single("master"))
            .source(SourcePortDescriptor::single("slave"))
            .build();
        let (a, b) = (raster("a"), raster("b"));
        let bound = bind_sources(&descriptor, &Sources::positional([a.clone(), b.clone()])).unwrap();

        assert!(Arc::ptr_eq(bound.source("master").unwrap(), &a));
        assert!(Arc::ptr_eq(bound.source("slave").unwrap(), &b));
        assert_eq!(bound.source_id(&b), Some("sourceProduct.2"));
    }

    #[test]
    fn test_named_source_by_alias() {
        let descriptor = OperatorDescriptor::builder::<Dummy>()
            .source(SourcePortDescriptor::single("source").with_alias("input"))
            .build();
        let a = raster("a");
        let bound = bind_sources(&descriptor, &Sources::new().with("input", a.clone())).unwrap();
        assert!(Arc::ptr_eq(bound.source("source").unwrap(), &a));
        assert_eq!(bound.source_id(&a), Some("input"));
    }

    #[test]
    fn test_missing_single_source() {
        let descriptor = OperatorDescriptor::builder::<Dummy>()
            .source(SourcePortDescriptor::single("source"))
            .source(SourcePortDescriptor::single("mask").optional())
            .build();
        assert!(matches!(
            bind_sources(&descriptor, &Sources::new()),
            Err(OperatorError::InvalidSource { .. })
        ));
        let bound = bind_sources(&descriptor, &Sources::from(raster("a"))).unwrap();
        assert!(bound.source("mask").is_none());
    }

    #[test]
    fn test_variadic_takes_remaining_sources() {
        let descriptor = OperatorDescriptor::builder::<Dummy>()
            .source(SourcePortDescriptor::single("reference"))
            .source(SourcePortDescriptor::variadic("others"))
            .build();
        let (a, b, c) = (raster("a"), raster("b"), raster("c"));
        let sources = Sources::new().with("reference", b.clone()).push(a).push(c);
        let bound = bind_sources(&descriptor, &sources).unwrap();
        let names: Vec<_> = bound.sources("others").iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(bound.len(), 3);
    }

    #[test]
    fn test_list_count_and_band_contract() {
        let descriptor = OperatorDescriptor::builder::<Dummy>()
            .source(SourcePortDescriptor::list_of("pair", 2).with_bands(["b1"]))
            .build();
        assert!(bind_sources(&descriptor, &Sources::from(raster("a"))).is_err());
        assert!(bind_sources(&descriptor, &Sources::positional([raster("a"), raster("b")])).is_ok());

        let plain = Raster::new("plain", "TEST", 2, 2);
        let err = bind_sources(&descriptor, &Sources::positional([raster("a"), plain])).unwrap_err();
        assert!(err.to_string().contains("does not contain the band 'b1'"));
    }
}
