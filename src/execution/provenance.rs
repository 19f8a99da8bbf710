//! Lineage metadata written into target rasters.
//!
//! Every initialized operator appends a `node.<n>` element to the
//! `Processing_Graph` element of its target's metadata:
//!
//! ```text
//! metadata
//! └── Processing_Graph
//!     ├── node.0          id, operator, purpose, authors, version, copyright, processingTime
//!     │   ├── sources     <source id> = <upstream node id | file:<path> | product:<name>>
//!     │   └── parameters  <name> = <value>
//!     └── node.1          (upstream operator)
//! ```
//!
//! Upstream operators are appended recursively. A node whose id is already
//! present is not written again.

use crate::core::context::ParameterSet;
use crate::core::metadata::MetadataElement;
use crate::core::raster::Raster;
use crate::core::types::Value;
use crate::execution::binding::BoundSources;
use crate::execution::context::OperatorContext;

/// Name of the lineage element under the metadata root.
pub const PROCESSING_GRAPH: &str = "Processing_Graph";

/// Append the lineage of `context` to the metadata of `target`.
pub(crate) fn record(
    target: &Raster,
    context: &OperatorContext,
    sources: &BoundSources,
    parameters: &ParameterSet,
) {
    let mut root = target.metadata();
    let graph = root.element_or_insert(PROCESSING_GRAPH);
    append_node(graph, context, sources, parameters);
}

/// Copy of the `Processing_Graph` element of a raster, if any.
pub fn processing_graph(raster: &Raster) -> Option<MetadataElement> {
    raster.metadata().element(PROCESSING_GRAPH).cloned()
}

fn append_node(
    graph: &mut MetadataElement,
    context: &OperatorContext,
    sources: &BoundSources,
    parameters: &ParameterSet,
) {
    let id = context.id().to_string();
    if graph
        .elements()
        .iter()
        .any(|e| e.attribute_string("id").as_deref() == Some(id.as_str()))
    {
        return;
    }

    let node_name = format!(
        "node.{}",
        graph
            .elements()
            .iter()
            .filter(|e| e.name().starts_with("node"))
            .count()
    );
    let descriptor = context.descriptor();
    let mut node = MetadataElement::new(&node_name);
    node.set_attribute("id", Value::String(id));
    node.set_attribute("operator", Value::from(descriptor.display_name()));
    for (name, text) in [
        ("purpose", &descriptor.description),
        ("authors", &descriptor.authors),
        ("version", &descriptor.version),
        ("copyright", &descriptor.copyright),
    ] {
        if !text.is_empty() {
            node.set_attribute(name, Value::String(text.clone()));
        }
    }
    node.set_attribute(
        "processingTime",
        Value::Date(chrono::Local::now().naive_local()),
    );
    graph.add_element(node);

    let mut references: Vec<(String, String)> = Vec::with_capacity(sources.len());
    for (source_id, raster) in sources.source_ids() {
        let reference = if let Some(path) = raster.file_location() {
            format!("file:{}", path.display())
        } else if let Some(upstream) = raster.producer() {
            if let Some((upstream_sources, upstream_parameters)) = upstream.lineage() {
                append_node(graph, &upstream, &upstream_sources, &upstream_parameters);
            }
            upstream.id().to_string()
        } else {
            format!("product:{}", raster.name())
        };
        references.push((source_id.clone(), reference));
    }
    references.sort_by(|a, b| a.0.cmp(&b.0));

    let mut sources_element = MetadataElement::new("sources");
    for (source_id, reference) in references {
        sources_element.set_attribute(source_id, Value::String(reference));
    }
    let mut parameters_element = MetadataElement::new("parameters");
    for (name, value) in parameters.iter() {
        parameters_element.set_attribute(name, Value::String(value.to_string()));
    }

    if let Some(node) = graph.element_mut(&node_name) {
        node.add_element(sources_element);
        node.add_element(parameters_element);
    }
}
