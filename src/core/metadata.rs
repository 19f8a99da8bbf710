//! Ordered metadata tree attached to every raster.
//!
//! Elements have a name, ordered child elements and ordered named attributes.
//! The engine only appends to it (processing lineage), everything else is
//! owned by whoever produced the raster.

use crate::core::types::Value;
use serde::{Deserialize, Serialize};

/// A named scalar attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    /// Attribute name
    pub name: String,
    /// Attribute value
    pub value: Value,
}

impl MetadataAttribute {
    /// Create an attribute.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A metadata element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataElement {
    name: String,
    elements: Vec<MetadataElement>,
    attributes: Vec<MetadataAttribute>,
}

impl MetadataElement {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child elements in insertion order.
    pub fn elements(&self) -> &[MetadataElement] {
        &self.elements
    }

    /// Number of child elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// First child element with the given name.
    pub fn element(&self, name: &str) -> Option<&MetadataElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Mutable access to the first child element with the given name.
    pub fn element_mut(&mut self, name: &str) -> Option<&mut MetadataElement> {
        self.elements.iter_mut().find(|e| e.name == name)
    }

    /// Get the named child element, appending an empty one if missing.
    pub fn element_or_insert(&mut self, name: &str) -> &mut MetadataElement {
        let index = match self.elements.iter().position(|e| e.name == name) {
            Some(index) => index,
            None => {
                self.elements.push(MetadataElement::new(name));
                self.elements.len() - 1
            }
        };
        &mut self.elements[index]
    }

    /// Append a child element.
    pub fn add_element(&mut self, element: MetadataElement) {
        self.elements.push(element);
    }

    /// Remove and return the first child element with the given name.
    pub fn remove_element(&mut self, name: &str) -> Option<MetadataElement> {
        let index = self.elements.iter().position(|e| e.name == name)?;
        Some(self.elements.remove(index))
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> &[MetadataAttribute] {
        &self.attributes
    }

    /// Attribute names in insertion order.
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    /// Value of the named attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// String form of the named attribute.
    pub fn attribute_string(&self, name: &str) -> Option<String> {
        self.attribute(name).map(|v| v.to_string())
    }

    /// Set an attribute, replacing an existing one with the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(MetadataAttribute::new(name, value)),
        }
    }

    /// Sort attributes by name.
    pub fn sort_attributes(&mut self) {
        self.attributes.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Serialize the tree to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
