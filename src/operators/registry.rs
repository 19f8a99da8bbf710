//! Operator registry for managing available operator types.

use crate::core::node::{Category, OperatorDescriptor};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of operator descriptors.
///
/// Descriptors are indexed by class name; every alias maps to a class name.
/// When two operators claim the same alias, the one registered last wins.
pub struct OperatorRegistry {
    /// Descriptors indexed by class name.
    operators: IndexMap<String, Arc<OperatorDescriptor>>,
    /// Alias to class name.
    aliases: HashMap<String, String>,
    /// Class names grouped by category.
    categories: IndexMap<Category, Vec<String>>,
}

impl OperatorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            operators: IndexMap::new(),
            aliases: HashMap::new(),
            categories: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with built-in operators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::operators::builtin::register_all(&mut registry);
        registry
    }

    /// Register an operator type, replacing one with the same class name.
    pub fn register(&mut self, descriptor: OperatorDescriptor) -> Arc<OperatorDescriptor> {
        let descriptor = Arc::new(descriptor);
        let name = descriptor.name.clone();

        if self.operators.contains_key(&name) {
            log::warn!("Replacing registered operator '{}'", name);
            self.remove(&name);
        }
        for alias in &descriptor.aliases {
            if let Some(previous) = self.aliases.insert(alias.clone(), name.clone()) {
                if previous != name {
                    log::warn!(
                        "Alias '{}' now refers to '{}' instead of '{}'",
                        alias,
                        name,
                        previous
                    );
                }
            }
        }
        self.categories
            .entry(descriptor.category)
            .or_default()
            .push(name.clone());
        self.operators.insert(name, Arc::clone(&descriptor));
        descriptor
    }

    /// Unregister an operator by class name or alias.
    ///
    /// Aliases that point at the removed operator are dropped with it.
    pub fn remove(&mut self, name: &str) -> Option<Arc<OperatorDescriptor>> {
        let class = self.resolve(name)?.to_string();
        let descriptor = self.operators.shift_remove(&class)?;
        self.aliases.retain(|_, target| *target != class);
        if let Some(names) = self.categories.get_mut(&descriptor.category) {
            names.retain(|n| *n != class);
        }
        Some(descriptor)
    }

    fn resolve<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.operators.contains_key(name) {
            Some(name)
        } else {
            self.aliases.get(name).map(String::as_str)
        }
    }

    /// Look up a descriptor by class name or alias.
    pub fn lookup(&self, name: &str) -> Option<Arc<OperatorDescriptor>> {
        self.resolve(name)
            .and_then(|class| self.operators.get(class))
            .cloned()
    }

    /// Check if an operator is registered under a class name or alias.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Class names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    /// All descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<OperatorDescriptor>> {
        self.operators.values()
    }

    /// Class names in a category.
    pub fn by_category(&self, category: Category) -> Vec<&str> {
        self.categories
            .get(&category)
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Search operators by name, alias or description.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.operators
            .iter()
            .filter(|(_, d)| {
                d.all_names().any(|n| n.to_lowercase().contains(&query))
                    || d.description.to_lowercase().contains(&query)
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Descriptors grouped by category, sorted by display name.
    pub fn grouped_by_category(&self) -> IndexMap<Category, Vec<&OperatorDescriptor>> {
        let mut grouped: IndexMap<Category, Vec<&OperatorDescriptor>> = IndexMap::new();
        for descriptor in self.operators.values() {
            grouped
                .entry(descriptor.category)
                .or_default()
                .push(descriptor.as_ref());
        }
        for descriptors in grouped.values_mut() {
            descriptors.sort_by(|a, b| a.display_name().cmp(b.display_name()));
        }
        grouped
    }

    /// Number of registered operators.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
