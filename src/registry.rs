//! Node capability registry.
//!
//! Maps a `node_type` id onto a capability descriptor: what params the node
//! accepts, which keys it promises to write into its namespace, and a
//! factory that instantiates the executable. The registry is read-only at
//! runtime; unknown types resolve to an error carrying fuzzy did-you-mean
//! suggestions.

use std::collections::BTreeMap;
use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use thiserror::Error;

use crate::ir::{NodeSpec, ValueType};
use crate::node::Node;
use crate::utils::fuzzy;

/// Constructor for a node implementation.
///
/// Receives the node spec so construction-time configuration (not
/// templated params) can shape the instance.
pub type NodeFactory = Arc<dyn Fn(&NodeSpec) -> Result<Arc<dyn Node>, RegistryError> + Send + Sync>;

/// One declared parameter or output field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub value_type: ValueType,
    pub required: bool,
    pub description: String,
}

impl FieldSpec {
    pub fn required(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: true,
            description: String::new(),
        }
    }

    pub fn optional(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: false,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Capability descriptor for one node type.
pub struct RegistryEntry {
    pub type_id: String,
    pub description: String,
    /// Parameter schema: keys the node reads from its resolved params.
    pub params: BTreeMap<String, FieldSpec>,
    /// Output schema: keys the node promises to write into its namespace.
    /// An empty map means the outputs are dynamic (`Any`), which disables
    /// ahead-of-time path checking.
    pub outputs: BTreeMap<String, FieldSpec>,
    factory: NodeFactory,
}

impl RegistryEntry {
    pub fn new(
        type_id: impl Into<String>,
        description: impl Into<String>,
        factory: NodeFactory,
    ) -> Self {
        Self {
            type_id: type_id.into(),
            description: description.into(),
            params: BTreeMap::new(),
            outputs: BTreeMap::new(),
            factory,
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, field: FieldSpec) -> Self {
        self.params.insert(name.into(), field);
        self
    }

    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>, field: FieldSpec) -> Self {
        self.outputs.insert(name.into(), field);
        self
    }

    /// Whether the output schema is concrete enough to check `node.key`
    /// paths ahead of time.
    pub fn outputs_are_concrete(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// Whether this node promises to write `key`.
    pub fn promises_output(&self, key: &str) -> bool {
        self.outputs.contains_key(key)
    }

    /// Output keys the node must have written for a run to count as
    /// covering its schema.
    pub fn required_output_keys(&self) -> impl Iterator<Item = &str> {
        self.outputs
            .iter()
            .filter(|(_, f)| f.required)
            .map(|(k, _)| k.as_str())
    }

    /// Build the executable for a node spec.
    pub fn instantiate(&self, spec: &NodeSpec) -> Result<Arc<dyn Node>, RegistryError> {
        (self.factory)(spec)
    }

    /// Structured documentation for interactive `describe` surfaces.
    pub fn to_doc(&self) -> Value {
        let fields = |map: &BTreeMap<String, FieldSpec>| -> Value {
            Value::Object(
                map.iter()
                    .map(|(name, field)| {
                        (
                            name.clone(),
                            json!({
                                "type": field.value_type.to_string(),
                                "required": field.required,
                                "description": field.description,
                            }),
                        )
                    })
                    .collect(),
            )
        };
        json!({
            "type": self.type_id,
            "description": self.description,
            "params": fields(&self.params),
            "outputs": fields(&self.outputs),
        })
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("type_id", &self.type_id)
            .field("description", &self.description)
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("unknown node type `{type_id}`{}", format_suggestions(.suggestions))]
    #[diagnostic(
        code(pflow::registry::unknown_type),
        help("Run a registry search to list the available node types.")
    )]
    UnknownType {
        type_id: String,
        suggestions: Vec<String>,
    },

    #[error("node type `{type_id}` is already registered")]
    #[diagnostic(code(pflow::registry::already_registered))]
    AlreadyRegistered { type_id: String },

    #[error("failed to construct node of type `{type_id}`: {reason}")]
    #[diagnostic(code(pflow::registry::construction))]
    Construction { type_id: String, reason: String },
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

/// The node type registry. Read-only once handed to the compiler.
pub struct Registry {
    entries: FxHashMap<String, RegistryEntry>,
}

impl Registry {
    /// An empty registry. Most callers want [`Registry::with_builtins`].
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// A registry pre-loaded with the built-in leaf nodes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in crate::nodes::builtin_entries() {
            registry
                .register(entry)
                .expect("builtin type ids are unique");
        }
        registry
    }

    pub fn register(&mut self, entry: RegistryEntry) -> Result<(), RegistryError> {
        if self.entries.contains_key(&entry.type_id) {
            return Err(RegistryError::AlreadyRegistered {
                type_id: entry.type_id,
            });
        }
        self.entries.insert(entry.type_id.clone(), entry);
        Ok(())
    }

    /// All entries, sorted by type id.
    pub fn load(&self) -> Vec<&RegistryEntry> {
        let mut entries: Vec<&RegistryEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.type_id.cmp(&b.type_id));
        entries
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.entries.contains_key(type_id)
    }

    /// Resolve a type id to its entry, or an error with fuzzy suggestions.
    pub fn resolve(&self, type_id: &str) -> Result<&RegistryEntry, RegistryError> {
        self.entries
            .get(type_id)
            .ok_or_else(|| RegistryError::UnknownType {
                type_id: type_id.to_string(),
                suggestions: self.suggest(type_id),
            })
    }

    /// Type ids matching a case-insensitive substring of the id or
    /// description.
    pub fn search(&self, pattern: &str) -> Vec<String> {
        let needle = pattern.to_lowercase();
        let mut matches: Vec<String> = self
            .entries
            .values()
            .filter(|e| {
                e.type_id.to_lowercase().contains(&needle)
                    || e.description.to_lowercase().contains(&needle)
            })
            .map(|e| e.type_id.clone())
            .collect();
        matches.sort();
        matches
    }

    /// Full entries for a list of type ids (interactive documentation).
    pub fn describe(&self, type_ids: &[&str]) -> Result<Vec<&RegistryEntry>, RegistryError> {
        type_ids.iter().map(|id| self.resolve(id)).collect()
    }

    /// Top-k fuzzy candidates for an unknown type id.
    pub fn suggest(&self, type_id: &str) -> Vec<String> {
        fuzzy::suggestions(
            type_id,
            self.entries.keys().map(String::as_str),
            crate::template::MAX_SUGGESTIONS,
        )
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_unknown_carries_suggestions() {
        let registry = Registry::with_builtins();
        let err = registry.resolve("shel").unwrap_err();
        match err {
            RegistryError::UnknownType { suggestions, .. } => {
                assert!(suggestions.contains(&"shell".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = Registry::with_builtins();
        let dup = crate::nodes::builtin_entries()
            .into_iter()
            .find(|e| e.type_id == "shell")
            .unwrap();
        assert!(matches!(
            registry.register(dup),
            Err(RegistryError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn search_matches_id_and_description() {
        let registry = Registry::with_builtins();
        assert!(registry.search("shell").contains(&"shell".to_string()));
        assert!(registry.search("zzz-not-there").is_empty());
    }
}
