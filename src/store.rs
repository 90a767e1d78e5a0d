//! Shared execution store with per-node namespaces.
//!
//! The store is the single shared mutable structure of a run: a root JSON
//! map keyed by node id (each holding that node's outputs) plus workflow
//! inputs at the root, plus a small set of framework keys of the form
//! `__name__` that always live at the root regardless of proxy depth.
//!
//! Nodes never touch the root directly. Each node receives a
//! [`NamespacedStore`] view scoped to its own id; every read and write is
//! rewritten to `root[namespace][key]`, except framework keys which pass
//! through to the root. Sequential execution makes locking unnecessary.

use serde_json::{Map, Value};

use crate::errors::WarningRecord;

/// Framework escape keys recognized by the runtime.
pub mod keys {
    /// Execution checkpoint: completed nodes, failed node, node actions.
    pub const EXECUTION: &str = "__execution__";
    /// Accumulated [`WarningRecord`](crate::errors::WarningRecord)s.
    pub const WARNINGS: &str = "__warnings__";
    /// Template resolution warnings recorded in permissive mode.
    pub const TEMPLATE_ERRORS: &str = "__template_errors__";
    /// Count of LLM calls made by planner-facing nodes.
    pub const LLM_CALLS: &str = "__llm_calls__";
    /// Count of cache hits reported by nodes.
    pub const CACHE_HITS: &str = "__cache_hits__";
    /// Node ids rewritten by the repair loop.
    pub const MODIFIED_NODES: &str = "__modified_nodes__";
    /// Set when the repair loop declines or exhausts its attempts.
    pub const NON_REPAIRABLE_ERROR: &str = "__non_repairable_error__";
    /// Reserved for the progress callback slot; the callable itself is
    /// injected via `ExecuteOptions`, never stored as a value.
    pub const PROGRESS_CALLBACK: &str = "__progress_callback__";
}

/// Whether a key matches the framework escape pattern `__name__`.
///
/// Escape keys always read and write at the store root; they can never be
/// claimed by a node namespace.
pub fn is_framework_key(key: &str) -> bool {
    key.len() > 4 && key.starts_with("__") && key.ends_with("__")
}

/// Root store for one workflow run.
///
/// Created fresh per run (and per repair attempt); discarded when the
/// [`ExecutionResult`](crate::executor::ExecutionResult) captures its final
/// contents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SharedStore {
    root: Map<String, Value>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store whose root already carries the merged workflow inputs.
    pub fn with_inputs(inputs: Map<String, Value>) -> Self {
        Self { root: inputs }
    }

    /// Root-level read (inputs, node namespaces, framework keys alike).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Root-level write. Node output must go through [`Self::namespaced`];
    /// this is for inputs and framework coordination.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.root.insert(key.into(), value);
    }

    /// The full root map, e.g. as template resolution context.
    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }

    /// Consume the store, yielding `shared_after` for the result.
    pub fn into_root(self) -> Map<String, Value> {
        self.root
    }

    /// A node's namespace, if it has written anything yet.
    pub fn namespace(&self, node_id: &str) -> Option<&Map<String, Value>> {
        self.root.get(node_id).and_then(Value::as_object)
    }

    /// Scoped view for one node. All non-framework accesses are rewritten
    /// to `root[node_id]`.
    pub fn namespaced(&mut self, node_id: impl Into<String>) -> NamespacedStore<'_> {
        NamespacedStore {
            root: &mut self.root,
            namespace: node_id.into(),
        }
    }

    /// Append a warning to `__warnings__`, deduplicating by exact message
    /// per node+param pair. Returns whether the warning was inserted.
    pub fn push_warning(&mut self, warning: WarningRecord) -> bool {
        let list = self.framework_list(keys::WARNINGS);
        let duplicate = list.iter().any(|v| {
            serde_json::from_value::<WarningRecord>(v.clone())
                .map(|existing| existing.dedup_key() == warning.dedup_key())
                .unwrap_or(false)
        });
        if duplicate {
            return false;
        }
        let encoded =
            serde_json::to_value(&warning).expect("warning serialization is infallible");
        list.push(encoded);
        true
    }

    /// Append a template-resolution diagnostic to `__template_errors__`.
    pub fn push_template_error(&mut self, diagnostic: Value) {
        self.framework_list(keys::TEMPLATE_ERRORS).push(diagnostic);
    }

    /// Warnings accumulated so far, in insertion order.
    pub fn warnings(&self) -> Vec<WarningRecord> {
        self.root
            .get(keys::WARNINGS)
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_template_errors(&self) -> bool {
        self.root
            .get(keys::TEMPLATE_ERRORS)
            .and_then(Value::as_array)
            .is_some_and(|list| !list.is_empty())
    }

    fn framework_list(&mut self, key: &'static str) -> &mut Vec<Value> {
        let slot = self
            .root
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(list) => list,
            _ => unreachable!("slot was just ensured to be an array"),
        }
    }
}

/// Mapping view scoped to one node's namespace.
///
/// Created per node by the executor and discarded after the node's post
/// phase. Framework keys (`__*__`) bypass the namespace in both directions;
/// everything else lands in `root[namespace]`.
#[derive(Debug)]
pub struct NamespacedStore<'a> {
    root: &'a mut Map<String, Value>,
    namespace: String,
}

impl NamespacedStore<'_> {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn contains(&self, key: &str) -> bool {
        if is_framework_key(key) {
            self.root.contains_key(key)
        } else {
            self.namespace_map().is_some_and(|ns| ns.contains_key(key))
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        if is_framework_key(key) {
            self.root.get(key)
        } else {
            self.namespace_map().and_then(|ns| ns.get(key))
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if is_framework_key(&key) {
            self.root.insert(key, value);
        } else {
            self.namespace_map_mut().insert(key, value);
        }
    }

    /// Insert `value` only if `key` is absent; returns the stored value.
    pub fn setdefault(&mut self, key: impl Into<String>, value: Value) -> &Value {
        let key = key.into();
        if is_framework_key(&key) {
            self.root.entry(key).or_insert(value)
        } else {
            self.namespace_map_mut().entry(key).or_insert(value)
        }
    }

    pub fn delete(&mut self, key: &str) -> Option<Value> {
        if is_framework_key(key) {
            self.root.remove(key)
        } else if let Some(Value::Object(ns)) = self.root.get_mut(&self.namespace) {
            ns.remove(key)
        } else {
            None
        }
    }

    fn namespace_map(&self) -> Option<&Map<String, Value>> {
        self.root.get(&self.namespace).and_then(Value::as_object)
    }

    fn namespace_map_mut(&mut self) -> &mut Map<String, Value> {
        let slot = self
            .root
            .entry(self.namespace.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just ensured to be an object"),
        }
    }
}
