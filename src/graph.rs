//! The compiled, executable form of a workflow.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::ir::{InputSpec, OutputSpec, TemplateResolutionMode};
use crate::wrapper::NodeWrapper;

/// Output of [`compile`](crate::compiler::compile): wrapped nodes in
/// execution order plus the workflow metadata the executor needs.
///
/// Nodes are instantiated once per compilation; the graph itself is
/// immutable and reusable across runs (each run gets a fresh store).
pub struct ExecutionGraph {
    pub(crate) nodes: Vec<NodeWrapper>,
    pub inputs: BTreeMap<String, InputSpec>,
    pub outputs: BTreeMap<String, OutputSpec>,
    /// Effective mode after walking the settings hierarchy at compile time.
    pub mode: TemplateResolutionMode,
    /// IR snapshot embedded into traces.
    pub(crate) ir_snapshot: Value,
}

impl ExecutionGraph {
    /// Wrapped nodes in execution order.
    pub fn nodes(&self) -> &[NodeWrapper] {
        &self.nodes
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(NodeWrapper::node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ir_snapshot(&self) -> &Value {
        &self.ir_snapshot
    }
}

impl std::fmt::Debug for ExecutionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGraph")
            .field("nodes", &self.node_ids().collect::<Vec<_>>())
            .field("mode", &self.mode)
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
