//! Declarative workflow intermediate representation.
//!
//! A workflow is a JSON document describing a linear chain of typed nodes:
//! declared inputs, templated node parameters, declared outputs, and the
//! edges wiring the chain together. The IR is produced by a planner or
//! written by hand; [`validate`](crate::validator::validate) checks it and
//! [`compile`](crate::compiler::compile) turns it into an executable graph.
//!
//! # Examples
//!
//! ```
//! use pflow::ir::WorkflowIr;
//!
//! let ir: WorkflowIr = serde_json::from_str(
//!     r#"{
//!         "ir_version": "0.1.0",
//!         "nodes": [
//!             {"id": "greet", "type": "shell",
//!              "params": {"command": "echo", "args": ["hello"]}}
//!         ],
//!         "edges": []
//!     }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(ir.nodes.len(), 1);
//! assert_eq!(ir.nodes[0].node_type, "shell");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// IR format version this runtime understands.
pub const IR_VERSION: &str = "0.1.0";

/// Policy for parameters whose templates cannot be fully resolved.
///
/// `Strict` fails fast before the referencing node executes; `Permissive`
/// records a warning and continues with the partially resolved value,
/// degrading the final status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateResolutionMode {
    #[default]
    Strict,
    Permissive,
}

impl fmt::Display for TemplateResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}

impl FromStr for TemplateResolutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            other => Err(format!(
                "invalid template resolution mode `{other}` (expected `strict` or `permissive`)"
            )),
        }
    }
}

/// Value types a registry schema or input declaration can name.
///
/// `Any` is allowed but disables ahead-of-time path checking for the keys
/// it covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    #[default]
    Any,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        };
        write!(f, "{s}")
    }
}

/// Declared workflow input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSpec {
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Required whenever `required` is false; validated at layer 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_required() -> bool {
    true
}

/// Declared workflow output: a template resolved against the final store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSpec {
    pub source: String,
    #[serde(default)]
    pub description: String,
}

/// One node of the chain.
///
/// `id` is the stable identifier other nodes reference in templates; `type`
/// names the executable class in the [`Registry`](crate::registry::Registry).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Directed edge between two node ids.
///
/// The edge set must form a linear chain over the `nodes` sequence; the
/// `nodes` order is the execution order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// The workflow IR document.
///
/// Unknown top-level keys are rejected at parse time, covering the layer-1
/// "extraneous keys" check for documents that enter through serde.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowIr {
    pub ir_version: String,
    /// Mode declared by the workflow itself; wins over settings and env.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_resolution_mode: Option<TemplateResolutionMode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, InputSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, OutputSpec>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeSpec>,
}

impl WorkflowIr {
    /// Parse an IR document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize back to a JSON value (used for trace snapshots and
    /// identical-patch detection in the repair loop).
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("IR serialization is infallible")
    }

    /// Position of a node id in the execution order.
    pub fn node_position(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// Look up a node spec by id.
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
