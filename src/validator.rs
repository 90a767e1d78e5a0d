//! Four-layer workflow IR validation.
//!
//! Layers run in order: structural schema, graph shape, template
//! resolution, node type existence. The template layer is skipped in
//! *static* mode (`extracted_params = None`); passing `Some(params)` —
//! even an empty map — runs complete validation, so templates relying on
//! missing inputs fail, intentionally.
//!
//! The validator never raises. It returns a list of
//! [`ErrorRecord`]s collected breadth-first by layer and then by node
//! order; an empty list means the IR is valid. Interactive surfaces show
//! the full list; the repair loop receives at most
//! [`REPAIR_ERROR_LIMIT`](crate::errors::REPAIR_ERROR_LIMIT) records via
//! [`validate_for_repair`].

use serde_json::{Map, Value};

use crate::errors::{ErrorCategory, ErrorRecord, REPAIR_ERROR_LIMIT};
use crate::ir::{IR_VERSION, WorkflowIr};
use crate::registry::Registry;
use crate::store::is_framework_key;
use crate::template::{self, TemplatePath};
use crate::utils::fuzzy;

/// Knobs for optional layers.
#[derive(Clone, Debug)]
pub struct ValidationOptions {
    /// Run layer 4 (registry existence). Disabled by callers validating
    /// IRs destined for a differently-provisioned runtime.
    pub check_node_types: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_node_types: true,
        }
    }
}

/// Validate an IR. `extracted_params = None` runs layers 1, 2, and 4 only.
pub fn validate(
    ir: &WorkflowIr,
    registry: &Registry,
    extracted_params: Option<&Map<String, Value>>,
) -> Vec<ErrorRecord> {
    validate_with_options(ir, registry, extracted_params, &ValidationOptions::default())
}

/// Validate and truncate the batch for the repair loop.
pub fn validate_for_repair(
    ir: &WorkflowIr,
    registry: &Registry,
    extracted_params: Option<&Map<String, Value>>,
) -> Vec<ErrorRecord> {
    let mut errors = validate(ir, registry, extracted_params);
    errors.truncate(REPAIR_ERROR_LIMIT);
    errors
}

/// Structural layers only (1, 2, 4); what the compiler runs fail-fast.
pub fn validate_structural(ir: &WorkflowIr, registry: &Registry) -> Vec<ErrorRecord> {
    validate(ir, registry, None)
}

pub fn validate_with_options(
    ir: &WorkflowIr,
    registry: &Registry,
    extracted_params: Option<&Map<String, Value>>,
    options: &ValidationOptions,
) -> Vec<ErrorRecord> {
    let mut errors = Vec::new();
    layer1_schema(ir, &mut errors);
    layer2_graph(ir, &mut errors);
    if let Some(params) = extracted_params {
        layer3_templates(ir, registry, params, &mut errors);
    }
    if options.check_node_types {
        layer4_node_types(ir, registry, &mut errors);
    }
    errors
}

fn schema_error(message: String) -> ErrorRecord {
    ErrorRecord::validation(ErrorCategory::Schema, message).fixable(true)
}

fn layer1_schema(ir: &WorkflowIr, errors: &mut Vec<ErrorRecord>) {
    if ir.ir_version != IR_VERSION {
        errors.push(schema_error(format!(
            "unsupported ir_version `{}` (supported: {IR_VERSION})",
            ir.ir_version
        )));
    }

    let mut seen = Vec::new();
    for node in &ir.nodes {
        if node.id.is_empty() {
            errors.push(schema_error("node with empty id".to_string()));
            continue;
        }
        if is_framework_key(&node.id) {
            errors.push(
                schema_error(format!(
                    "node id `{}` collides with the framework key pattern `__*__`",
                    node.id
                ))
                .with_node_id(&node.id),
            );
        }
        if seen.contains(&node.id.as_str()) {
            errors.push(
                schema_error(format!("duplicate node id `{}`", node.id)).with_node_id(&node.id),
            );
        } else {
            seen.push(node.id.as_str());
        }
        if ir.inputs.contains_key(&node.id) {
            errors.push(
                schema_error(format!(
                    "node id `{}` shadows a declared workflow input of the same name",
                    node.id
                ))
                .with_node_id(&node.id),
            );
        }
    }

    for (name, input) in &ir.inputs {
        if !input.required && input.default.is_none() {
            errors.push(schema_error(format!(
                "input `{name}` is optional but declares no default"
            )));
        }
    }
}

fn layer2_graph(ir: &WorkflowIr, errors: &mut Vec<ErrorRecord>) {
    let graph_error = |message: String| {
        ErrorRecord::validation(ErrorCategory::Graph, message).fixable(true)
    };

    let mut successors: Vec<&str> = Vec::new();
    let mut predecessors: Vec<&str> = Vec::new();
    for edge in &ir.edges {
        let from_pos = ir.node_position(&edge.from);
        let to_pos = ir.node_position(&edge.to);
        if from_pos.is_none() {
            errors.push(graph_error(format!(
                "edge references unknown node `{}`",
                edge.from
            )));
        }
        if to_pos.is_none() {
            errors.push(graph_error(format!(
                "edge references unknown node `{}`",
                edge.to
            )));
        }
        let (Some(from_pos), Some(to_pos)) = (from_pos, to_pos) else {
            continue;
        };

        if successors.contains(&edge.from.as_str()) {
            errors.push(graph_error(format!(
                "node `{}` has more than one successor; the chain must be linear",
                edge.from
            )));
        } else {
            successors.push(&edge.from);
        }
        if predecessors.contains(&edge.to.as_str()) {
            errors.push(graph_error(format!(
                "node `{}` has more than one predecessor; the chain must be linear",
                edge.to
            )));
        } else {
            predecessors.push(&edge.to);
        }

        if from_pos >= to_pos {
            errors.push(graph_error(format!(
                "edge `{}` -> `{}` runs against the node order; the nodes list is the execution order",
                edge.from, edge.to
            )));
        }
    }
}

/// Context heads visible to a template at a given point: inputs with a
/// provided or default value, plus the namespaces of nodes before
/// `before_node` (all nodes for workflow outputs).
fn visible_heads<'a>(
    ir: &'a WorkflowIr,
    params: &Map<String, Value>,
    before_node: Option<usize>,
) -> Vec<&'a str> {
    let mut heads: Vec<&str> = ir
        .inputs
        .iter()
        .filter(|(name, spec)| params.contains_key(*name) || spec.default.is_some())
        .map(|(name, _)| name.as_str())
        .collect();
    let limit = before_node.unwrap_or(ir.nodes.len());
    heads.extend(ir.nodes.iter().take(limit).map(|n| n.id.as_str()));
    heads
}

fn check_variable(
    ir: &WorkflowIr,
    registry: &Registry,
    var: &str,
    heads: &[&str],
    subject: &str,
    node_id: Option<&str>,
    errors: &mut Vec<ErrorRecord>,
) {
    let template_error = |message: String| {
        let mut record =
            ErrorRecord::validation(ErrorCategory::TemplateError, message).fixable(true);
        if let Some(id) = node_id {
            record = record.with_node_id(id);
        }
        record.with_available_fields(heads.iter().map(|h| h.to_string()).collect())
    };

    let path = match TemplatePath::parse(var) {
        Ok(path) => path,
        Err(err) => {
            errors.push(template_error(format!("{subject}: {err}")));
            return;
        }
    };

    if !heads.contains(&path.head()) {
        let suggestions = fuzzy::suggestions(
            path.head(),
            heads.iter().copied(),
            template::MAX_SUGGESTIONS,
        );
        let mut message = format!(
            "{subject}: `${{{var}}}` does not resolve; `{}` is neither an available input nor a preceding node",
            path.head()
        );
        if !suggestions.is_empty() {
            message.push_str(&format!(" (did you mean: {}?)", suggestions.join(", ")));
        }
        errors.push(template_error(message));
        return;
    }

    // Ahead-of-time key check, possible only when the head is a node whose
    // type promises a concrete output schema.
    let Some(node) = ir.node(path.head()) else {
        return;
    };
    let Ok(entry) = registry.resolve(&node.node_type) else {
        return; // layer 4 reports the unknown type
    };
    if !entry.outputs_are_concrete() {
        return;
    }
    match path.segments().first() {
        Some(crate::template::PathSegment::Field(field)) => {
            if !entry.promises_output(field) {
                let known: Vec<&str> = entry.outputs.keys().map(String::as_str).collect();
                errors.push(template_error(format!(
                    "{subject}: node `{}` (type `{}`) does not promise output `{field}`; declared outputs: {}",
                    path.head(),
                    node.node_type,
                    known.join(", ")
                )));
            }
        }
        Some(crate::template::PathSegment::Index(_)) => {
            errors.push(template_error(format!(
                "{subject}: node namespaces are mappings; `${{{var}}}` indexes `{}` like an array",
                path.head()
            )));
        }
        None => {}
    }
}

fn walk_templates(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for var in template::extract_variables(s) {
                if !out.contains(&var) {
                    out.push(var);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| walk_templates(v, out)),
        Value::Object(map) => map.values().for_each(|v| walk_templates(v, out)),
        _ => {}
    }
}

fn layer3_templates(
    ir: &WorkflowIr,
    registry: &Registry,
    params: &Map<String, Value>,
    errors: &mut Vec<ErrorRecord>,
) {
    for (pos, node) in ir.nodes.iter().enumerate() {
        let heads = visible_heads(ir, params, Some(pos));
        for (param_name, param_value) in &node.params {
            let mut vars = Vec::new();
            walk_templates(param_value, &mut vars);
            for var in vars {
                check_variable(
                    ir,
                    registry,
                    &var,
                    &heads,
                    &format!("param `{param_name}`"),
                    Some(&node.id),
                    errors,
                );
            }
        }
    }

    let heads = visible_heads(ir, params, None);
    for (output_name, output) in &ir.outputs {
        for var in template::extract_variables(&output.source) {
            check_variable(
                ir,
                registry,
                &var,
                &heads,
                &format!("workflow output `{output_name}`"),
                None,
                errors,
            );
        }
    }
}

fn layer4_node_types(ir: &WorkflowIr, registry: &Registry, errors: &mut Vec<ErrorRecord>) {
    for node in &ir.nodes {
        if !registry.contains(&node.node_type) {
            let suggestions = registry.suggest(&node.node_type);
            let mut message = format!("unknown node type `{}`", node.node_type);
            if !suggestions.is_empty() {
                message.push_str(&format!(" (did you mean: {}?)", suggestions.join(", ")));
            }
            errors.push(
                ErrorRecord::validation(ErrorCategory::UnknownNodeType, message)
                    .with_node_id(&node.id)
                    .fixable(true),
            );
        }
    }
}
