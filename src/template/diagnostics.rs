//! Enriched diagnostics for failed template resolution.
//!
//! Produced on strict-mode failures and in permissive-mode warnings. The
//! goal is a message an agent (or human) can act on without opening the
//! trace: the failing node and param, which variables did not resolve,
//! what the context actually offered, and up to three did-you-mean
//! candidates for the failing heads.

use serde_json::{Map, Value, json};

use crate::errors::{ErrorCategory, ErrorRecord, ErrorSource, WarningRecord};
use crate::store::is_framework_key;
use crate::utils::fuzzy;

use super::path::TemplatePath;
use super::resolve::unresolved_variables;

/// Context heads shown in a diagnostic, at most.
pub const MAX_CONTEXT_KEYS: usize = 20;
/// Did-you-mean candidates per diagnostic, at most.
pub const MAX_SUGGESTIONS: usize = 3;

const PREVIEW_LEN: usize = 40;

/// One parameter that failed to resolve completely.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolutionFailure {
    pub node_id: String,
    pub param: String,
    /// The parameter as declared, templates intact.
    pub template: Value,
    pub unresolved_variables: Vec<String>,
    /// Human-readable summary of the context heads, `"(none)"` when the
    /// context offered nothing.
    pub available_context_keys: String,
    pub suggestions: Vec<String>,
}

impl ResolutionFailure {
    /// Diagnose a failed resolution of `original` → `resolved` for one
    /// node param against the root context.
    pub fn diagnose(
        node_id: &str,
        param: &str,
        original: &Value,
        resolved: &Value,
        context: &Map<String, Value>,
    ) -> Self {
        let unresolved = unresolved_variables(original, resolved);
        let heads: Vec<&str> = context
            .keys()
            .filter(|k| !is_framework_key(k))
            .map(String::as_str)
            .collect();

        let mut suggestions = Vec::new();
        for var in &unresolved {
            let head = TemplatePath::parse(var)
                .map(|p| p.head().to_string())
                .unwrap_or_else(|_| var.clone());
            for candidate in fuzzy::suggestions(&head, heads.iter().copied(), MAX_SUGGESTIONS) {
                if !suggestions.contains(&candidate) {
                    suggestions.push(candidate);
                }
            }
        }
        suggestions.truncate(MAX_SUGGESTIONS);

        Self {
            node_id: node_id.to_string(),
            param: param.to_string(),
            template: original.clone(),
            unresolved_variables: unresolved,
            available_context_keys: describe_context_keys(context),
            suggestions,
        }
    }

    /// Actionable one-line message.
    pub fn message(&self) -> String {
        let vars = self
            .unresolved_variables
            .iter()
            .map(|v| format!("${{{v}}}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut msg = format!(
            "unresolved template variables in param `{}` of node `{}`: {}; available context keys: {}",
            self.param, self.node_id, vars, self.available_context_keys
        );
        if !self.suggestions.is_empty() {
            msg.push_str(&format!("; did you mean: {}", self.suggestions.join(", ")));
        }
        msg
    }

    /// Structured payload carried in `ErrorRecord::details` and in
    /// `__template_errors__`.
    pub fn to_details(&self) -> Value {
        json!({
            "node_id": self.node_id,
            "param": self.param,
            "template": self.template,
            "unresolved_variables": self.unresolved_variables,
            "available_context_keys": self.available_context_keys,
            "suggestions": self.suggestions,
        })
    }

    /// Head-level context keys for `ErrorRecord::available_fields`.
    pub fn available_fields(context: &Map<String, Value>) -> Vec<String> {
        context
            .keys()
            .filter(|k| !is_framework_key(k))
            .take(MAX_CONTEXT_KEYS)
            .cloned()
            .collect()
    }

    pub fn to_error_record(&self, source: ErrorSource, context: &Map<String, Value>) -> ErrorRecord {
        ErrorRecord::new(source, ErrorCategory::TemplateError, self.message())
            .with_node_id(&self.node_id)
            .fixable(true)
            .with_available_fields(Self::available_fields(context))
            .with_details(self.to_details())
    }

    pub fn to_warning(&self) -> WarningRecord {
        WarningRecord::new(ErrorCategory::TemplateError, self.message())
            .with_node_id(&self.node_id)
            .with_param(&self.param)
    }
}

/// Summarize the context heads: type-tagged, small values previewed,
/// capped at [`MAX_CONTEXT_KEYS`]. Framework keys are omitted.
pub fn describe_context_keys(context: &Map<String, Value>) -> String {
    let mut described: Vec<String> = Vec::new();
    let mut total = 0usize;
    for (key, value) in context {
        if is_framework_key(key) {
            continue;
        }
        total += 1;
        if described.len() < MAX_CONTEXT_KEYS {
            described.push(format!("{key} ({})", describe_value(value)));
        }
    }
    if described.is_empty() {
        return "(none)".to_string();
    }
    let mut out = described.join(", ");
    if total > MAX_CONTEXT_KEYS {
        out.push_str(&format!(", … {} more", total - MAX_CONTEXT_KEYS));
    }
    out
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean = {b}"),
        Value::Number(n) => format!("number = {n}"),
        Value::String(s) => format!("string = {}", preview_str(s)),
        Value::Array(items) => format!("array[{}]", items.len()),
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().take(5).map(String::as_str).collect();
            if map.len() > keys.len() {
                format!("object: {}, …", keys.join(", "))
            } else {
                format!("object: {}", keys.join(", "))
            }
        }
    }
}

fn preview_str(s: &str) -> String {
    if s.chars().count() <= PREVIEW_LEN {
        format!("{s:?}")
    } else {
        let truncated: String = s.chars().take(PREVIEW_LEN).collect();
        format!("{:?}…", truncated)
    }
}
