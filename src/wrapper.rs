//! Template-aware, instrumented decorator around every registered node.
//!
//! The wrapper owns the per-node lifecycle: resolve the declared params
//! against the current store (root view, since templates reference sibling
//! namespaces), apply the strict/permissive gate, run the inner node's
//! `prep`/`exec`/`post`, and record timing and failure context. Declared
//! params are never mutated — each run resolves a fresh copy, so the
//! wrapper is idempotent across repair attempts.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::errors::{ErrorCategory, ErrorRecord, ErrorSource};
use crate::ir::{NodeSpec, TemplateResolutionMode};
use crate::node::{Node, NodeContext, NodeError};
use crate::registry::RegistryEntry;
use crate::store::SharedStore;
use crate::template::{ResolutionFailure, resolve};

/// What one wrapped execution produced, success or not.
///
/// `duration_ms` is always a number; a node that fails before timing
/// starts reports 0.
#[derive(Clone, Debug)]
pub struct WrapperOutcome {
    pub node_id: String,
    pub resolved_params: Map<String, Value>,
    pub duration_ms: u64,
    pub error: Option<ErrorRecord>,
    /// Whether the inner node was invoked at all (false when the strict
    /// gate rejected the params).
    pub executed: bool,
}

/// A registered node bound to its spec, ready to execute.
pub struct NodeWrapper {
    node_id: String,
    node_type: String,
    /// Declared params, templates intact. Never mutated.
    spec_params: Map<String, Value>,
    mode: TemplateResolutionMode,
    required_outputs: Vec<String>,
    inner: Arc<dyn Node>,
}

impl NodeWrapper {
    pub fn new(
        spec: &NodeSpec,
        entry: &RegistryEntry,
        inner: Arc<dyn Node>,
        mode: TemplateResolutionMode,
    ) -> Self {
        Self {
            node_id: spec.id.clone(),
            node_type: spec.node_type.clone(),
            spec_params: spec.params.clone(),
            mode,
            required_outputs: entry.required_output_keys().map(str::to_string).collect(),
            inner,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Run the full prep → gate → exec → post lifecycle for one node.
    pub async fn execute(&self, step: usize, store: &mut SharedStore) -> WrapperOutcome {
        // Prep: resolve every declared param against the root view.
        let mut resolved_params = Map::new();
        let mut failures: Vec<(String, ResolutionFailure)> = Vec::new();
        for (param, original) in &self.spec_params {
            let (resolved, complete) = resolve(original, store.root());
            if !complete {
                let failure = ResolutionFailure::diagnose(
                    &self.node_id,
                    param,
                    original,
                    &resolved,
                    store.root(),
                );
                failures.push((param.clone(), failure));
            }
            resolved_params.insert(param.clone(), resolved);
        }

        // Strict/permissive gate.
        if !failures.is_empty() {
            match self.mode {
                TemplateResolutionMode::Strict => {
                    let (_, failure) = &failures[0];
                    debug!(
                        node_id = %self.node_id,
                        unresolved = ?failure.unresolved_variables,
                        "strict gate rejected params"
                    );
                    return WrapperOutcome {
                        node_id: self.node_id.clone(),
                        resolved_params,
                        duration_ms: 0,
                        error: Some(failure.to_error_record(ErrorSource::Runtime, store.root())),
                        executed: false,
                    };
                }
                TemplateResolutionMode::Permissive => {
                    for (param, failure) in &failures {
                        warn!(
                            node_id = %self.node_id,
                            param = %param,
                            unresolved = ?failure.unresolved_variables,
                            "continuing with partially resolved param"
                        );
                        store.push_template_error(failure.to_details());
                        store.push_warning(failure.to_warning());
                    }
                }
            }
        }

        // Execute.
        let started = Instant::now();
        let run_result = self.run_inner(step, &resolved_params, store).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        // Post: schema coverage, then failure enrichment.
        let error = match run_result {
            Ok(()) => self.missing_output_error(store),
            Err(node_error) => Some(self.to_error_record(node_error, store)),
        };

        WrapperOutcome {
            node_id: self.node_id.clone(),
            resolved_params,
            duration_ms,
            error,
            executed: true,
        }
    }

    async fn run_inner(
        &self,
        step: usize,
        resolved_params: &Map<String, Value>,
        store: &mut SharedStore,
    ) -> Result<(), NodeError> {
        let mut ctx = NodeContext::new(&self.node_id, step, store.namespaced(&self.node_id));
        self.inner.prep(&mut ctx).await?;
        self.inner.exec(resolved_params, &mut ctx).await?;
        self.inner.post(&mut ctx).await
    }

    /// Schema-promised keys the run failed to write, as an error record.
    fn missing_output_error(&self, store: &SharedStore) -> Option<ErrorRecord> {
        let namespace = store.namespace(&self.node_id);
        let missing: Vec<&str> = self
            .required_outputs
            .iter()
            .map(String::as_str)
            .filter(|key| !namespace.is_some_and(|ns| ns.contains_key(*key)))
            .collect();
        if missing.is_empty() {
            return None;
        }
        let record = ErrorRecord::runtime(
            ErrorCategory::ExecutionFailure,
            format!(
                "node `{}` (type `{}`) completed without writing promised outputs: {}",
                self.node_id,
                self.node_type,
                missing.join(", ")
            ),
        )
        .with_node_id(&self.node_id);
        Some(enrich_from_namespace(record, namespace))
    }

    fn to_error_record(&self, error: NodeError, store: &SharedStore) -> ErrorRecord {
        let mut record = ErrorRecord::runtime(error.category(), error.to_string())
            .with_node_id(&self.node_id)
            .fixable(true);
        if let Some(code) = error.status_code() {
            record = record.with_status_code(code);
        }
        if let Some(raw) = error.raw_response() {
            record = record.with_raw_response(raw.clone());
        }
        enrich_from_namespace(record, store.namespace(&self.node_id))
    }
}

/// Pull error-bearing fields a failing node may have written (`response`,
/// `status_code`, `result.error`, `error_details`) into the record, and
/// list the namespace keys as `available_fields`.
pub fn enrich_from_namespace(
    mut record: ErrorRecord,
    namespace: Option<&Map<String, Value>>,
) -> ErrorRecord {
    let Some(ns) = namespace else {
        return record;
    };
    record.available_fields = Some(ns.keys().cloned().collect());
    if record.raw_response.is_none() {
        record.raw_response = ns.get("response").cloned();
    }
    if record.status_code.is_none() {
        record.status_code = ns
            .get("status_code")
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok());
    }
    if record.mcp_error.is_none() {
        record.mcp_error = ns
            .get("mcp_error")
            .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string));
    }

    let result_error = ns
        .get("result")
        .and_then(Value::as_object)
        .and_then(|r| r.get("error"));
    let error_details = ns.get("error_details");
    if result_error.is_some() || error_details.is_some() {
        let mut extra = Map::new();
        if let Some(v) = result_error {
            extra.insert("result_error".into(), v.clone());
        }
        if let Some(v) = error_details {
            extra.insert("error_details".into(), v.clone());
        }
        record.details = match record.details {
            Value::Null => Value::Object(extra),
            Value::Object(mut existing) => {
                existing.extend(extra);
                Value::Object(existing)
            }
            other => json!({"details": other, "captured": extra}),
        };
    }
    record
}
