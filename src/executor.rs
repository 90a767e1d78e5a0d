//! Sequential workflow execution.
//!
//! The executor walks the compiled chain in order, one node at a time, on
//! one logical task. Each node gets a fresh namespaced store view; the
//! first error terminates the run. No exception escapes: the result embeds
//! every diagnostic, and a trace file is always written.
//!
//! # Ordering guarantees
//!
//! - A node's writes are visible to every later node's param resolution.
//! - Framework keys follow root-level happens-before.
//! - Warnings keep insertion order into the final result and trace.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::errors::{ErrorCategory, ErrorRecord, ErrorSource, WarningRecord};
use crate::graph::ExecutionGraph;
use crate::store::{SharedStore, keys};
use crate::template::{ResolutionFailure, resolve};
use crate::trace::{
    NodeTraceEvent, RepairAttemptRecord, TRACE_FORMAT_VERSION, TraceDocument, default_trace_dir,
};

/// Final tri-state outcome of a run.
///
/// `DEGRADED` is a first-class value: the workflow completed, but warnings
/// or template diagnostics were recorded along the way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "DEGRADED")]
    Degraded,
    #[serde(rename = "FAILED")]
    Failed,
}

impl WorkflowStatus {
    /// Conventional process exit code for CLI embedders.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Degraded => 2,
            Self::Failed => 1,
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Degraded => write!(f, "DEGRADED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Verdict returned by a progress callback between nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressSignal {
    Continue,
    Cancel,
}

/// Snapshot handed to the progress callback between nodes.
#[derive(Clone, Debug)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub last_node: Option<String>,
    pub next_node: Option<String>,
}

/// Callable invoked between nodes; returning [`ProgressSignal::Cancel`]
/// halts the run after the current node. An in-flight node is never
/// interrupted.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) -> ProgressSignal + Send + Sync>;

/// Per-run execution options.
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    /// Explicit trace file path; defaults to the conventional directory.
    pub trace_path: Option<PathBuf>,
    /// Cancellation hook (the `__progress_callback__` slot).
    pub progress: Option<ProgressCallback>,
}

/// Everything a run produced.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// `status != FAILED`.
    pub success: bool,
    pub status: WorkflowStatus,
    /// Final root store: inputs, node namespaces, framework keys.
    pub shared_after: Map<String, Value>,
    /// Declared workflow outputs that resolved.
    pub outputs: Map<String, Value>,
    pub errors: Vec<ErrorRecord>,
    pub warnings: Vec<WarningRecord>,
    pub duration_ms: u64,
    pub trace_path: Option<PathBuf>,
    pub run_id: String,
}

/// Runs compiled graphs and renders [`ExecutionResult`]s.
#[derive(Clone, Debug)]
pub struct ExecutorService {
    trace_dir: PathBuf,
}

impl ExecutorService {
    pub fn new() -> Self {
        Self {
            trace_dir: default_trace_dir(),
        }
    }

    pub fn with_trace_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            trace_dir: dir.into(),
        }
    }

    /// Execute a compiled graph once, to completion or first failure.
    #[instrument(skip_all, fields(nodes = graph.len(), mode = %graph.mode))]
    pub async fn execute(
        &self,
        graph: &ExecutionGraph,
        params: Map<String, Value>,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        self.execute_attempt(graph, params, options, Vec::new()).await
    }

    /// Like [`execute`](Self::execute), threading repair attempt records
    /// into the trace. Each attempt starts from a fresh store.
    pub(crate) async fn execute_attempt(
        &self,
        graph: &ExecutionGraph,
        params: Map<String, Value>,
        options: &ExecuteOptions,
        repair_attempts: Vec<RepairAttemptRecord>,
    ) -> ExecutionResult {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut errors: Vec<ErrorRecord> = Vec::new();
        let mut events: Vec<NodeTraceEvent> = Vec::new();
        let mut outputs: Map<String, Value> = Map::new();

        // Merge provided params with declared defaults.
        let mut inputs: Map<String, Value> = Map::new();
        for (name, spec) in &graph.inputs {
            match params.get(name).or(spec.default.as_ref()) {
                Some(value) => {
                    inputs.insert(name.clone(), value.clone());
                }
                None if spec.required => {
                    errors.push(
                        ErrorRecord::validation(
                            ErrorCategory::Schema,
                            format!("required input `{name}` was not provided"),
                        )
                        .fixable(true),
                    );
                }
                None => {}
            }
        }

        let mut store = SharedStore::with_inputs(inputs);
        store.set(
            keys::EXECUTION,
            json!({
                "completed_nodes": [],
                "failed_node": null,
                "node_actions": {},
            }),
        );

        if errors.is_empty() {
            let total = graph.len();
            let mut completed: Vec<String> = Vec::new();

            for (step, wrapper) in graph.nodes().iter().enumerate() {
                if step > 0 {
                    if let Some(progress) = &options.progress {
                        let update = ProgressUpdate {
                            completed: completed.len(),
                            total,
                            last_node: completed.last().cloned(),
                            next_node: Some(wrapper.node_id().to_string()),
                        };
                        if progress(&update) == ProgressSignal::Cancel {
                            warn!(next = wrapper.node_id(), "cancelled by progress callback");
                            errors.push(ErrorRecord::runtime(
                                ErrorCategory::Cancelled,
                                format!(
                                    "execution cancelled by progress callback before node `{}`",
                                    wrapper.node_id()
                                ),
                            ));
                            break;
                        }
                    }
                }

                let node_started_at = Utc::now();
                debug!(node_id = wrapper.node_id(), step, "node begin");
                let outcome = wrapper.execute(step, &mut store).await;
                let node_finished_at = Utc::now();

                events.push(NodeTraceEvent {
                    node_id: wrapper.node_id().to_string(),
                    node_type: wrapper.node_type().to_string(),
                    started_at: node_started_at,
                    finished_at: node_finished_at,
                    duration_ms: outcome.duration_ms,
                    inputs: Value::Object(outcome.resolved_params.clone()),
                    outputs: store
                        .namespace(wrapper.node_id())
                        .map(|ns| Value::Object(ns.clone()))
                        .unwrap_or(Value::Null),
                    error: outcome.error.clone(),
                });

                match outcome.error {
                    Some(record) => {
                        error!(node_id = wrapper.node_id(), message = %record.message, "node failed");
                        set_execution_field(
                            &mut store,
                            "failed_node",
                            json!(wrapper.node_id()),
                        );
                        errors.push(record);
                        break;
                    }
                    None => {
                        debug!(
                            node_id = wrapper.node_id(),
                            duration_ms = outcome.duration_ms,
                            "node end"
                        );
                        completed.push(wrapper.node_id().to_string());
                        push_completed_node(&mut store, wrapper.node_id());
                    }
                }
            }

            // Resolve declared workflow outputs against the final store.
            if errors.is_empty() {
                for (name, spec) in &graph.outputs {
                    let source = Value::String(spec.source.clone());
                    let (value, complete) = resolve(&source, store.root());
                    if complete {
                        outputs.insert(name.clone(), value);
                    } else {
                        let failure = ResolutionFailure::diagnose(
                            "workflow",
                            name,
                            &source,
                            &value,
                            store.root(),
                        );
                        errors.push(
                            ErrorRecord::new(
                                ErrorSource::Runtime,
                                ErrorCategory::TemplateError,
                                format!("workflow output `{name}` did not resolve: {}", failure.message()),
                            )
                            .fixable(true)
                            .with_details(failure.to_details()),
                        );
                    }
                }
            }
        }

        let warnings = store.warnings();
        let non_repairable = store.get(keys::NON_REPAIRABLE_ERROR).is_some();
        let status = if !errors.is_empty() || non_repairable {
            WorkflowStatus::Failed
        } else if !warnings.is_empty() || store.has_template_errors() {
            WorkflowStatus::Degraded
        } else {
            WorkflowStatus::Success
        };

        let finished_at = Utc::now();
        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        let document = TraceDocument {
            format_version: TRACE_FORMAT_VERSION.to_string(),
            run_id: run_id.clone(),
            started_at,
            finished_at,
            duration_ms,
            template_resolution_mode: graph.mode,
            workflow: graph.ir_snapshot().clone(),
            events,
            errors: errors.clone(),
            warnings: warnings.clone(),
            status,
            repair_attempts,
        };
        let trace_path = self.write_trace(&document, options);

        ExecutionResult {
            success: status != WorkflowStatus::Failed,
            status,
            shared_after: store.into_root(),
            outputs,
            errors,
            warnings,
            duration_ms,
            trace_path,
            run_id,
        }
    }

    fn write_trace(&self, document: &TraceDocument, options: &ExecuteOptions) -> Option<PathBuf> {
        let outcome = match &options.trace_path {
            Some(path) => document.write_to(path).map(|()| path.clone()),
            None => document.write_under(&self.trace_dir),
        };
        match outcome {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(%err, "failed to write trace file");
                None
            }
        }
    }
}

impl Default for ExecutorService {
    fn default() -> Self {
        Self::new()
    }
}

fn set_execution_field(store: &mut SharedStore, field: &str, value: Value) {
    if let Some(execution) = store
        .root_mut()
        .get_mut(keys::EXECUTION)
        .and_then(Value::as_object_mut)
    {
        execution.insert(field.to_string(), value);
    }
}

fn push_completed_node(store: &mut SharedStore, node_id: &str) {
    if let Some(execution) = store
        .root_mut()
        .get_mut(keys::EXECUTION)
        .and_then(Value::as_object_mut)
    {
        if let Some(list) = execution
            .get_mut("completed_nodes")
            .and_then(Value::as_array_mut)
        {
            list.push(json!(node_id));
        }
        if let Some(actions) = execution
            .get_mut("node_actions")
            .and_then(Value::as_object_mut)
        {
            actions.insert(node_id.to_string(), json!("default"));
        }
    }
}
