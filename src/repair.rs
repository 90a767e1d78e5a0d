//! Planner-driven repair loop and the high-level run facade.
//!
//! The planner is an external collaborator injected as a trait object:
//! given the failing IR, a capped batch of error records, and a redacted
//! snapshot of the partial store, it returns a patched IR or declines.
//! The loop re-validates, recompiles, and re-executes each patch from a
//! fresh store; nothing from a prior attempt is replayed. Three attempts,
//! then the failure is marked non-repairable.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use crate::compiler::compile;
use crate::errors::{ErrorCategory, ErrorRecord, cap_for_repair};
use crate::executor::{ExecuteOptions, ExecutionResult, ExecutorService, ProgressCallback, WorkflowStatus};
use crate::ir::WorkflowIr;
use crate::registry::Registry;
use crate::settings::Settings;
use crate::store::{is_framework_key, keys};
use crate::trace::RepairAttemptRecord;
use crate::validator::validate;

/// Repair attempts per run, at most.
pub const MAX_REPAIR_ATTEMPTS: usize = 3;

const REDACT_STRING_LIMIT: usize = 500;

/// External planner contract: `patch(ir, errors, shared) -> IR | decline`.
///
/// Injected as a dependency so the core never couples to a concrete
/// planner pipeline.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn patch(
        &self,
        ir: &WorkflowIr,
        errors: &[ErrorRecord],
        shared: &Map<String, Value>,
    ) -> Option<WorkflowIr>;
}

/// Options for [`WorkflowRunner::run`].
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Skip the repair loop even when a planner is configured.
    pub no_repair: bool,
    /// Validate (all four layers, with the provided params) and return
    /// without executing.
    pub validate_only: bool,
    pub trace_path: Option<PathBuf>,
    pub progress: Option<ProgressCallback>,
    /// Settings-file layer of the mode hierarchy; `None` skips it.
    pub settings: Option<Settings>,
}

/// Compile-and-run front door tying validator, compiler, executor, and
/// repair loop together.
pub struct WorkflowRunner {
    registry: Registry,
    executor: ExecutorService,
    planner: Option<Arc<dyn Planner>>,
}

impl WorkflowRunner {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            executor: ExecutorService::new(),
            planner: None,
        }
    }

    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorService) -> Self {
        self.executor = executor;
        self
    }

    #[must_use]
    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run a workflow end to end: validate/compile, execute, and repair on
    /// recoverable failure when a planner is configured.
    #[instrument(skip_all, fields(nodes = ir.nodes.len()))]
    pub async fn run(
        &self,
        ir: &WorkflowIr,
        params: Map<String, Value>,
        options: RunOptions,
    ) -> ExecutionResult {
        if options.validate_only {
            let errors = validate(ir, &self.registry, Some(&params));
            return validation_result(errors);
        }

        let execute_options = ExecuteOptions {
            trace_path: options.trace_path.clone(),
            progress: options.progress.clone(),
        };

        let mut current_ir = ir.clone();
        let mut attempts: Vec<RepairAttemptRecord> = Vec::new();
        let mut result = self
            .compile_and_execute(&current_ir, &params, &execute_options, attempts.clone(), options.settings.as_ref())
            .await;

        let planner = match (&self.planner, options.no_repair) {
            (Some(planner), false) => planner,
            _ => return result,
        };

        while !result.success && attempts.len() < MAX_REPAIR_ATTEMPTS {
            let attempt_no = u32::try_from(attempts.len() + 1).unwrap_or(u32::MAX);
            let batch = cap_for_repair(&result.errors).to_vec();
            let redacted = redact_store(&result.shared_after);

            info!(attempt = attempt_no, errors = batch.len(), "requesting IR patch");
            let patched = planner.patch(&current_ir, &batch, &redacted).await;

            let Some(patched) = patched else {
                attempts.push(RepairAttemptRecord {
                    attempt: attempt_no,
                    accepted: false,
                    message: "planner declined to patch".to_string(),
                    errors_sent: batch.len(),
                });
                return mark_non_repairable(result, "planner declined to patch the workflow");
            };
            if patched.to_value() == current_ir.to_value() {
                attempts.push(RepairAttemptRecord {
                    attempt: attempt_no,
                    accepted: false,
                    message: "planner returned an identical workflow".to_string(),
                    errors_sent: batch.len(),
                });
                return mark_non_repairable(result, "planner returned an identical workflow");
            }

            attempts.push(RepairAttemptRecord {
                attempt: attempt_no,
                accepted: true,
                message: "planner patched the workflow; re-executing".to_string(),
                errors_sent: batch.len(),
            });
            current_ir = patched;
            result = self
                .compile_and_execute(&current_ir, &params, &execute_options, attempts.clone(), options.settings.as_ref())
                .await;
        }

        if !result.success && attempts.len() >= MAX_REPAIR_ATTEMPTS {
            warn!("repair attempts exhausted");
            return mark_non_repairable(result, "repair attempts exhausted");
        }
        result
    }

    async fn compile_and_execute(
        &self,
        ir: &WorkflowIr,
        params: &Map<String, Value>,
        options: &ExecuteOptions,
        attempts: Vec<RepairAttemptRecord>,
        settings: Option<&Settings>,
    ) -> ExecutionResult {
        match compile(ir, &self.registry, settings) {
            Ok(graph) => {
                self.executor
                    .execute_attempt(&graph, params.clone(), options, attempts)
                    .await
            }
            Err(err) => validation_result(err.into_records()),
        }
    }
}

/// Result shell for validation/compile failures where nothing executed.
fn validation_result(errors: Vec<ErrorRecord>) -> ExecutionResult {
    let status = if errors.is_empty() {
        WorkflowStatus::Success
    } else {
        WorkflowStatus::Failed
    };
    ExecutionResult {
        success: errors.is_empty(),
        status,
        shared_after: Map::new(),
        outputs: Map::new(),
        errors,
        warnings: Vec::new(),
        duration_ms: 0,
        trace_path: None,
        run_id: uuid::Uuid::new_v4().to_string(),
    }
}

fn mark_non_repairable(mut result: ExecutionResult, reason: &str) -> ExecutionResult {
    result
        .shared_after
        .insert(keys::NON_REPAIRABLE_ERROR.to_string(), json!(reason));
    result.errors.push(
        ErrorRecord::runtime(ErrorCategory::NonRepairable, reason.to_string()).fixable(false),
    );
    result.status = WorkflowStatus::Failed;
    result.success = false;
    result
}

/// Strip framework keys and truncate large strings before the partial
/// store leaves the process boundary toward the planner.
pub fn redact_store(shared: &Map<String, Value>) -> Map<String, Value> {
    shared
        .iter()
        .filter(|(key, _)| !is_framework_key(key))
        .map(|(key, value)| (key.clone(), redact_value(value)))
        .collect()
}

fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > REDACT_STRING_LIMIT => {
            let truncated: String = s.chars().take(REDACT_STRING_LIMIT).collect();
            Value::String(format!("{truncated}… [truncated]"))
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
