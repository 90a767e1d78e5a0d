//! IR → executable graph compilation.
//!
//! Compilation resolves the effective template-resolution mode, runs the
//! structural validation layers fail-fast (schema, graph, node types),
//! instantiates each node through the registry, and wraps it for
//! execution. Template resolution is *not* checked here — that happens
//! per-run against live params, or explicitly via
//! [`validate`](crate::validator::validate).

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use crate::errors::{ErrorCategory, ErrorRecord};
use crate::graph::ExecutionGraph;
use crate::ir::WorkflowIr;
use crate::registry::{Registry, RegistryError};
use crate::settings::{Settings, effective_mode};
use crate::validator::validate_structural;
use crate::wrapper::NodeWrapper;

#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    /// Structural validation rejected the IR.
    #[error("workflow failed validation with {} error(s)", .0.len())]
    #[diagnostic(
        code(pflow::compiler::invalid),
        help("Inspect the attached records; each names the offending node or edge.")
    )]
    Invalid(Vec<ErrorRecord>),

    /// The registry could not resolve or construct a node.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),
}

impl CompileError {
    /// Flatten into records for surfaces that embed rather than raise.
    pub fn into_records(self) -> Vec<ErrorRecord> {
        match self {
            Self::Invalid(records) => records,
            Self::Registry(err) => {
                let category = match &err {
                    RegistryError::UnknownType { .. } => ErrorCategory::UnknownNodeType,
                    _ => ErrorCategory::ExecutionFailure,
                };
                vec![ErrorRecord::compile(category, err.to_string()).fixable(true)]
            }
        }
    }
}

/// Compile a workflow IR into an [`ExecutionGraph`].
///
/// `settings` feeds the mode hierarchy (IR > settings file > env >
/// strict); pass `None` to skip the settings-file layer.
#[instrument(skip_all, fields(nodes = ir.nodes.len()))]
pub fn compile(
    ir: &WorkflowIr,
    registry: &Registry,
    settings: Option<&Settings>,
) -> Result<ExecutionGraph, CompileError> {
    let mode = effective_mode(ir.template_resolution_mode, settings);

    let errors = validate_structural(ir, registry);
    if !errors.is_empty() {
        return Err(CompileError::Invalid(errors));
    }

    let mut nodes = Vec::with_capacity(ir.nodes.len());
    for spec in &ir.nodes {
        let entry = registry.resolve(&spec.node_type)?;
        let inner = entry
            .instantiate(spec)
            .map_err(|err| match err {
                RegistryError::Construction { .. } => err,
                other => RegistryError::Construction {
                    type_id: spec.node_type.clone(),
                    reason: other.to_string(),
                },
            })?;
        nodes.push(NodeWrapper::new(spec, entry, inner, mode));
    }

    Ok(ExecutionGraph {
        nodes,
        inputs: ir.inputs.clone(),
        outputs: ir.outputs.clone(),
        mode,
        ir_snapshot: ir.to_value(),
    })
}
