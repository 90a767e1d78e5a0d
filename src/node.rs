//! Executable node primitives.
//!
//! A node is a typed unit of work with three capabilities: `prep` (per-run
//! setup), `exec` (the work itself, against fully resolved params), and
//! `post` (cleanup after outputs are written). `prep` and `post` default to
//! no-ops; most nodes only implement `exec`.
//!
//! Nodes never see the root store. They write their outputs through the
//! [`NamespacedStore`] view on their [`NodeContext`]; the wrapper and
//! executor own resolution, instrumentation, and error capture around them.
//!
//! # Error Handling
//!
//! `exec` returning `Err` halts the workflow: the executor converts the
//! error into an [`ErrorRecord`](crate::errors::ErrorRecord), enriches it
//! from the node's namespace, and stops the chain. There is no in-core
//! retry; recovery is the repair loop's job.
//!
//! # Examples
//!
//! ```
//! use async_trait::async_trait;
//! use pflow::node::{Node, NodeContext, NodeError};
//! use serde_json::{Map, Value, json};
//!
//! struct UppercaseNode;
//!
//! #[async_trait]
//! impl Node for UppercaseNode {
//!     async fn exec(
//!         &self,
//!         params: &Map<String, Value>,
//!         ctx: &mut NodeContext<'_>,
//!     ) -> Result<(), NodeError> {
//!         let text = params
//!             .get("text")
//!             .and_then(Value::as_str)
//!             .ok_or(NodeError::MissingParam { param: "text" })?;
//!         ctx.store.set("result", json!(text.to_uppercase()));
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::errors::ErrorCategory;
use crate::store::NamespacedStore;

/// Core trait for executable workflow nodes.
///
/// Implementations should be stateless: everything a run needs arrives in
/// the resolved `params` and the store view. One instance may be executed
/// across repair attempts.
#[async_trait]
pub trait Node: Send + Sync {
    /// Per-run setup before `exec` (default no-op).
    async fn prep(&self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let _ = ctx;
        Ok(())
    }

    /// Perform the node's work.
    ///
    /// `params` is the fully resolved parameter map (templates already
    /// substituted by the wrapper). Outputs go into the node's namespace
    /// via `ctx.store`.
    async fn exec(
        &self,
        params: &Map<String, Value>,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError>;

    /// Hook after outputs are written (default no-op).
    async fn post(&self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let _ = ctx;
        Ok(())
    }
}

/// Execution context handed to a node for one run.
///
/// Carries the node's identity, its position in the chain, and the
/// namespaced store view scoped to it.
#[derive(Debug)]
pub struct NodeContext<'a> {
    /// Unique identifier of the executing node.
    pub node_id: String,
    /// Zero-based position in the execution order.
    pub step: usize,
    /// Scoped store view; non-framework keys land in this node's namespace.
    pub store: NamespacedStore<'a>,
}

impl<'a> NodeContext<'a> {
    pub fn new(node_id: impl Into<String>, step: usize, store: NamespacedStore<'a>) -> Self {
        Self {
            node_id: node_id.into(),
            step,
            store,
        }
    }
}

/// Fatal errors from node execution.
///
/// Each variant maps onto one category of the closed error taxonomy via
/// [`NodeError::category`].
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// A required parameter is absent from the resolved param map.
    #[error("missing required param `{param}`")]
    #[diagnostic(
        code(pflow::node::missing_param),
        help("Declare the param in the node spec or check the registry schema.")
    )]
    MissingParam { param: &'static str },

    /// A parameter is present but unusable.
    #[error("invalid param `{param}`: {reason}")]
    #[diagnostic(code(pflow::node::invalid_param))]
    InvalidParam { param: String, reason: String },

    /// The node's work failed (non-zero exit, refused connection, ...).
    #[error("{message}")]
    #[diagnostic(code(pflow::node::execution_failed))]
    ExecutionFailed { message: String },

    /// A collaborator returned a structured validation failure.
    #[error("api validation failed ({status_code}): {message}")]
    #[diagnostic(code(pflow::node::api_validation))]
    ApiValidation {
        status_code: u16,
        message: String,
        raw_response: Option<Value>,
    },

    #[error(transparent)]
    #[diagnostic(code(pflow::node::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(pflow::node::serde_json))]
    Serde(#[from] serde_json::Error),
}

impl NodeError {
    /// Taxonomy category for the resulting error record.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiValidation { .. } => ErrorCategory::ApiValidation,
            _ => ErrorCategory::ExecutionFailure,
        }
    }

    /// HTTP-style status code, when the failure carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiValidation { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Raw response payload, when the failure carries one.
    pub fn raw_response(&self) -> Option<&Value> {
        match self {
            Self::ApiValidation { raw_response, .. } => raw_response.as_ref(),
            _ => None,
        }
    }
}
