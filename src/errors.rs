//! Structured diagnostic records shared by the validator, compiler, and
//! executor.
//!
//! Validation and execution never raise: fallible surfaces return a list of
//! [`ErrorRecord`]s or embed them in an
//! [`ExecutionResult`](crate::executor::ExecutionResult). Runtime exceptions
//! from nodes are caught once at the wrapper boundary and converted into
//! records here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Maximum number of errors handed to the repair loop in one batch.
///
/// Interactive surfaces (CLI/MCP display) receive the full list; the repair
/// planner works more reliably on small batches.
pub const REPAIR_ERROR_LIMIT: usize = 3;

/// Which stage of the pipeline produced a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Runtime,
    Validation,
    Compile,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime => write!(f, "runtime"),
            Self::Validation => write!(f, "validation"),
            Self::Compile => write!(f, "compile"),
        }
    }
}

/// Closed error taxonomy.
///
/// Every record carries exactly one category; downstream consumers (repair
/// planner, CLI renderers) switch on it rather than parsing messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Structural IR problems (validator layer 1).
    Schema,
    /// Edge, ordering, or cycle problems (layer 2).
    Graph,
    /// Unresolved or partially resolved template variables (layer 3 or runtime).
    TemplateError,
    /// Node type not present in the registry (layer 4).
    UnknownNodeType,
    /// A node returned a structured validation failure (e.g. HTTP 4xx with body).
    ApiValidation,
    /// Generic exception from a node.
    ExecutionFailure,
    /// Repair loop declined or exhausted its attempts.
    NonRepairable,
    /// Progress callback requested a stop between nodes.
    Cancelled,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Schema => "schema",
            Self::Graph => "graph",
            Self::TemplateError => "template_error",
            Self::UnknownNodeType => "unknown_node_type",
            Self::ApiValidation => "api_validation",
            Self::ExecutionFailure => "execution_failure",
            Self::NonRepairable => "non_repairable",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One structured error from validation, compilation, or execution.
///
/// Records carry enough context for an agent or human to act: node id,
/// category, actionable message, did-you-mean suggestions, and the fields
/// available at the failure point.
///
/// # Examples
///
/// ```
/// use pflow::errors::{ErrorCategory, ErrorRecord, ErrorSource};
///
/// let record = ErrorRecord::new(
///     ErrorSource::Validation,
///     ErrorCategory::Graph,
///     "edge references unknown node `fetch`",
/// )
/// .with_node_id("fetch")
/// .fixable(true);
///
/// assert_eq!(record.category, ErrorCategory::Graph);
/// assert_eq!(record.node_id.as_deref(), Some("fetch"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(default = "Utc::now")]
    pub when: DateTime<Utc>,
    pub source: ErrorSource,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Whether the repair loop may attempt to patch the IR for this error.
    #[serde(default)]
    pub fixable: bool,
    /// Raw body captured from a failing node, when one was reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    /// Upstream MCP error payload, when the failing node surfaced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_error: Option<String>,
    /// Head-level keys present in the failing node's namespace (or the
    /// resolution context) at the point of failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Category-specific structured payload (e.g. template diagnostics).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl ErrorRecord {
    pub fn new(
        source: ErrorSource,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            when: Utc::now(),
            source,
            category,
            message: message.into(),
            node_id: None,
            fixable: false,
            raw_response: None,
            mcp_error: None,
            available_fields: None,
            status_code: None,
            details: Value::Null,
        }
    }

    /// Shorthand for a validation-sourced record.
    pub fn validation(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::new(ErrorSource::Validation, category, message)
    }

    /// Shorthand for a compile-sourced record.
    pub fn compile(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::new(ErrorSource::Compile, category, message)
    }

    /// Shorthand for a runtime-sourced record.
    pub fn runtime(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::new(ErrorSource::Runtime, category, message)
    }

    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    #[must_use]
    pub fn fixable(mut self, fixable: bool) -> Self {
        self.fixable = fixable;
        self
    }

    #[must_use]
    pub fn with_available_fields(mut self, fields: Vec<String>) -> Self {
        self.available_fields = Some(fields);
        self
    }

    #[must_use]
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    #[must_use]
    pub fn with_raw_response(mut self, raw: Value) -> Self {
        self.raw_response = Some(raw);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_id {
            Some(id) => write!(
                f,
                "[{}/{}@{}] {}",
                self.source, self.category, id, self.message
            ),
            None => write!(f, "[{}/{}] {}", self.source, self.category, self.message),
        }
    }
}

/// Non-fatal diagnostic recorded during execution.
///
/// Warnings are accumulated in insertion order; a non-empty warning list
/// downgrades a clean run to `DEGRADED`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecord {
    #[serde(default = "Utc::now")]
    pub when: DateTime<Utc>,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Parameter the warning refers to, when it targets one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl WarningRecord {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            category,
            message: message.into(),
            node_id: None,
            param: None,
        }
    }

    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    /// Dedup key: warnings targeting the same node+param pair collapse when
    /// their message is identical.
    pub fn dedup_key(&self) -> (Option<&str>, Option<&str>, &str) {
        (self.node_id.as_deref(), self.param.as_deref(), &self.message)
    }
}

/// Truncate an error batch for the repair loop.
///
/// Interactive callers display the full list; the planner receives at most
/// [`REPAIR_ERROR_LIMIT`] records.
pub fn cap_for_repair(errors: &[ErrorRecord]) -> &[ErrorRecord] {
    &errors[..errors.len().min(REPAIR_ERROR_LIMIT)]
}
