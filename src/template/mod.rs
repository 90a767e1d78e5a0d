//! Template extraction, resolution, and diagnostics.
//!
//! Node parameters and workflow outputs may embed `${path}` references
//! that are resolved against the shared store at execution time. The
//! subsystem splits into:
//!
//! - [`path`]: the reference grammar (`head.field[0].other`)
//! - [`resolve`]: scanning, substitution, and the recursive unresolved
//!   predicate that drives the strict/permissive gate
//! - [`diagnostics`]: enriched failure payloads with available context
//!   keys and did-you-mean suggestions
//!
//! # Examples
//!
//! ```
//! use pflow::template::{extract_variables, resolve, variable_exists};
//! use serde_json::{json, Map};
//!
//! let mut ctx = Map::new();
//! ctx.insert("greet".into(), json!({"stdout": "Hello World"}));
//!
//! assert_eq!(extract_variables("Got: ${greet.stdout}"), vec!["greet.stdout"]);
//! assert!(variable_exists("greet.stdout", &ctx));
//!
//! let (value, complete) = resolve(&json!("Got: ${greet.stdout}"), &ctx);
//! assert_eq!(value, json!("Got: Hello World"));
//! assert!(complete);
//! ```

pub mod diagnostics;
pub mod path;
pub mod resolve;

use miette::Diagnostic;
use thiserror::Error;

pub use diagnostics::{MAX_CONTEXT_KEYS, MAX_SUGGESTIONS, ResolutionFailure, describe_context_keys};
pub use path::{PathSegment, TemplatePath};
pub use resolve::{
    as_simple_template, extract_variables, is_unresolved, resolve, unresolved_variables,
    variable_exists,
};

/// Errors from the template subsystem itself (grammar violations).
///
/// Failed *resolution* is not an error here — it flows through the
/// strict/permissive gate as [`ResolutionFailure`] records.
#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    /// The text between `${` and `}` does not match the path grammar.
    #[error("invalid template path `{path}`: {reason}")]
    #[diagnostic(
        code(pflow::template::invalid_path),
        help("Paths look like `input_name` or `node_id.field.sub[0].other`.")
    )]
    InvalidPath { path: String, reason: String },
}
