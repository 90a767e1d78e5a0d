//! Built-in leaf nodes.
//!
//! External leaf families (MCP, HTTP, LLM) plug in through the same
//! [`Registry`](crate::registry::Registry) surface; only `shell` ships in
//! the core.

pub mod shell;

use std::sync::Arc;

use crate::ir::ValueType;
use crate::registry::{FieldSpec, RegistryEntry};

pub use shell::ShellNode;

/// Registry entries for the nodes bundled with the engine.
pub fn builtin_entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::new(
            "shell",
            "Run a command (argv style, no shell interpolation) and capture its output",
            Arc::new(|_spec| Ok(Arc::new(ShellNode) as Arc<dyn crate::node::Node>)),
        )
        .with_param(
            "command",
            FieldSpec::required(ValueType::String).describe("Executable to run"),
        )
        .with_param(
            "args",
            FieldSpec::optional(ValueType::Array).describe("Arguments, templated per element"),
        )
        .with_param(
            "stdin",
            FieldSpec::optional(ValueType::String).describe("Text piped to standard input"),
        )
        .with_param(
            "cwd",
            FieldSpec::optional(ValueType::String).describe("Working directory"),
        )
        .with_param(
            "env",
            FieldSpec::optional(ValueType::Object).describe("Extra environment variables"),
        )
        .with_param(
            "timeout_secs",
            FieldSpec::optional(ValueType::Number).describe("Kill the process after this long"),
        )
        .with_output(
            "stdout",
            FieldSpec::required(ValueType::String).describe("Captured stdout, newline-trimmed"),
        )
        .with_output(
            "stderr",
            FieldSpec::required(ValueType::String).describe("Captured stderr, newline-trimmed"),
        )
        .with_output(
            "exit_code",
            FieldSpec::required(ValueType::Number).describe("Process exit status"),
        ),
    ]
}
