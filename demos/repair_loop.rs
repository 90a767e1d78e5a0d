//! A toy planner patching a misspelled template head, end to end.
//!
//! The workflow references `${producer.stdout}` (typo); the planner reads
//! the suggestion out of the error details and rewrites the param. The
//! second execution succeeds.
//!
//! ```sh
//! cargo run --example repair_loop
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use pflow::errors::ErrorRecord;
use pflow::ir::WorkflowIr;
use pflow::registry::Registry;
use pflow::repair::{Planner, RunOptions, WorkflowRunner};
use pflow::telemetry::{self, FormatterMode, PlainFormatter};

/// Replaces a known-bad head with the first fuzzy suggestion the error
/// diagnostics carry.
struct TypoFixer;

#[async_trait]
impl Planner for TypoFixer {
    async fn patch(
        &self,
        ir: &WorkflowIr,
        errors: &[ErrorRecord],
        _shared: &Map<String, Value>,
    ) -> Option<WorkflowIr> {
        let suggestion = errors
            .iter()
            .find_map(|e| e.details.get("suggestions"))
            .and_then(|s| s.as_array())
            .and_then(|s| s.first())
            .and_then(Value::as_str)?
            .to_string();

        let mut text = serde_json::to_string(ir).ok()?;
        text = text.replace("${producer.", &format!("${{{suggestion}."));
        let patched: WorkflowIr = serde_json::from_str(&text).ok()?;
        println!("planner: rewriting `producer` -> `{suggestion}`");
        Some(patched)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let ir = WorkflowIr::from_json(
        r#"{
            "ir_version": "0.1.0",
            "template_resolution_mode": "strict",
            "nodes": [
                {"id": "produce", "type": "shell",
                 "params": {"command": "echo", "args": ["fresh data"]}},
                {"id": "consume", "type": "shell",
                 "params": {"command": "echo", "args": ["got: ${producer.stdout}"]}}
            ],
            "edges": [{"from": "produce", "to": "consume"}]
        }"#,
    )?;

    let runner = WorkflowRunner::new(Registry::with_builtins()).with_planner(Arc::new(TypoFixer));
    let result = runner.run(&ir, Map::new(), RunOptions::default()).await;

    let formatter = PlainFormatter::with_mode(FormatterMode::Auto);
    print!("{}", formatter.render_summary(&result).join_lines());
    if let Some(consume) = result.shared_after.get("consume") {
        println!("consume namespace: {consume}");
    }

    std::process::exit(result.status.exit_code());
}
