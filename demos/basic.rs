//! Compile and run a two-node shell chain with a declared input/output.
//!
//! ```sh
//! cargo run --example basic
//! ```

use serde_json::{Map, json};

use pflow::executor::ExecutorService;
use pflow::ir::WorkflowIr;
use pflow::registry::Registry;
use pflow::repair::{RunOptions, WorkflowRunner};
use pflow::telemetry::{self, FormatterMode, PlainFormatter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let ir = WorkflowIr::from_json(
        r#"{
            "ir_version": "0.1.0",
            "template_resolution_mode": "strict",
            "inputs": {
                "who": {"type": "string", "required": false, "default": "world"}
            },
            "outputs": {
                "reply": {"source": "${consumer.stdout}", "description": "final line"}
            },
            "nodes": [
                {"id": "producer", "type": "shell",
                 "params": {"command": "echo", "args": ["hello ${who}"]}},
                {"id": "consumer", "type": "shell",
                 "params": {"command": "echo", "args": ["got: ${producer.stdout}"]}}
            ],
            "edges": [{"from": "producer", "to": "consumer"}]
        }"#,
    )?;

    let runner = WorkflowRunner::new(Registry::with_builtins())
        .with_executor(ExecutorService::new());

    let mut params = Map::new();
    params.insert("who".into(), json!("pflow"));
    let result = runner.run(&ir, params, RunOptions::default()).await;

    let formatter = PlainFormatter::with_mode(FormatterMode::Auto);
    print!("{}", formatter.render_summary(&result).join_lines());
    for render in formatter.render_errors(&result.errors) {
        print!("{}", render.join_lines());
    }
    println!("outputs: {}", serde_json::to_string_pretty(&result.outputs)?);

    std::process::exit(result.status.exit_code());
}
