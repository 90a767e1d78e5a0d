#![allow(dead_code)]

pub mod nodes;

use serde_json::{Map, Value, json};

use pflow::ir::WorkflowIr;
use pflow::registry::Registry;

/// Registry with the built-in nodes plus the scripted test nodes.
pub fn test_registry() -> Registry {
    let mut registry = Registry::with_builtins();
    for entry in nodes::test_entries() {
        registry.register(entry).unwrap();
    }
    registry
}

/// Parse an IR document from a `json!` value.
pub fn ir_from(value: Value) -> WorkflowIr {
    serde_json::from_value(value).expect("test IR parses")
}

/// Two-node shell chain: `producer` echoes, `consumer` echoes a template
/// over the producer's stdout.
pub fn shell_chain_ir(mode: &str) -> WorkflowIr {
    ir_from(json!({
        "ir_version": "0.1.0",
        "template_resolution_mode": mode,
        "nodes": [
            {"id": "producer", "type": "shell",
             "params": {"command": "echo", "args": ["Hello World"]}},
            {"id": "consumer", "type": "shell",
             "params": {"command": "echo", "args": ["Got: ${producer.stdout}"]}}
        ],
        "edges": [{"from": "producer", "to": "consumer"}]
    }))
}

/// Single shell node referencing an undeclared `${missing}` variable.
pub fn missing_variable_ir(mode: &str) -> WorkflowIr {
    ir_from(json!({
        "ir_version": "0.1.0",
        "template_resolution_mode": mode,
        "nodes": [
            {"id": "will-fail", "type": "shell",
             "params": {"command": "echo", "args": ["Value: ${missing}"]}}
        ],
        "edges": []
    }))
}

pub fn empty_params() -> Map<String, Value> {
    Map::new()
}

pub fn params_from(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("params must be an object, got {other}"),
    }
}
