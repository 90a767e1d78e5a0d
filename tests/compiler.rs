mod common;

use std::sync::Arc;

use serde_json::json;

use common::*;
use pflow::compiler::{CompileError, compile};
use pflow::errors::ErrorCategory;
use pflow::ir::TemplateResolutionMode;
use pflow::registry::{Registry, RegistryEntry, RegistryError};
use pflow::validator::validate;

#[test]
fn compile_preserves_execution_order_and_metadata() {
    let ir = ir_from(json!({
        "ir_version": "0.1.0",
        "inputs": {"city": {"type": "string", "required": true}},
        "outputs": {"said": {"source": "${b.stdout}"}},
        "nodes": [
            {"id": "a", "type": "shell", "params": {"command": "echo", "args": ["${city}"]}},
            {"id": "b", "type": "shell", "params": {"command": "echo", "args": ["${a.stdout}"]}}
        ],
        "edges": [{"from": "a", "to": "b"}]
    }));
    let graph = compile(&ir, &test_registry(), None).unwrap();

    assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(graph.mode, TemplateResolutionMode::Strict);
    assert!(graph.inputs.contains_key("city"));
    assert!(graph.outputs.contains_key("said"));
    assert_eq!(graph.ir_snapshot()["ir_version"], json!("0.1.0"));
}

#[test]
fn structurally_invalid_ir_fails_fast() {
    let ir = ir_from(json!({
        "ir_version": "0.1.0",
        "nodes": [
            {"id": "a", "type": "not-a-type", "params": {}},
            {"id": "a", "type": "shell", "params": {"command": "echo"}}
        ]
    }));
    let err = compile(&ir, &test_registry(), None).unwrap_err();
    let records = err.into_records();
    assert!(records.iter().any(|r| r.category == ErrorCategory::Schema));
    assert!(
        records
            .iter()
            .any(|r| r.category == ErrorCategory::UnknownNodeType)
    );
}

#[test]
fn construction_failures_surface_the_type_and_cause() {
    let mut registry = Registry::new();
    registry
        .register(RegistryEntry::new(
            "doomed",
            "factory always fails",
            Arc::new(|spec| {
                Err(RegistryError::Construction {
                    type_id: spec.node_type.clone(),
                    reason: "backing binary not installed".to_string(),
                })
            }),
        ))
        .unwrap();

    let ir = ir_from(json!({
        "ir_version": "0.1.0",
        "nodes": [{"id": "x", "type": "doomed", "params": {}}]
    }));
    let err = compile(&ir, &registry, None).unwrap_err();
    match err {
        CompileError::Registry(RegistryError::Construction { type_id, reason }) => {
            assert_eq!(type_id, "doomed");
            assert!(reason.contains("not installed"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn validation_then_compile_equals_direct_compile() {
    let ir = shell_chain_ir("strict");
    let registry = test_registry();

    // Validation is read-only; compiling after it changes nothing.
    assert!(validate(&ir, &registry, Some(&empty_params())).is_empty());
    let after_validate = compile(&ir, &registry, None).unwrap();
    let direct = compile(&ir, &registry, None).unwrap();

    assert_eq!(
        after_validate.node_ids().collect::<Vec<_>>(),
        direct.node_ids().collect::<Vec<_>>()
    );
    assert_eq!(after_validate.mode, direct.mode);
    assert_eq!(after_validate.ir_snapshot(), direct.ir_snapshot());
}
