mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use common::*;
use pflow::compiler::compile;
use pflow::errors::ErrorCategory;
use pflow::executor::{ExecuteOptions, ExecutorService, ProgressSignal, WorkflowStatus};
use pflow::ir::TemplateResolutionMode;
use pflow::settings::Settings;
use pflow::store::is_framework_key;

fn executor(dir: &tempfile::TempDir) -> ExecutorService {
    ExecutorService::with_trace_dir(dir.path())
}

#[tokio::test]
async fn basic_success_chain() {
    let dir = tempfile::tempdir().unwrap();
    let ir = shell_chain_ir("strict");
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;

    assert_eq!(result.status, WorkflowStatus::Success);
    assert!(result.success);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
    assert_eq!(
        result.shared_after["consumer"]["stdout"],
        json!("Got: Hello World")
    );
    assert_eq!(
        result.shared_after["__execution__"]["completed_nodes"],
        json!(["producer", "consumer"])
    );
}

#[tokio::test]
async fn strict_mode_fails_fast_on_missing_variable() {
    let dir = tempfile::tempdir().unwrap();
    let ir = missing_variable_ir("strict");
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    assert!(!result.success);
    let error = &result.errors[0];
    assert_eq!(error.category, ErrorCategory::TemplateError);
    assert_eq!(error.node_id.as_deref(), Some("will-fail"));
    assert_eq!(error.details["unresolved_variables"], json!(["missing"]));
    assert_eq!(error.details["available_context_keys"], json!("(none)"));
    // The node never executed, so it never claimed a namespace.
    assert!(!result.shared_after.contains_key("will-fail"));
    assert_eq!(
        result.shared_after["__execution__"]["failed_node"],
        json!("will-fail")
    );
}

#[tokio::test]
async fn permissive_mode_degrades_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let ir = missing_variable_ir("permissive");
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;

    assert_eq!(result.status, WorkflowStatus::Degraded);
    assert!(result.success);
    assert!(!result.warnings.is_empty());
    // echo printed the unresolved token verbatim (argv, no shell).
    assert_eq!(
        result.shared_after["will-fail"]["stdout"],
        json!("Value: ${missing}")
    );
}

#[tokio::test]
async fn partial_resolution_is_rejected_in_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    let ir = ir_from(json!({
        "ir_version": "0.1.0",
        "template_resolution_mode": "strict",
        "nodes": [
            {"id": "name", "type": "shell",
             "params": {"command": "echo", "args": ["Alice"]}},
            {"id": "builder", "type": "shell",
             "params": {"command": "echo",
                        "args": ["User ${name.stdout} has ${missing_count} items"]}}
        ],
        "edges": [{"from": "name", "to": "builder"}]
    }));
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    let error = &result.errors[0];
    assert!(error.message.contains("${missing_count}"));
    assert!(!error.message.contains("${name.stdout}"));
    assert!(!result.shared_after.contains_key("builder"));
}

#[tokio::test]
async fn ir_mode_wins_over_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::default().with_mode(TemplateResolutionMode::Permissive);
    let ir = missing_variable_ir("strict");
    let graph = compile(&ir, &test_registry(), Some(&settings)).unwrap();
    assert_eq!(graph.mode, TemplateResolutionMode::Strict);

    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;
    assert_eq!(result.status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn settings_mode_applies_when_ir_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::default().with_mode(TemplateResolutionMode::Permissive);
    let ir = ir_from(json!({
        "ir_version": "0.1.0",
        "nodes": [
            {"id": "will-fail", "type": "shell",
             "params": {"command": "echo", "args": ["Value: ${missing}"]}}
        ]
    }));
    let graph = compile(&ir, &test_registry(), Some(&settings)).unwrap();
    assert_eq!(graph.mode, TemplateResolutionMode::Permissive);

    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;
    assert_eq!(result.status, WorkflowStatus::Degraded);
}

#[tokio::test]
async fn literal_template_text_in_data_is_not_reprocessed() {
    let dir = tempfile::tempdir().unwrap();
    let ir = ir_from(json!({
        "ir_version": "0.1.0",
        "template_resolution_mode": "strict",
        "nodes": [
            {"id": "producer", "type": "legacy-data", "params": {}},
            {"id": "consumer", "type": "emit",
             "params": {"value": "${producer.result}"}}
        ],
        "edges": [{"from": "producer", "to": "consumer"}]
    }));
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;

    assert_eq!(result.status, WorkflowStatus::Success);
    assert_eq!(
        result.shared_after["consumer"]["value"],
        json!({"command": "${OLD_VAR}", "note": "verbatim data"})
    );
}

#[tokio::test]
async fn inputs_merge_defaults_and_reject_missing_required() {
    let dir = tempfile::tempdir().unwrap();
    let ir = ir_from(json!({
        "ir_version": "0.1.0",
        "inputs": {
            "greeting": {"type": "string", "required": true},
            "suffix": {"type": "string", "required": false, "default": "!"}
        },
        "nodes": [
            {"id": "say", "type": "shell",
             "params": {"command": "echo", "args": ["${greeting}${suffix}"]}}
        ]
    }));
    let graph = compile(&ir, &test_registry(), None).unwrap();

    let provided = executor(&dir)
        .execute(
            &graph,
            params_from(json!({"greeting": "hi"})),
            &ExecuteOptions::default(),
        )
        .await;
    assert_eq!(provided.status, WorkflowStatus::Success);
    assert_eq!(provided.shared_after["say"]["stdout"], json!("hi!"));

    let missing = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;
    assert_eq!(missing.status, WorkflowStatus::Failed);
    assert_eq!(missing.errors[0].category, ErrorCategory::Schema);
    assert!(missing.errors[0].message.contains("greeting"));
    // No node ran.
    assert!(!missing.shared_after.contains_key("say"));
}

#[tokio::test]
async fn declared_outputs_resolve_or_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let ok_ir = ir_from(json!({
        "ir_version": "0.1.0",
        "outputs": {
            "greeting": {"source": "${producer.stdout}", "description": "what was said"}
        },
        "nodes": [
            {"id": "producer", "type": "shell",
             "params": {"command": "echo", "args": ["Hello World"]}}
        ]
    }));
    let graph = compile(&ok_ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;
    assert_eq!(result.status, WorkflowStatus::Success);
    assert_eq!(result.outputs["greeting"], json!("Hello World"));

    let bad_ir = ir_from(json!({
        "ir_version": "0.1.0",
        "outputs": {
            "greeting": {"source": "${producer.nope_field}"}
        },
        "nodes": [
            {"id": "producer", "type": "emit", "params": {"stdout": "x"}}
        ]
    }));
    let graph = compile(&bad_ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;
    assert_eq!(result.status, WorkflowStatus::Failed);
    assert_eq!(result.errors[0].category, ErrorCategory::TemplateError);
    assert!(result.errors[0].message.contains("greeting"));
}

#[tokio::test]
async fn failing_node_error_is_enriched_from_its_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let ir = ir_from(json!({
        "ir_version": "0.1.0",
        "nodes": [
            {"id": "api", "type": "flaky-api", "params": {}},
            {"id": "after", "type": "shell",
             "params": {"command": "echo", "args": ["never runs"]}}
        ],
        "edges": [{"from": "api", "to": "after"}]
    }));
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    let error = &result.errors[0];
    assert_eq!(error.category, ErrorCategory::ApiValidation);
    assert_eq!(error.status_code, Some(429));
    assert_eq!(error.raw_response, Some(json!({"error": "quota exceeded"})));
    let fields = error.available_fields.as_ref().unwrap();
    for expected in ["response", "status_code", "result", "error_details"] {
        assert!(fields.iter().any(|f| f == expected), "missing {expected}");
    }
    assert_eq!(error.details["result_error"], json!("upstream refused the call"));
    assert_eq!(error.details["error_details"], json!("retry after 60s"));
    // First error terminates execution.
    assert!(!result.shared_after.contains_key("after"));
}

#[tokio::test]
async fn unwritten_promised_outputs_fail_the_node() {
    let dir = tempfile::tempdir().unwrap();
    let ir = ir_from(json!({
        "ir_version": "0.1.0",
        "nodes": [{"id": "sloppy", "type": "forgetful", "params": {}}]
    }));
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    let error = &result.errors[0];
    assert_eq!(error.category, ErrorCategory::ExecutionFailure);
    assert!(error.message.contains("report"));
}

#[tokio::test]
async fn progress_callback_cancels_between_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let ir = shell_chain_ir("strict");
    let graph = compile(&ir, &test_registry(), None).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let options = ExecuteOptions {
        trace_path: None,
        progress: Some(Arc::new(move |update| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(update.completed, 1);
            assert_eq!(update.next_node.as_deref(), Some("consumer"));
            ProgressSignal::Cancel
        })),
    };
    let result = executor(&dir).execute(&graph, empty_params(), &options).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.status, WorkflowStatus::Failed);
    assert_eq!(result.errors[0].category, ErrorCategory::Cancelled);
    // The in-flight node finished; the next one never started.
    assert!(result.shared_after.contains_key("producer"));
    assert!(!result.shared_after.contains_key("consumer"));
}

#[tokio::test]
async fn framework_keys_never_leak_into_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    let ir = missing_variable_ir("permissive");
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;

    for (key, value) in &result.shared_after {
        if is_framework_key(key) {
            continue;
        }
        if let Some(namespace) = value.as_object() {
            assert!(
                namespace.keys().all(|k| !is_framework_key(k)),
                "framework key leaked into namespace `{key}`"
            );
        }
    }
}

#[tokio::test]
async fn trace_file_is_versioned_and_complete() {
    let dir = tempfile::tempdir().unwrap();
    let ir = shell_chain_ir("strict");
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let result = executor(&dir)
        .execute(&graph, empty_params(), &ExecuteOptions::default())
        .await;

    let path = result.trace_path.as_ref().expect("trace always written");
    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(document["format_version"], json!("1.2.0"));
    assert_eq!(document["status"], json!("SUCCESS"));
    assert_eq!(document["template_resolution_mode"], json!("strict"));
    let events = document["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["node_id"], json!("producer"));
    assert_eq!(events[1]["node_id"], json!("consumer"));
    for event in events {
        assert!(event["duration_ms"].is_u64(), "duration must be an integer");
        assert!(event["inputs"].is_object());
    }
    assert_eq!(events[1]["outputs"]["stdout"], json!("Got: Hello World"));
    // Compiled IR snapshot rides along for debugging.
    assert_eq!(document["workflow"]["ir_version"], json!("0.1.0"));
}

#[tokio::test]
async fn explicit_trace_path_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    let trace_path = dir.path().join("custom/trace.json");
    let ir = shell_chain_ir("strict");
    let graph = compile(&ir, &test_registry(), None).unwrap();
    let options = ExecuteOptions {
        trace_path: Some(trace_path.clone()),
        progress: None,
    };
    let result = executor(&dir).execute(&graph, empty_params(), &options).await;

    assert_eq!(result.trace_path.as_deref(), Some(trace_path.as_path()));
    assert!(trace_path.exists());
}

#[tokio::test]
async fn exit_codes_follow_status() {
    assert_eq!(WorkflowStatus::Success.exit_code(), 0);
    assert_eq!(WorkflowStatus::Degraded.exit_code(), 2);
    assert_eq!(WorkflowStatus::Failed.exit_code(), 1);
}
