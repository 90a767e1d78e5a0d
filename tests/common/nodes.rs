#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use pflow::ir::ValueType;
use pflow::node::{Node, NodeContext, NodeError};
use pflow::registry::{FieldSpec, RegistryEntry};

/// Writes every resolved param into its namespace verbatim.
#[derive(Debug, Default)]
pub struct EmitNode;

#[async_trait]
impl Node for EmitNode {
    async fn exec(
        &self,
        params: &Map<String, Value>,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError> {
        for (key, value) in params {
            ctx.store.set(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// Emits a hardcoded payload carrying a literal `${OLD_VAR}` string, the
/// way an MCP response can embed `${...}` as plain data.
#[derive(Debug, Default)]
pub struct LegacyDataNode;

#[async_trait]
impl Node for LegacyDataNode {
    async fn exec(
        &self,
        _params: &Map<String, Value>,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError> {
        ctx.store.set(
            "result",
            json!({"command": "${OLD_VAR}", "note": "verbatim data"}),
        );
        Ok(())
    }
}

/// Fails after writing error-bearing fields into its namespace.
#[derive(Debug, Default)]
pub struct FlakyApiNode;

#[async_trait]
impl Node for FlakyApiNode {
    async fn exec(
        &self,
        params: &Map<String, Value>,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError> {
        ctx.store
            .set("response", json!({"error": "quota exceeded"}));
        ctx.store.set("status_code", json!(429));
        ctx.store
            .set("result", json!({"error": "upstream refused the call"}));
        ctx.store.set("error_details", json!("retry after 60s"));
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("simulated api failure");
        Err(NodeError::ApiValidation {
            status_code: 429,
            message: message.to_string(),
            raw_response: None,
        })
    }
}

/// Declares a concrete output schema but never writes it.
#[derive(Debug, Default)]
pub struct ForgetfulNode;

#[async_trait]
impl Node for ForgetfulNode {
    async fn exec(
        &self,
        _params: &Map<String, Value>,
        _ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError> {
        Ok(())
    }
}

/// Registry entries for the scripted test nodes.
pub fn test_entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::new(
            "emit",
            "Write every resolved param into the namespace",
            Arc::new(|_spec| Ok(Arc::new(EmitNode) as Arc<dyn Node>)),
        ),
        RegistryEntry::new(
            "legacy-data",
            "Emit a payload containing literal ${...} text as data",
            Arc::new(|_spec| Ok(Arc::new(LegacyDataNode) as Arc<dyn Node>)),
        )
        .with_output("result", FieldSpec::required(ValueType::Object)),
        RegistryEntry::new(
            "flaky-api",
            "Fail with a structured 429 after writing error fields",
            Arc::new(|_spec| Ok(Arc::new(FlakyApiNode) as Arc<dyn Node>)),
        ),
        RegistryEntry::new(
            "forgetful",
            "Promise an output and never write it",
            Arc::new(|_spec| Ok(Arc::new(ForgetfulNode) as Arc<dyn Node>)),
        )
        .with_output("report", FieldSpec::required(ValueType::String)),
    ]
}
