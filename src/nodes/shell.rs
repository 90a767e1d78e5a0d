//! Built-in `shell` node: run a command and capture its output.
//!
//! The command is executed argv-style through [`tokio::process::Command`];
//! no shell is involved, so argument text (including literal `${...}`
//! survivors in permissive mode) is never reinterpreted.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::node::{Node, NodeContext, NodeError};

/// Leaf node running one process per execution.
///
/// Params: `command` (required), `args`, `stdin`, `cwd`, `env`,
/// `timeout_secs`. Outputs: `stdout`, `stderr` (trailing newline trimmed),
/// `exit_code`. A non-zero exit fails the node after the outputs are
/// written, so failure enrichment can surface them.
#[derive(Debug, Default)]
pub struct ShellNode;

fn value_as_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn trim_trailing_newline(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

#[async_trait]
impl Node for ShellNode {
    async fn exec(
        &self,
        params: &Map<String, Value>,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError> {
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .ok_or(NodeError::MissingParam { param: "command" })?;

        let args: Vec<String> = match params.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(value_as_arg).collect(),
            Some(other) => vec![value_as_arg(other)],
        };

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = params.get("cwd").and_then(Value::as_str) {
            cmd.current_dir(cwd);
        }
        if let Some(env) = params.get("env").and_then(Value::as_object) {
            for (key, value) in env {
                cmd.env(key, value_as_arg(value));
            }
        }

        debug!(node_id = %ctx.node_id, command, ?args, "spawning process");
        let mut child = cmd.spawn().map_err(|e| NodeError::ExecutionFailed {
            message: format!("failed to spawn `{command}`: {e}"),
        })?;

        if let Some(input) = params.get("stdin").and_then(Value::as_str) {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).await?;
            }
        } else {
            drop(child.stdin.take());
        }

        let timeout = params
            .get("timeout_secs")
            .and_then(Value::as_f64)
            .map(Duration::from_secs_f64);

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| NodeError::ExecutionFailed {
                    message: format!(
                        "`{command}` timed out after {}s",
                        limit.as_secs_f64()
                    ),
                })??,
            None => child.wait_with_output().await?,
        };

        let stdout = trim_trailing_newline(String::from_utf8_lossy(&output.stdout).into_owned());
        let stderr = trim_trailing_newline(String::from_utf8_lossy(&output.stderr).into_owned());
        let exit_code = output.status.code().unwrap_or(-1);

        ctx.store.set("stdout", json!(stdout));
        ctx.store.set("stderr", json!(stderr));
        ctx.store.set("exit_code", json!(exit_code));

        if !output.status.success() {
            return Err(NodeError::ExecutionFailed {
                message: format!("`{command}` exited with status {exit_code}"),
            });
        }
        Ok(())
    }
}
