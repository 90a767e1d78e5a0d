//! Versioned execution trace documents.
//!
//! Every run writes one JSON trace (format `1.2.0`): workflow metadata,
//! the resolved effective mode, the ordered node events with integer
//! durations, the compiled IR snapshot, errors, warnings, repair attempt
//! records, and the final tri-state status. Field names are stable for
//! programmatic consumers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::{ErrorRecord, WarningRecord};
use crate::executor::WorkflowStatus;
use crate::ir::TemplateResolutionMode;

/// Trace document format version.
pub const TRACE_FORMAT_VERSION: &str = "1.2.0";

/// Environment variable overriding the conventional trace directory.
pub const TRACE_DIR_ENV_VAR: &str = "PFLOW_TRACE_DIR";

/// One node's begin/end record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeTraceEvent {
    pub node_id: String,
    pub node_type: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Always an integer; a node that never started the clock reports 0.
    pub duration_ms: u64,
    /// Resolved parameter snapshot the node executed with.
    pub inputs: Value,
    /// The node's namespace after its post phase.
    pub outputs: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

/// One repair-loop attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepairAttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Whether the planner produced a usable patch.
    pub accepted: bool,
    pub message: String,
    /// How many error records were handed to the planner.
    pub errors_sent: usize,
}

/// The per-run trace document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceDocument {
    pub format_version: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub template_resolution_mode: TemplateResolutionMode,
    /// Compiled IR snapshot the run executed.
    pub workflow: Value,
    pub events: Vec<NodeTraceEvent>,
    pub errors: Vec<ErrorRecord>,
    pub warnings: Vec<WarningRecord>,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repair_attempts: Vec<RepairAttemptRecord>,
}

impl TraceDocument {
    /// Write pretty-printed JSON to an explicit path, creating parent
    /// directories as needed.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "trace written");
        Ok(())
    }

    /// Write under a trace directory as `trace-<run_id>.json`, returning
    /// the full path.
    pub fn write_under(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(format!("trace-{}.json", self.run_id));
        self.write_to(&path)?;
        Ok(path)
    }
}

/// Conventional debug directory for traces: `$PFLOW_TRACE_DIR`, else
/// `<tmp>/pflow/traces`.
pub fn default_trace_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(TRACE_DIR_ENV_VAR) {
        return PathBuf::from(dir);
    }
    std::env::temp_dir().join("pflow").join("traces")
}
