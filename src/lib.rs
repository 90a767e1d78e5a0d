//! # pflow: Workflow Execution Engine
//!
//! pflow compiles and runs declarative workflows. A workflow is a linear
//! chain of typed nodes expressed in a JSON intermediate representation:
//! declared inputs, templated node parameters, and declared outputs. The
//! runtime validates the IR in four layers, compiles it against a node
//! registry, executes it sequentially with full instrumentation, writes a
//! versioned trace file, and — when a planner is injected — patches and
//! re-runs failing workflows.
//!
//! ## Core Concepts
//!
//! - **IR**: the declarative workflow document ([`ir`])
//! - **Registry**: node type → capability descriptor ([`registry`])
//! - **Templates**: `${path}` references resolved against the shared
//!   store, with strict/permissive policies ([`template`])
//! - **Shared store**: per-node namespaces plus `__*__` framework keys
//!   ([`store`])
//! - **Tri-state status**: `SUCCESS | DEGRADED | FAILED` ([`executor`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use pflow::compiler::compile;
//! use pflow::executor::{ExecuteOptions, ExecutorService};
//! use pflow::ir::WorkflowIr;
//! use pflow::registry::Registry;
//! use serde_json::Map;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ir = WorkflowIr::from_json(
//!     r#"{
//!         "ir_version": "0.1.0",
//!         "nodes": [
//!             {"id": "greet", "type": "shell",
//!              "params": {"command": "echo", "args": ["Hello World"]}},
//!             {"id": "reply", "type": "shell",
//!              "params": {"command": "echo", "args": ["Got: ${greet.stdout}"]}}
//!         ],
//!         "edges": [{"from": "greet", "to": "reply"}]
//!     }"#,
//! )?;
//!
//! let registry = Registry::with_builtins();
//! let graph = compile(&ir, &registry, None)?;
//! let result = ExecutorService::new()
//!     .execute(&graph, Map::new(), &ExecuteOptions::default())
//!     .await;
//!
//! assert!(result.success);
//! println!("status: {} trace: {:?}", result.status, result.trace_path);
//! # Ok(())
//! # }
//! ```
//!
//! ## Validation Without Execution
//!
//! ```
//! use pflow::ir::WorkflowIr;
//! use pflow::registry::Registry;
//! use pflow::validator::validate;
//!
//! let ir = WorkflowIr::from_json(
//!     r#"{"ir_version": "0.1.0",
//!         "nodes": [{"id": "a", "type": "shell",
//!                    "params": {"command": "echo"}}]}"#,
//! )
//! .unwrap();
//!
//! // Static validation: schema + graph + registry, templates skipped.
//! let errors = validate(&ir, &Registry::with_builtins(), None);
//! assert!(errors.is_empty());
//! ```
//!
//! ## Module Guide
//!
//! - [`ir`] - Workflow IR data model
//! - [`validator`] - Four-layer IR validation
//! - [`registry`] - Node capability registry with fuzzy lookup
//! - [`template`] - `${path}` extraction, resolution, diagnostics
//! - [`store`] - Namespaced shared store and framework keys
//! - [`node`] / [`wrapper`] - Node trait and the instrumented decorator
//! - [`compiler`] / [`graph`] - IR compilation into an executable graph
//! - [`executor`] - Sequential execution and the tri-state result
//! - [`repair`] - Planner contract and the repair loop
//! - [`trace`] - Versioned trace documents
//! - [`settings`] - Template-resolution-mode hierarchy
//! - [`library`] - Named workflow persistence
//! - [`nodes`] - Built-in leaf nodes

pub mod compiler;
pub mod errors;
pub mod executor;
pub mod graph;
pub mod ir;
pub mod library;
pub mod node;
pub mod nodes;
pub mod registry;
pub mod repair;
pub mod settings;
pub mod store;
pub mod telemetry;
pub mod template;
pub mod trace;
pub mod utils;
pub mod validator;
pub mod wrapper;

pub use compiler::{CompileError, compile};
pub use errors::{ErrorCategory, ErrorRecord, ErrorSource, WarningRecord};
pub use executor::{ExecuteOptions, ExecutionResult, ExecutorService, WorkflowStatus};
pub use graph::ExecutionGraph;
pub use ir::{TemplateResolutionMode, WorkflowIr};
pub use registry::Registry;
pub use repair::{Planner, RunOptions, WorkflowRunner};
pub use validator::validate;
