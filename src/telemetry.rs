//! Tracing setup and human-readable diagnostic rendering.
//!
//! Interactive surfaces receive the *full* error list (unlike the repair
//! loop's capped batch); the formatter here turns records into the lines a
//! CLI or MCP console prints.

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::errors::{ErrorRecord, WarningRecord};
use crate::executor::ExecutionResult;

pub const CONTEXT_COLOR: &str = "\x1b[32m"; // green
pub const LINE_COLOR: &str = "\x1b[35m"; // magenta
pub const WARN_COLOR: &str = "\x1b[33m"; // yellow
pub const RESET_COLOR: &str = "\x1b[0m";

/// Install the default subscriber: `RUST_LOG`-driven filtering, compact
/// fmt output, and span traces on errors. Safe to call more than once;
/// later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .with(ErrorLayer::default())
        .try_init();
}

/// Whether ANSI color codes are emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatterMode {
    /// Colors when stderr is a terminal.
    #[default]
    Auto,
    Colored,
    Plain,
}

impl FormatterMode {
    fn colored(self) -> bool {
        match self {
            Self::Colored => true,
            Self::Plain => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// Rendered output for one diagnostic, consumable by sinks.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl DiagnosticRender {
    pub fn join_lines(&self) -> String {
        self.lines.join("")
    }
}

/// Plain-text formatter for error and warning records.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.mode.colored() {
            format!("{color}{text}{RESET_COLOR}")
        } else {
            text.to_string()
        }
    }

    pub fn render_errors(&self, errors: &[ErrorRecord]) -> Vec<DiagnosticRender> {
        errors
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let scope = match &record.node_id {
                    Some(id) => format!("{}/{} @ {id}", record.source, record.category),
                    None => format!("{}/{}", record.source, record.category),
                };
                let mut lines = Vec::new();
                lines.push(format!(
                    "[{i}] {} | {}\n",
                    record.when,
                    self.paint(CONTEXT_COLOR, &scope)
                ));
                lines.push(self.paint(LINE_COLOR, &format!("  error: {}\n", record.message)));
                if let Some(code) = record.status_code {
                    lines.push(self.paint(LINE_COLOR, &format!("  status: {code}\n")));
                }
                if let Some(fields) = &record.available_fields {
                    if !fields.is_empty() {
                        lines.push(self.paint(
                            LINE_COLOR,
                            &format!("  available fields: {}\n", fields.join(", ")),
                        ));
                    }
                }
                if !record.details.is_null() {
                    lines.push(self.paint(LINE_COLOR, &format!("  details: {}\n", record.details)));
                }
                DiagnosticRender {
                    context: Some(scope),
                    lines,
                }
            })
            .collect()
    }

    pub fn render_warnings(&self, warnings: &[WarningRecord]) -> Vec<DiagnosticRender> {
        warnings
            .iter()
            .map(|warning| {
                let scope = match (&warning.node_id, &warning.param) {
                    (Some(node), Some(param)) => format!("{node}.{param}"),
                    (Some(node), None) => node.clone(),
                    _ => "workflow".to_string(),
                };
                DiagnosticRender {
                    context: Some(scope.clone()),
                    lines: vec![self.paint(
                        WARN_COLOR,
                        &format!("warning [{scope}]: {}\n", warning.message),
                    )],
                }
            })
            .collect()
    }

    /// One-line run summary: status, counts, trace pointer.
    pub fn render_summary(&self, result: &ExecutionResult) -> DiagnosticRender {
        let mut line = format!(
            "{} in {}ms ({} error(s), {} warning(s))",
            result.status,
            result.duration_ms,
            result.errors.len(),
            result.warnings.len()
        );
        if let Some(path) = &result.trace_path {
            line.push_str(&format!("; trace: {}", path.display()));
        }
        line.push('\n');
        DiagnosticRender {
            context: Some(result.status.to_string()),
            lines: vec![self.paint(CONTEXT_COLOR, &line)],
        }
    }
}

/// Format error records with explicit color control.
pub fn pretty_print_with_mode(errors: &[ErrorRecord], mode: FormatterMode) -> String {
    let formatter = PlainFormatter::with_mode(mode);
    let renders = formatter.render_errors(errors);
    let mut out = String::new();
    for (idx, render) in renders.into_iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(&render.join_lines());
    }
    out
}

/// Format error records with auto-detected color support.
pub fn pretty_print(errors: &[ErrorRecord]) -> String {
    pretty_print_with_mode(errors, FormatterMode::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCategory, ErrorSource};

    #[test]
    fn plain_mode_emits_no_ansi() {
        let errors = vec![
            ErrorRecord::new(
                ErrorSource::Runtime,
                ErrorCategory::TemplateError,
                "unresolved `${x}`",
            )
            .with_node_id("fetch")
            .with_status_code(404),
        ];
        let text = pretty_print_with_mode(&errors, FormatterMode::Plain);
        assert!(!text.contains("\x1b["));
        assert!(text.contains("runtime/template_error @ fetch"));
        assert!(text.contains("status: 404"));
    }

    #[test]
    fn colored_mode_wraps_lines() {
        let errors = vec![ErrorRecord::new(
            ErrorSource::Validation,
            ErrorCategory::Schema,
            "bad input",
        )];
        let text = pretty_print_with_mode(&errors, FormatterMode::Colored);
        assert!(text.contains(LINE_COLOR));
        assert!(text.contains(RESET_COLOR));
    }
}
