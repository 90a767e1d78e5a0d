//! On-disk library of named workflows.
//!
//! Saved workflows live as JSON envelopes under a conventional directory,
//! one file per name. Names are lowercase kebab (`^[a-z0-9-]+$`); the
//! library accepts up to 50 characters, while strict front-ends (CLI)
//! enforce 30.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::ir::WorkflowIr;

/// Name length ceiling enforced by strict front-ends.
pub const NAME_LIMIT_STRICT: usize = 30;
/// Name length ceiling enforced by the library itself.
pub const NAME_LIMIT: usize = 50;

/// Environment variable overriding the library directory.
pub const LIBRARY_DIR_ENV_VAR: &str = "PFLOW_LIBRARY_DIR";

#[derive(Debug, Error, Diagnostic)]
pub enum LibraryError {
    #[error("invalid workflow name `{name}`: {reason}")]
    #[diagnostic(
        code(pflow::library::invalid_name),
        help("Names match ^[a-z0-9-]+$ and stay within the length limit.")
    )]
    InvalidName { name: String, reason: String },

    #[error("workflow `{name}` already exists at {}", .path.display())]
    #[diagnostic(
        code(pflow::library::already_exists),
        help("Pass force=true to overwrite.")
    )]
    AlreadyExists { name: String, path: PathBuf },

    #[error("workflow `{name}` not found in the library")]
    #[diagnostic(code(pflow::library::not_found))]
    NotFound { name: String },

    #[error("library I/O failure at {}: {source}", .path.display())]
    #[diagnostic(code(pflow::library::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse saved workflow at {}: {source}", .path.display())]
    #[diagnostic(code(pflow::library::parse))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Validate a workflow name against the naming rules.
///
/// `strict` applies the tighter CLI-level length ceiling.
pub fn validate_name(name: &str, strict: bool) -> Result<(), LibraryError> {
    let invalid = |reason: &str| LibraryError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid("only lowercase letters, digits, and `-` are allowed"));
    }
    let limit = if strict { NAME_LIMIT_STRICT } else { NAME_LIMIT };
    if name.len() > limit {
        return Err(invalid(&format!("longer than {limit} characters")));
    }
    Ok(())
}

/// Envelope persisted per saved workflow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedWorkflow {
    pub name: String,
    pub description: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    pub workflow: WorkflowIr,
}

/// The library manager.
#[derive(Clone, Debug)]
pub struct WorkflowLibrary {
    dir: PathBuf,
}

impl WorkflowLibrary {
    /// Library at the conventional directory: `$PFLOW_LIBRARY_DIR`, else
    /// `$HOME/.pflow/workflows`, else `<tmp>/pflow/workflows`.
    pub fn new() -> Self {
        let dir = std::env::var(LIBRARY_DIR_ENV_VAR)
            .map(PathBuf::from)
            .ok()
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".pflow/workflows"))
            })
            .unwrap_or_else(|| std::env::temp_dir().join("pflow").join("workflows"));
        Self { dir }
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Persist an IR under a name, returning the written path.
    pub fn save(
        &self,
        ir: &WorkflowIr,
        name: &str,
        description: &str,
        metadata: Option<Value>,
        force: bool,
    ) -> Result<PathBuf, LibraryError> {
        validate_name(name, false)?;
        let path = self.path_for(name);
        if path.exists() && !force {
            return Err(LibraryError::AlreadyExists {
                name: name.to_string(),
                path,
            });
        }
        std::fs::create_dir_all(&self.dir).map_err(|source| LibraryError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let envelope = SavedWorkflow {
            name: name.to_string(),
            description: description.to_string(),
            saved_at: Utc::now(),
            metadata: metadata.unwrap_or(Value::Null),
            workflow: ir.clone(),
        };
        let text = serde_json::to_string_pretty(&envelope).map_err(|source| {
            LibraryError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        std::fs::write(&path, text).map_err(|source| LibraryError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(name, path = %path.display(), "workflow saved");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<SavedWorkflow, LibraryError> {
        validate_name(name, false)?;
        let path = self.path_for(name);
        if !path.exists() {
            return Err(LibraryError::NotFound {
                name: name.to_string(),
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|source| LibraryError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| LibraryError::Parse { path, source })
    }

    /// Names of every saved workflow, sorted.
    pub fn list(&self) -> Result<Vec<String>, LibraryError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|source| LibraryError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                (path.extension().is_some_and(|ext| ext == "json"))
                    .then(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
                    .flatten()
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

impl Default for WorkflowLibrary {
    fn default() -> Self {
        Self::new()
    }
}
