//! Runtime settings and the template-resolution-mode hierarchy.
//!
//! Precedence, highest first: workflow IR key > settings file
//! (`runtime.template_resolution_mode`) > `PFLOW_TEMPLATE_RESOLUTION_MODE`
//! environment variable > `strict`. The compiler resolves the hierarchy
//! once per compilation and bakes the result into the execution graph.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ir::TemplateResolutionMode;

/// Environment variable naming the mode when neither IR nor settings do.
pub const MODE_ENV_VAR: &str = "PFLOW_TEMPLATE_RESOLUTION_MODE";
/// Environment variable overriding the settings file location.
pub const SETTINGS_PATH_ENV_VAR: &str = "PFLOW_SETTINGS_PATH";

#[derive(Debug, Error, Diagnostic)]
pub enum SettingsError {
    #[error("failed to read settings file {}: {source}", .path.display())]
    #[diagnostic(code(pflow::settings::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {}: {source}", .path.display())]
    #[diagnostic(
        code(pflow::settings::parse),
        help("Settings are JSON, e.g. {{\"runtime\": {{\"template_resolution_mode\": \"permissive\"}}}}.")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// `runtime` section of the settings file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub template_resolution_mode: Option<TemplateResolutionMode>,
}

/// On-disk settings document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub runtime: RuntimeSettings,
}

impl Settings {
    /// Load from the conventional location; absent or unset files yield
    /// defaults, unreadable or malformed ones surface an error.
    pub fn load() -> Result<Self, SettingsError> {
        match Self::conventional_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `$PFLOW_SETTINGS_PATH`, else `$HOME/.pflow/settings.json`.
    pub fn conventional_path() -> Option<PathBuf> {
        dotenvy::dotenv().ok();
        if let Ok(path) = std::env::var(SETTINGS_PATH_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".pflow/settings.json"))
    }

    #[must_use]
    pub fn with_mode(mut self, mode: TemplateResolutionMode) -> Self {
        self.runtime.template_resolution_mode = Some(mode);
        self
    }
}

/// Walk the four-level hierarchy to one effective mode.
///
/// Call once per compilation; the result rides on the execution graph so
/// the decision is not re-derived mid-run.
pub fn effective_mode(
    ir_mode: Option<TemplateResolutionMode>,
    settings: Option<&Settings>,
) -> TemplateResolutionMode {
    if let Some(mode) = ir_mode {
        debug!(%mode, "template resolution mode from IR");
        return mode;
    }
    if let Some(mode) = settings.and_then(|s| s.runtime.template_resolution_mode) {
        debug!(%mode, "template resolution mode from settings file");
        return mode;
    }
    dotenvy::dotenv().ok();
    if let Some(mode) = std::env::var(MODE_ENV_VAR)
        .ok()
        .and_then(|raw| TemplateResolutionMode::from_str(&raw).ok())
    {
        debug!(%mode, "template resolution mode from {MODE_ENV_VAR}");
        return mode;
    }
    TemplateResolutionMode::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_mode_wins_over_settings() {
        let settings = Settings::default().with_mode(TemplateResolutionMode::Permissive);
        assert_eq!(
            effective_mode(Some(TemplateResolutionMode::Strict), Some(&settings)),
            TemplateResolutionMode::Strict
        );
    }

    #[test]
    fn settings_mode_wins_over_default() {
        let settings = Settings::default().with_mode(TemplateResolutionMode::Permissive);
        assert_eq!(
            effective_mode(None, Some(&settings)),
            TemplateResolutionMode::Permissive
        );
    }

    #[test]
    fn settings_parse_round_trip() {
        let parsed: Settings = serde_json::from_str(
            r#"{"runtime": {"template_resolution_mode": "permissive"}}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.runtime.template_resolution_mode,
            Some(TemplateResolutionMode::Permissive)
        );
        let empty: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Settings::default());
    }
}
