use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::{ConvertError, Result};

/// Persisted user settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub preserve_structure: bool,
    pub skip_existing: bool,
    pub output_encoding: String,
    pub log_level: String,
    pub last_input_path: Option<PathBuf>,
    pub last_output_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preserve_structure: true,
            skip_existing: true,
            output_encoding: "utf-8".to_string(),
            log_level: "info".to_string(),
            last_input_path: None,
            last_output_path: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; a missing file yields the defaults.
    ///
    /// Keys absent from the file keep their default values.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file {:?} not found, using default settings", path);
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&json)
            .map_err(|e| ConvertError::Settings(format!("cannot parse {:?}: {}", path, e)))?;
        settings.validate()?;

        info!("Settings loaded from {:?}", path);
        Ok(settings)
    }

    /// Like [`load`](Self::load), but falls back to the defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("Error loading settings: {}, using defaults", e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConvertError::Settings(format!("cannot serialize settings: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;

        info!("Settings saved to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let encoding = self.output_encoding.to_ascii_lowercase().replace('_', "-");
        if encoding != "utf-8" && encoding != "utf8" {
            return Err(ConvertError::Settings(format!(
                "unsupported output encoding {:?}, only UTF-8 is written",
                self.output_encoding
            )));
        }

        log_filter(&self.log_level)?;
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
        info!("Settings reset to defaults");
    }
}

/// Build a log filter from a level name or a full filter directive.
///
/// A bare word must be a level (`"info"`, `"WARNING"`, `"critical"`, ...);
/// only inputs containing `=` or `,` are read as `EnvFilter` directives.
pub fn log_filter(level: &str) -> Result<EnvFilter> {
    let level = level.trim();
    let invalid = |reason: String| ConvertError::Settings(format!("invalid log level {:?}: {}", level, reason));

    if level.is_empty() {
        return Err(invalid("empty".to_string()));
    }

    if level.contains('=') || level.contains(',') {
        return EnvFilter::try_new(level).map_err(|e| invalid(e.to_string()));
    }

    let name = match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    };
    let filter = LevelFilter::from_str(&name).map_err(|e| invalid(e.to_string()))?;

    EnvFilter::try_new(filter.to_string()).map_err(|e| invalid(e.to_string()))
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "preserve_structure={}, skip_existing={}, output_encoding={}, log_level={}",
            self.preserve_structure, self.skip_existing, self.output_encoding, self.log_level
        )
    }
}
