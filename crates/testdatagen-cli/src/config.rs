use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CliError, CliResult};

/// Settings file looked up in the working directory when `--config` is absent.
pub const DEFAULT_SETTINGS_FILE: &str = "testdatagen.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub fail_on_warnings: bool,
    pub output: OutputFormat,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            fail_on_warnings: false,
            output: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub validation: ValidationSettings,
}

/// Load settings from an explicit path (which must exist) or from
/// `testdatagen.toml` in the working directory (defaults when missing).
pub fn load_settings(explicit: Option<&Path>) -> CliResult<Settings> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(CliError::InvalidConfig(format!(
                "settings file {} does not exist",
                path.display()
            )));
        }
        Some(path) => path.to_path_buf(),
        None => {
            let path = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if !path.exists() {
                return Ok(Settings::default());
            }
            path
        }
    };
    read_settings(&path)
}

fn read_settings(path: &Path) -> CliResult<Settings> {
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}
