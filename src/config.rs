use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_VENV_DIR: &str = "venv";
pub const DEFAULT_ENTRY_POINT: &str = "run.py";
pub const CONFIG_FILE_NAME: &str = "launcher.json";

/// Values read from `launcher.json`. Every field is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub project_dir: Option<PathBuf>,
    pub venv_dir: Option<PathBuf>,
    pub entry_point: Option<PathBuf>,
    pub pause: Option<bool>,
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub project_dir: Option<PathBuf>,
    pub venv_dir: Option<PathBuf>,
    pub entry_point: Option<PathBuf>,
    pub no_pause: bool,
}

/// Fully resolved launch configuration.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub project_dir: PathBuf,
    pub venv_dir: PathBuf,
    pub entry_point: PathBuf,
    pub pause: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("{field} must be relative to the project directory, got {}", path.display())]
    NotRelative { field: &'static str, path: PathBuf },
}

impl LaunchConfig {
    /// Merge defaults, file values and overrides, then validate.
    pub fn resolve(file: ConfigFile, overrides: Overrides, cwd: &Path) -> anyhow::Result<Self> {
        let project_dir = overrides
            .project_dir
            .or(file.project_dir)
            .unwrap_or_else(|| cwd.to_path_buf());
        let project_dir = if project_dir.is_absolute() {
            project_dir
        } else {
            cwd.join(project_dir)
        };

        let config = LaunchConfig {
            project_dir,
            venv_dir: overrides
                .venv_dir
                .or(file.venv_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VENV_DIR)),
            entry_point: overrides
                .entry_point
                .or(file.entry_point)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENTRY_POINT)),
            pause: !overrides.no_pause && file.pause.unwrap_or(true),
        };

        validate_config(&config)?;
        Ok(config)
    }
}

fn validate_config(config: &LaunchConfig) -> Result<(), ConfigError> {
    if config.venv_dir.as_os_str().is_empty() {
        return Err(ConfigError::EmptyField { field: "venv_dir" });
    }
    if config.venv_dir.is_absolute() {
        return Err(ConfigError::NotRelative {
            field: "venv_dir",
            path: config.venv_dir.clone(),
        });
    }

    if config.entry_point.as_os_str().is_empty() {
        return Err(ConfigError::EmptyField {
            field: "entry_point",
        });
    }
    if config.entry_point.is_absolute() {
        return Err(ConfigError::NotRelative {
            field: "entry_point",
            path: config.entry_point.clone(),
        });
    }

    Ok(())
}

pub fn load_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing config at {}", path.display()))
}

/// Find the config file to use. An explicit path must exist; otherwise
/// `./launcher.json` and then the per-user config directory are tried.
pub fn discover_config(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<ConfigFile> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(anyhow!("config file {} does not exist", path.display()));
        }
        return load_config_file(path);
    }

    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return load_config_file(&local);
    }

    if let Some(user) = user_config_path() {
        if user.is_file() {
            return load_config_file(&user);
        }
    }

    Ok(ConfigFile::default())
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("venv-launcher").join(CONFIG_FILE_NAME))
}
