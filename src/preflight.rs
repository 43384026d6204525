use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::LaunchConfig;
use crate::runtime_env::{ActivatedEnv, VenvLayout, activate_venv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    CheckDir,
    ChangeDir,
    CheckEnvMarker,
    Activate,
    CheckEntryPoint,
    Probe,
    Launch,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Stage::CheckDir => "Checking project directory",
            Stage::ChangeDir => "Entering project directory",
            Stage::CheckEnvMarker => "Looking for virtual environment",
            Stage::Activate => "Activating virtual environment",
            Stage::CheckEntryPoint => "Looking for entry point",
            Stage::Probe => "Collecting interpreter details",
            Stage::Launch => "Starting program",
            Stage::Report => "Reporting result",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("Directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },
    #[error("Cannot enter directory {}: {source}", path.display())]
    DirectoryInaccessible { path: PathBuf, source: io::Error },
    #[error(
        "Virtual environment not found (expected {}). Create it with: {create_command}",
        marker.display()
    )]
    EnvMarkerMissing {
        marker: PathBuf,
        create_command: String,
    },
    #[error("Failed to activate virtual environment at {}: {reason}", venv_dir.display())]
    ActivationFailed { venv_dir: PathBuf, reason: String },
    #[error("Entry point not found: {}", path.display())]
    EntryPointMissing { path: PathBuf },
    #[error("Cannot access {}: {source}", path.display())]
    Unreadable {
        stage: Stage,
        path: PathBuf,
        source: io::Error,
    },
}

impl PreflightError {
    pub fn stage(&self) -> Stage {
        match self {
            PreflightError::DirectoryNotFound { .. } => Stage::CheckDir,
            PreflightError::DirectoryInaccessible { .. } => Stage::ChangeDir,
            PreflightError::EnvMarkerMissing { .. } => Stage::CheckEnvMarker,
            PreflightError::ActivationFailed { .. } => Stage::Activate,
            PreflightError::EntryPointMissing { .. } => Stage::CheckEntryPoint,
            PreflightError::Unreadable { stage, .. } => *stage,
        }
    }
}

/// Result of a successful pre-flight: everything the launch step needs.
#[derive(Debug, Clone, Serialize)]
pub struct Preflight {
    pub project_dir: PathBuf,
    pub entry_point: PathBuf,
    pub env: ActivatedEnv,
}

/// Run the ordered checks. `on_stage` is called as each stage begins; no
/// stage runs once an earlier one has failed.
pub fn run_preflight(
    config: &LaunchConfig,
    os: &str,
    base_path: Option<OsString>,
    mut on_stage: impl FnMut(Stage),
) -> Result<Preflight, PreflightError> {
    let project_dir = &config.project_dir;

    on_stage(Stage::CheckDir);
    if !project_dir.exists() {
        return Err(PreflightError::DirectoryNotFound {
            path: project_dir.clone(),
        });
    }

    on_stage(Stage::ChangeDir);
    enter_directory(project_dir)?;

    on_stage(Stage::CheckEnvMarker);
    let layout = VenvLayout::for_os(os);
    let venv_dir = project_dir.join(&config.venv_dir);
    let marker = layout.marker_path(&venv_dir);
    if !file_exists(&marker, Stage::CheckEnvMarker)? {
        return Err(PreflightError::EnvMarkerMissing {
            marker,
            create_command: format!("python -m venv {}", config.venv_dir.display()),
        });
    }

    on_stage(Stage::Activate);
    let env = activate_venv(&venv_dir, layout, base_path)
        .map_err(|reason| PreflightError::ActivationFailed { venv_dir, reason })?;

    on_stage(Stage::CheckEntryPoint);
    let entry_path = project_dir.join(&config.entry_point);
    if !file_exists(&entry_path, Stage::CheckEntryPoint)? {
        return Err(PreflightError::EntryPointMissing { path: entry_path });
    }

    Ok(Preflight {
        project_dir: project_dir.clone(),
        entry_point: config.entry_point.clone(),
        env,
    })
}

/// Entering a directory needs search permission, not read permission:
/// resolving `path/.` fails exactly when the directory cannot be entered.
fn enter_directory(path: &Path) -> Result<(), PreflightError> {
    let inaccessible = |source: io::Error| PreflightError::DirectoryInaccessible {
        path: path.to_path_buf(),
        source,
    };

    if !path.is_dir() {
        return Err(inaccessible(io::Error::other("not a directory")));
    }
    fs::metadata(path.join(".")).map_err(inaccessible)?;
    Ok(())
}

/// Only `NotFound` counts as absent; any other lookup error is reported as is.
fn file_exists(path: &Path, stage: Stage) -> Result<bool, PreflightError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(PreflightError::Unreadable {
            stage,
            path: path.to_path_buf(),
            source,
        }),
    }
}
