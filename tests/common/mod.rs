//! Shared helpers for driving the launcher binary against scratch projects.

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[allow(dead_code)]
pub struct Project {
    root: TempDir,
}

#[allow(dead_code)]
impl Project {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("Failed to create temp directory for tests"),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn venv_bin(&self) -> PathBuf {
        let name = if cfg!(windows) { "Scripts" } else { "bin" };
        self.path().join("venv").join(name)
    }

    /// Create the activation marker without an interpreter.
    pub fn with_marker(self) -> Self {
        let marker = if cfg!(windows) { "activate.bat" } else { "activate" };
        fs::create_dir_all(self.venv_bin()).expect("Failed to create venv bin dir");
        fs::write(self.venv_bin().join(marker), "").expect("Failed to write marker");
        self
    }

    pub fn with_entry_point(self) -> Self {
        fs::write(self.path().join("run.py"), "print('hello')\n").expect("Failed to write run.py");
        self
    }

    /// Launcher invocation isolated from any user-level config.
    pub fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("venv-launcher").expect("Failed to locate binary");
        cmd.current_dir(self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env("HOME", self.path())
            .arg("--no-pause");
        cmd
    }
}
