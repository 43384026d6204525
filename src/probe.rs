use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::System;

use crate::process::{LaunchPlan, ProcessRunner};
use crate::runtime_env::ActivatedEnv;

/// Diagnostic details printed before launch. Every field is best-effort.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub interpreter_version: Option<String>,
    pub interpreter_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venv_version: Option<String>,
    pub os: String,
    pub os_version: String,
    pub cpu_arch: String,
    pub started_at: DateTime<Utc>,
}

impl ProbeReport {
    pub fn print(&self) {
        println!(
            "Python version:  {}",
            self.interpreter_version.as_deref().unwrap_or("unknown")
        );
        println!(
            "Python location: {}",
            self.interpreter_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "unavailable".to_string())
        );
        if let Some(version) = &self.venv_version {
            println!("venv created with Python {version}");
        }
        println!(
            "Host: {} {} ({}), started {}",
            self.os,
            self.os_version,
            self.cpu_arch,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}

pub fn current_os() -> String {
    normalize_os(std::env::consts::OS)
}

pub fn probe_interpreter(
    env: &ActivatedEnv,
    project_dir: &Path,
    runner: &dyn ProcessRunner,
) -> ProbeReport {
    ProbeReport {
        interpreter_version: interpreter_version(env, project_dir, runner),
        interpreter_path: locate_interpreter(env, project_dir),
        venv_version: venv_version(&env.venv_dir),
        os: current_os(),
        os_version: System::long_os_version()
            .or_else(System::os_version)
            .unwrap_or_else(|| "unknown".to_string()),
        cpu_arch: normalize_arch(std::env::consts::ARCH),
        started_at: Utc::now(),
    }
}

fn interpreter_version(
    env: &ActivatedEnv,
    project_dir: &Path,
    runner: &dyn ProcessRunner,
) -> Option<String> {
    let plan = LaunchPlan::new(env, project_dir.to_path_buf()).arg("--version");
    let output = runner.output(&plan).ok()?;
    if !output.success {
        return None;
    }

    // Python 2 writes its version to stderr.
    [output.stdout, output.stderr]
        .into_iter()
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

/// Resolve the interpreter by name through the activated PATH, the way
/// `where`/`which` would from the activated shell.
fn locate_interpreter(env: &ActivatedEnv, project_dir: &Path) -> Option<PathBuf> {
    let name = env.interpreter.file_stem()?;
    which::which_in(name, env.search_path(), project_dir).ok()
}

fn venv_version(venv_dir: &Path) -> Option<String> {
    let data = fs::read_to_string(venv_dir.join("pyvenv.cfg")).ok()?;
    let values = parse_pyvenv_cfg(&data);
    values
        .get("version")
        .or_else(|| values.get("version_info"))
        .cloned()
}

/// Parse the `key = value` lines of a `pyvenv.cfg` file.
pub fn parse_pyvenv_cfg(data: &str) -> BTreeMap<String, String> {
    data.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn normalize_os(raw: &str) -> String {
    match raw {
        "macos" => "macos".to_string(),
        "windows" => "windows".to_string(),
        other => other.to_lowercase(),
    }
}

fn normalize_arch(raw: &str) -> String {
    match raw {
        "x86_64" => "x64".to_string(),
        "aarch64" => "arm64".to_string(),
        other => other.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_pyvenv_cfg, probe_interpreter};
    use crate::process::{CapturedOutput, LaunchPlan, ProcessRunner};
    use crate::runtime_env::{VenvLayout, activate_venv};
    use std::io;

    struct VersionRunner {
        result: io::Result<CapturedOutput>,
    }

    impl ProcessRunner for VersionRunner {
        fn output(&self, plan: &LaunchPlan) -> io::Result<CapturedOutput> {
            assert_eq!(plan.args, vec![std::ffi::OsString::from("--version")]);
            match &self.result {
                Ok(output) => Ok(output.clone()),
                Err(err) => Err(io::Error::new(err.kind(), err.to_string())),
            }
        }

        fn status(&self, _plan: &LaunchPlan) -> io::Result<Option<i32>> {
            panic!("probe must not launch the program");
        }
    }

    #[test]
    fn parses_pyvenv_cfg() {
        let values = parse_pyvenv_cfg(
            "home = /usr/bin\ninclude-system-site-packages = false\nversion = 3.12.1\n",
        );
        assert_eq!(values.get("home").map(String::as_str), Some("/usr/bin"));
        assert_eq!(values.get("version").map(String::as_str), Some("3.12.1"));
    }

    #[test]
    fn probe_reads_version_from_stderr_and_cfg() {
        let dir = tempfile::tempdir().unwrap();
        let venv = dir.path().join("venv");
        std::fs::create_dir_all(venv.join("bin")).unwrap();
        std::fs::write(venv.join("bin").join("python"), "").unwrap();
        std::fs::write(venv.join("pyvenv.cfg"), "version_info = 3.11.4.final.0\n").unwrap();
        let env = activate_venv(&venv, VenvLayout::for_os("linux"), None).unwrap();

        let runner = VersionRunner {
            result: Ok(CapturedOutput {
                success: true,
                stdout: String::new(),
                stderr: "Python 2.7.18\n".to_string(),
            }),
        };
        let report = probe_interpreter(&env, dir.path(), &runner);

        assert_eq!(report.interpreter_version.as_deref(), Some("Python 2.7.18"));
        assert_eq!(report.venv_version.as_deref(), Some("3.11.4.final.0"));
    }

    #[test]
    fn probe_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let venv = dir.path().join("venv");
        std::fs::create_dir_all(venv.join("bin")).unwrap();
        std::fs::write(venv.join("bin").join("python"), "").unwrap();
        let env = activate_venv(&venv, VenvLayout::for_os("linux"), None).unwrap();

        let runner = VersionRunner {
            result: Err(io::Error::new(io::ErrorKind::NotFound, "gone")),
        };
        let report = probe_interpreter(&env, dir.path(), &runner);

        assert!(report.interpreter_version.is_none());
        assert!(report.venv_version.is_none());
    }
}
