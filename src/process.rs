use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use serde::{Serialize, Serializer};

use crate::runtime_env::ActivatedEnv;

/// Everything needed to start a child process, without touching the
/// launcher's own environment or working directory.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchPlan {
    pub program: PathBuf,
    #[serde(serialize_with = "lossy_args")]
    pub args: Vec<OsString>,
    pub current_dir: PathBuf,
    pub env: ActivatedEnv,
}

impl LaunchPlan {
    pub fn new(env: &ActivatedEnv, current_dir: PathBuf) -> Self {
        Self {
            program: env.interpreter.clone(),
            args: Vec::new(),
            current_dir,
            env: env.clone(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.current_dir)
            .envs(&self.env.context.env);
        for key in &self.env.context.removed {
            cmd.env_remove(key);
        }
        cmd
    }
}

fn lossy_args<S: Serializer>(args: &[OsString], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(args.iter().map(|arg| arg.to_string_lossy()))
}

#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Seam between the launcher and the operating system.
pub trait ProcessRunner {
    /// Run to completion, capturing output.
    fn output(&self, plan: &LaunchPlan) -> io::Result<CapturedOutput>;
    /// Run to completion with inherited stdio. `None` means no exit code
    /// (terminated by a signal).
    fn status(&self, plan: &LaunchPlan) -> io::Result<Option<i32>>;
}

#[derive(Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn output(&self, plan: &LaunchPlan) -> io::Result<CapturedOutput> {
        let output = plan.command().output()?;
        Ok(CapturedOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn status(&self, plan: &LaunchPlan) -> io::Result<Option<i32>> {
        let status = plan.command().status()?;
        Ok(status.code())
    }
}
