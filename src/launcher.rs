use std::ffi::OsString;

use crate::config::LaunchConfig;
use crate::console::Acknowledge;
use crate::preflight::{Preflight, Stage, run_preflight};
use crate::probe::probe_interpreter;
use crate::process::{LaunchPlan, ProcessRunner};

/// Exit code for any failed pre-flight check.
pub const PREFLIGHT_FAILURE: i32 = 1;

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Exited(i32),
    Signaled,
    SpawnFailed,
}

impl Outcome {
    /// Exit code the launcher reports for this outcome. On unix, non-zero
    /// child codes that would truncate to zero in an 8-bit status become 1;
    /// Windows keeps the full 32-bit code.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Exited(0) => 0,
            Outcome::Exited(code) if cfg!(unix) && code & 0xff == 0 => 1,
            Outcome::Exited(code) => code,
            Outcome::Signaled | Outcome::SpawnFailed => 1,
        }
    }
}

pub struct Launcher<'a> {
    config: LaunchConfig,
    os: String,
    base_path: Option<OsString>,
    runner: &'a dyn ProcessRunner,
    pause: &'a mut dyn Acknowledge,
}

impl<'a> Launcher<'a> {
    pub fn new(
        config: LaunchConfig,
        os: impl Into<String>,
        runner: &'a dyn ProcessRunner,
        pause: &'a mut dyn Acknowledge,
    ) -> Self {
        Self {
            config,
            os: os.into(),
            base_path: std::env::var_os("PATH"),
            runner,
            pause,
        }
    }

    /// Use `path` instead of the inherited PATH as the base for activation.
    pub fn with_base_path(mut self, path: Option<OsString>) -> Self {
        self.base_path = path;
        self
    }

    /// Run every stage in order and return the process exit code.
    pub fn run(&mut self) -> i32 {
        let preflight = match run_preflight(
            &self.config,
            &self.os,
            self.base_path.clone(),
            announce,
        ) {
            Ok(preflight) => preflight,
            Err(err) => {
                eprintln!("[ERROR] {err}");
                self.pause.acknowledge();
                return PREFLIGHT_FAILURE;
            }
        };

        announce(Stage::Probe);
        probe_interpreter(&preflight.env, &preflight.project_dir, self.runner).print();

        announce(Stage::Launch);
        let outcome = self.launch(&preflight);

        announce(Stage::Report);
        self.report(outcome)
    }

    fn launch(&self, preflight: &Preflight) -> Outcome {
        let plan = LaunchPlan::new(&preflight.env, preflight.project_dir.clone())
            .arg(preflight.entry_point.as_os_str());

        match self.runner.status(&plan) {
            Ok(Some(code)) => Outcome::Exited(code),
            Ok(None) => Outcome::Signaled,
            Err(err) => {
                eprintln!(
                    "[ERROR] could not start {}: {err}",
                    plan.program.display()
                );
                Outcome::SpawnFailed
            }
        }
    }

    fn report(&mut self, outcome: Outcome) -> i32 {
        match outcome {
            Outcome::Exited(0) => println!("Program finished."),
            Outcome::Exited(code) => {
                eprintln!("[ERROR] Program exited with error code {code}");
                self.pause.acknowledge();
            }
            Outcome::Signaled => {
                eprintln!("[ERROR] Program was terminated by a signal");
                self.pause.acknowledge();
            }
            Outcome::SpawnFailed => {
                eprintln!("[ERROR] Program could not be started");
                self.pause.acknowledge();
            }
        }

        self.pause.acknowledge();
        outcome.exit_code()
    }
}

fn announce(stage: Stage) {
    println!("==> {stage}");
}
