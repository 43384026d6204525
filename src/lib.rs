pub mod cli;
pub mod config;
pub mod console;
pub mod launcher;
pub mod preflight;
pub mod probe;
pub mod process;
pub mod runtime_env;

/// Run the command line interface and return an exit code.
pub fn run_cli() -> i32 {
    cli::run()
}
