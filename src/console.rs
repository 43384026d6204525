use std::io::{self, BufRead, Write};

/// Switch the console to UTF-8 before anything is printed. Best-effort.
pub fn prepare_console(os: &str) {
    if os != "windows" {
        return;
    }

    let _ = std::process::Command::new("cmd")
        .args(["/C", "chcp 65001 >NUL"])
        .status();
}

/// Keeps output visible to an interactive user until they acknowledge it.
pub trait Acknowledge {
    fn acknowledge(&mut self);
}

/// Prompts on stdout and waits for a line on stdin.
#[derive(Debug, Default)]
pub struct PromptPause;

impl Acknowledge for PromptPause {
    fn acknowledge(&mut self) {
        print!("Press Enter to continue . . . ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        // EOF or a closed stdin just means nobody is there to wait for.
        let _ = io::stdin().lock().read_line(&mut line);
    }
}

#[derive(Debug, Default)]
pub struct NoPause;

impl Acknowledge for NoPause {
    fn acknowledge(&mut self) {}
}

pub fn pause_for(enabled: bool) -> Box<dyn Acknowledge> {
    if enabled {
        Box::new(PromptPause)
    } else {
        Box::new(NoPause)
    }
}
