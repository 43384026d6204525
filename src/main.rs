fn main() {
    let code = venv_launcher::run_cli();
    if code != 0 {
        std::process::exit(code);
    }
}
