use std::process::ExitCode;

fn main() -> ExitCode {
    taskpilot_cli::run()
}
