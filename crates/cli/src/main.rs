use std::process::ExitCode;

fn main() -> ExitCode {
    readycheck_cli::run()
}
