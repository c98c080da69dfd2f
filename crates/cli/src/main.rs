use std::process::ExitCode;

fn main() -> ExitCode {
    sentra_cli::run()
}
