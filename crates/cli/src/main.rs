use std::process::ExitCode;

fn main() -> ExitCode {
    ano_cli::run()
}
