use std::process::ExitCode;

fn main() -> ExitCode {
    dealroom_cli::run()
}
