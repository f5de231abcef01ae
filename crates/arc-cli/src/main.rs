use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = arc_cli::Cli::parse();
    arc_cli::config::init_tracing(cli.log_level());
    match arc_cli::run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
