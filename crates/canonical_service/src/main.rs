use std::process::ExitCode;

use canonical_service::Cli;
use clap::Parser;
use engine_logging::engine_error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match canonical_service::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            engine_error!("{:#}", err);
            eprintln!("canonicalurl: {err:#}");
            ExitCode::FAILURE
        }
    }
}
