//! Entry point for the dupescan CLI.

use clap::Parser;
use dupescan::cli::Cli;
use dupescan::error::ExitCode;

fn main() {
    let cli = Cli::parse();
    match dupescan::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    }
}
