//! Resync CLI Binary
//!
//! Push, pull, back up and clean documents on a reMarkable tablet.

use clap::Parser;
use resync::logging::init_logging;
use resync::tooling::cli::{Cli, CliContext};
use std::process;

fn main() {
    let cli = Cli::parse();

    let context = match CliContext::new(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&context.config().logging)) {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    match context.execute(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}
