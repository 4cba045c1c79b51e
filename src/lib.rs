pub mod cli;
pub mod commands;
pub mod config;
pub mod connectors;
pub mod core;
pub mod error;
pub mod external_data;
pub mod fetch;
pub mod formats;
pub mod hooks;
pub mod jsonpath;
pub mod mapping;
pub mod params;
pub mod project_identity;
pub mod ui;
pub mod utils;

pub use config::{Registry, RegistryBuilder};
pub use connectors::EntryPoint;
pub use connectors::clients::Services;
pub use error::{ExtDataError, Result};
pub use external_data::{ExternalData, FetchOutcome};
pub use params::RequestParams;

use clap::Parser;
use std::process::exit;

/// Run extdata CLI entrypoint.
pub fn run_cli() {
    // 0. Initialize color settings (must be first)
    ui::init_colors();

    // 1. Signal Handling
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        ui::warning("Operation cancelled by user.");
        exit(130);
    }) {
        ui::warning(&format!("Could not install Ctrl-C handler: {}", e));
    }

    // 2. Parse & Run
    let args = cli::args::Cli::parse();
    ui::set_quiet(args.global.quiet);
    ui::set_verbose(args.global.verbose);

    if let Err(e) = cli::dispatcher::dispatch(&args) {
        ui::error(&format!("{}", e));
        exit(1);
    }
}
