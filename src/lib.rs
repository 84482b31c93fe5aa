pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod distro;
pub mod error;
pub mod hosts;
pub mod packages;
pub mod project_identity;
pub mod remote;
pub mod service;
pub mod state;
pub mod store;
pub mod sync;
pub mod ui;
pub mod utils;

use clap::Parser;
use std::process::exit;
use tracing_subscriber::EnvFilter;

/// Run oneconf CLI entrypoint.
pub fn run_cli() {
    let args = cli::args::Cli::parse();
    ui::set_quiet(args.global.quiet);
    init_tracing(args.global.verbose);

    if let Err(e) = cli::dispatcher::dispatch(&args) {
        ui::error(&format!("{}", e));
        if e.is_lookup_error() {
            ui::hint("Run 'oneconf hosts' to list the known hosts");
        }
        exit(1);
    }
}

/// Diagnostics go to stderr; `ONECONF_LOG` wins over `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "oneconf=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(project_identity::LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
