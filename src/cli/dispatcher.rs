//! Command dispatcher
//!
//! Routes CLI commands to their appropriate handlers.

use crate::cli::RuntimeContext;
use crate::cli::args::{Cli, Command};
use crate::commands;
use crate::error::Result;

/// Dispatch the parsed CLI command to the appropriate handler
pub fn dispatch(args: &Cli) -> Result<()> {
    let json = args.global.json;

    // No settings, cache or host detection needed for these.
    if let Command::Completions { shell } = &args.command {
        return commands::completions::run(*shell);
    }

    let ctx = RuntimeContext::load(&args.global)?;
    if let Command::Settings = &args.command {
        return commands::settings::run(&ctx, json);
    }

    let oneconf = ctx.open()?;
    match &args.command {
        Command::Hosts => commands::hosts::run(&oneconf, json),
        Command::Packages {
            host,
            manual,
            removed: false,
        } => commands::packages::run(&oneconf, host, *manual, json),
        Command::Packages { removed: true, .. } => commands::packages::run_removed(&oneconf, json),
        Command::Diff { host } => commands::diff::run(&oneconf, host, json),
        Command::Update => commands::update::run(&oneconf, json),
        Command::Share { host_id } => commands::share::run(&oneconf, true, host_id.as_deref()),
        Command::Unshare { host_id } => {
            commands::share::run(&oneconf, false, host_id.as_deref())
        }
        Command::LastSync => commands::last_sync::run(&oneconf, json),
        Command::Sync => commands::sync::run(&ctx, &oneconf, json),
        Command::Daemon { interval } => commands::daemon::run(
            &ctx,
            &oneconf,
            commands::daemon::DaemonOptions {
                interval: *interval,
            },
        ),
        Command::Settings | Command::Completions { .. } => Ok(()),
    }
}
