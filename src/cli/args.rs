use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "oneconf",
    about = "Keep the inventory of installed packages in sync across machines",
    long_about = "Query and maintain the inventory of manually installed packages of this \
                  machine and of every other machine registered to the same account",
    version,
    next_line_help = false,
    term_width = 80
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalFlags {
    /// Verbose output (debug diagnostics on stderr)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Quiet mode
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use this cache directory instead of the configured one
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Read settings from this file instead of the default location
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,
}

/// Selects a host by id or by name; neither means the current host.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSelector {
    /// Host id
    #[arg(long, value_name = "ID", conflicts_with = "hostname")]
    pub host_id: Option<String>,

    /// Host name
    #[arg(long, value_name = "NAME")]
    pub hostname: Option<String>,
}

impl HostSelector {
    pub fn is_empty(&self) -> bool {
        self.host_id.is_none() && self.hostname.is_none()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all known hosts
    Hosts,

    /// Show the package inventory of a host
    Packages {
        #[command(flatten)]
        host: HostSelector,

        /// Only manually installed packages
        #[arg(long)]
        manual: bool,

        /// Packages this host no longer has, with their removal time
        #[arg(long, conflicts_with_all = ["manual", "host_id", "hostname"])]
        removed: bool,
    },

    /// Compare this host with another one
    Diff {
        #[command(flatten)]
        host: HostSelector,
    },

    /// Recompute the inventory of this host
    Update,

    /// Share the inventory of a host (this one by default)
    Share {
        #[arg(long, value_name = "ID")]
        host_id: Option<String>,
    },

    /// Stop sharing the inventory of a host (this one by default)
    Unshare {
        #[arg(long, value_name = "ID")]
        host_id: Option<String>,
    },

    /// Show when the catalog was last synced
    LastSync,

    /// Run one sync cycle against the catalog
    Sync,

    /// Run the sync loop in the foreground
    Daemon {
        /// Seconds between two cycles (overrides the setting)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },

    /// Show the effective settings
    Settings,

    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
