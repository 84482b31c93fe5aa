//! Command handlers
//!
//! One module per subcommand. Handlers print through [`crate::ui`], or a single
//! JSON document on stdout when `--json` is set.

pub mod completions;
pub mod daemon;
pub mod diff;
pub mod hosts;
pub mod last_sync;
pub mod packages;
pub mod settings;
pub mod share;
pub mod sync;
pub mod update;

use crate::error::Result;
use serde::Serialize;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
