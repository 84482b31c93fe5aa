//! Shell completion scripts, generated from the clap definition.

use crate::cli::args::Cli;
use crate::error::Result;
use crate::project_identity::BINARY_NAME;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

pub fn run(shell: Shell) -> Result<()> {
    write_script(shell, &mut io::stdout().lock())
}

/// Completions are keyed to the installed binary name, not the package name.
fn write_script(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, BINARY_NAME, out);
    out.flush()?;
    Ok(())
}
