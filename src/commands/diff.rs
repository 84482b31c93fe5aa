use crate::cli::args::HostSelector;
use crate::commands::print_json;
use crate::error::{OneconfError, Result};
use crate::project_identity;
use crate::service::OneConf;
use crate::ui as output;

pub fn run(oneconf: &OneConf, host: &HostSelector, json: bool) -> Result<()> {
    if host.is_empty() {
        return Err(OneconfError::Other(format!(
            "Pick the host to compare with: {}",
            project_identity::cli_with("diff --hostname <NAME>")
        )));
    }
    let diff = oneconf.diff(host.host_id.as_deref(), host.hostname.as_deref())?;
    if json {
        return print_json(&diff);
    }

    if diff.is_empty() {
        output::success("Both hosts have the same manually installed packages");
        return Ok(());
    }
    if !diff.to_install.is_empty() {
        output::header("Packages to install");
        for name in &diff.to_install {
            output::added(name);
        }
    }
    if !diff.to_remove.is_empty() {
        output::header("Packages to remove");
        for name in &diff.to_remove {
            output::removed(name);
        }
    }
    Ok(())
}
