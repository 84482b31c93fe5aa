use crate::cli::args::HostSelector;
use crate::commands::print_json;
use crate::error::Result;
use crate::service::OneConf;
use crate::store::PackageListing;
use crate::ui as output;
use chrono::Local;
use colored::Colorize;

pub fn run(oneconf: &OneConf, host: &HostSelector, manual: bool, json: bool) -> Result<()> {
    let listing = oneconf.get_packages(host.host_id.as_deref(), host.hostname.as_deref(), manual)?;
    if json {
        return print_json(&listing);
    }

    match &listing {
        PackageListing::Manual(names) => {
            for name in names {
                output::line(name);
            }
        }
        PackageListing::Full(list) => {
            for (name, entry) in list {
                if entry.auto {
                    output::line(&format!("{} {}", name, "(auto)".dimmed()));
                } else {
                    output::line(name);
                }
            }
        }
    }
    if listing.is_empty() {
        output::info("No package recorded for this host yet");
    }
    Ok(())
}

pub fn run_removed(oneconf: &OneConf, json: bool) -> Result<()> {
    let removed = oneconf.get_removed_packages()?;
    if json {
        return print_json(&removed);
    }
    if removed.is_empty() {
        output::info("No package was removed from this host");
        return Ok(());
    }
    for (name, at) in &removed {
        let when = at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        output::line(&format!("{} {}", name, format!("(removed {})", when).dimmed()));
    }
    Ok(())
}
