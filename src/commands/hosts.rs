use crate::commands::print_json;
use crate::error::Result;
use crate::service::OneConf;
use crate::ui as output;
use colored::Colorize;

pub fn run(oneconf: &OneConf, json: bool) -> Result<()> {
    let hosts = oneconf.get_all_hosts()?;
    if json {
        return print_json(&hosts);
    }

    output::header("Hosts");
    for (hostid, host) in &hosts {
        let mut marks = Vec::new();
        if host.is_current {
            marks.push("this host".green().to_string());
        }
        if !host.share_inventory {
            marks.push("not shared".yellow().to_string());
        }
        let suffix = if marks.is_empty() {
            String::new()
        } else {
            format!(" ({})", marks.join(", "))
        };
        output::line(&format!("{:<20} {}{}", host.hostname, hostid.dimmed(), suffix));
    }
    Ok(())
}
