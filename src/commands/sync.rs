//! One sync cycle in the foreground.

use crate::cli::RuntimeContext;
use crate::error::{OneconfError, Result};
use crate::service::OneConf;
use crate::sync::{SyncEngine, SyncReport};
use crate::ui as output;
use serde_json::json;

pub fn run(ctx: &RuntimeContext, oneconf: &OneConf, json: bool) -> Result<()> {
    let catalog = ctx.catalog()?;
    oneconf.update()?;

    let engine = SyncEngine::new(oneconf.store().clone(), catalog);
    engine.can_sync_flag().store(
        ctx.network_available() && ctx.credentials_available(),
        std::sync::atomic::Ordering::SeqCst,
    );
    let report = engine.run_cycle();

    if json {
        super::print_json(&json!({
            "complete": report.is_complete(),
            "hosts_changed": report.hosts_changed,
            "packages_changed": report.packages_changed,
            "logos_changed": report.logos_changed,
            "pushed_host": report.pushed_host,
            "pushed_packages": report.pushed_packages,
            "removed": report.removed,
            "failures": report.failures,
        }))?;
    } else {
        print_report(&report);
    }

    match report.aborted_at {
        Some(step) => Err(OneconfError::Other(format!(
            "Sync interrupted during {:?}: catalog unreachable or credentials missing",
            step
        ))),
        None => Ok(()),
    }
}

fn print_report(report: &SyncReport) {
    if report.hosts_changed {
        output::info("Host list updated");
    }
    for hostid in &report.packages_changed {
        output::info(&format!("Packages of {} updated", hostid));
    }
    if report.pushed_host {
        output::info("This host was registered in the catalog");
    }
    if report.pushed_packages {
        output::info("Inventory of this host uploaded");
    }
    for hostid in &report.removed {
        output::info(&format!("Host {} removed from the catalog", hostid));
    }
    for failure in &report.failures {
        output::warning(failure);
    }
    if report.is_complete() {
        output::success("Sync complete");
    }
}
