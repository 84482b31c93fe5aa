//! Integration tests for the sync workflow
//!
//! Two machines share one catalog file:
//! - Inventories flow from one machine to the other
//! - Diffs work on the synced copies
//! - Unsharing removes a machine from the catalog
//! - A long-lived service never reverts sharing changed by the CLI

use std::sync::Arc;

use oneconf::core::types::InstalledPackage;
use oneconf::distro::DistroPolicy;
use oneconf::hosts::HostIdentity;
use oneconf::packages::{SnapshotSource, StaticSource};
use oneconf::remote::{RemoteCatalog, SiloCatalog};
use oneconf::service::{NEVER_SYNCED, OneConf};
use oneconf::store::PackageListing;
use oneconf::sync::SyncEngine;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to open a machine with the given installed packages
fn machine(dir: &TempDir, hostid: &str, hostname: &str, packages: &[&str]) -> OneConf {
    let source = StaticSource::new(packages.iter().map(|n| InstalledPackage::new(*n)).collect());
    OneConf::open(
        dir.path().join("cache"),
        &HostIdentity::new(hostid, hostname),
        DistroPolicy::for_key("generic").unwrap(),
        Box::new(source),
    )
    .unwrap()
}

/// Helper to run one complete cycle for a machine
fn sync(oneconf: &OneConf, silo: &Arc<SiloCatalog>) {
    let engine = SyncEngine::new(Arc::clone(oneconf.store()), Box::new(Arc::clone(silo)));
    let report = engine.run_cycle();
    assert!(report.is_complete(), "cycle aborted: {:?}", report);
    assert!(report.failures.is_empty(), "failures: {:?}", report.failures);
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_inventory_flows_between_machines() {
    let dir = tempfile::tempdir().unwrap();
    let silo = Arc::new(SiloCatalog::new(dir.path().join("silo.json")));

    let desktop = machine(&dir, "AAAA", "desktop", &["vim", "gimp", "git"]);
    let laptop = machine(&dir, "BBBB", "laptop", &["vim", "emacs"]);
    desktop.update().unwrap();
    laptop.update().unwrap();
    desktop.set_share_inventory(true, None).unwrap();
    laptop.set_share_inventory(true, None).unwrap();

    sync(&desktop, &silo);
    sync(&laptop, &silo);
    sync(&desktop, &silo);

    assert_eq!(
        laptop.get_packages(None, Some("desktop"), true).unwrap(),
        PackageListing::Manual(names(&["gimp", "git", "vim"]))
    );

    // What the other machine needs to match this one.
    let diff = laptop.diff(None, Some("desktop")).unwrap();
    assert_eq!(diff.to_install, names(&["emacs"]));
    assert_eq!(diff.to_remove, names(&["gimp", "git"]));

    let diff = desktop.diff(Some("BBBB"), None).unwrap();
    assert_eq!(diff.to_install, names(&["gimp", "git"]));
    assert_eq!(diff.to_remove, names(&["emacs"]));

    assert_ne!(desktop.get_last_sync_date().unwrap(), NEVER_SYNCED);
}

#[test]
fn test_unshared_machine_is_invisible() {
    let dir = tempfile::tempdir().unwrap();
    let silo = Arc::new(SiloCatalog::new(dir.path().join("silo.json")));

    let desktop = machine(&dir, "AAAA", "desktop", &["vim"]);
    let laptop = machine(&dir, "BBBB", "laptop", &["emacs"]);
    desktop.update().unwrap();
    laptop.update().unwrap();

    sync(&desktop, &silo);
    sync(&laptop, &silo);

    assert!(silo.list_machines().unwrap().is_empty());
    let hosts = laptop.get_all_hosts().unwrap();
    assert_eq!(hosts.len(), 1);
    assert!(hosts["BBBB"].is_current);
}

#[test]
fn test_unsharing_removes_machine_from_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let silo = Arc::new(SiloCatalog::new(dir.path().join("silo.json")));

    let desktop = machine(&dir, "AAAA", "desktop", &["vim"]);
    let laptop = machine(&dir, "BBBB", "laptop", &["emacs"]);
    desktop.update().unwrap();
    desktop.set_share_inventory(true, None).unwrap();
    sync(&desktop, &silo);
    sync(&laptop, &silo);
    assert!(laptop.get_all_hosts().unwrap().contains_key("AAAA"));

    desktop.set_share_inventory(false, None).unwrap();
    sync(&desktop, &silo);
    assert!(silo.list_machines().unwrap().is_empty());

    sync(&laptop, &silo);
    assert!(!laptop.get_all_hosts().unwrap().contains_key("AAAA"));
    assert!(laptop.get_packages(Some("AAAA"), None, false).is_err());
}

#[test]
fn test_changes_made_by_another_process_are_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let silo = Arc::new(SiloCatalog::new(dir.path().join("silo.json")));

    // Long-lived service instance, as the daemon holds it.
    let service = machine(&dir, "AAAA", "desktop", &["vim"]);
    service.update().unwrap();
    sync(&service, &silo);
    assert!(silo.list_machines().unwrap().is_empty());

    // A CLI invocation shares the inventory through the cache files.
    let cli = machine(&dir, "AAAA", "desktop", &["vim", "git"]);
    cli.update().unwrap();
    cli.set_share_inventory(true, None).unwrap();

    sync(&service, &silo);
    let machines = silo.list_machines().unwrap();
    assert_eq!(machines.len(), 1);
    assert_eq!(machines[0].hostname, "desktop");
    assert_eq!(
        silo.list_packages("AAAA").unwrap().len(),
        2,
        "the service pushed the inventory written by the CLI"
    );
}

/// Helper to write the package snapshot a machine reads on update
fn write_snapshot(path: &Path, packages: &[&str]) {
    let entries: Vec<String> = packages
        .iter()
        .map(|n| format!("{{\"name\": \"{}\"}}", n))
        .collect();
    fs::write(path, format!("[{}]", entries.join(","))).unwrap();
}

fn snapshot_machine(dir: &TempDir, snapshot: &Path) -> OneConf {
    OneConf::open(
        dir.path().join("cache"),
        &HostIdentity::new("AAAA", "desktop"),
        DistroPolicy::for_key("generic").unwrap(),
        Box::new(SnapshotSource::new(snapshot)),
    )
    .unwrap()
}

#[test]
fn test_service_refresh_keeps_unshare_from_cli() {
    let dir = tempfile::tempdir().unwrap();
    let silo = Arc::new(SiloCatalog::new(dir.path().join("silo.json")));
    let snapshot = dir.path().join("packages.json");
    write_snapshot(&snapshot, &["vim"]);

    let service = snapshot_machine(&dir, &snapshot);
    service.set_share_inventory(true, None).unwrap();
    service.update().unwrap();
    sync(&service, &silo);
    assert_eq!(silo.list_machines().unwrap().len(), 1);

    let cli = snapshot_machine(&dir, &snapshot);
    cli.set_share_inventory(false, None).unwrap();

    // The service refreshes its inventory between two cycles.
    write_snapshot(&snapshot, &["vim", "gimp"]);
    assert!(service.update().unwrap().is_changed());

    let fresh = snapshot_machine(&dir, &snapshot);
    assert!(!fresh.get_all_hosts().unwrap()["AAAA"].share_inventory);

    sync(&service, &silo);
    assert!(silo.list_machines().unwrap().is_empty());
    sync(&service, &silo);
    assert!(
        silo.list_machines().unwrap().is_empty(),
        "the unshared host was pushed again"
    );
}
