use super::*;
use crate::core::types::{InstalledPackage, PackageEntry, PackageList};
use crate::distro::DistroPolicy;
use crate::hosts::{HostIdentity, HostRegistry};
use crate::packages::StaticSource;
use crate::remote::{SiloCatalog, SiloOperation};
use crate::state::io::write_json_atomically;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

struct Fixture {
    dir: TempDir,
    store: Arc<PackageStore>,
    silo: Arc<SiloCatalog>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().expect("tempdir");
        let silo = Arc::new(SiloCatalog::new(dir.path().join("silo.json")));
        let store = Self::open_store(&dir);
        Self { dir, store, silo }
    }

    fn open_store(dir: &TempDir) -> Arc<PackageStore> {
        let registry =
            HostRegistry::open(dir.path().join("cache"), &HostIdentity::new("0000", "foomachine"))
                .expect("open registry")
                .into_shared();
        let policy = DistroPolicy::for_key("generic").expect("policy");
        Arc::new(PackageStore::new(registry, policy))
    }

    /// Drop in-memory state and load everything back from disk.
    fn restart(&mut self) {
        self.store = Self::open_store(&self.dir);
    }

    fn engine(&self) -> (SyncEngine, Receiver<SyncEvent>) {
        let (sender, receiver) = mpsc::channel();
        let engine = SyncEngine::new(Arc::clone(&self.store), Box::new(Arc::clone(&self.silo)))
            .with_events(sender);
        (engine, receiver)
    }

    fn seed_remote_host(&self, hostid: &str, hostname: &str, packages: &[&str]) {
        self.silo
            .update_machine(hostid, hostname, None)
            .expect("seed machine");
        let list = manual(packages);
        let checksum = checksum_of(&list).expect("checksum");
        self.silo
            .update_packages(hostid, &checksum, &list)
            .expect("seed packages");
    }

    fn share_current_host(&self) {
        write_registry(self.store.registry())
            .expect("registry")
            .set_share_inventory(true, None)
            .expect("share");
    }

    fn update_current(&self, packages: &[&str]) -> String {
        let source = StaticSource::new(packages.iter().map(|n| InstalledPackage::new(*n)).collect());
        self.store.update(&source).expect("update").etag().to_string()
    }

    fn remote_ids(&self) -> Vec<String> {
        self.silo
            .list_machines()
            .expect("list")
            .into_iter()
            .map(|m| m.id)
            .collect()
    }
}

fn manual(names: &[&str]) -> PackageList {
    names
        .iter()
        .map(|name| (name.to_string(), PackageEntry::manual()))
        .collect()
}

fn drain(receiver: &Receiver<SyncEvent>) -> Vec<SyncEvent> {
    receiver.try_iter().collect()
}

fn wait_for_sync(receiver: &Receiver<SyncEvent>) {
    loop {
        match receiver.recv_timeout(Duration::from_secs(10)) {
            Ok(SyncEvent::LastSyncChanged(_)) => return,
            Ok(_) => continue,
            Err(e) => panic!("no sync cycle completed: {}", e),
        }
    }
}

#[test]
fn first_cycle_pulls_hosts_and_packages() {
    let fx = Fixture::new();
    fx.seed_remote_host("BBBBB", "hostb", &["foo", "qux"]);
    let (engine, events) = fx.engine();

    let report = engine.run_cycle();
    assert!(report.is_complete(), "failures: {:?}", report.failures);
    assert!(report.hosts_changed);
    assert_eq!(report.packages_changed, vec!["BBBBB".to_string()]);

    let events = drain(&events);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], SyncEvent::HostsChanged);
    assert_eq!(events[1], SyncEvent::PackagesChanged("BBBBB".into()));
    assert!(matches!(events[2], SyncEvent::LastSyncChanged(_)));

    let selection = fx.store.get_selection("BBBBB").expect("selection");
    assert_eq!(
        selection.into_iter().collect::<Vec<_>>(),
        vec!["foo".to_string(), "qux".to_string()]
    );
    let registry = read_registry(fx.store.registry()).expect("registry");
    assert_eq!(registry.gethostid_by_name("hostb").expect("lookup"), "BBBBB");
    assert_eq!(registry.last_sync_date(), report.completed_at);
}

#[test]
fn unchanged_catalog_emits_no_change_events() {
    let fx = Fixture::new();
    fx.seed_remote_host("BBBBB", "hostb", &["foo"]);
    let (engine, events) = fx.engine();
    engine.run_cycle();
    drain(&events);

    let report = engine.run_cycle();
    assert!(!report.hosts_changed);
    assert!(report.packages_changed.is_empty());
    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SyncEvent::LastSyncChanged(_)));

    let fetches = fx
        .silo
        .calls_for("BBBBB")
        .into_iter()
        .filter(|op| *op == SiloOperation::ListPackages)
        .count();
    assert_eq!(fetches, 1);
}

#[test]
fn shared_host_is_pushed_once() {
    let fx = Fixture::new();
    fx.share_current_host();
    let etag = fx.update_current(&["foo", "baz"]);
    let (engine, _events) = fx.engine();

    let report = engine.run_cycle();
    assert!(report.pushed_host);
    assert!(report.pushed_packages);
    let content = fx.silo.snapshot().expect("silo");
    assert_eq!(content.hosts_metadata["0000"].hostname, "foomachine");
    assert_eq!(
        content.hosts_metadata["0000"].packages_checksum.as_deref(),
        Some(etag.as_str())
    );
    assert_eq!(content.packages_metadata["0000"].package_list, manual(&["baz", "foo"]));

    let report = engine.run_cycle();
    assert!(!report.pushed_host);
    assert!(!report.pushed_packages);
    let pushes = fx
        .silo
        .calls_for("0000")
        .into_iter()
        .filter(|op| *op == SiloOperation::UpdatePackages)
        .count();
    assert_eq!(pushes, 1);
}

fn package_pushes(fx: &Fixture) -> usize {
    fx.silo
        .calls_for("0000")
        .into_iter()
        .filter(|op| *op == SiloOperation::UpdatePackages)
        .count()
}

#[test]
fn failed_listing_does_not_repush_unchanged_packages() {
    let fx = Fixture::new();
    fx.share_current_host();
    let etag = fx.update_current(&["foo", "baz"]);
    fx.silo.fail_on(
        SiloOperation::ListMachines,
        RemoteError::Http {
            status: 500,
            message: "boom".into(),
        },
    );
    let (engine, _events) = fx.engine();

    let report = engine.run_cycle();
    assert!(report.pushed_packages);
    assert_eq!(
        read_registry(fx.store.registry())
            .expect("registry")
            .current_host()
            .pushed_packages_checksum,
        Some(etag)
    );

    let report = engine.run_cycle();
    assert!(!report.pushed_packages);
    assert_eq!(package_pushes(&fx), 1);

    // A new inventory is still pushed without the listing.
    fx.update_current(&["foo", "baz", "qux"]);
    let report = engine.run_cycle();
    assert!(report.pushed_packages);
    assert_eq!(package_pushes(&fx), 2);
}

#[test]
fn sharing_again_after_removal_pushes_packages() {
    let fx = Fixture::new();
    fx.share_current_host();
    fx.update_current(&["foo"]);
    let (engine, _events) = fx.engine();
    engine.run_cycle();

    write_registry(fx.store.registry())
        .expect("registry")
        .set_share_inventory(false, None)
        .expect("unshare");
    let report = engine.run_cycle();
    assert_eq!(report.removed, vec!["0000".to_string()]);

    fx.share_current_host();
    fx.silo
        .fail_on(SiloOperation::ListMachines, RemoteError::Transport("reset".into()));
    let report = engine.run_cycle();
    assert!(report.pushed_packages);
    assert_eq!(package_pushes(&fx), 2);
    fx.silo.clear_failures();
    assert_eq!(fx.remote_ids(), vec!["0000".to_string()]);
}

#[test]
fn current_host_never_lists_itself_as_other() {
    let fx = Fixture::new();
    fx.share_current_host();
    fx.update_current(&["foo"]);
    let (engine, _events) = fx.engine();
    engine.run_cycle();
    engine.run_cycle();

    let registry = read_registry(fx.store.registry()).expect("registry");
    assert!(registry.other_hosts().is_empty());
    assert_eq!(registry.all_hosts().len(), 1);
}

#[test]
fn unshared_host_is_never_pushed() {
    let fx = Fixture::new();
    fx.update_current(&["foo", "baz"]);
    let (engine, _events) = fx.engine();

    let report = engine.run_cycle();
    assert!(report.is_complete());
    assert!(!report.pushed_host);
    assert!(!report.pushed_packages);
    assert!(fx.silo.calls_for("0000").is_empty());
    assert!(fx.remote_ids().is_empty());
}

#[test]
fn unshared_host_still_in_catalog_is_removed() {
    let fx = Fixture::new();
    fx.seed_remote_host("0000", "foomachine", &["foo"]);
    let (engine, _events) = fx.engine();

    let report = engine.run_cycle();
    assert_eq!(report.removed, vec!["0000".to_string()]);
    assert!(fx.remote_ids().is_empty());
    assert_eq!(
        fx.silo.calls_for("0000"),
        vec![
            SiloOperation::UpdateMachine,
            SiloOperation::UpdatePackages,
            SiloOperation::DeleteMachine
        ]
    );
    let registry = read_registry(fx.store.registry()).expect("registry");
    assert!(registry.pending_changes().is_empty());
}

#[test]
fn disabling_shared_host_queues_one_removal() {
    let fx = Fixture::new();
    fx.share_current_host();
    fx.update_current(&["foo"]);
    let (engine, _events) = fx.engine();
    engine.run_cycle();
    assert_eq!(fx.remote_ids(), vec!["0000".to_string()]);

    write_registry(fx.store.registry())
        .expect("registry")
        .set_share_inventory(false, None)
        .expect("unshare");
    {
        let registry = read_registry(fx.store.registry()).expect("registry");
        assert_eq!(registry.pending_changes().len(), 1);
        assert_eq!(
            registry.pending_change("0000", SHARE_INVENTORY_KEY),
            Some(&Value::Bool(false))
        );
    }

    let report = engine.run_cycle();
    assert_eq!(report.removed, vec!["0000".to_string()]);
    assert!(!report.pushed_host);
    assert!(fx.remote_ids().is_empty());
}

#[test]
fn failed_removal_survives_restart_and_is_retried() {
    let mut fx = Fixture::new();
    fx.seed_remote_host("BBBBB", "hostb", &["foo"]);
    {
        let (engine, _events) = fx.engine();
        engine.run_cycle();
    }
    write_registry(fx.store.registry())
        .expect("registry")
        .set_share_inventory(false, Some("BBBBB"))
        .expect("unshare");

    fx.silo
        .fail_on(SiloOperation::DeleteMachine, RemoteError::Transport("reset".into()));
    {
        let (engine, _events) = fx.engine();
        let report = engine.run_cycle();
        assert!(report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert!(report.removed.is_empty());
    }

    fx.restart();
    fx.silo.clear_failures();
    {
        let registry = read_registry(fx.store.registry()).expect("registry");
        assert_eq!(
            registry.pending_change("BBBBB", SHARE_INVENTORY_KEY),
            Some(&Value::Bool(false))
        );
    }

    let (engine, events) = fx.engine();
    let report = engine.run_cycle();
    assert_eq!(report.removed, vec!["BBBBB".to_string()]);
    assert!(fx.remote_ids().is_empty());
    let registry = read_registry(fx.store.registry()).expect("registry");
    assert!(registry.pending_changes().is_empty());
    assert!(registry.other_hosts().is_empty());
    assert!(drain(&events).contains(&SyncEvent::HostsChanged));
}

#[test]
fn one_failing_host_does_not_block_the_others() {
    let fx = Fixture::new();
    fx.seed_remote_host("BBBBB", "hostb", &["foo"]);
    fx.seed_remote_host("CCCCC", "hostc", &["bar"]);
    // Listed with a checksum, but no package list behind it.
    fx.silo.update_machine("DDDDD", "hostd", None).expect("machine");
    fx.silo
        .update_packages("DDDDD", "sum-d", &manual(&["x"]))
        .expect("packages");
    let mut content = fx.silo.snapshot().expect("silo");
    content.packages_metadata.remove("DDDDD");
    write_json_atomically(fx.silo.path(), &content).expect("rewrite silo");

    let (engine, _events) = fx.engine();
    let report = engine.run_cycle();
    assert!(report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.packages_changed,
        vec!["BBBBB".to_string(), "CCCCC".to_string()]
    );
}

#[test]
fn connectivity_loss_stops_the_cycle() {
    let fx = Fixture::new();
    fx.seed_remote_host("BBBBB", "hostb", &["foo"]);
    fx.seed_remote_host("CCCCC", "hostc", &["bar"]);
    fx.silo.fail_on(SiloOperation::ListPackages, RemoteError::Unauthorized);
    let (engine, events) = fx.engine();

    let report = engine.run_cycle();
    assert_eq!(report.aborted_at, Some(SyncStep::PullPackages));
    assert!(report.completed_at.is_none());
    assert_eq!(
        fx.silo
            .calls()
            .iter()
            .filter(|call| call.operation == SiloOperation::ListPackages)
            .count(),
        1
    );

    // Hosts pulled before the loss stay; no last-sync is recorded.
    let registry = read_registry(fx.store.registry()).expect("registry");
    assert_eq!(registry.other_hosts().len(), 2);
    assert!(registry.last_sync_date().is_none());
    assert_eq!(drain(&events), vec![SyncEvent::HostsChanged]);
}

#[test]
fn cleared_flag_cancels_before_any_call() {
    let fx = Fixture::new();
    let (engine, _events) = fx.engine();
    engine.can_sync_flag().store(false, Ordering::SeqCst);

    let report = engine.run_cycle();
    assert_eq!(report.aborted_at, Some(SyncStep::PullHosts));
    assert!(fx.silo.calls().is_empty());
}

#[test]
fn logos_follow_their_checksum() {
    let fx = Fixture::new();
    fx.seed_remote_host("BBBBB", "hostb", &["foo"]);
    fx.silo
        .update_machine_logo("BBBBB", "logo-1", b"\x89PNG-1")
        .expect("logo");
    let (engine, events) = fx.engine();

    let report = engine.run_cycle();
    assert_eq!(report.logos_changed, vec!["BBBBB".to_string()]);
    assert!(drain(&events).contains(&SyncEvent::LogoChanged("BBBBB".into())));
    let logo_path = read_registry(fx.store.registry())
        .expect("registry")
        .logo_path("BBBBB");
    assert_eq!(fs::read(&logo_path).expect("logo file"), b"\x89PNG-1".to_vec());

    let report = engine.run_cycle();
    assert!(report.logos_changed.is_empty());
}

#[test]
fn shared_host_uploads_its_logo() {
    let fx = Fixture::new();
    fx.share_current_host();
    let logo_path = read_registry(fx.store.registry())
        .expect("registry")
        .logo_path("0000");
    fs::write(&logo_path, b"\x89PNG-me").expect("logo");
    let (engine, _events) = fx.engine();

    engine.run_cycle();
    assert_eq!(
        fx.silo.get_machine_logo("0000").expect("logo"),
        Some(b"\x89PNG-me".to_vec())
    );
    let checksum = checksum_bytes(b"\x89PNG-me");
    assert_eq!(
        fx.silo.snapshot().expect("silo").hosts_metadata["0000"]
            .logo_checksum
            .as_deref(),
        Some(checksum.as_str())
    );
}

#[test]
fn hosts_gone_from_catalog_are_dropped() {
    let fx = Fixture::new();
    fx.seed_remote_host("BBBBB", "hostb", &["foo"]);
    let (engine, events) = fx.engine();
    engine.run_cycle();
    let list_path = read_registry(fx.store.registry())
        .expect("registry")
        .layout()
        .package_list_file("BBBBB");
    assert!(list_path.exists());
    drain(&events);

    fx.silo.delete_machine("BBBBB").expect("delete");
    let report = engine.run_cycle();
    assert!(report.hosts_changed);
    assert!(!list_path.exists());
    assert!(fx.store.get_package_list("BBBBB").expect("list").is_empty());
    assert_eq!(drain(&events)[0], SyncEvent::HostsChanged);
}

#[test]
fn scheduler_syncs_on_edges_only() {
    let fx = Fixture::new();
    let (engine, events) = fx.engine();
    let handle = SyncScheduler::new(engine, Duration::from_secs(3600))
        .spawn()
        .expect("spawn");

    handle.set_network(true);
    assert!(!handle.can_sync());
    handle.set_credentials(true);
    assert!(handle.can_sync());
    wait_for_sync(&events);

    // Already syncable: no new edge.
    handle.set_credentials(true);
    handle.set_network(false);
    assert!(!handle.can_sync());
    handle.set_network(true);
    assert_eq!(handle.shutdown(), 2);

    let remaining = drain(&events);
    assert_eq!(remaining.len(), 1);
    assert!(matches!(remaining[0], SyncEvent::LastSyncChanged(_)));
}

#[test]
fn scheduler_starts_with_initial_state_and_sync_now() {
    let fx = Fixture::new();
    let (engine, events) = fx.engine();
    let handle = SyncScheduler::new(engine, Duration::from_secs(3600))
        .with_state(true, true)
        .spawn()
        .expect("spawn");
    wait_for_sync(&events);

    handle.sync_now();
    wait_for_sync(&events);
    assert_eq!(handle.shutdown(), 2);
}
