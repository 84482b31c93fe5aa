//! Foreground sync service.
//!
//! Holds the instance lock for the cache root, runs the scheduler thread and
//! reports its change notifications until interrupted.

use crate::cli::RuntimeContext;
use crate::error::{OneconfError, Result};
use crate::service::OneConf;
use crate::state::io::acquire_lock;
use crate::sync::scheduler::SyncScheduler;
use crate::sync::{SyncEngine, SyncEvent};
use crate::ui as output;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct DaemonOptions {
    pub interval: Option<u64>,
}

pub fn run(ctx: &RuntimeContext, oneconf: &OneConf, options: DaemonOptions) -> Result<()> {
    let interval = match options.interval {
        Some(0) => {
            return Err(OneconfError::ConfigError(
                "Sync interval must be a positive number of seconds".to_string(),
            ));
        }
        Some(secs) => Duration::from_secs(secs),
        None => ctx.settings.sync_interval,
    };
    let catalog = ctx.catalog()?;
    let _lock = acquire_lock(&ctx.cache_root)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .map_err(|e| OneconfError::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    refresh_inventory(oneconf);

    let (events, receiver) = mpsc::channel();
    let engine = SyncEngine::new(oneconf.store().clone(), catalog).with_events(events);
    let handle = SyncScheduler::new(engine, interval)
        .with_state(ctx.network_available(), ctx.credentials_available())
        .spawn()?;

    output::info(&format!(
        "Syncing every {}s (cache: {}). Press Ctrl-C to stop.",
        interval.as_secs(),
        ctx.cache_root.display()
    ));
    if !handle.can_sync() {
        output::warning("Network or credentials unavailable; waiting");
    }

    let mut last_refresh = Instant::now();
    while !interrupted.load(Ordering::SeqCst) {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(event) => report_event(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if last_refresh.elapsed() >= interval {
            refresh_inventory(oneconf);
            last_refresh = Instant::now();
        }
    }

    let cycles = handle.shutdown();
    output::info(&format!("Stopped after {} sync cycle(s)", cycles));
    Ok(())
}

fn refresh_inventory(oneconf: &OneConf) {
    if let Err(e) = oneconf.update() {
        output::warning(&format!("Could not refresh the inventory: {}", e));
    }
}

fn report_event(event: &SyncEvent) {
    match event {
        SyncEvent::HostsChanged => output::info("Host list changed"),
        SyncEvent::PackagesChanged(hostid) => {
            output::info(&format!("Packages of {} changed", hostid))
        }
        SyncEvent::LogoChanged(hostid) => output::info(&format!("Logo of {} changed", hostid)),
        SyncEvent::LastSyncChanged(_) => output::success("Sync complete"),
    }
}
