//! Background loop deciding when a sync cycle runs.
//!
//! A cycle starts when network and credentials become available together
//! (edge-triggered), then periodically while both hold. Losing either one
//! clears the engine's `can_sync` flag, which a running cycle observes
//! between remote calls.

use super::SyncEngine;
use crate::error::{OneconfError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Message {
    Network(bool),
    Credentials(bool),
    SyncNow,
    Shutdown,
}

pub struct SyncScheduler {
    engine: SyncEngine,
    interval: Duration,
    network: bool,
    credentials: bool,
}

impl SyncScheduler {
    pub fn new(engine: SyncEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            network: false,
            credentials: false,
        }
    }

    /// Initial connectivity state, before the loop starts.
    pub fn with_state(mut self, network: bool, credentials: bool) -> Self {
        self.network = network;
        self.credentials = credentials;
        self
    }

    pub fn spawn(self) -> Result<SchedulerHandle> {
        let (sender, receiver) = mpsc::channel();
        let network = Arc::new(AtomicBool::new(self.network));
        let credentials = Arc::new(AtomicBool::new(self.credentials));
        let can_sync = self.engine.can_sync_flag();
        can_sync.store(self.network && self.credentials, Ordering::SeqCst);
        let cycles = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            engine: self.engine,
            interval: self.interval,
            network: self.network,
            credentials: self.credentials,
            cycles: Arc::clone(&cycles),
        };
        let thread = thread::Builder::new()
            .name("oneconf-sync".to_string())
            .spawn(move || worker.run(receiver))
            .map_err(|e| OneconfError::Other(format!("Failed to start sync thread: {}", e)))?;

        Ok(SchedulerHandle {
            sender,
            network,
            credentials,
            can_sync,
            cycles,
            thread: Some(thread),
        })
    }
}

struct Worker {
    engine: SyncEngine,
    interval: Duration,
    network: bool,
    credentials: bool,
    cycles: Arc<AtomicUsize>,
}

impl Worker {
    fn syncable(&self) -> bool {
        self.network && self.credentials
    }

    fn run(mut self, receiver: Receiver<Message>) {
        if self.syncable() {
            self.cycle();
        }

        loop {
            let was_syncable = self.syncable();
            match receiver.recv_timeout(self.interval) {
                Ok(Message::Network(connected)) => self.network = connected,
                Ok(Message::Credentials(present)) => self.credentials = present,
                Ok(Message::SyncNow) | Err(RecvTimeoutError::Timeout) => {
                    if was_syncable {
                        self.cycle();
                    }
                    continue;
                }
                Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            }
            if self.syncable() && !was_syncable {
                self.cycle();
            }
        }
        tracing::debug!("Sync scheduler stopped");
    }

    fn cycle(&self) {
        let report = self.engine.run_cycle();
        self.cycles.fetch_add(1, Ordering::SeqCst);
        if !report.failures.is_empty() {
            tracing::warn!("Sync finished with {} failed step(s)", report.failures.len());
        }
    }
}

/// Control side of a running scheduler.
pub struct SchedulerHandle {
    sender: Sender<Message>,
    network: Arc<AtomicBool>,
    credentials: Arc<AtomicBool>,
    can_sync: Arc<AtomicBool>,
    cycles: Arc<AtomicUsize>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    fn refresh_can_sync(&self) {
        let can_sync =
            self.network.load(Ordering::SeqCst) && self.credentials.load(Ordering::SeqCst);
        self.can_sync.store(can_sync, Ordering::SeqCst);
    }

    fn send(&self, message: Message) {
        if self.sender.send(message).is_err() {
            tracing::debug!("Sync scheduler is gone, dropping {:?}", message);
        }
    }

    pub fn set_network(&self, connected: bool) {
        self.network.store(connected, Ordering::SeqCst);
        self.refresh_can_sync();
        self.send(Message::Network(connected));
    }

    pub fn set_credentials(&self, present: bool) {
        self.credentials.store(present, Ordering::SeqCst);
        self.refresh_can_sync();
        self.send(Message::Credentials(present));
    }

    /// Ask for a cycle now, if network and credentials allow it.
    pub fn sync_now(&self) {
        self.send(Message::SyncNow);
    }

    pub fn can_sync(&self) -> bool {
        self.can_sync.load(Ordering::SeqCst)
    }

    /// Cycles run so far (complete or not).
    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Stop the loop, wait for the running cycle, if any, and return how
    /// many cycles ran.
    pub fn shutdown(mut self) -> usize {
        self.stop();
        self.cycles()
    }

    fn stop(&mut self) {
        self.send(Message::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("Sync thread panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
