//! Background fsync for batched durability
//!
//! `Batched` mode checks its interval whenever a commit is appended. On an
//! idle database nothing is appended, so the flusher thread wakes once per
//! interval and fsyncs the WAL if commits are still waiting. Unsynced commits
//! therefore reach disk within about two intervals even with no further
//! traffic.

use crate::mode::DurabilityMode;
use crate::wal::Wal;
use parking_lot::{Condvar, Mutex, MutexGuard};
use pharmastock_core::Result;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to the background fsync thread; stops and joins it on drop
pub struct BackgroundSync {
    shutdown: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundSync {
    /// Start the flusher for `wal`.
    ///
    /// Returns `None` unless the WAL runs in `Batched` mode; `Strict` syncs
    /// every commit itself.
    pub fn start(wal: Arc<Mutex<Wal>>) -> Result<Option<Self>> {
        let interval = match wal.lock().mode() {
            DurabilityMode::Batched { interval_ms, .. } => {
                Duration::from_millis(interval_ms.max(1))
            }
            DurabilityMode::Strict | DurabilityMode::None => return Ok(None),
        };

        let shutdown = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("pharmastock-wal-sync".into())
            .spawn(move || run(&wal, &signal, interval))?;

        tracing::debug!(interval_ms = interval.as_millis() as u64, "background WAL sync started");
        Ok(Some(BackgroundSync {
            shutdown,
            handle: Some(handle),
        }))
    }

    /// Stop the thread and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        let (stopped, wake) = &*self.shutdown;
        *stopped.lock() = true;
        wake.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("background WAL sync thread panicked");
            }
        }
    }
}

impl Drop for BackgroundSync {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for BackgroundSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSync")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn run(wal: &Mutex<Wal>, signal: &(Mutex<bool>, Condvar), interval: Duration) {
    let (stopped, wake) = signal;
    let mut guard = stopped.lock();
    while !*guard {
        wake.wait_for(&mut guard, interval);
        if *guard {
            break;
        }
        // The shutdown flag stays free while waiting on the WAL
        MutexGuard::unlocked(&mut guard, || {
            if let Err(e) = wal.lock().sync_if_due() {
                tracing::warn!(error = %e, "background WAL sync failed");
            }
        });
    }
}
