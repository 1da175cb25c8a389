//! Background thread that keeps a pinging pool's sessions alive
//!
//! Every `interval` the thread calls [`Pingable::ping_all_due`]. Failures are
//! logged and the loop carries on; the next tick retries.

use crate::pool::Pingable;
use parking_lot::{Condvar, Mutex};
use spool_core::{Error, ErrorCode, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

struct PingerInner {
    stopped: Mutex<bool>,
    wake: Condvar,
    rounds: AtomicU64,
}

/// Handle to a running ping thread
///
/// Dropping the handle stops the thread.
pub struct Pinger {
    inner: Arc<PingerInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Pinger {
    /// Start pinging `pool` every `interval` on a thread named `spool-pinger`
    pub fn spawn(pool: Arc<dyn Pingable>, interval: Duration) -> Result<Self> {
        let inner = Arc::new(PingerInner {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
            rounds: AtomicU64::new(0),
        });

        let inner_clone = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("spool-pinger".to_string())
            .spawn(move || ping_loop(&inner_clone, pool.as_ref(), interval))
            .map_err(|e| {
                Error::backend(
                    ErrorCode::Internal,
                    format!("failed to spawn pinger thread: {}", e),
                )
            })?;

        info!(target: "spool::pinger", interval = ?interval, "Pinger started");
        Ok(Self {
            inner,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Completed ping rounds
    pub fn rounds(&self) -> u64 {
        self.inner.rounds.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it to exit
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        {
            let mut stopped = self.inner.stopped.lock();
            *stopped = true;
            self.inner.wake.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
            info!(target: "spool::pinger", "Pinger stopped");
        }
    }
}

impl Drop for Pinger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn ping_loop(inner: &PingerInner, pool: &dyn Pingable, interval: Duration) {
    loop {
        {
            let mut stopped = inner.stopped.lock();
            if !*stopped {
                inner.wake.wait_for(&mut stopped, interval);
            }
            if *stopped {
                return;
            }
        }

        match pool.ping_all_due() {
            Ok(refreshed) => {
                debug!(target: "spool::pinger", refreshed, "Ping round complete");
            }
            Err(e) => {
                error!(target: "spool::pinger", error = %e, "Ping round failed");
            }
        }
        inner.rounds.fetch_add(1, Ordering::Relaxed);
    }
}
