//! IdleLock: locks a logged-in device after a period without user activity.
//!
//! Each (re-)arm bumps an epoch counter and spawns a sleeper that remembers
//! the epoch it was started with.  When a sleeper wakes up and the epoch has
//! moved on, it was superseded and exits without doing anything; there is no
//! need to track or abort the spawned tasks.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config_status::ConfigStatusController;
use crate::domain::status::ConfigStatus;

/// Inactivity timer driving the LoggedIn → Locked edge.
pub struct IdleLock {
    status: Arc<ConfigStatusController>,
    runtime: Handle,
    epoch: Arc<AtomicU64>,
    timeout_secs: AtomicU32,
}

impl IdleLock {
    pub fn new(status: Arc<ConfigStatusController>, runtime: Handle) -> Self {
        Self {
            status,
            runtime,
            epoch: Arc::new(AtomicU64::new(0)),
            timeout_secs: AtomicU32::new(0),
        }
    }

    /// Starts (or restarts) the countdown with `timeout_secs`.
    ///
    /// `0` disables idle locking until the next `arm` with a non-zero value.
    pub fn arm(&self, timeout_secs: u32) {
        self.timeout_secs.store(timeout_secs, Ordering::Relaxed);
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        if timeout_secs == 0 {
            debug!("idle lock disabled");
            return;
        }

        // The deadline is taken now, not when the task is first polled.
        let deadline = Instant::now() + Duration::from_secs(u64::from(timeout_secs));
        let status = Arc::clone(&self.status);
        let current = Arc::clone(&self.epoch);
        self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if current.load(Ordering::Acquire) != epoch {
                return;
            }
            if status.transition_from(ConfigStatus::LoggedIn, ConfigStatus::Locked) {
                info!("device locked after {timeout_secs}s of inactivity");
            }
        });
    }

    /// Records user activity: restarts the countdown if the device is
    /// logged in.
    pub fn touch(&self) {
        if self.status.current_status() == ConfigStatus::LoggedIn {
            self.arm(self.timeout_secs.load(Ordering::Relaxed));
        }
    }

    /// Changes the timeout and restarts the countdown if logged in.
    pub fn set_timeout(&self, timeout_secs: u32) {
        self.timeout_secs.store(timeout_secs, Ordering::Relaxed);
        self.touch();
    }

    /// Stops the countdown; a pending sleeper becomes a no-op.
    pub fn disarm(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Unlocks a locked device when `supplied` matches `expected`.
    ///
    /// Moves Locked → LoggedIn and re-arms.  A wrong passphrase, or a device
    /// that is not locked, returns `false` and changes nothing.
    pub fn unlock(&self, supplied: &str, expected: &str) -> bool {
        if supplied != expected {
            warn!("unlock rejected: wrong passphrase");
            return false;
        }
        if !self
            .status
            .transition_from(ConfigStatus::Locked, ConfigStatus::LoggedIn)
        {
            debug!("unlock ignored; device is not locked");
            return false;
        }
        self.arm(self.timeout_secs.load(Ordering::Relaxed));
        true
    }

    pub fn timeout_secs(&self) -> u32 {
        self.timeout_secs.load(Ordering::Relaxed)
    }
}
