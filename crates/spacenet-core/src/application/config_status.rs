//! ConfigStatusController: owns the current [`ConfigStatus`] and its single
//! subscriber.
//!
//! # Ordering (for beginners)
//!
//! Two threads may race to change the status while a third replaces the
//! subscriber.  All three go through the same mutex, and the handler is
//! invoked *while that mutex is held*.  That gives two guarantees cheaply:
//!
//! - the subscriber sees transitions in exactly the order they happened;
//! - a notification that started before a replacement finishes against the
//!   old subscriber, and the new subscriber's first callback is the replay of
//!   the status as it was at registration time.
//!
//! The price is that a handler must not call back into
//! [`register_status_handler`](ConfigStatusController::register_status_handler)
//! or trigger a transition; it would deadlock.  Reading
//! [`current_status`](ConfigStatusController::current_status) is fine, it is
//! an atomic load.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{error, info, warn};

use super::recover;
use crate::domain::status::ConfigStatus;

/// Callback receiving every status change.
pub type StatusHandler = Arc<dyn Fn(ConfigStatus) + Send + Sync>;

/// A requested status change that is not an edge of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("status transition {from} -> {to} is not allowed")]
    NotAllowed {
        from: ConfigStatus,
        to: ConfigStatus,
    },
}

/// The configuration-status state machine.
pub struct ConfigStatusController {
    /// Snapshot for lock-free readers.  Written only under `handler`.
    current: AtomicU8,
    handler: Mutex<Option<StatusHandler>>,
}

impl ConfigStatusController {
    /// Creates a controller in [`ConfigStatus::NeedsInit`].
    pub fn new() -> Self {
        Self {
            current: AtomicU8::new(ConfigStatus::NeedsInit.as_u8()),
            handler: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<StatusHandler>> {
        recover(self.handler.lock())
    }

    fn load(&self) -> ConfigStatus {
        // Only valid discriminants are ever stored.
        ConfigStatus::try_from(self.current.load(Ordering::Acquire)).unwrap_or(ConfigStatus::Error)
    }

    pub fn current_status(&self) -> ConfigStatus {
        self.load()
    }

    /// Installs `handler`, replacing any previous one, and immediately
    /// invokes it once with the current status.
    pub fn register_status_handler(&self, handler: StatusHandler) {
        let mut slot = self.lock();
        let status = self.load();
        *slot = Some(Arc::clone(&handler));
        info!("status handler registered; current status {status}");
        handler(status);
    }

    /// Clears the subscriber.  Idempotent.
    pub fn unregister_status_handler(&self) {
        if self.lock().take().is_some() {
            info!("status handler unregistered");
        }
    }

    /// Moves to `to` and notifies the subscriber.
    ///
    /// A move to the current status is a no-op.  `Error` can only be left
    /// through [`recover`](Self::recover).
    ///
    /// # Errors
    ///
    /// [`TransitionError::NotAllowed`] when `current -> to` is not an edge;
    /// the status is left unchanged.
    pub fn transition(&self, to: ConfigStatus) -> Result<(), TransitionError> {
        let slot = self.lock();
        let from = self.load();
        if from == to {
            return Ok(());
        }
        if from == ConfigStatus::Error || !from.can_transition_to(to) {
            warn!("rejected status transition {from} -> {to}");
            return Err(TransitionError::NotAllowed { from, to });
        }
        self.commit(&slot, from, to);
        Ok(())
    }

    /// Moves to `to` only when the current status is `expected`.
    ///
    /// Returns `false` without logging when the status has moved on, which
    /// is how timers and late completions find out they lost a race.
    pub fn transition_from(&self, expected: ConfigStatus, to: ConfigStatus) -> bool {
        let slot = self.lock();
        let from = self.load();
        if from != expected || !from.can_transition_to(to) || from == ConfigStatus::Error {
            return false;
        }
        self.commit(&slot, from, to);
        true
    }

    /// Enters the sticky [`ConfigStatus::Error`] state.
    pub fn fail(&self, reason: &str) {
        let slot = self.lock();
        let from = self.load();
        error!("entering error status from {from}: {reason}");
        if from != ConfigStatus::Error {
            self.commit(&slot, from, ConfigStatus::Error);
        }
    }

    /// Leaves [`ConfigStatus::Error`] for [`ConfigStatus::NeedsInit`].
    ///
    /// Returns `false` when the controller is not in `Error`.
    pub fn recover(&self) -> bool {
        let slot = self.lock();
        let from = self.load();
        if from != ConfigStatus::Error {
            return false;
        }
        self.commit(&slot, from, ConfigStatus::NeedsInit);
        true
    }

    /// Publishes `to` and notifies under the already-held lock.
    fn commit(&self, slot: &Option<StatusHandler>, from: ConfigStatus, to: ConfigStatus) {
        self.current.store(to.as_u8(), Ordering::Release);
        info!("status {from} -> {to}");
        if let Some(handler) = slot {
            handler(to);
        }
    }
}

impl Default for ConfigStatusController {
    fn default() -> Self {
        Self::new()
    }
}
