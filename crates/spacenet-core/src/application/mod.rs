//! Application layer: the controllers that implement the client's behaviour.
//!
//! Code in this layer orchestrates domain types and talks to the outside
//! world only through traits, so every controller can be driven in tests with
//! scripted collaborators.
//!
//! # Sub-modules
//!
//! - **`dialog_broker`** – owns the registered UI adapter and correlates
//!   input requests with the answers the adapter delivers later, from any
//!   thread.  Leaf dependency of everything else.
//! - **`config_status`** – the status state machine and its single
//!   subscriber.
//! - **`settings_store`** – loads/saves the settings document, binds the
//!   device owner, loads key files.
//! - **`session_manager`** – initialize, login, logout, EULA flag.
//! - **`idle_lock`** – locks a logged-in device after a period of inactivity.

pub mod config_status;
pub mod dialog_broker;
pub mod idle_lock;
pub mod session_manager;
pub mod settings_store;

use std::sync::{LockResult, PoisonError};

/// Recovers the guard from a poisoned lock.
///
/// A panic inside a foreign callback must not wedge the core for the rest of
/// the process; the protected state is kept consistent by each critical
/// section, not by the absence of panics.
pub(crate) fn recover<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}
