//! # spacenet-bridge
//!
//! C boundary of the SpaceNet client core.  Native front-ends link the
//! `cdylib`/`staticlib` output and call the `sn*` functions declared in
//! `include/spacenet.h`.
//!
//! # How the pieces fit (for beginners)
//!
//! ```text
//! front-end ──sn*()──► ffi ──► Bridge ──► spacenet-core
//!     ▲                          │
//!     └── extern "C" callbacks ◄─┘ (via ContextRegistry)
//! ```
//!
//! - The host calls [`install`] once with its [`Authenticator`](spacenet_core::Authenticator)
//!   before any `sn*` call.  Until then every `sn*` call logs a warning and
//!   returns a neutral value.
//! - [`Bridge`] owns the runtime and the core components.  [`ffi`] only
//!   translates C arguments.
//! - `void *ctx` pointers never travel into the core; completions carry a
//!   [`Key`](spacenet_core::Key) into the [`ContextRegistry`], so
//!   `snReleaseContext(ctx)` makes late completions a no-op.

pub mod adapter;
pub mod bridge;
pub mod context;
pub mod ffi;
pub mod logging;
pub mod strings;

use thiserror::Error;

pub use bridge::{Bridge, BridgeConfig};
pub use context::ContextRegistry;
pub use ffi::install;

/// Errors raised at the boundary itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("the core has not been installed")]
    NotInstalled,

    #[error("the core is already installed")]
    AlreadyInstalled,

    #[error("string argument is null or not valid UTF-8")]
    InvalidString,
}
