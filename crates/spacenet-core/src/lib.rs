//! # spacenet-core
//!
//! Headless core of the SpaceNet client: the configuration-status lifecycle,
//! the login/session flow, settings coordination, and the broker that
//! correlates dialog/input requests with results delivered by a front-end.
//!
//! The crate has no knowledge of any UI toolkit or of the C boundary; the
//! `spacenet-bridge` crate adapts it to foreign callers.
//!
//! # Layers
//!
//! - **`domain`** – plain data: [`ConfigStatus`], dialog enums,
//!   [`DialogRequest`], [`Session`], [`Settings`].
//! - **`registry`** – generational [`HandleTable`] and the monotonic
//!   [`RequestIdAllocator`].
//! - **`application`** – the controllers.  They depend only on traits
//!   ([`Authenticator`], [`SettingsRepository`], [`KeyStore`],
//!   [`DialogPresenter`]).
//! - **`infrastructure`** – reference file-system providers for those traits.
//!
//! ```text
//! SessionManager ──► SettingsStore ──► SettingsRepository / KeyStore
//!       │                 │
//!       ├──► ConfigStatusController ──► status subscriber
//!       │                 │
//!       └──────► DialogBroker ◄──── adapter (show / dismiss / deliver_input)
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod registry;

pub use application::config_status::{ConfigStatusController, StatusHandler, TransitionError};
pub use application::dialog_broker::{
    DialogBroker, DialogDismisser, DialogError, DialogPresenter, InputPrompter, InputReceiver,
};
pub use application::idle_lock::IdleLock;
pub use application::session_manager::{AuthError, AuthenticatedUser, Authenticator, SessionManager};
pub use application::settings_store::{
    KeyError, KeyStore, SettingsError, SettingsRepository, SettingsStore, StoreError, Unlock,
};
pub use domain::dialog::{
    AccessoryType, AdapterContext, AdapterHandle, DialogContent, DialogHandle, DialogRequest, DialogType,
    InputOutcome, InputScope, RequestId,
};
pub use domain::session::{DeviceOwner, Session};
pub use domain::settings::{ClientSettings, Settings, SettingsDocument};
pub use domain::status::{ConfigStatus, DecodeError};
pub use infrastructure::storage::{FsKeyStore, TomlSettingsRepository};
pub use registry::handle_table::{HandleTable, Key};
pub use registry::sequence::RequestIdAllocator;
