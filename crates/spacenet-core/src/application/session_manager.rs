//! SessionManager: initialize, login, logout and the EULA flag.
//!
//! # Login flow
//!
//! ```text
//! login(on_done)
//!   └─ spawn ─► Authenticator::login(prompter)      prompts via DialogBroker
//!                  ├─ Ok(user)   ─► Session stored, NeedsLogin/LoggedOut -> LoggedIn,
//!                  │                idle lock armed, on_done(true)
//!                  └─ Err(_)     ─► status unchanged, on_done(false)
//! ```
//!
//! Credential checks belong to the host: the manager only knows the
//! [`Authenticator`] trait.  Prompts it raises are session-scoped, so a
//! logout (or adapter teardown) cancels them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use super::config_status::ConfigStatusController;
use super::dialog_broker::{DialogBroker, DialogError, InputPrompter};
use super::idle_lock::IdleLock;
use super::recover;
use super::settings_store::{SettingsError, SettingsStore, StoreError, Unlock};
use crate::domain::dialog::InputScope;
use crate::domain::session::Session;
use crate::domain::status::ConfigStatus;

/// Error type for authentication and session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The user dismissed the credential prompt.  Not a fault.
    #[error("login cancelled by the user")]
    Cancelled,

    #[error("a login is already in progress")]
    InProgress,

    #[error("no user is logged in")]
    NoSession,

    /// Login was attempted in a status that does not accept it.
    #[error("login is not possible while {0}")]
    NotReady(ConfigStatus),

    #[error("authentication provider error: {0}")]
    Provider(String),

    #[error("could not prompt for credentials: {0}")]
    Prompt(#[from] DialogError),
}

/// A user the [`Authenticator`] vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    /// No key material exists for this user on this device yet.
    pub needs_key: bool,
}

/// Host-supplied credential verification.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Interactively authenticates a user, prompting through `prompter`.
    async fn login(&self, prompter: &InputPrompter) -> Result<AuthenticatedUser, AuthError>;

    /// Returns the user of a still-valid prior session, if any.
    async fn restore(&self) -> Result<Option<AuthenticatedUser>, AuthError>;

    /// Invalidates the current session with the provider.
    async fn logout(&self) -> Result<(), AuthError>;
}

/// Clears the in-flight flag when a login attempt ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the current [`Session`] and drives the login lifecycle.
pub struct SessionManager {
    status: Arc<ConfigStatusController>,
    broker: Arc<DialogBroker>,
    settings: Arc<SettingsStore>,
    authenticator: Arc<dyn Authenticator>,
    idle: Arc<IdleLock>,
    runtime: Handle,
    session: RwLock<Option<Session>>,
    login_in_flight: AtomicBool,
}

impl SessionManager {
    pub fn new(
        status: Arc<ConfigStatusController>,
        broker: Arc<DialogBroker>,
        settings: Arc<SettingsStore>,
        authenticator: Arc<dyn Authenticator>,
        idle: Arc<IdleLock>,
        runtime: Handle,
    ) -> Self {
        Self {
            status,
            broker,
            settings,
            authenticator,
            idle,
            runtime,
            session: RwLock::new(None),
            login_in_flight: AtomicBool::new(false),
        }
    }

    /// Opens the settings store and restores a prior session if possible.
    ///
    /// - store opened, prior session valid → LoggedIn, `true`
    /// - store opened, no prior session → NeedsLogin, `true`
    /// - protected store, no passphrase → Locked, `false`
    /// - wrong passphrase or unreadable store → Error, `false`
    pub async fn initialize(&self, passphrase: Option<String>) -> bool {
        let from = self.status.current_status();
        if !matches!(from, ConfigStatus::NeedsInit | ConfigStatus::Locked) {
            debug!("initialize ignored in status {from}");
            return from != ConfigStatus::Error;
        }

        match self.settings.open(passphrase).await {
            Ok(Unlock::Opened) => {}
            Ok(Unlock::NeedsPassphrase) => {
                if let Err(e) = self.status.transition(ConfigStatus::Locked) {
                    warn!("cannot lock during initialize: {e}");
                }
                return false;
            }
            Err(SettingsError::Store(StoreError::BadPassphrase)) => {
                self.status.fail("settings passphrase rejected");
                return false;
            }
            Err(e) => {
                self.status.fail(&format!("settings store unavailable: {e}"));
                return false;
            }
        }

        let restored = match self.authenticator.restore().await {
            Ok(user) => user,
            Err(e) => {
                warn!("could not restore prior session: {e}");
                None
            }
        };

        match restored {
            Some(user) => {
                info!("restored session for {}", user.username);
                self.begin_session(user);
                self.enter_logged_in()
            }
            None => self.status.transition(ConfigStatus::NeedsLogin).is_ok(),
        }
    }

    /// Starts a login and returns immediately; `on_done(ok)` runs exactly
    /// once when it finishes.
    pub fn login<F>(self: &Arc<Self>, on_done: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            let ok = this.login_async().await.is_ok();
            on_done(ok);
        });
    }

    /// Authenticates a user and moves to LoggedIn.
    ///
    /// # Errors
    ///
    /// A failed or cancelled login leaves the status unchanged.
    pub async fn login_async(&self) -> Result<Session, AuthError> {
        if self.login_in_flight.swap(true, Ordering::AcqRel) {
            warn!("login rejected: another login is in progress");
            return Err(AuthError::InProgress);
        }
        let _in_flight = InFlight(&self.login_in_flight);

        let from = self.status.current_status();
        if !matches!(from, ConfigStatus::NeedsLogin | ConfigStatus::LoggedOut) {
            warn!("login rejected in status {from}");
            return Err(AuthError::NotReady(from));
        }

        let prompter = InputPrompter::new(Arc::clone(&self.broker), InputScope::Session);
        let user = match self.authenticator.login(&prompter).await {
            Ok(user) => user,
            Err(AuthError::Cancelled) => {
                info!("login cancelled by the user");
                return Err(AuthError::Cancelled);
            }
            Err(e) => {
                warn!("login failed: {e}");
                return Err(e);
            }
        };

        let session = self.begin_session(user);
        if !self.enter_logged_in() {
            self.clear_session();
            return Err(AuthError::NotReady(self.status.current_status()));
        }
        info!("{} logged in (owner: {})", session.username, session.is_owner);
        Ok(session)
    }

    fn begin_session(&self, user: AuthenticatedUser) -> Session {
        let settings = self.settings.settings().unwrap_or_default();
        let session = Session {
            is_owner: settings.is_owner(&user.username),
            username: user.username,
            device_name: settings.device_name,
            needs_key: user.needs_key,
            eula_accepted: self.settings.eula_accepted(),
        };
        *recover(self.session.write()) = Some(session.clone());
        session
    }

    fn clear_session(&self) -> Option<Session> {
        recover(self.session.write()).take()
    }

    fn enter_logged_in(&self) -> bool {
        match self.status.transition(ConfigStatus::LoggedIn) {
            Ok(()) => {
                self.idle.touch();
                true
            }
            Err(e) => {
                error!("cannot enter logged-in status: {e}");
                false
            }
        }
    }

    /// Ends the session: signs out with the provider, cancels the session's
    /// prompts and moves to LoggedOut.
    ///
    /// Returns `false` without changing anything when no session exists,
    /// and `false` with the session and its prompts kept when the provider
    /// refuses.
    pub async fn logout(&self) -> bool {
        let Some(username) = self.logged_in_user() else {
            debug!("logout ignored; no session");
            return false;
        };

        if let Err(e) = self.authenticator.logout().await {
            warn!("logout of {username} refused by provider: {e}");
            return false;
        }

        let cancelled = self.broker.cancel_scope(InputScope::Session);
        debug!("logout cancelled {cancelled} session prompt(s)");

        self.idle.disarm();
        self.clear_session();
        if let Err(e) = self.status.transition(ConfigStatus::LoggedOut) {
            warn!("logout did not change status: {e}");
        }
        info!("{username} logged out");
        true
    }

    /// Username of the current session.
    pub fn logged_in_user(&self) -> Option<String> {
        recover(self.session.read())
            .as_ref()
            .map(|s| s.username.clone())
    }

    pub fn session(&self) -> Option<Session> {
        recover(self.session.read()).clone()
    }

    /// Whether the logged-in user is the device owner; `false` without a
    /// session.
    pub fn is_logged_in_user_owner(&self) -> bool {
        recover(self.session.read())
            .as_ref()
            .is_some_and(|s| s.is_owner)
    }

    pub fn eula_accepted(&self) -> bool {
        self.settings.eula_accepted()
    }

    /// Persists EULA acceptance; `false` when the write failed.
    pub async fn set_eula_accepted(&self) -> bool {
        match self.settings.set_eula_accepted().await {
            Ok(()) => {
                if let Some(session) = recover(self.session.write()).as_mut() {
                    session.eula_accepted = true;
                }
                true
            }
            Err(e) => {
                warn!("persisting EULA acceptance failed: {e}");
                false
            }
        }
    }

    /// Unlocks an idle-locked device with the settings passphrase.
    pub fn unlock(&self, passphrase: &str) -> bool {
        self.idle.unlock(passphrase, &self.settings.lock_passphrase())
    }

    /// Records user activity for the idle lock.
    pub fn touch(&self) {
        self.idle.touch();
    }

    pub fn status(&self) -> &Arc<ConfigStatusController> {
        &self.status
    }
}
