//! SettingsStore: the device settings, the device-owner binding and the
//! user's key file.
//!
//! Persistence and key material live behind two traits so the store can be
//! driven by the file-system providers in `infrastructure::storage` or by
//! in-memory fakes in tests:
//!
//! - [`SettingsRepository`] – opens, reads and atomically writes the
//!   [`SettingsDocument`].
//! - [`KeyStore`] – loads or creates a user's key file.
//!
//! Both traits are synchronous; the store calls them through
//! `tokio::task::spawn_blocking` so no runtime worker ever blocks on disk.
//!
//! # Completions
//!
//! Every operation has an `async fn` form and a `spawn_*` form that runs on
//! the runtime handle and invokes a completion exactly once.  The boundary
//! uses the latter.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::dialog_broker::{DialogBroker, InputPrompter};
use super::idle_lock::IdleLock;
use super::recover;
use super::session_manager::{AuthError, Authenticator};
use crate::domain::dialog::InputScope;
use crate::domain::session::DeviceOwner;
use crate::domain::settings::{Settings, SettingsDocument};

/// Device name proposed when neither the settings nor the environment
/// provide one.
pub const FALLBACK_DEVICE_NAME: &str = "spacenet-device";

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error type for settings persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("the settings passphrase is incorrect")]
    BadPassphrase,

    #[error("I/O error accessing settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Error type for key-file operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key file {0} does not exist")]
    NotFound(PathBuf),

    #[error("I/O error accessing key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key file {0} is empty")]
    Empty(PathBuf),

    #[error("key file path is empty or not valid")]
    InvalidPath,
}

/// Any failure of a settings operation.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("owner authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The blocking worker running the operation panicked or was cancelled.
    #[error("settings worker stopped: {0}")]
    Interrupted(String),
}

impl SettingsError {
    /// Whether the failure is the user backing out rather than a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SettingsError::Auth(AuthError::Cancelled))
    }
}

// ── Collaborator traits ───────────────────────────────────────────────────────

/// Outcome of opening the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unlock {
    Opened,
    /// The store is protected and no passphrase was supplied.
    NeedsPassphrase,
}

/// Persistent home of the [`SettingsDocument`].
pub trait SettingsRepository: Send + Sync {
    /// Checks `passphrase` against the stored one.
    ///
    /// An unprotected or not-yet-created store opens with any passphrase.
    fn unlock(&self, passphrase: Option<&str>) -> Result<Unlock, StoreError>;

    /// Reads the document; a missing file yields the defaults.
    fn load(&self) -> Result<SettingsDocument, StoreError>;

    /// Replaces the stored document.  Must never leave a partially written
    /// file behind: on failure the previous document stays intact.
    fn save(&self, document: &SettingsDocument) -> Result<(), StoreError>;
}

/// Loads or creates per-user key files.  Both methods return the resolved
/// path of the key file.
#[cfg_attr(test, mockall::automock)]
pub trait KeyStore: Send + Sync {
    fn load(&self, path: &Path) -> Result<PathBuf, KeyError>;
    fn create(&self, path: &Path) -> Result<PathBuf, KeyError>;
}

// ── SettingsStore ─────────────────────────────────────────────────────────────

/// Coordinates the settings document, the owner binding and key files.
pub struct SettingsStore {
    repo: Arc<dyn SettingsRepository>,
    keys: Arc<dyn KeyStore>,
    broker: Arc<DialogBroker>,
    authenticator: Arc<dyn Authenticator>,
    idle: Arc<IdleLock>,
    runtime: Handle,
    cache: RwLock<Option<SettingsDocument>>,
    /// Serializes read-modify-write cycles against the repository.
    save_gate: tokio::sync::Mutex<()>,
}

impl SettingsStore {
    pub fn new(
        repo: Arc<dyn SettingsRepository>,
        keys: Arc<dyn KeyStore>,
        broker: Arc<DialogBroker>,
        authenticator: Arc<dyn Authenticator>,
        idle: Arc<IdleLock>,
        runtime: Handle,
    ) -> Self {
        Self {
            repo,
            keys,
            broker,
            authenticator,
            idle,
            runtime,
            cache: RwLock::new(None),
            save_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Snapshot of the cached document, if loaded.
    pub fn document(&self) -> Option<SettingsDocument> {
        recover(self.cache.read()).clone()
    }

    /// Snapshot of the cached device settings, if loaded.
    pub fn settings(&self) -> Option<Settings> {
        recover(self.cache.read())
            .as_ref()
            .map(|doc| doc.device.clone())
    }

    pub fn eula_accepted(&self) -> bool {
        recover(self.cache.read())
            .as_ref()
            .is_some_and(|doc| doc.client.eula_accepted)
    }

    /// The stored lock passphrase; empty when none is set or not loaded.
    pub fn lock_passphrase(&self) -> String {
        recover(self.cache.read())
            .as_ref()
            .map(|doc| doc.device.lock_passphrase.clone())
            .unwrap_or_default()
    }

    fn replace_cache(&self, document: SettingsDocument) {
        *recover(self.cache.write()) = Some(document);
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T, SettingsError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, SettingsError> + Send + 'static,
    {
        self.runtime
            .spawn_blocking(work)
            .await
            .map_err(|e| SettingsError::Interrupted(e.to_string()))?
    }

    /// Opens the store with `passphrase` and caches the document.
    ///
    /// Returns [`Unlock::NeedsPassphrase`] without loading anything when
    /// the store is protected and no passphrase was given.
    pub async fn open(&self, passphrase: Option<String>) -> Result<Unlock, SettingsError> {
        let repo = Arc::clone(&self.repo);
        let opened = self
            .blocking(move || {
                match repo.unlock(passphrase.as_deref())? {
                    Unlock::Opened => Ok(Some(repo.load()?)),
                    Unlock::NeedsPassphrase => Ok(None),
                }
            })
            .await?;

        let Some(document) = opened else {
            info!("settings store is protected; passphrase required");
            return Ok(Unlock::NeedsPassphrase);
        };
        debug!(
            "settings opened (initialized: {}, owner bound: {})",
            document.device.initialized,
            document.device.has_owner()
        );
        self.idle.set_timeout(document.device.unlocked_timeout_seconds);
        self.replace_cache(document);
        Ok(Unlock::Opened)
    }

    /// Loads the settings (from cache when already opened).
    pub async fn init(&self) -> Result<Settings, SettingsError> {
        if let Some(settings) = self.settings() {
            return Ok(settings);
        }
        let repo = Arc::clone(&self.repo);
        let document = self.blocking(move || Ok(repo.load()?)).await?;
        let settings = document.device.clone();
        self.replace_cache(document);
        Ok(settings)
    }

    /// Applies `edit` to the current document and persists the result.
    ///
    /// The cache is only updated once the repository reports success, so a
    /// failed write leaves both the file and the in-memory copy untouched.
    async fn update<F>(&self, edit: F) -> Result<SettingsDocument, SettingsError>
    where
        F: FnOnce(&mut SettingsDocument),
    {
        let _gate = self.save_gate.lock().await;
        let mut document = match self.document() {
            Some(document) => document,
            None => {
                let repo = Arc::clone(&self.repo);
                self.blocking(move || Ok(repo.load()?)).await?
            }
        };
        edit(&mut document);

        let repo = Arc::clone(&self.repo);
        let to_write = document.clone();
        self.blocking(move || Ok(repo.save(&to_write)?)).await?;
        self.replace_cache(document.clone());
        Ok(document)
    }

    /// Persists new device settings and marks the device initialized.
    pub async fn save(
        &self,
        device_name: String,
        lock_passphrase: String,
        unlocked_timeout_seconds: u32,
    ) -> Result<(), SettingsError> {
        let result = self
            .update(|doc| {
                doc.device.device_name = device_name;
                doc.device.lock_passphrase = lock_passphrase;
                doc.device.unlocked_timeout_seconds = unlocked_timeout_seconds;
                doc.device.initialized = true;
            })
            .await;

        match result {
            Ok(_) => {
                info!("settings saved");
                self.idle.set_timeout(unlocked_timeout_seconds);
                Ok(())
            }
            Err(e) => {
                warn!("saving settings failed: {e}");
                Err(e)
            }
        }
    }

    /// Persists the EULA acceptance flag.
    pub async fn set_eula_accepted(&self) -> Result<(), SettingsError> {
        self.update(|doc| doc.client.eula_accepted = true)
            .await
            .map(|_| info!("EULA accepted"))
    }

    /// Clears the owner binding, authenticates a new owner and binds them.
    ///
    /// The prompt is global-scoped: it may run before any session exists and
    /// must survive a logout.
    pub async fn reset_device_owner(&self) -> Result<DeviceOwner, SettingsError> {
        self.update(|doc| doc.device.device_user.clear()).await?;
        info!("device owner cleared; authenticating new owner");

        let prompter = InputPrompter::new(Arc::clone(&self.broker), InputScope::Global);
        let user = match self.authenticator.login(&prompter).await {
            Ok(user) => user,
            Err(AuthError::Cancelled) => {
                info!("owner reset cancelled by the user");
                return Err(AuthError::Cancelled.into());
            }
            Err(e) => {
                warn!("owner reset failed: {e}");
                return Err(e.into());
            }
        };

        let username = user.username.clone();
        let document = self
            .update(move |doc| {
                doc.device.device_user = username;
                if doc.device.device_name.is_empty() {
                    doc.device.device_name = host_name();
                }
            })
            .await?;

        info!("device bound to new owner {}", user.username);
        Ok(DeviceOwner {
            username: user.username,
            device_name: document.device.device_name,
            needs_key: user.needs_key,
        })
    }

    /// Loads `key_file`, creating it when absent and `create` is set.
    pub async fn load_user_key(&self, key_file: PathBuf, create: bool) -> Result<PathBuf, SettingsError> {
        let keys = Arc::clone(&self.keys);
        let result = self
            .blocking(move || match keys.load(&key_file) {
                Err(KeyError::NotFound(_)) if create => {
                    info!("no key file at {}; creating one", key_file.display());
                    Ok(keys.create(&key_file)?)
                }
                other => Ok(other?),
            })
            .await;
        if let Err(e) = &result {
            warn!("loading user key failed: {e}");
        }
        result
    }

    // ── Completion-style entry points ─────────────────────────────────────────

    pub fn spawn_init<F>(self: &Arc<Self>, on_done: F)
    where
        F: FnOnce(Result<Settings, SettingsError>) + Send + 'static,
    {
        let this = Arc::clone(self);
        self.runtime.spawn(async move { on_done(this.init().await) });
    }

    pub fn spawn_reset_device_owner<F>(self: &Arc<Self>, on_done: F)
    where
        F: FnOnce(Result<DeviceOwner, SettingsError>) + Send + 'static,
    {
        let this = Arc::clone(self);
        self.runtime
            .spawn(async move { on_done(this.reset_device_owner().await) });
    }

    pub fn spawn_load_user_key<F>(self: &Arc<Self>, key_file: PathBuf, create: bool, on_done: F)
    where
        F: FnOnce(Result<PathBuf, SettingsError>) + Send + 'static,
    {
        let this = Arc::clone(self);
        self.runtime
            .spawn(async move { on_done(this.load_user_key(key_file, create).await) });
    }

    pub fn spawn_save<F>(
        self: &Arc<Self>,
        device_name: String,
        lock_passphrase: String,
        unlocked_timeout_seconds: u32,
        on_done: F,
    ) where
        F: FnOnce(Result<(), SettingsError>) + Send + 'static,
    {
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            on_done(
                this.save(device_name, lock_passphrase, unlocked_timeout_seconds)
                    .await,
            )
        });
    }
}

/// Host name from the environment, or [`FALLBACK_DEVICE_NAME`].
pub fn host_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_DEVICE_NAME.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
