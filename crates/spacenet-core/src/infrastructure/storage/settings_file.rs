//! TOML-based settings persistence.
//!
//! Reads and writes the [`SettingsDocument`] to the platform-appropriate
//! settings file:
//! - Windows:  `%APPDATA%\SpaceNet\settings.toml`
//! - Linux:    `~/.config/spacenet/settings.toml`
//! - macOS:    `~/Library/Application Support/SpaceNet/settings.toml`
//!
//! A missing file is not an error: the device is simply uninitialized and
//! the defaults apply until the first save.
//!
//! # Passphrase
//!
//! The `[device] lock_passphrase` doubles as the store passphrase.  An empty
//! passphrase means the store is unprotected.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::write_atomically;
use crate::application::settings_store::{SettingsRepository, StoreError, Unlock};
use crate::domain::settings::SettingsDocument;

const SETTINGS_FILE: &str = "settings.toml";

/// [`SettingsRepository`] backed by one TOML file.
#[derive(Debug, Clone)]
pub struct TomlSettingsRepository {
    path: PathBuf,
}

impl TomlSettingsRepository {
    /// Repository at the platform default location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoPlatformConfigDir`] when the platform config
    /// base directory cannot be determined from the environment.
    pub fn platform_default() -> Result<Self, StoreError> {
        let dir = platform_config_dir().ok_or(StoreError::NoPlatformConfigDir)?;
        Ok(Self::at(dir.join(SETTINGS_FILE)))
    }

    /// Repository at an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsRepository for TomlSettingsRepository {
    fn unlock(&self, passphrase: Option<&str>) -> Result<Unlock, StoreError> {
        let stored = self.load()?.device.lock_passphrase;
        if stored.is_empty() {
            return Ok(Unlock::Opened);
        }
        match passphrase {
            None => Ok(Unlock::NeedsPassphrase),
            Some(given) if given == stored => Ok(Unlock::Opened),
            Some(_) => Err(StoreError::BadPassphrase),
        }
    }

    fn load(&self) -> Result<SettingsDocument, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no settings file at {}; using defaults", self.path.display());
                Ok(SettingsDocument::default())
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, document: &SettingsDocument) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(document)?;
        write_atomically(&self.path, content.as_bytes()).map_err(|e| self.io_error(e))?;
        debug!("settings written to {}", self.path.display());
        Ok(())
    }
}

/// Resolves the platform config base directory including the `SpaceNet`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("SpaceNet"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("spacenet"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("SpaceNet")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
