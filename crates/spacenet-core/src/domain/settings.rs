//! Device settings tuple.

use serde::{Deserialize, Serialize};

/// Default idle time before a logged-in device locks itself.
pub const DEFAULT_UNLOCKED_TIMEOUT_SECS: u32 = 300;

/// Device settings loaded and saved as one unit.
///
/// Field names double as the `[device]` table keys of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Username of the bound device owner.  Empty when unbound.
    #[serde(default, rename = "user")]
    pub device_user: String,
    #[serde(default, rename = "name")]
    pub device_name: String,
    #[serde(default)]
    pub lock_passphrase: String,
    /// Seconds of inactivity before the device locks.  `0` disables locking.
    #[serde(default = "default_unlocked_timeout")]
    pub unlocked_timeout_seconds: u32,
    #[serde(default)]
    pub initialized: bool,
}

fn default_unlocked_timeout() -> u32 {
    DEFAULT_UNLOCKED_TIMEOUT_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_user: String::new(),
            device_name: String::new(),
            lock_passphrase: String::new(),
            unlocked_timeout_seconds: default_unlocked_timeout(),
            initialized: false,
        }
    }
}

/// `[client]` table: preferences that are not tied to the device owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub eula_accepted: bool,
    /// Default `tracing` filter when neither `RUST_LOG` nor `SPACENET_LOG`
    /// is set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            eula_accepted: false,
            log_level: default_log_level(),
        }
    }
}

/// The whole persisted settings file.
///
/// ```toml
/// [device]
/// user = "alice"
/// name = "alice-laptop"
/// lock_passphrase = ""
/// unlocked_timeout_seconds = 300
/// initialized = true
///
/// [client]
/// eula_accepted = true
/// log_level = "info"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default)]
    pub device: Settings,
    #[serde(default)]
    pub client: ClientSettings,
}

impl Settings {
    pub fn has_owner(&self) -> bool {
        !self.device_user.is_empty()
    }

    /// Whether `username` is the bound owner.  Always `false` when unbound.
    pub fn is_owner(&self, username: &str) -> bool {
        self.has_owner() && self.device_user == username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_uninitialized_and_unbound() {
        let s = Settings::default();
        assert!(!s.initialized);
        assert!(!s.has_owner());
        assert_eq!(s.unlocked_timeout_seconds, 300);
    }

    #[test]
    fn test_is_owner_requires_a_bound_owner() {
        let mut s = Settings::default();
        assert!(!s.is_owner(""));

        s.device_user = "alice".to_string();
        assert!(s.is_owner("alice"));
        assert!(!s.is_owner("bob"));
    }

    #[test]
    fn test_partial_document_falls_back_to_defaults() {
        // Arrange – only the owner is present in the file.
        let text = "[device]\nuser = \"alice\"\n";

        // Act
        let doc: SettingsDocument = toml::from_str(text).expect("valid toml");

        // Assert
        assert_eq!(doc.device.device_user, "alice");
        assert_eq!(doc.device.unlocked_timeout_seconds, DEFAULT_UNLOCKED_TIMEOUT_SECS);
        assert!(!doc.device.initialized);
        assert!(!doc.client.eula_accepted);
        assert_eq!(doc.client.log_level, "info");
    }

    #[test]
    fn test_empty_document_is_default() {
        let doc: SettingsDocument = toml::from_str("").expect("empty toml is valid");
        assert_eq!(doc, SettingsDocument::default());
    }
}
