//! Configuration status lifecycle.
//!
//! ```text
//!  NeedsInit  ──► NeedsLogin   initialize, store open, no valid token
//!  NeedsInit  ──► LoggedIn     initialize, valid prior session token
//!  NeedsInit  ──► Locked       initialize without a required passphrase
//!  NeedsLogin ──► LoggedIn     login
//!  LoggedIn   ──► LoggedOut    logout
//!  LoggedOut  ──► LoggedIn     re-login
//!  LoggedIn   ──► Locked       idle timeout
//!  Locked     ──► LoggedIn     unlock
//!  Locked     ──► NeedsLogin   initialize with passphrase, no valid token
//!  Locked     ──► LoggedOut    logout while locked
//!  any        ──► Error        unrecoverable store failure (sticky)
//!  Error      ──► NeedsInit    explicit recovery only
//! ```

use std::fmt;

use thiserror::Error;

/// Failure to decode a boundary byte into one of the domain enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown config status value {0}")]
    UnknownStatus(u8),
    #[error("unknown dialog type value {0}")]
    UnknownDialogType(u8),
    #[error("unknown accessory type value {0}")]
    UnknownAccessoryType(u8),
}

/// Current phase of the device/account configuration lifecycle.
///
/// The discriminants are the values the front-end sees on the boundary and
/// must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConfigStatus {
    /// Unrecoverable failure (corrupt store, wrong passphrase).  Sticky.
    Error = 0,
    /// The settings store has not been opened yet.
    NeedsInit = 1,
    /// The store is open but no user is logged in.
    NeedsLogin = 2,
    /// A session exists.
    LoggedIn = 3,
    /// A session existed and was closed.
    LoggedOut = 4,
    /// The device is locked behind its passphrase.
    Locked = 5,
}

impl ConfigStatus {
    /// Boundary byte for this status.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` when `self → to` is an edge of the lifecycle.
    ///
    /// Every state may move to [`ConfigStatus::Error`].  The only way out of
    /// `Error` is the explicit recovery edge back to `NeedsInit`.
    pub fn can_transition_to(self, to: ConfigStatus) -> bool {
        use ConfigStatus::*;

        if to == Error {
            return true;
        }
        matches!(
            (self, to),
            (NeedsInit, NeedsLogin)
                | (NeedsInit, LoggedIn)
                | (NeedsInit, Locked)
                | (NeedsLogin, LoggedIn)
                | (LoggedIn, LoggedOut)
                | (LoggedIn, Locked)
                | (LoggedOut, LoggedIn)
                | (Locked, LoggedIn)
                | (Locked, NeedsLogin)
                | (Locked, LoggedOut)
                | (Error, NeedsInit)
        )
    }
}

impl TryFrom<u8> for ConfigStatus {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(ConfigStatus::Error),
            1 => Ok(ConfigStatus::NeedsInit),
            2 => Ok(ConfigStatus::NeedsLogin),
            3 => Ok(ConfigStatus::LoggedIn),
            4 => Ok(ConfigStatus::LoggedOut),
            5 => Ok(ConfigStatus::Locked),
            other => Err(DecodeError::UnknownStatus(other)),
        }
    }
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigStatus::Error => "error",
            ConfigStatus::NeedsInit => "needs-init",
            ConfigStatus::NeedsLogin => "needs-login",
            ConfigStatus::LoggedIn => "logged-in",
            ConfigStatus::LoggedOut => "logged-out",
            ConfigStatus::Locked => "locked",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigStatus::*;

    const ALL: [ConfigStatus; 6] = [Error, NeedsInit, NeedsLogin, LoggedIn, LoggedOut, Locked];

    #[test]
    fn test_boundary_values_match_published_numbering() {
        assert_eq!(Error.as_u8(), 0);
        assert_eq!(NeedsInit.as_u8(), 1);
        assert_eq!(NeedsLogin.as_u8(), 2);
        assert_eq!(LoggedIn.as_u8(), 3);
        assert_eq!(LoggedOut.as_u8(), 4);
        assert_eq!(Locked.as_u8(), 5);
    }

    #[test]
    fn test_decode_accepts_every_published_value() {
        for status in ALL {
            assert_eq!(ConfigStatus::try_from(status.as_u8()), Ok(status));
        }
    }

    #[test]
    fn test_decode_rejects_unknown_value() {
        assert_eq!(
            ConfigStatus::try_from(6),
            Err(DecodeError::UnknownStatus(6))
        );
        assert_eq!(
            ConfigStatus::try_from(255),
            Err(DecodeError::UnknownStatus(255))
        );
    }

    #[test]
    fn test_every_state_can_fail_into_error() {
        for status in ALL {
            assert!(status.can_transition_to(Error), "{status} -> error");
        }
    }

    #[test]
    fn test_error_is_sticky_except_for_recovery() {
        for status in ALL {
            let allowed = Error.can_transition_to(status);
            let expected = matches!(status, Error | NeedsInit);
            assert_eq!(allowed, expected, "error -> {status}");
        }
    }

    #[test]
    fn test_login_edges() {
        assert!(NeedsLogin.can_transition_to(LoggedIn));
        assert!(LoggedOut.can_transition_to(LoggedIn));
        assert!(!NeedsLogin.can_transition_to(LoggedOut));
    }

    #[test]
    fn test_lock_edges() {
        assert!(LoggedIn.can_transition_to(Locked));
        assert!(Locked.can_transition_to(LoggedIn));
        assert!(!LoggedOut.can_transition_to(Locked));
        assert!(!NeedsLogin.can_transition_to(Locked));
    }

    #[test]
    fn test_logout_is_only_reachable_with_a_session() {
        for status in ALL {
            let allowed = status.can_transition_to(LoggedOut);
            assert_eq!(allowed, matches!(status, LoggedIn | Locked), "{status} -> logged-out");
        }
    }

    #[test]
    fn test_display_is_kebab_case() {
        assert_eq!(NeedsLogin.to_string(), "needs-login");
        assert_eq!(Locked.to_string(), "locked");
    }
}
