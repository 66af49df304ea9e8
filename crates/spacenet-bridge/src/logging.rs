//! `tracing` subscriber setup for hosts that load the core as a library.
//!
//! A library cannot own `main`, so the subscriber is installed on first
//! [`install`](crate::install) instead.  The filter is picked from, in order:
//!
//! 1. `RUST_LOG`
//! 2. `SPACENET_LOG`
//! 3. `[client] log_level` from the settings file
//! 4. `"info"`
//!
//! If the host already installed a global subscriber, that one wins.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted after `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "SPACENET_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Chooses the first non-empty directive.
pub fn filter_directive(
    rust_log: Option<String>,
    spacenet_log: Option<String>,
    configured: Option<&str>,
) -> String {
    rust_log
        .into_iter()
        .chain(spacenet_log)
        .chain(configured.map(str::to_owned))
        .map(|d| d.trim().to_owned())
        .find(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_owned())
}

/// Installs the global fmt subscriber.
///
/// Returns `false` when a subscriber was already installed.
pub fn init(configured: Option<&str>) -> bool {
    let directive = filter_directive(
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        std::env::var(LOG_ENV_VAR).ok(),
        configured,
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        let d = filter_directive(Some("debug".into()), Some("warn".into()), Some("error"));
        assert_eq!(d, "debug");
    }

    #[test]
    fn test_spacenet_log_before_settings() {
        let d = filter_directive(None, Some("spacenet_core=trace".into()), Some("error"));
        assert_eq!(d, "spacenet_core=trace");
    }

    #[test]
    fn test_settings_level_then_default() {
        assert_eq!(filter_directive(None, None, Some("warn")), "warn");
        assert_eq!(filter_directive(None, None, None), "info");
    }

    #[test]
    fn test_blank_values_are_skipped() {
        assert_eq!(filter_directive(Some("  ".into()), Some(String::new()), Some("")), "info");
    }
}
