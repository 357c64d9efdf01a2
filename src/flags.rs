//! Feature flags controlling which parts of the node come up.
//!
//! Both flags are read from the process environment exactly once, at
//! startup, and the resolved value is threaded through the rest of the
//! sequence. Nothing re-reads the environment after this point.

use tracing::debug;

/// Environment variable disabling the routing data plane.
///
/// Networking is enabled unless this is set to the literal string
/// `"false"` (case-sensitive). Any other value, including the empty
/// string, leaves networking on.
pub const NETWORKING_ENV: &str = "MESHNODE_NETWORKING";

/// Environment variable disabling per-service file logging.
///
/// File logging is enabled unless this is set to the literal string
/// `"true"` (case-sensitive). Any other value leaves file logging on.
pub const DISABLE_FILE_LOGGING_ENV: &str = "MESHNODE_DISABLE_FILE_LOGGING";

/// Resolved feature flags, immutable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Run the routing data plane (BGP daemons + confd).
    pub networking_enabled: bool,
    /// Keep per-service log subdirectories under supervision.
    pub file_logging_enabled: bool,
}

impl FeatureFlags {
    /// Resolve flags from the process environment.
    pub fn resolve() -> Self {
        Self::resolve_from(|name| std::env::var(name).ok())
    }

    /// Resolve flags through an arbitrary lookup.
    ///
    /// Unrecognized values fail open to the flag's default.
    pub fn resolve_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let networking_enabled = match lookup(NETWORKING_ENV) {
            Some(val) => val != "false",
            None => true,
        };

        let file_logging_enabled = match lookup(DISABLE_FILE_LOGGING_ENV) {
            Some(val) => val != "true",
            None => true,
        };

        let flags = Self {
            networking_enabled,
            file_logging_enabled,
        };
        debug!(
            "Resolved feature flags: networking={}, file_logging={}",
            flags.networking_enabled, flags.file_logging_enabled
        );
        flags
    }
}
