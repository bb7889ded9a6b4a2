//! Inactivity auto-lock.
//!
//! [`AutoLockPreferences`] mirrors the user's auto-lock settings from the
//! local store; [`InactivityTimer`] arms a one-shot lock timer from them,
//! re-arms it on every user interaction and tells the background process the
//! user is still active through a throttled [`crate::heartbeat::Heartbeat`].

mod preferences;
mod timer;

use std::time::Duration;

pub use preferences::{AUTO_LOCK_ENABLED_KEY, AUTO_LOCK_TIMEOUT_KEY, AutoLockPreferences};
pub use timer::{ActivityKind, InactivityTimer};

use crate::config::GateConfig;

/// When, if ever, an idle session locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityPolicy {
    pub enabled: bool,
    /// `None` means never expire, regardless of `enabled`.
    pub timeout_ms: Option<u64>,
}

impl InactivityPolicy {
    /// The lock delay to arm, or `None` if nothing should be scheduled.
    pub fn lock_after(&self) -> Option<Duration> {
        match (self.enabled, self.timeout_ms) {
            (true, Some(ms)) => Some(Duration::from_millis(ms)),
            _ => None,
        }
    }

    pub fn never() -> Self {
        Self {
            enabled: false,
            timeout_ms: None,
        }
    }
}

impl From<&GateConfig> for InactivityPolicy {
    fn from(config: &GateConfig) -> Self {
        Self {
            enabled: config.default_auto_lock_enabled,
            timeout_ms: config
                .default_auto_lock_timeout
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}
