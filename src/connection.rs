//! Recovery path for an unreachable companion app.
//!
//! The connection modal offers a single user-initiated retry. A successful
//! retry routes to a fresh login rather than back into the vaults, since a
//! lost connection invalidates whatever session the view was holding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::blocking::MonitorShared;
use crate::surface::Route;

const PAIRING_PENDING_MESSAGE: &str = "Pairing with the desktop app is required first";

/// Result of one retry, shaped for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RetryOutcome {
    fn recovered() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Retry handle bound to the monitor that opened the connection modal.
#[derive(Clone)]
pub struct ConnectionRetryController {
    monitor: Weak<MonitorShared>,
    in_flight: Arc<AtomicBool>,
}

impl ConnectionRetryController {
    pub(crate) fn new(monitor: Weak<MonitorShared>) -> Self {
        Self {
            monitor,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_retrying(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Re-query the blocking state.
    ///
    /// When nothing blocks any more, the modal is closed and the user is sent
    /// to master password entry. Otherwise the modal stays open and the
    /// failure is returned for display; nothing is retried automatically.
    pub async fn retry(&self) -> RetryOutcome {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return RetryOutcome::failed("Retry already in progress");
        }
        let outcome = self.retry_once().await;
        self.in_flight.store(false, Ordering::SeqCst);

        if !outcome.success {
            tracing::warn!(message = ?outcome.message, "Connection retry failed");
        }
        outcome
    }

    async fn retry_once(&self) -> RetryOutcome {
        let Some(monitor) = self.monitor.upgrade() else {
            return RetryOutcome::failed("Blocking state monitor is no longer active");
        };

        match monitor.bridge.get_blocking_state().await {
            Ok(None) => {
                if !monitor.mark_recovered().await {
                    return RetryOutcome::failed(PAIRING_PENDING_MESSAGE);
                }
                monitor.surface.close_all_modals();
                monitor.surface.navigate(Route::MasterPassword);
                tracing::info!("Companion connection recovered");
                RetryOutcome::recovered()
            }
            Ok(Some(state)) => RetryOutcome::failed(state.detail),
            Err(e) => RetryOutcome::failed(e.to_string()),
        }
    }
}

impl std::fmt::Debug for ConnectionRetryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRetryController")
            .field("retrying", &self.is_retrying())
            .finish_non_exhaustive()
    }
}
