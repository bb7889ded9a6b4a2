//! Live view of the auto-lock settings.
//!
//! Values are read once from the settings store and then kept current from
//! its change feed. Writes never touch the store directly: they go to the
//! background process, which persists them and the change comes back here.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{broadcast, watch};

use super::InactivityPolicy;
use crate::bridge::{BackgroundMessenger, BackgroundRequest};
use crate::config::GateConfig;
use crate::events::Subscription;
use crate::settings::{SettingChange, SettingsStore};

pub const AUTO_LOCK_ENABLED_KEY: &str = "autoLockEnabled";
pub const AUTO_LOCK_TIMEOUT_KEY: &str = "autoLockTimeoutMs";

/// The user's auto-lock settings, kept live from the settings store.
pub struct AutoLockPreferences {
    policy: Arc<watch::Sender<InactivityPolicy>>,
    generation: Arc<AtomicU64>,
    messenger: Arc<dyn BackgroundMessenger>,
    _listener: Subscription,
}

impl AutoLockPreferences {
    /// Read the current settings and start following changes.
    ///
    /// Missing or ill-typed values fall back to the configured defaults. A
    /// failed read is logged and also falls back.
    pub async fn load(
        store: Arc<dyn SettingsStore>,
        messenger: Arc<dyn BackgroundMessenger>,
        config: &GateConfig,
    ) -> Self {
        // Subscribe before reading so no change between the two is lost.
        let changes = store.subscribe();

        let mut policy = InactivityPolicy::from(config);
        match store
            .get(&[AUTO_LOCK_ENABLED_KEY, AUTO_LOCK_TIMEOUT_KEY])
            .await
        {
            Ok(values) => {
                if let Some(value) = values.get(AUTO_LOCK_ENABLED_KEY) {
                    apply_enabled(&mut policy, value);
                }
                if let Some(value) = values.get(AUTO_LOCK_TIMEOUT_KEY) {
                    apply_timeout(&mut policy, value);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read auto-lock settings, using defaults");
            }
        }
        tracing::debug!(?policy, "Auto-lock preferences loaded");

        let (tx, _) = watch::channel(policy);
        let tx = Arc::new(tx);
        let generation = Arc::new(AtomicU64::new(0));

        let listener = Subscription::spawn(
            "auto-lock-settings",
            follow_changes(changes, Arc::clone(&tx), Arc::clone(&generation)),
        );

        Self {
            policy: tx,
            generation,
            messenger,
            _listener: listener,
        }
    }

    /// Current policy.
    pub fn policy(&self) -> InactivityPolicy {
        *self.policy.borrow()
    }

    pub fn is_auto_lock_enabled(&self) -> bool {
        self.policy().enabled
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.policy().timeout_ms
    }

    /// Receive the policy every time it changes.
    pub fn subscribe(&self) -> watch::Receiver<InactivityPolicy> {
        self.policy.subscribe()
    }

    /// Number of applied changes since load.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Ask the background process to turn auto-lock on or off.
    pub fn set_auto_lock_enabled(&self, enabled: bool) {
        self.messenger
            .send(BackgroundRequest::SetAutoLockEnabled { enabled });
    }

    /// Ask the background process to change the timeout. `None` = never.
    pub fn set_timeout_ms(&self, timeout_ms: Option<u64>) {
        self.messenger
            .send(BackgroundRequest::SetAutoLockTimeout { timeout_ms });
    }
}

async fn follow_changes(
    mut changes: broadcast::Receiver<SettingChange>,
    policy: Arc<watch::Sender<InactivityPolicy>>,
    generation: Arc<AtomicU64>,
) {
    loop {
        let change = match changes.recv().await {
            Ok(change) => change,
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!("Settings change feed closed");
                return;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Auto-lock settings listener lagged");
                continue;
            }
        };

        // A removed key keeps the current value.
        let Some(value) = change.new_value else {
            continue;
        };

        let modified = policy.send_if_modified(|current| {
            let before = *current;
            match change.key.as_str() {
                AUTO_LOCK_ENABLED_KEY => apply_enabled(current, &value),
                AUTO_LOCK_TIMEOUT_KEY => apply_timeout(current, &value),
                _ => {}
            }
            *current != before
        });

        if modified {
            generation.fetch_add(1, Ordering::SeqCst);
            let current = *policy.borrow();
            tracing::debug!(key = %change.key, policy = ?current, "Auto-lock preferences changed");
        }
    }
}

fn apply_enabled(policy: &mut InactivityPolicy, value: &Value) {
    match value {
        Value::Bool(enabled) => policy.enabled = *enabled,
        other => tracing::warn!(value = %other, "Ignoring non-boolean autoLockEnabled"),
    }
}

/// `null` selects "never"; any non-negative integer is a timeout in ms.
fn apply_timeout(policy: &mut InactivityPolicy, value: &Value) {
    match value {
        Value::Null => policy.timeout_ms = None,
        Value::Number(n) => match n.as_u64() {
            Some(ms) => policy.timeout_ms = Some(ms),
            None => tracing::warn!(value = %n, "Ignoring non-integer autoLockTimeoutMs"),
        },
        other => tracing::warn!(value = %other, "Ignoring ill-typed autoLockTimeoutMs"),
    }
}
