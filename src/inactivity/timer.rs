//! One-shot inactivity lock timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::{AutoLockPreferences, InactivityPolicy};
use crate::bridge::{BackgroundMessenger, BackgroundRequest, VaultClient};
use crate::config::GateConfig;
use crate::events::Subscription;
use crate::heartbeat::Heartbeat;
use crate::surface::{Route, Surface};

/// User interactions that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    #[serde(rename = "mousemove")]
    PointerMove,
    KeyDown,
    #[serde(rename = "mousedown")]
    PointerDown,
    TouchStart,
    Scroll,
}

struct TimerInner {
    vault: Arc<dyn VaultClient>,
    surface: Arc<dyn Surface>,
    heartbeat: Heartbeat,
    policy: Mutex<InactivityPolicy>,
    pending: Mutex<Option<JoinHandle<()>>>,
    locks: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TimerInner {
    fn set_policy(self: &Arc<Self>, policy: InactivityPolicy) {
        *lock(&self.policy) = policy;
        tracing::debug!(?policy, "Inactivity policy applied");
        self.reset();
    }

    /// Cancel the pending timer and arm a fresh one if the policy allows.
    fn reset(self: &Arc<Self>) {
        let mut pending = lock(&self.pending);
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let policy = *lock(&self.policy);
        let Some(delay) = policy.lock_after() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, inactivity timer not armed");
            return;
        };

        self.heartbeat.beat();

        let weak = Arc::downgrade(self);
        *pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Detach the lock sequence so a later reset cannot abort it midway.
            tokio::spawn(expire(weak));
        }));
    }

    fn cancel(&self) {
        if let Some(handle) = lock(&self.pending).take() {
            handle.abort();
        }
    }
}

/// Lock the session if a user is still logged in.
async fn expire(weak: Weak<TimerInner>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    let user = match inner.vault.user_data().await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Inactivity timer fired but user state is unavailable");
            return;
        }
    };
    tracing::info!(is_logged_in = user.is_logged_in, "Inactivity timer fired");
    if !user.is_logged_in {
        return;
    }

    inner.surface.set_loading(true);
    inner.surface.close_all_modals();
    inner.surface.set_loading(false);
    inner.surface.navigate(Route::MasterPassword);
    inner.vault.reset_state().await;
    inner.locks.fetch_add(1, Ordering::SeqCst);
    tracing::info!("Session locked after inactivity");
}

/// Locks the session after a period without user activity.
///
/// Every recorded interaction re-arms the timer and, at most once per
/// heartbeat interval, tells the background process the user is active.
/// Must be driven from within a Tokio runtime.
pub struct InactivityTimer {
    inner: Arc<TimerInner>,
    policy_watch: Option<Subscription>,
}

impl InactivityTimer {
    pub fn new(
        vault: Arc<dyn VaultClient>,
        surface: Arc<dyn Surface>,
        messenger: Arc<dyn BackgroundMessenger>,
        config: &GateConfig,
        policy: InactivityPolicy,
    ) -> Self {
        let heartbeat = Heartbeat::new(config.heartbeat_interval, move || {
            messenger.send(BackgroundRequest::ResetTimer);
        });
        Self {
            inner: Arc::new(TimerInner {
                vault,
                surface,
                heartbeat,
                policy: Mutex::new(policy),
                pending: Mutex::new(None),
                locks: AtomicU64::new(0),
            }),
            policy_watch: None,
        }
    }

    /// Apply the current preferences, arm the timer and keep following
    /// preference changes until torn down.
    pub fn watch_preferences(&mut self, prefs: &AutoLockPreferences) {
        let mut rx = prefs.subscribe();
        self.inner.set_policy(*rx.borrow_and_update());

        let weak = Arc::downgrade(&self.inner);
        self.policy_watch = Some(Subscription::spawn("auto-lock-policy", async move {
            while rx.changed().await.is_ok() {
                let policy = *rx.borrow_and_update();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.set_policy(policy);
            }
        }));
    }

    pub fn record_activity(&self, kind: ActivityKind) {
        tracing::trace!(?kind, "User activity");
        self.inner.reset();
    }

    pub fn set_policy(&self, policy: InactivityPolicy) {
        self.inner.set_policy(policy);
    }

    /// Re-arm the timer without an interaction.
    pub fn reset(&self) {
        self.inner.reset();
    }

    pub fn policy(&self) -> InactivityPolicy {
        *lock(&self.inner.policy)
    }

    /// Whether a lock is currently scheduled.
    pub fn is_armed(&self) -> bool {
        lock(&self.inner.pending)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Number of times this timer has locked the session.
    pub fn lock_count(&self) -> u64 {
        self.inner.locks.load(Ordering::SeqCst)
    }

    /// Cancel the pending timer and stop following preferences.
    pub fn teardown(&mut self) {
        self.policy_watch = None;
        self.inner.cancel();
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for InactivityTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InactivityTimer")
            .field("policy", &self.policy())
            .field("armed", &self.is_armed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::inactivity::AUTO_LOCK_TIMEOUT_KEY;
    use crate::settings::MemorySettingsStore;
    use crate::testing::{FakeVault, RecordingMessenger, RecordingSurface, SurfaceEvent};

    struct Harness {
        vault: Arc<FakeVault>,
        surface: Arc<RecordingSurface>,
        messenger: Arc<RecordingMessenger>,
        timer: InactivityTimer,
    }

    fn harness(timeout_ms: Option<u64>) -> Harness {
        let vault = Arc::new(FakeVault::new());
        vault.set_logged_in(true);
        let surface = Arc::new(RecordingSurface::new());
        let messenger = Arc::new(RecordingMessenger::default());
        let timer = InactivityTimer::new(
            vault.clone(),
            surface.clone(),
            messenger.clone(),
            &GateConfig::default(),
            InactivityPolicy {
                enabled: true,
                timeout_ms,
            },
        );
        Harness {
            vault,
            surface,
            messenger,
            timer,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_locks_after_timeout() {
        let h = harness(Some(5_000));
        h.timer.reset();
        assert!(h.timer.is_armed());

        tokio::time::sleep(Duration::from_millis(5_001)).await;
        settle().await;

        assert_eq!(
            h.surface.events(),
            vec![
                SurfaceEvent::Loading(true),
                SurfaceEvent::CloseAllModals,
                SurfaceEvent::Loading(false),
                SurfaceEvent::Navigate(Route::MasterPassword),
            ]
        );
        assert_eq!(h.vault.count("reset_state"), 1);
        assert_eq!(h.timer.lock_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_postpones_lock() {
        let h = harness(Some(5_000));
        h.timer.reset();

        tokio::time::sleep(Duration::from_millis(4_000)).await;
        h.timer.record_activity(ActivityKind::KeyDown);
        tokio::time::sleep(Duration::from_millis(4_000)).await;
        settle().await;
        assert_eq!(h.timer.lock_count(), 0);

        tokio::time::sleep(Duration::from_millis(1_001)).await;
        settle().await;
        assert_eq!(h.timer.lock_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_null_timeout_never_locks() {
        let h = harness(None);
        h.timer.record_activity(ActivityKind::PointerMove);
        assert!(!h.timer.is_armed());

        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        settle().await;

        assert_eq!(h.timer.lock_count(), 0);
        assert!(h.surface.events().is_empty());
        // Nothing armed means no heartbeat either.
        assert_eq!(h.messenger.resets(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_policy_cancels_pending() {
        let h = harness(Some(1_000));
        h.timer.reset();
        h.timer.set_policy(InactivityPolicy {
            enabled: false,
            timeout_ms: Some(1_000),
        });
        assert!(!h.timer.is_armed());

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(h.timer.lock_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_while_logged_out_is_inert() {
        let h = harness(Some(1_000));
        h.vault.set_logged_in(false);
        h.timer.reset();

        tokio::time::sleep(Duration::from_millis(1_001)).await;
        settle().await;

        assert_eq!(h.vault.count("user_data"), 1);
        assert_eq!(h.vault.count("reset_state"), 0);
        assert!(h.surface.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_is_throttled() {
        let h = harness(Some(60_000));
        for _ in 0..20 {
            h.timer.record_activity(ActivityKind::PointerMove);
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(h.messenger.resets(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        h.timer.record_activity(ActivityKind::Scroll);
        assert_eq!(h.messenger.resets(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_timer() {
        let mut h = harness(Some(1_000));
        h.timer.reset();
        h.timer.teardown();
        assert!(!h.timer.is_armed());

        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(h.vault.count("user_data"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follows_preference_changes() {
        let store = Arc::new(MemorySettingsStore::new());
        store.set(AUTO_LOCK_TIMEOUT_KEY, json!(60_000)).await;
        let mut h = harness(None);
        let prefs =
            AutoLockPreferences::load(store.clone(), h.messenger.clone(), &GateConfig::default())
                .await;

        h.timer.watch_preferences(&prefs);
        assert_eq!(h.timer.policy().timeout_ms, Some(60_000));
        assert!(h.timer.is_armed());

        store.set(AUTO_LOCK_TIMEOUT_KEY, serde_json::Value::Null).await;
        settle().await;
        assert_eq!(h.timer.policy().timeout_ms, None);
        assert!(!h.timer.is_armed());

        store.set(AUTO_LOCK_TIMEOUT_KEY, json!(2_000)).await;
        settle().await;
        tokio::time::sleep(Duration::from_millis(2_001)).await;
        settle().await;
        assert_eq!(h.timer.lock_count(), 1);
    }

    #[test]
    fn test_activity_kind_names() {
        assert_eq!(
            serde_json::to_value(ActivityKind::PointerMove).unwrap(),
            "mousemove"
        );
        assert_eq!(serde_json::to_value(ActivityKind::KeyDown).unwrap(), "keydown");
        assert_eq!(
            serde_json::to_value(ActivityKind::TouchStart).unwrap(),
            "touchstart"
        );
    }
}
