//! Blocking state monitor.
//!
//! Decides, on every activation, whether the extension may operate normally
//! and opens the right modal when it may not:
//!
//! ```text
//!            check_blocking_state()
//! Unknown ──► Checking ──┬──► Blocked(Pairing)    ──► pairing modal (single-flight)
//!                        ├──► Blocked(Connection) ──► connection modal
//!                        └──► Unblocked
//! ```
//!
//! `Blocked(Pairing)` is only left through a successful pairing; re-running
//! the check does not lift it. Pairing demands pushed at any time (by the
//! vault client or the background runtime) take the same route as a check
//! that reports `Pairing`.
//!
//! A failed query fails open: it is logged and the phase returns to what it
//! was before the check. The push channel or the next check re-detects a
//! broken companion link.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::sync::RwLock;
use tokio_stream::StreamExt;

use crate::bridge::{BlockingKind, BlockingState, SecureChannelBridge, VaultClient};
use crate::config::GateConfig;
use crate::connection::ConnectionRetryController;
use crate::events::{EventHub, PairingRequired, Subscription};
use crate::pairing::{PairSuccessHandler, PairingCoordinator};
use crate::surface::{Modal, Route, Surface};

/// Single-flight guard for the pairing modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModalGuard {
    #[default]
    Idle,
    /// A pairing modal is open; further requests to show one are no-ops.
    PairingOpen,
}

/// Where the monitor is in its check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorPhase {
    #[default]
    Unknown,
    Checking,
    Blocked(BlockingKind),
    Unblocked,
}

/// Point-in-time view of the monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub phase: MonitorPhase,
    /// `None` means unblocked (or not known to be blocked).
    pub blocking_state: Option<BlockingState>,
    pub modal: ModalGuard,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl MonitorSnapshot {
    fn pairing_pending(&self) -> bool {
        self.phase == MonitorPhase::Blocked(BlockingKind::Pairing)
    }
}

/// State shared between the monitor, its listeners and the handles it gives
/// out to the surface.
pub(crate) struct MonitorShared {
    pub(crate) bridge: Arc<dyn SecureChannelBridge>,
    vault: Arc<dyn VaultClient>,
    pub(crate) surface: Arc<dyn Surface>,
    config: GateConfig,
    state: RwLock<MonitorSnapshot>,
}

impl MonitorShared {
    async fn check(self: &Arc<Self>) -> Option<BlockingState> {
        let previous = {
            let mut state = self.state.write().await;
            let previous = state.phase;
            if !state.pairing_pending() {
                state.phase = MonitorPhase::Checking;
            }
            previous
        };

        let blocking = match self.bridge.get_blocking_state().await {
            Ok(blocking) => blocking,
            Err(e) => {
                tracing::error!(error = %e, "Failed to get blocking state, continuing unblocked");
                let mut state = self.state.write().await;
                if state.phase == MonitorPhase::Checking {
                    state.phase = previous;
                }
                return state.blocking_state.clone();
            }
        };

        {
            let mut state = self.state.write().await;
            state.last_checked_at = Some(Utc::now());

            let reports_pairing = blocking
                .as_ref()
                .is_some_and(|b| b.kind == BlockingKind::Pairing);
            if state.pairing_pending() && !reports_pairing {
                tracing::debug!(
                    reported = ?blocking,
                    "Pairing still required; check result does not lift it"
                );
                return state.blocking_state.clone();
            }

            state.blocking_state = blocking.clone();
            state.phase = match &blocking {
                Some(b) => MonitorPhase::Blocked(b.kind),
                None => MonitorPhase::Unblocked,
            };
        }

        match &blocking {
            Some(b) => {
                tracing::info!(kind = %b.kind, detail = %b.detail, "Extension is blocked");
                match b.kind {
                    BlockingKind::Pairing => self.show_pairing_modal().await,
                    BlockingKind::Connection => self.show_connection_modal(),
                }
            }
            None => tracing::debug!("Extension is unblocked"),
        }

        blocking
    }

    async fn handle_pairing_required(self: &Arc<Self>, event: PairingRequired) {
        tracing::info!(reason = %event.reason, "Pairing required");
        {
            let mut state = self.state.write().await;
            state.blocking_state = Some(BlockingState::pairing(event.reason));
            state.phase = MonitorPhase::Blocked(BlockingKind::Pairing);
        }
        self.show_pairing_modal().await;
    }

    async fn show_pairing_modal(self: &Arc<Self>) {
        {
            let mut state = self.state.write().await;
            if state.modal == ModalGuard::PairingOpen {
                tracing::debug!("Pairing modal already open");
                return;
            }
            state.modal = ModalGuard::PairingOpen;
        }

        let coordinator = PairingCoordinator::new(
            Arc::clone(&self.bridge),
            Arc::clone(&self.vault),
            Arc::clone(&self.surface),
            Arc::new(PairSuccessRelay(Arc::downgrade(self))),
            self.config.min_token_len,
        );
        self.surface.close_all_modals();
        self.surface.open_modal(Modal::Pairing(coordinator));
    }

    fn show_connection_modal(self: &Arc<Self>) {
        let controller = ConnectionRetryController::new(Arc::downgrade(self));
        self.surface.close_all_modals();
        self.surface.open_modal(Modal::Connection(controller));
    }

    /// Clear the blocking state after a verified reconnect.
    ///
    /// Refused while pairing is pending: only a successful pairing lifts
    /// that block. Returns whether the state was cleared.
    pub(crate) async fn mark_recovered(&self) -> bool {
        let mut state = self.state.write().await;
        if state.pairing_pending() {
            tracing::debug!("Reconnect ignored, pairing still required");
            return false;
        }
        state.blocking_state = None;
        state.phase = MonitorPhase::Unblocked;
        state.modal = ModalGuard::Idle;
        state.last_checked_at = Some(Utc::now());
        true
    }

    async fn pair_succeeded(&self) {
        {
            let mut state = self.state.write().await;
            state.modal = ModalGuard::Idle;
            state.blocking_state = None;
            state.phase = MonitorPhase::Unblocked;
        }
        tracing::info!("Pairing succeeded, entering vaults");
        self.surface.close_all_modals();
        self.surface.navigate(Route::Vaults);
    }
}

/// Forwards pairing success to the monitor without keeping it alive.
struct PairSuccessRelay(Weak<MonitorShared>);

#[async_trait]
impl PairSuccessHandler for PairSuccessRelay {
    async fn on_pair_success(&self) {
        match self.0.upgrade() {
            Some(shared) => shared.pair_succeeded().await,
            None => tracing::warn!("Pairing succeeded after the monitor was torn down"),
        }
    }
}

/// Gates the extension on pairing and companion reachability.
pub struct BlockingStateMonitor {
    shared: Arc<MonitorShared>,
    subscription: Option<Subscription>,
}

impl BlockingStateMonitor {
    pub fn new(
        bridge: Arc<dyn SecureChannelBridge>,
        vault: Arc<dyn VaultClient>,
        surface: Arc<dyn Surface>,
        config: GateConfig,
    ) -> Self {
        Self {
            shared: Arc::new(MonitorShared {
                bridge,
                vault,
                surface,
                config,
                state: RwLock::new(MonitorSnapshot::default()),
            }),
            subscription: None,
        }
    }

    /// Subscribe to both pairing-required sources on `events`, then run the
    /// initial check.
    pub async fn activate(&mut self, events: &EventHub) -> Option<BlockingState> {
        self.subscribe(events.pairing_required_stream());
        self.check_blocking_state().await
    }

    /// Route every pairing demand on `stream` to the pairing modal until
    /// [`Self::teardown`] or drop. Replaces any earlier subscription.
    pub fn subscribe<S>(&mut self, stream: S)
    where
        S: Stream<Item = PairingRequired> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.shared);
        self.subscription = Some(Subscription::spawn("pairing-required", async move {
            tokio::pin!(stream);
            while let Some(event) = stream.next().await {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                shared.handle_pairing_required(event).await;
            }
        }));
    }

    /// Query the bridge once and open the matching modal.
    pub async fn check_blocking_state(&self) -> Option<BlockingState> {
        self.shared.check().await
    }

    /// Handle a pairing demand as if it had arrived on a subscribed source.
    pub async fn handle_pairing_required(&self, event: PairingRequired) {
        self.shared.handle_pairing_required(event).await;
    }

    /// Open the pairing modal unless one is already open.
    pub async fn show_pairing_modal(&self) {
        self.shared.show_pairing_modal().await;
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        self.shared.state.read().await.clone()
    }

    pub async fn blocking_state(&self) -> Option<BlockingState> {
        self.shared.state.read().await.blocking_state.clone()
    }

    pub async fn is_checking(&self) -> bool {
        self.shared.state.read().await.phase == MonitorPhase::Checking
    }

    pub async fn is_blocked(&self) -> bool {
        self.shared.state.read().await.blocking_state.is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Stop listening for pairing demands.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}
