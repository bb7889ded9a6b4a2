//! Companion gate: keeps a browser extension's vault view locked behind a
//! paired, reachable companion desktop app and an active user.
//!
//! ```text
//!              ┌────────────────────── EventHub ──────────────────────┐
//!              │  vault client events    background runtime messages  │
//!              └───────────────┬──────────────────────────────────────┘
//!                              ▼
//!   SecureChannelBridge ◄── BlockingStateMonitor ──► Surface (modals, routes)
//!          ▲                  │        │
//!          │       PairingCoordinator  ConnectionRetryController
//!          │
//!   VaultClient ◄── InactivityTimer ◄── AutoLockPreferences ◄── SettingsStore
//!                        │
//!                        └── Heartbeat ──► BackgroundMessenger
//! ```

pub mod blocking;
pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod inactivity;
pub mod logging;
pub mod pairing;
pub mod settings;
pub mod surface;
pub mod vault_sync;

#[cfg(test)]
mod testing;

pub use blocking::{BlockingStateMonitor, ModalGuard, MonitorPhase, MonitorSnapshot};
pub use bridge::{
    BackgroundMessenger, BackgroundRequest, BlockingKind, BlockingState, Identity,
    SecureChannelBridge, UserData, VaultClient,
};
pub use config::GateConfig;
pub use connection::{ConnectionRetryController, RetryOutcome};
pub use error::{BridgeError, Error, PairingError, Result};
pub use events::{EventHub, PairingRequired, RuntimeMessage, Subscription, VaultClientEvent};
pub use inactivity::{ActivityKind, AutoLockPreferences, InactivityPolicy, InactivityTimer};
pub use pairing::{PairSuccessHandler, PairingCoordinator, PairingSession, PairingStep};
pub use settings::{MemorySettingsStore, SettingsStore};
pub use surface::{Modal, Route, Surface};
