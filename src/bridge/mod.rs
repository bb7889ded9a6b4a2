//! Contracts for the collaborators the gate talks to.
//!
//! The gate does not implement the secure channel, the vault engine or the
//! background process. It consumes them through the traits in this module:
//!
//! ```text
//! ┌──────────────────┐  SecureChannelBridge   ┌────────────────────┐
//! │                  │ ─────────────────────► │ companion desktop  │
//! │  companion-gate  │  VaultClient           ├────────────────────┤
//! │                  │ ─────────────────────► │ vault engine       │
//! │                  │  BackgroundMessenger   ├────────────────────┤
//! │                  │ ─────────────────────► │ background runtime │
//! └──────────────────┘                        └────────────────────┘
//! ```
//!
//! Implementations that speak JSON can reuse the reply shapes in [`wire`].

pub mod wire;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{BridgeError, VaultError};

/// Why the extension is blocked from normal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingKind {
    /// The extension is not paired with the companion app.
    Pairing,
    /// The companion app is unreachable.
    Connection,
}

impl std::fmt::Display for BlockingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockingKind::Pairing => write!(f, "pairing"),
            BlockingKind::Connection => write!(f, "connection"),
        }
    }
}

/// A condition preventing normal operation until resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingState {
    #[serde(rename = "state")]
    pub kind: BlockingKind,
    /// Free-form reason reported by the companion.
    #[serde(rename = "error", default)]
    pub detail: String,
}

impl BlockingState {
    pub fn pairing(detail: impl Into<String>) -> Self {
        Self {
            kind: BlockingKind::Pairing,
            detail: detail.into(),
        }
    }

    pub fn connection(detail: impl Into<String>) -> Self {
        Self {
            kind: BlockingKind::Connection,
            detail: detail.into(),
        }
    }
}

/// The companion application's long-term identity.
///
/// Opaque key material; never persisted here. Pinning is the bridge's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "ed25519PublicKey")]
    pub signing_public_key: String,
    #[serde(rename = "x25519PublicKey", default)]
    pub agreement_public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Identity {
    /// Compare every field against `other` without short-circuiting on the
    /// first differing byte.
    pub fn matches(&self, other: &Identity) -> bool {
        let signing = self
            .signing_public_key
            .as_bytes()
            .ct_eq(other.signing_public_key.as_bytes());
        let agreement = self
            .agreement_public_key
            .as_bytes()
            .ct_eq(other.agreement_public_key.as_bytes());
        let fingerprint = match (&self.fingerprint, &other.fingerprint) {
            (Some(a), Some(b)) => a.as_bytes().ct_eq(b.as_bytes()),
            (None, None) => 1u8.into(),
            _ => 0u8.into(),
        };
        bool::from(signing & agreement & fingerprint)
    }

    /// First 32 characters of the fingerprint, for display.
    pub fn short_fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref().map(|fp| match fp.char_indices().nth(32) {
            Some((idx, _)) => &fp[..idx],
            None => fp,
        })
    }
}

/// Request/response interface to the companion application.
#[async_trait]
pub trait SecureChannelBridge: Send + Sync {
    /// Current block condition, `None` when unblocked.
    async fn get_blocking_state(&self) -> Result<Option<BlockingState>, BridgeError>;

    /// Fetch the companion identity for a pairing token.
    async fn get_identity(&self, token: &str) -> Result<Identity, BridgeError>;

    /// Ask the companion to confirm the pending pairing.
    async fn confirm_pair(&self) -> Result<bool, BridgeError>;

    /// Durably record `identity` as trusted.
    async fn pin_identity(&self, identity: &Identity) -> Result<bool, BridgeError>;

    /// Drop any pairing state on both ends.
    async fn unpair(&self) -> Result<(), BridgeError>;

    /// Unlock the local client keystore.
    ///
    /// Fails with [`BridgeError::MasterPasswordRequired`] on a wrong password.
    async fn unlock_client_keystore(&self, password: &SecretString) -> Result<(), BridgeError>;
}

/// Login status reported by the vault client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub is_logged_in: bool,
}

/// Narrow contract to the vault engine.
#[async_trait]
pub trait VaultClient: Send + Sync {
    async fn log_in(&self, password: &SecretString) -> Result<(), VaultError>;

    async fn init_vaults(&self, password: &SecretString) -> Result<(), VaultError>;

    async fn sync_vault(&self) -> Result<(), VaultError>;

    /// Re-read the current user's login status.
    async fn user_data(&self) -> Result<UserData, VaultError>;

    /// Forget the in-memory session and vault selection.
    async fn reset_state(&self);
}

/// Fire-and-forget messages sent to the background process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundRequest {
    /// The user is still active; push back the background's own lock timer.
    ResetTimer,
    SetAutoLockEnabled {
        #[serde(rename = "autoLockEnabled")]
        enabled: bool,
    },
    SetAutoLockTimeout {
        /// `None` means never lock.
        #[serde(rename = "autoLockTimeoutMs")]
        timeout_ms: Option<u64>,
    },
}

/// Outbound channel to the background process.
pub trait BackgroundMessenger: Send + Sync {
    fn send(&self, request: BackgroundRequest);
}
