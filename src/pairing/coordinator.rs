//! Pairing coordinator.
//!
//! Drives one pairing attempt from token entry to a bootstrapped session.
//! The commit sequence in [`PairingCoordinator::complete_pairing`] is strictly
//! ordered: each step runs only after the previous one succeeded, so a failed
//! or spoofed step never reaches the side effects behind it.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::session::{PairingSession, PairingStep};
use crate::bridge::{Identity, SecureChannelBridge, VaultClient};
use crate::error::{BridgeError, PairingError};
use crate::surface::Surface;

const DESKTOP_VERIFIED_MESSAGE: &str = "Desktop verified! Enter your master password to complete.";
const PAIRED_MESSAGE: &str = "Paired successfully!";

/// Receives control once pairing fully succeeds.
///
/// Responsible for closing the pairing UI and entering the unlocked session.
#[async_trait]
pub trait PairSuccessHandler: Send + Sync {
    async fn on_pair_success(&self);
}

/// Handle driving a pairing attempt. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct PairingCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    bridge: Arc<dyn SecureChannelBridge>,
    vault: Arc<dyn VaultClient>,
    surface: Arc<dyn Surface>,
    on_success: Arc<dyn PairSuccessHandler>,
    min_token_len: usize,
    session: Mutex<PairingSession>,
}

/// Clears the busy flag when the action ends, however it ends.
struct BusyGuard<'a> {
    session: &'a Mutex<PairingSession>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock(self.session).busy = false;
    }
}

fn lock(session: &Mutex<PairingSession>) -> MutexGuard<'_, PairingSession> {
    session
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PairingCoordinator {
    pub fn new(
        bridge: Arc<dyn SecureChannelBridge>,
        vault: Arc<dyn VaultClient>,
        surface: Arc<dyn Surface>,
        on_success: Arc<dyn PairSuccessHandler>,
        min_token_len: usize,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                bridge,
                vault,
                surface,
                on_success,
                min_token_len,
                session: Mutex::new(PairingSession::default()),
            }),
        }
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> PairingSession {
        lock(&self.inner.session).clone()
    }

    pub fn step(&self) -> PairingStep {
        lock(&self.inner.session).step
    }

    pub fn identity(&self) -> Option<Identity> {
        lock(&self.inner.session).identity.clone()
    }

    /// While busy, every action is refused with [`PairingError::Busy`].
    pub fn is_busy(&self) -> bool {
        lock(&self.inner.session).busy
    }

    pub fn is_complete(&self) -> bool {
        lock(&self.inner.session).completed
    }

    /// Navigate back to token entry, dropping the verified identity.
    pub fn back(&self) {
        let mut session = lock(&self.inner.session);
        if session.busy {
            tracing::debug!("Ignoring back navigation while pairing is busy");
            return;
        }
        session.restart();
        tracing::debug!("Pairing flow returned to token step");
    }

    fn begin(&self) -> Result<BusyGuard<'_>, PairingError> {
        let mut session = lock(&self.inner.session);
        if session.busy {
            tracing::debug!("Pairing action refused: another action is in flight");
            return Err(PairingError::Busy);
        }
        session.busy = true;
        Ok(BusyGuard {
            session: &self.inner.session,
        })
    }

    fn fail(&self, err: PairingError) -> PairingError {
        self.inner.surface.notify(err.user_message());
        err
    }

    /// Verify the companion identity for `token`.
    ///
    /// Tokens shorter than the configured minimum (after trimming) are
    /// rejected without a round trip. On success the session moves to
    /// [`PairingStep::Password`].
    pub async fn fetch_identity(&self, token: &str) -> Result<PairingStep, PairingError> {
        let token = token.trim();
        if token.is_empty() || token.chars().count() < self.inner.min_token_len {
            tracing::debug!(len = token.len(), "Rejected short pairing token");
            return Err(self.fail(PairingError::InvalidToken {
                min_len: self.inner.min_token_len,
            }));
        }

        let _busy = self.begin()?;

        match self.inner.bridge.get_identity(token).await {
            Ok(identity) => {
                tracing::info!(
                    fingerprint = identity.short_fingerprint().unwrap_or("-"),
                    "Companion identity verified"
                );
                lock(&self.inner.session).verified(token.to_string(), identity);
                self.inner.surface.notify(DESKTOP_VERIFIED_MESSAGE);
                Ok(PairingStep::Password)
            }
            Err(source) => {
                tracing::error!(step = "fetch_identity", error = %source, "Failed to fetch identity");
                Err(self.fail(PairingError::IdentityUnavailable { source }))
            }
        }
    }

    /// Commit the pairing with the master password.
    ///
    /// Revalidates the identity, unlocks the keystore, confirms and pins the
    /// pairing, then logs in and opens the vaults. On success the
    /// [`PairSuccessHandler`] is invoked.
    pub async fn complete_pairing(&self, password: SecretString) -> Result<(), PairingError> {
        let held = {
            let session = lock(&self.inner.session);
            if session.completed {
                drop(session);
                return Err(self.fail(PairingError::AlreadyPaired));
            }
            session
                .identity
                .clone()
                .map(|identity| (session.token.clone(), identity))
        };
        let Some((token, verified)) = held else {
            return Err(self.fail(PairingError::IdentityRequired));
        };
        if password.expose_secret().is_empty() {
            return Err(self.fail(PairingError::PasswordRequired));
        }

        let busy = self.begin()?;

        if let Err(err) = self.commit(&token, &verified, &password).await {
            tracing::error!(error = %err, "Failed to complete pairing");
            return Err(self.fail(err));
        }

        lock(&self.inner.session).completed = true;
        drop(busy);

        tracing::info!("Pairing completed");
        self.inner.surface.notify(PAIRED_MESSAGE);
        self.inner.on_success.on_pair_success().await;
        Ok(())
    }

    async fn commit(
        &self,
        token: &str,
        verified: &Identity,
        password: &SecretString,
    ) -> Result<(), PairingError> {
        let identity = self.revalidate(token, verified).await?;
        self.unlock_keystore(password).await?;
        self.confirm_and_pin(&identity).await?;
        self.bootstrap_session(password).await
    }

    /// Re-fetch the identity and require it to match the verified one.
    async fn revalidate(&self, token: &str, verified: &Identity) -> Result<Identity, PairingError> {
        let fresh = match self.inner.bridge.get_identity(token).await {
            Ok(identity) => identity,
            Err(source) => {
                tracing::warn!(step = "revalidate", error = %source, "Identity revalidation failed");
                lock(&self.inner.session).restart();
                return Err(PairingError::RevalidationFailed { source });
            }
        };

        if !fresh.matches(verified) {
            tracing::warn!(
                step = "revalidate",
                "Companion identity changed between verification and commit"
            );
            lock(&self.inner.session).restart();
            return Err(PairingError::IdentityMismatch);
        }

        Ok(fresh)
    }

    /// Only a rejected password stops the flow; other keystore errors are
    /// logged and the flow continues.
    async fn unlock_keystore(&self, password: &SecretString) -> Result<(), PairingError> {
        match self.inner.bridge.unlock_client_keystore(password).await {
            Ok(()) => Ok(()),
            Err(BridgeError::MasterPasswordRequired(reason)) => {
                tracing::error!(step = "unlock_keystore", %reason, "Keystore rejected password");
                Err(PairingError::IncorrectPassword)
            }
            Err(e) => {
                tracing::warn!(step = "unlock_keystore", error = %e, "Keystore error, continuing");
                Ok(())
            }
        }
    }

    /// Confirm and pin. If either fails, unpair to undo the half-commit.
    async fn confirm_and_pin(&self, identity: &Identity) -> Result<(), PairingError> {
        let confirmed = match self.inner.bridge.confirm_pair().await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                tracing::warn!(step = "confirm_pair", error = %e, "Pair confirmation failed");
                false
            }
        };
        let pinned = match self.inner.bridge.pin_identity(identity).await {
            Ok(pinned) => pinned,
            Err(e) => {
                tracing::warn!(step = "pin_identity", error = %e, "Identity pinning failed");
                false
            }
        };

        if confirmed && pinned {
            return Ok(());
        }

        tracing::warn!(confirmed, pinned, "Rolling back partial pairing");
        lock(&self.inner.session).restart();
        if let Err(e) = self.inner.bridge.unpair().await {
            tracing::error!(step = "unpair", error = %e, "Rollback unpair failed");
        }
        Err(PairingError::PairingFailed { confirmed, pinned })
    }

    /// The pairing stays committed even if this fails.
    async fn bootstrap_session(&self, password: &SecretString) -> Result<(), PairingError> {
        let result = async {
            self.inner.vault.log_in(password).await?;
            self.inner.vault.init_vaults(password).await
        }
        .await;

        result.map_err(|source| {
            tracing::error!(step = "bootstrap", error = %source, "Paired but session bootstrap failed");
            PairingError::SessionBootstrap { source }
        })
    }
}

impl std::fmt::Debug for PairingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingCoordinator")
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}
