//! State of one pairing attempt.

use crate::bridge::Identity;

/// Which input the pairing flow is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PairingStep {
    /// Waiting for the pairing token from the desktop app.
    #[default]
    Token,
    /// Identity verified; waiting for the master password.
    Password,
}

/// Transient state owned by a [`super::PairingCoordinator`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingSession {
    pub step: PairingStep,
    /// Trimmed token the held identity was fetched with.
    pub token: String,
    /// Identity captured at verification time.
    pub identity: Option<Identity>,
    /// An action is in flight; all others are refused.
    pub busy: bool,
    /// The pairing was committed and the session bootstrapped.
    pub completed: bool,
}

impl PairingSession {
    /// Move to the password step with a freshly verified identity.
    pub(crate) fn verified(&mut self, token: String, identity: Identity) {
        self.token = token;
        self.identity = Some(identity);
        self.step = PairingStep::Password;
    }

    /// Back to the token step, dropping the held identity.
    ///
    /// The token text is kept so the user can correct it in place.
    pub(crate) fn restart(&mut self) {
        self.identity = None;
        self.step = PairingStep::Token;
    }
}
