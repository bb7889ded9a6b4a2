//! Error types for companion-gate.

/// Top-level error type for the gate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Wire-level error codes the bridge attaches to a failed reply.
pub const INVALID_PAIRING_TOKEN_CODE: &str = "INVALID_PAIRING_TOKEN";
pub const MASTER_PASSWORD_REQUIRED_CODE: &str = "MASTER_PASSWORD_REQUIRED";
pub const TIMEOUT_CODE: &str = "TIMEOUT";

/// Errors reported by the secure channel bridge.
///
/// Each variant is a structured classification of what the companion
/// application (or the transport underneath it) reported. Callers branch on
/// the variant, never on the message text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid pairing token: {0}")]
    InvalidPairingToken(String),

    #[error("Master password required: {0}")]
    MasterPasswordRequired(String),

    #[error("Bridge request timed out")]
    Timeout,

    #[error("Bridge rejected request: {0}")]
    Rejected(String),

    #[error("Bridge transport failure: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Build an error from a wire `code` and message.
    ///
    /// Unknown or missing codes become [`BridgeError::Rejected`].
    pub fn from_code(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Some(INVALID_PAIRING_TOKEN_CODE) => Self::InvalidPairingToken(message),
            Some(MASTER_PASSWORD_REQUIRED_CODE) => Self::MasterPasswordRequired(message),
            Some(TIMEOUT_CODE) => Self::Timeout,
            _ => Self::Rejected(message),
        }
    }

    /// The wire code for this error, if it has one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidPairingToken(_) => Some(INVALID_PAIRING_TOKEN_CODE),
            Self::MasterPasswordRequired(_) => Some(MASTER_PASSWORD_REQUIRED_CODE),
            Self::Timeout => Some(TIMEOUT_CODE),
            Self::Rejected(_) | Self::Transport(_) => None,
        }
    }
}

/// Errors raised by the vault client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("Vault login failed: {0}")]
    LoginFailed(String),

    #[error("Vault initialization failed: {0}")]
    InitFailed(String),

    #[error("Vault sync failed: {0}")]
    SyncFailed(String),

    #[error("Vault client unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the local settings store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Settings store read failed: {0}")]
    Read(String),
}

pub const INVALID_TOKEN_MESSAGE: &str = "Please enter a valid pairing token from the desktop app";
pub const IDENTITY_REQUIRED_MESSAGE: &str = "Please verify desktop identity first";
pub const PASSWORD_REQUIRED_MESSAGE: &str = "Please enter your master password";
pub const FAILED_TO_GET_IDENTITY_MESSAGE: &str =
    "Failed to get identity. Please ensure the desktop app is running.";
pub const TIMED_OUT_MESSAGE: &str = "Request timed out. Please ensure the desktop app is running.";
pub const REJECTED_TOKEN_MESSAGE: &str = "Invalid pairing token. Please check and try again.";
pub const IDENTITY_MISMATCH_MESSAGE: &str = "Identity mismatch. Please verify desktop app.";
pub const TOKEN_VALIDATION_FAILED_MESSAGE: &str =
    "Token validation failed. Please enter the new token from desktop.";
pub const INCORRECT_PASSWORD_MESSAGE: &str = "Incorrect password. Please try again.";
pub const PAIRING_FAILED_MESSAGE: &str = "Pairing failed";
pub const INVALID_MASTER_PASSWORD_MESSAGE: &str = "Invalid master password. Please try again.";
pub const PAIRING_BUSY_MESSAGE: &str = "Pairing is already in progress";
pub const ALREADY_PAIRED_MESSAGE: &str = "Desktop app is already paired";

/// Errors from the pairing flow.
///
/// Every variant maps to exactly one user-facing notification via
/// [`PairingError::user_message`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairingError {
    #[error("Pairing token must be at least {min_len} characters")]
    InvalidToken { min_len: usize },

    #[error("No verified identity is held")]
    IdentityRequired,

    #[error("Master password is empty")]
    PasswordRequired,

    #[error("Another pairing action is in flight")]
    Busy,

    #[error("Pairing already completed")]
    AlreadyPaired,

    /// The initial identity fetch failed.
    #[error("Could not fetch companion identity: {source}")]
    IdentityUnavailable {
        #[source]
        source: BridgeError,
    },

    /// Revalidation before commit could not fetch the identity.
    #[error("Identity revalidation failed: {source}")]
    RevalidationFailed {
        #[source]
        source: BridgeError,
    },

    /// The identity changed between verification and commit.
    #[error("Companion identity changed between verification and commit")]
    IdentityMismatch,

    #[error("Keystore rejected the master password")]
    IncorrectPassword,

    /// Confirm or pin did not succeed; the pairing was rolled back.
    #[error("Pairing commit failed (confirmed: {confirmed}, pinned: {pinned})")]
    PairingFailed { confirmed: bool, pinned: bool },

    /// Paired, but logging in or opening vaults failed afterwards.
    #[error("Session bootstrap failed: {source}")]
    SessionBootstrap {
        #[source]
        source: VaultError,
    },
}

impl PairingError {
    /// The notification text shown to the user for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidToken { .. } => INVALID_TOKEN_MESSAGE,
            Self::IdentityRequired => IDENTITY_REQUIRED_MESSAGE,
            Self::PasswordRequired => PASSWORD_REQUIRED_MESSAGE,
            Self::Busy => PAIRING_BUSY_MESSAGE,
            Self::AlreadyPaired => ALREADY_PAIRED_MESSAGE,
            Self::IdentityUnavailable { source } => match source {
                BridgeError::InvalidPairingToken(_) => REJECTED_TOKEN_MESSAGE,
                BridgeError::Timeout => TIMED_OUT_MESSAGE,
                _ => FAILED_TO_GET_IDENTITY_MESSAGE,
            },
            Self::RevalidationFailed { source } => match source {
                BridgeError::Transport(_) => TOKEN_VALIDATION_FAILED_MESSAGE,
                _ => FAILED_TO_GET_IDENTITY_MESSAGE,
            },
            Self::IdentityMismatch => IDENTITY_MISMATCH_MESSAGE,
            Self::IncorrectPassword => INCORRECT_PASSWORD_MESSAGE,
            Self::PairingFailed { .. } => PAIRING_FAILED_MESSAGE,
            Self::SessionBootstrap { .. } => INVALID_MASTER_PASSWORD_MESSAGE,
        }
    }
}

/// Result type alias for the gate.
pub type Result<T> = std::result::Result<T, Error>;
