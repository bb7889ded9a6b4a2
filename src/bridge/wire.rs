//! JSON reply shapes used by the companion's secure channel.
//!
//! The companion answers with `{ success, ... }` records. These types parse
//! them and fold them into the `Result` form the [`super::SecureChannelBridge`]
//! trait returns.

use serde::{Deserialize, Serialize};

use super::{BlockingState, Identity};
use crate::error::BridgeError;

/// Reply to `getBlockingState`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingStateReply {
    pub success: bool,
    #[serde(default)]
    pub blocking_state: Option<BlockingState>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl BlockingStateReply {
    pub fn into_result(self) -> Result<Option<BlockingState>, BridgeError> {
        if self.success {
            Ok(self.blocking_state)
        } else {
            Err(BridgeError::from_code(
                self.code.as_deref(),
                self.error
                    .unwrap_or_else(|| "blocking state unavailable".to_string()),
            ))
        }
    }
}

/// Reply to `getIdentity`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityReply {
    pub success: bool,
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl IdentityReply {
    /// A successful reply without an identity is still a failure.
    pub fn into_result(self) -> Result<Identity, BridgeError> {
        match (self.success, self.identity) {
            (true, Some(identity)) => Ok(identity),
            _ => Err(BridgeError::from_code(
                self.code.as_deref(),
                self.error.unwrap_or_else(|| "identity unavailable".to_string()),
            )),
        }
    }
}

/// Reply to `confirmPair`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConfirmPairReply {
    #[serde(default)]
    pub confirmed: bool,
}

/// Reply to `pinIdentity`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PinIdentityReply {
    #[serde(default)]
    pub success: bool,
}

/// Error reply carried by any failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl From<ErrorReply> for BridgeError {
    fn from(reply: ErrorReply) -> Self {
        BridgeError::from_code(reply.code.as_deref(), reply.message)
    }
}
