//! Pairing with the companion desktop application.
//!
//! The user copies a token from the desktop app, the extension fetches and
//! shows the companion identity, and the master password commits the pair:
//!
//! ```text
//! Token ──fetch_identity──► Password ──complete_pairing──► paired
//!   ▲                          │
//!   └── revalidation failure, ─┘
//!       mismatch, commit
//!       failure or back()
//! ```

mod coordinator;
mod session;

pub use coordinator::{PairSuccessHandler, PairingCoordinator};
pub use session::{PairingSession, PairingStep};
