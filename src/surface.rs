//! The view-side collaborator.
//!
//! Rendering, routing and toasts live outside this crate. The gate drives
//! them through [`Surface`], which the host implements over its UI layer.

use crate::connection::ConnectionRetryController;
use crate::pairing::PairingCoordinator;

/// Entry points the gate can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// The unlocked vault list.
    Vaults,
    /// Master password entry (a fresh login).
    MasterPassword,
}

/// How a modal should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModalPresentation {
    pub closeable: bool,
    pub full_screen: bool,
    pub has_overlay: bool,
}

impl ModalPresentation {
    /// Pairing: a regular card the user cannot dismiss.
    pub const PAIRING: Self = Self {
        closeable: false,
        full_screen: false,
        has_overlay: true,
    };

    /// Connection: full-screen, no overlay, not dismissable.
    pub const CONNECTION: Self = Self {
        closeable: false,
        full_screen: true,
        has_overlay: false,
    };
}

/// A modal the gate asks the surface to show, with the handle that drives it.
pub enum Modal {
    Pairing(PairingCoordinator),
    Connection(ConnectionRetryController),
}

impl Modal {
    pub fn name(&self) -> &'static str {
        match self {
            Modal::Pairing(_) => "pairing",
            Modal::Connection(_) => "connection",
        }
    }

    pub fn presentation(&self) -> ModalPresentation {
        match self {
            Modal::Pairing(_) => ModalPresentation::PAIRING,
            Modal::Connection(_) => ModalPresentation::CONNECTION,
        }
    }
}

impl std::fmt::Debug for Modal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Modal").field(&self.name()).finish()
    }
}

/// UI effects requested by the gate.
pub trait Surface: Send + Sync {
    /// Show a transient notification.
    fn notify(&self, message: &str);

    fn open_modal(&self, modal: Modal);

    fn close_all_modals(&self);

    fn navigate(&self, route: Route);

    fn set_loading(&self, loading: bool);
}
