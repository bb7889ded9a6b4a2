//! Background vault sync on navigation.
//!
//! Each time the visible page changes the extension asks the desktop app for
//! fresh vault data. Failures are logged and otherwise ignored; the next page
//! change tries again.

use std::sync::Arc;

use tokio::sync::watch;

use crate::bridge::VaultClient;
use crate::events::Subscription;

/// Run one sync. Returns whether it succeeded.
pub async fn sync_vault(vault: &dyn VaultClient) -> bool {
    match vault.sync_vault().await {
        Ok(()) => {
            tracing::debug!("Vault synced");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Vault sync failed");
            false
        }
    }
}

/// Sync once for the current page, then again on every page change.
pub fn sync_on_navigation(
    vault: Arc<dyn VaultClient>,
    mut pages: watch::Receiver<String>,
) -> Subscription {
    Subscription::spawn("vault-sync", async move {
        loop {
            let page = pages.borrow_and_update().clone();
            tracing::trace!(%page, "Page changed, syncing vault");
            sync_vault(vault.as_ref()).await;
            if pages.changed().await.is_err() {
                break;
            }
        }
    })
}
