//! Pairing-required signals and scoped subscriptions.
//!
//! Two independent sources can demand pairing at any time:
//!
//! ```text
//! vault client (in-process) ──► VaultClientEvent::PairingRequired ─┐
//!                                                                   ├─► pairing_required_stream
//! background runtime (push) ──► RuntimeMessage::PairingRequired ───┘
//! ```
//!
//! Both are carried on `tokio::sync::broadcast` channels owned by an
//! [`EventHub`]. Listeners are held as [`Subscription`]s that stop their task
//! when dropped.

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Capacity of each event channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Pairing has become required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRequired {
    #[serde(default)]
    pub reason: String,
}

/// Events emitted by the in-process vault client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultClientEvent {
    PairingRequired(PairingRequired),
}

/// Messages pushed by the background runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeMessage {
    PairingRequired {
        #[serde(default)]
        reason: String,
    },
    /// Any message type this crate does not handle.
    #[serde(other)]
    Other,
}

impl RuntimeMessage {
    fn pairing_required(self) -> Option<PairingRequired> {
        match self {
            RuntimeMessage::PairingRequired { reason } => Some(PairingRequired { reason }),
            RuntimeMessage::Other => None,
        }
    }
}

/// Owner of the event channels for one extension surface.
#[derive(Debug, Clone)]
pub struct EventHub {
    vault_tx: broadcast::Sender<VaultClientEvent>,
    runtime_tx: broadcast::Sender<RuntimeMessage>,
}

impl EventHub {
    pub fn new() -> Self {
        let (vault_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (runtime_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            vault_tx,
            runtime_tx,
        }
    }

    /// Publish an in-process vault client event. Returns the listener count.
    pub fn emit_vault_event(&self, event: VaultClientEvent) -> usize {
        self.vault_tx.send(event).unwrap_or(0)
    }

    /// Deliver a message pushed by the background runtime.
    pub fn deliver_runtime_message(&self, message: RuntimeMessage) -> usize {
        self.runtime_tx.send(message).unwrap_or(0)
    }

    /// Merged stream of pairing demands from both sources.
    pub fn pairing_required_stream(&self) -> impl Stream<Item = PairingRequired> + Send + 'static {
        pairing_required_stream(self.vault_tx.subscribe(), self.runtime_tx.subscribe())
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge both sources into one stream of pairing demands.
///
/// Unrelated runtime messages are skipped. A lagged receiver is logged and
/// skipped; the next delivered demand still gets through.
pub fn pairing_required_stream(
    vault_rx: broadcast::Receiver<VaultClientEvent>,
    runtime_rx: broadcast::Receiver<RuntimeMessage>,
) -> impl Stream<Item = PairingRequired> + Send + 'static {
    let vault = BroadcastStream::new(vault_rx).filter_map(|event| match event {
        Ok(VaultClientEvent::PairingRequired(required)) => Some(required),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "Vault event listener lagged");
            None
        }
    });

    let runtime = BroadcastStream::new(runtime_rx).filter_map(|message| match message {
        Ok(message) => message.pairing_required(),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "Runtime message listener lagged");
            None
        }
    });

    vault.merge(runtime)
}

/// A live listener task, stopped when dropped.
#[derive(Debug)]
pub struct Subscription {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawn `task` as a listener named `name`.
    pub fn spawn<F>(name: &'static str, task: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::debug!(subscription = name, "Subscribed");
        Self {
            name,
            handle: Some(tokio::spawn(task)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the listener task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the listener now.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!(subscription = self.name, "Unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}
