//! Local key-value settings store.
//!
//! The background process owns persistence; the extension reads values and
//! watches changes through [`SettingsStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};

use crate::error::StoreError;

/// Capacity of the change broadcast.
const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// A single key change. `new_value` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingChange {
    pub key: String,
    pub new_value: Option<Value>,
}

/// Read access to the local settings store plus change notifications.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Values for `keys`; missing keys are absent from the map.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;

    /// Subscribe to key changes.
    fn subscribe(&self) -> broadcast::Receiver<SettingChange>;
}

/// In-memory store with change broadcast.
#[derive(Debug)]
pub struct MemorySettingsStore {
    values: RwLock<HashMap<String, Value>>,
    tx: broadcast::Sender<SettingChange>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            tx,
        }
    }

    /// Write `value` under `key` and notify subscribers.
    pub async fn set(&self, key: &str, value: Value) {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.clone());
        let _ = self.tx.send(SettingChange {
            key: key.to_string(),
            new_value: Some(value),
        });
    }

    /// Remove `key` and notify subscribers.
    pub async fn remove(&self, key: &str) {
        if self.values.write().await.remove(key).is_some() {
            let _ = self.tx.send(SettingChange {
                key: key.to_string(),
                new_value: None,
            });
        }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let values = self.values.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_get_returns_only_present_keys() {
        let store = MemorySettingsStore::new();
        store.set("autoLockEnabled", json!(true)).await;

        let values = store.get(&["autoLockEnabled", "missing"]).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["autoLockEnabled"], json!(true));
    }

    #[tokio::test]
    async fn test_set_and_remove_broadcast_changes() {
        let store = MemorySettingsStore::new();
        let mut rx = store.subscribe();

        store.set("autoLockTimeoutMs", Value::Null).await;
        store.remove("autoLockTimeoutMs").await;
        store.remove("autoLockTimeoutMs").await;

        let first = rx.try_recv().unwrap();
        assert_eq!(first.new_value, Some(Value::Null));
        let second = rx.try_recv().unwrap();
        assert_eq!(second.new_value, None);
        assert!(rx.try_recv().is_err());
    }
}
