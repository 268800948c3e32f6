//! Persisted key-value state
//!
//! Provides:
//! - `KeyValueStore`, the get/set contract every backend implements
//! - `InMemoryStore` for tests and throwaway sessions
//! - `SqliteKvStore` for state that survives restarts
//! - `SnapshotStore`, which serializes read-modify-write per process

pub mod sqlite;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::memory::LearningMemory;

pub use sqlite::{KvStats, SqliteKvStore};

/// Key holding the `LearningMemory` snapshot
pub const MEMORY_KEY: &str = "learning-memory";
/// Key holding the `UserProfile`
pub const PROFILE_KEY: &str = "user-profile";
/// Key holding the `ProgressMetrics`
pub const METRICS_KEY: &str = "progress-metrics";
/// Key holding the daily challenge state
pub const CHALLENGE_KEY: &str = "daily-challenge";

/// Generic persisted key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `default` when absent
    async fn get(&self, key: &str, default: Value) -> Result<Value>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;
}

/// Process-local store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str, default: Value) -> Result<Value> {
        Ok(self.entries.read().await.get(key).cloned().unwrap_or(default))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Typed access to a `KeyValueStore`.
///
/// `update` holds a lock across read, transform and write, so concurrent
/// updates in this process always fold over the latest stored value.
pub struct SnapshotStore<S: ?Sized> {
    store: Arc<S>,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore + ?Sized> SnapshotStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Load `key`, falling back to `T::default()` when nothing is stored
    pub async fn load<T>(&self, key: &str) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let default = serde_json::to_value(T::default())?;
        let raw = self.store.get(key, default).await?;
        serde_json::from_value(raw).with_context(|| format!("Failed to decode stored '{}'", key))
    }

    /// Load `key`, or `None` when nothing is stored
    pub async fn load_optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key, Value::Null).await? {
            Value::Null => Ok(None),
            raw => serde_json::from_value(raw)
                .map(Some)
                .with_context(|| format!("Failed to decode stored '{}'", key)),
        }
    }

    pub async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(key, value).await
    }

    /// Read the latest value, apply `f`, write and return the result
    pub async fn update<T, F>(&self, key: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&T) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let current: T = self.load(key).await?;
        let next = f(&current);
        self.write(key, &next).await?;
        Ok(next)
    }

    /// Like `update`, for values with no sensible default
    pub async fn update_optional<T, F>(&self, key: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<&T>) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let current: Option<T> = self.load_optional(key).await?;
        let next = f(current.as_ref());
        self.write(key, &next).await?;
        Ok(next)
    }

    /// Latest learner memory with invariants re-applied
    pub async fn load_memory(&self) -> Result<LearningMemory> {
        Ok(self.load::<LearningMemory>(MEMORY_KEY).await?.normalize())
    }

    pub async fn update_memory<F>(&self, f: F) -> Result<LearningMemory>
    where
        F: FnOnce(&LearningMemory) -> LearningMemory,
    {
        self.update(MEMORY_KEY, |current: &LearningMemory| {
            f(&current.clone().normalize())
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(key).await
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_value(value).context("Failed to encode snapshot")?;
        self.store.set(key, raw).await?;
        debug!("Persisted snapshot '{}'", key);
        Ok(())
    }
}
