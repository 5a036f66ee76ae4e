//! Store trait and the in-memory session backend

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store file: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Lifetime of the values held by a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Cleared whenever the owning process restarts
    Session,
    /// Survives restarts
    Durable,
}

/// A key-value store holding JSON values
///
/// `get` returns only the keys that are present; absent keys are simply
/// missing from the result.
pub trait KvStore: Send + Sync {
    /// Read the given keys
    fn get(&self, keys: &[&str]) -> StoreResult<BTreeMap<String, Value>>;

    /// Write all entries, replacing existing values
    fn set(&mut self, entries: BTreeMap<String, Value>) -> StoreResult<()>;

    /// Remove a key (no-op when absent)
    fn remove(&mut self, key: &str) -> StoreResult<()>;

    /// All keys currently present
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Which lifetime this store provides
    fn scope(&self) -> Scope;
}

/// Session-scoped store held entirely in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> StoreResult<BTreeMap<String, Value>> {
        debug!(?keys, "MemoryStore::get: called");
        Ok(keys
            .iter()
            .filter_map(|k| self.values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&mut self, entries: BTreeMap<String, Value>) -> StoreResult<()> {
        debug!(count = entries.len(), "MemoryStore::set: called");
        self.values.extend(entries);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        debug!(%key, "MemoryStore::remove: called");
        self.values.remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.values.keys().cloned().collect())
    }

    fn scope(&self) -> Scope {
        Scope::Session
    }
}
