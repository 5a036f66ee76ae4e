//! SessionStore - key-value snapshot storage
//!
//! Two scopes back the same `get` / `set` / `remove` interface:
//!
//! - **Session**: [`MemoryStore`], lives as long as the owning process and is
//!   blank on every restart.
//! - **Durable**: [`FileStore`], a single JSON object on disk that survives
//!   restarts. Writes take an exclusive file lock.
//!
//! # Example
//!
//! ```ignore
//! use sessionstore::{FileStore, KvStore};
//! use std::collections::BTreeMap;
//!
//! let mut store = FileStore::open("durable.json")?;
//! store.set(BTreeMap::from([("preferences".to_string(), serde_json::json!({}))]))?;
//! let values = store.get(&["preferences"])?;
//! ```

pub mod cli;
pub mod config;
mod file;
mod store;

pub use file::FileStore;
pub use store::{KvStore, MemoryStore, Scope, StoreError, StoreResult};

/// Default file name for the durable store
pub const DEFAULT_STORE_FILE: &str = "durable.json";
