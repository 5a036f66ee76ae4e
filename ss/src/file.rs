//! Durable store backed by a single JSON file

use fs2::FileExt;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::store::{KvStore, Scope, StoreError, StoreResult};

/// Durable key-value store: one JSON object per file
///
/// Every call re-reads the file so several processes can share it. Writes
/// hold an exclusive lock for the read-merge-write cycle.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open or create a store at the given file path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        debug!(?path, "Opened file store");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> StoreResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        parse_object(&content)
    }

    /// Run a read-modify-write cycle under an exclusive lock
    fn modify(&self, f: impl FnOnce(&mut Map<String, Value>)) -> StoreResult<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let result = rewrite_locked(&mut file, f);

        FileExt::unlock(&file)?;
        result
    }
}

fn parse_object(content: &str) -> StoreResult<Map<String, Value>> {
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(content)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Corrupt(format!("expected a JSON object, found {}", other))),
    }
}

fn rewrite_locked(file: &mut File, f: impl FnOnce(&mut Map<String, Value>)) -> StoreResult<()> {
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let mut map = parse_object(&content)?;

    f(&mut map);

    let json = serde_json::to_string_pretty(&Value::Object(map))?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(json.as_bytes())?;
    file.flush()?;
    Ok(())
}

impl KvStore for FileStore {
    fn get(&self, keys: &[&str]) -> StoreResult<BTreeMap<String, Value>> {
        debug!(?keys, path = %self.path.display(), "FileStore::get: called");
        let map = self.read_all()?;
        Ok(keys
            .iter()
            .filter_map(|k| map.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&mut self, entries: BTreeMap<String, Value>) -> StoreResult<()> {
        debug!(count = entries.len(), "FileStore::set: called");
        self.modify(|map| map.extend(entries))
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        debug!(%key, "FileStore::remove: called");
        self.modify(|map| {
            map.remove(key);
        })
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.read_all()?.keys().cloned().collect())
    }

    fn scope(&self) -> Scope {
        Scope::Durable
    }
}
