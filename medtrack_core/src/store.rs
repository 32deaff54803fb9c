//! Namespaced key-value storage.
//!
//! Every user owns a slice of the key space:
//! - `user:{userId}:medications` holds the medication array
//! - `user:{userId}:entries:{date}` holds one day of doses
//!
//! Values are JSON text. Backends only need get/put/delete and a prefix scan.

use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Minimal key-value interface the API layer is written against
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
    /// Deleting a missing key is not an error
    fn delete(&self, key: &str) -> Result<()>;
    /// Keys starting with `prefix`, sorted
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list(prefix)
    }
}

// ============================================================================
// Key Layout
// ============================================================================

pub fn medications_key(user_id: &str) -> String {
    format!("user:{}:medications", user_id)
}

pub fn entries_prefix(user_id: &str) -> String {
    format!("user:{}:entries:", user_id)
}

pub fn entries_key(user_id: &str, date: NaiveDate) -> String {
    format!("{}{}", entries_prefix(user_id), date.format("%Y-%m-%d"))
}

/// Recover the date from an entries key of the given user
pub fn parse_entries_key(user_id: &str, key: &str) -> Option<NaiveDate> {
    let date = key.strip_prefix(&entries_prefix(user_id))?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local store, used by tests and `--memory` servers
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Store("memory store lock poisoned".into())
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.read().map_err(poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.map.write().map_err(poisoned)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.map.write().map_err(poisoned)?;
        map.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let map = self.map.read().map_err(poisoned)?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
