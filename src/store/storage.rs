//! Key/value backends behind the token store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::StoreError;

/// String-keyed storage for session credentials.
///
/// Writes are batched so file-backed storage rewrites its document once per
/// logical update.
pub trait TokenStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_items(&self, items: &[(&str, &str)]) -> Result<(), StoreError>;
    fn remove_items(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// Process-local storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed storage with existing entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set_items(&self, items: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut entries = self.entries();
        for (key, value) in items {
            entries.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_items(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self.entries();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        storage
            .set_items(&[("access_token", "a"), ("refresh_token", "r")])
            .unwrap();
        assert_eq!(storage.get_item("access_token").unwrap().as_deref(), Some("a"));

        storage.remove_items(&["access_token", "missing"]).unwrap();
        assert_eq!(storage.get_item("access_token").unwrap(), None);
        assert_eq!(storage.get_item("refresh_token").unwrap().as_deref(), Some("r"));
    }
}
