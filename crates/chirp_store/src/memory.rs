//! In-memory session store for testing.

use crate::error::StoreResult;
use crate::store::SessionStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory session store.
///
/// Nothing survives the process. Suitable for:
/// - Unit tests
/// - Integration tests
/// - Sessions that should end with the process
///
/// # Example
///
/// ```rust
/// use chirp_store::{SessionStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.set("user", "{}").unwrap();
/// assert_eq!(store.keys().unwrap(), vec!["user".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing entries.
    ///
    /// Useful for testing partially-written sessions.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SessionStore for InMemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn set_get_remove() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());

        store.set("token", "t1").unwrap();
        store.set("token", "t2").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("t2"));
        assert_eq!(store.len(), 1);

        store.remove("token").unwrap();
        assert_eq!(store.get("token").unwrap(), None);
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let store = InMemoryStore::new();
        store.remove("nothing").unwrap();
    }

    #[test]
    fn with_entries_seeds_store() {
        let store = InMemoryStore::with_entries([("user", "{}")]);
        assert_eq!(store.get("user").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get("token").unwrap(), None);
    }

    proptest! {
        #[test]
        fn last_write_wins(values in prop::collection::vec(".*", 1..20)) {
            let store = InMemoryStore::new();
            for v in &values {
                store.set("k", v).unwrap();
            }
            prop_assert_eq!(store.get("k").unwrap(), values.last().cloned());
        }
    }
}
