//! Adapter-private session metadata shared by every query of a grabber.
//!
//! Extractors cache values such as API tokens here, keyed first by extractor
//! kind and then by an extractor-chosen key. Concurrent writers race on the
//! same key during expansion; the first value stored wins and later writers
//! receive it back instead of overwriting it.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// Serialisable snapshot of the session store: extractor kind to key/value blob.
pub type Metadata = HashMap<String, HashMap<String, Value>>;

/// Concurrency-safe key/value store with first-writer-wins semantics.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    entries: Arc<DashMap<(String, String), Value>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded from a previously saved snapshot.
    #[must_use]
    pub fn from_metadata(metadata: Metadata) -> Self {
        let store = Self::new();
        for (kind, blob) in metadata {
            for (key, value) in blob {
                store.entries.insert((kind.clone(), key), value);
            }
        }
        store
    }

    /// Returns the value stored for `kind`/`key`, if any.
    #[must_use]
    pub fn get(&self, kind: &str, key: &str) -> Option<Value> {
        self.entries
            .get(&(kind.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Stores `value` unless a value is already present; returns the value
    /// that ends up stored.
    pub fn insert_if_absent(&self, kind: &str, key: &str, value: Value) -> Value {
        self.entries
            .entry((kind.to_string(), key.to_string()))
            .or_insert(value)
            .value()
            .clone()
    }

    /// Removes `stale` so the next writer can replace it.
    ///
    /// A value that no longer equals `stale` was already refreshed by another
    /// task and is kept. Returns true if the entry was removed.
    pub fn invalidate(&self, kind: &str, key: &str, stale: &Value) -> bool {
        self.entries
            .remove_if(&(kind.to_string(), key.to_string()), |_, current| current == stale)
            .is_some()
    }

    /// Returns a snapshot suitable for persisting between runs.
    #[must_use]
    pub fn snapshot(&self) -> Metadata {
        let mut metadata = Metadata::new();
        for entry in self.entries.iter() {
            let (kind, key) = entry.key();
            metadata
                .entry(kind.clone())
                .or_default()
                .insert(key.clone(), entry.value().clone());
        }
        metadata
    }
}
