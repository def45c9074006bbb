//! Store Module
//!
//! The key-value backend the server's handlers operate on.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Contract for a key-value backend
///
/// The protocol treats storage as an opaque collaborator; any backend
/// satisfying this contract may be substituted for the in-memory map.
pub trait Store: Send + Sync {
    /// Look up a value by key
    fn get(&self, key: &str) -> Option<String>;

    /// Insert or overwrite a key-value pair
    fn set(&self, key: String, value: String);

    /// Remove a key, returning whether it was present
    fn delete(&self, key: &str) -> bool;
}

/// In-memory store shared across all server connections
///
/// Connection handlers run on their own threads, so the map is guarded by an
/// RwLock: many concurrent GETs, exclusive SET/DELETE.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: String, value: String) {
        self.entries.write().insert(key, value);
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }
}
