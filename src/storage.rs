/*!
 * In-Memory Keyspace
 *
 * Two maps make up the keyspace: a flat string map behind a reader-writer
 * lock and a hash-of-hashes behind a plain mutex. Entries live until
 * explicitly deleted; there is no expiry.
 */

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

/// Shared keyspace, threaded through every session and the replay driver.
#[derive(Default)]
pub struct Store {
    strings: RwLock<HashMap<String, String>>,
    hashes: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: String, value: String) {
        self.strings.write().insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.strings.read().get(key).cloned()
    }

    /// Remove a flat key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.strings.write().remove(key).is_some()
    }

    pub fn hset(&self, hash: String, field: String, value: String) {
        self.hashes
            .lock()
            .entry(hash)
            .or_default()
            .insert(field, value);
    }

    pub fn hget(&self, hash: &str, field: &str) -> Option<String> {
        self.hashes
            .lock()
            .get(hash)
            .and_then(|fields| fields.get(field))
            .cloned()
    }

    /// Values across all hashes, or across one hash when a filter is
    /// given. Iteration order is unspecified.
    pub fn hash_values(&self, filter: Option<&str>) -> Vec<String> {
        let hashes = self.hashes.lock();
        let mut values = Vec::new();
        for (name, fields) in hashes.iter() {
            if let Some(wanted) = filter {
                if name != wanted {
                    continue;
                }
            }
            values.extend(fields.values().cloned());
        }
        values
    }
}
