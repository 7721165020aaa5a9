use std::fmt;
use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use parking_lot::RwLock;

/// The key/value contract shared by every storage layer.
///
/// Layers compose by wrapping: each one holds the next and forwards to it, so
/// any implementation can stand in for any other. All operations are best
/// effort. A `get` that returns `None` is a miss, whatever the cause (never
/// written, evicted, I/O failure or a race with a concurrent mutation).
pub trait Store: Send + Sync {
  /// Returns the stored bytes for `key`, or `None` on a miss.
  fn get(&self, key: &str) -> Option<Vec<u8>>;

  /// Stores `value` under `key`, replacing any previous value.
  fn set(&self, key: &str, value: &[u8]);

  /// Removes `key`. Removing an absent key is a no-op.
  fn delete(&self, key: &str);
}

impl<S: Store + ?Sized> Store for Arc<S> {
  #[inline]
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    (**self).get(key)
  }

  #[inline]
  fn set(&self, key: &str, value: &[u8]) {
    (**self).set(key, value)
  }

  #[inline]
  fn delete(&self, key: &str) {
    (**self).delete(key)
  }
}

impl<S: Store + ?Sized> Store for Box<S> {
  #[inline]
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    (**self).get(key)
  }

  #[inline]
  fn set(&self, key: &str, value: &[u8]) {
    (**self).set(key, value)
  }

  #[inline]
  fn delete(&self, key: &str) {
    (**self).delete(key)
  }
}

/// An unbounded, thread-safe in-memory store.
///
/// Wrap it in an [`EvictionCache`](crate::EvictionCache) to put it under a
/// byte budget.
#[derive(Default)]
pub struct MemoryStore {
  map: RwLock<HashMap<String, Vec<u8>>>,
}

impl fmt::Debug for MemoryStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemoryStore")
      .field("len", &self.len())
      .finish()
  }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      map: RwLock::new(HashMap::new()),
    }
  }

  /// Returns the number of stored records.
  pub fn len(&self) -> usize {
    self.map.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.read().is_empty()
  }
}

impl Store for MemoryStore {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    self.map.read().get(key).cloned()
  }

  fn set(&self, key: &str, value: &[u8]) {
    let mut map = self.map.write();
    match map.get_mut(key) {
      Some(existing) => {
        existing.clear();
        existing.extend_from_slice(value);
      }
      None => {
        map.insert(key.to_string(), value.to_vec());
      }
    }
  }

  fn delete(&self, key: &str) {
    self.map.write().remove(key);
  }
}
