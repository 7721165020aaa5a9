use std::fmt;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::lru_list::LruList;
use crate::store::Store;

/// Bookkeeping guarded by the cache mutex.
struct LruState {
  list: LruList,
  // capacity minus the sum of tracked sizes, adjusted incrementally.
  remaining: i64,
}

/// A byte-budgeted LRU decorator over another [`Store`].
///
/// The cache only tracks keys, sizes and recency. Values live in the inner
/// store, which stays authoritative for hits and misses. The mutex covers the
/// bookkeeping alone and is never held while the inner store is called, so a
/// slow backing store does not stall operations on unrelated keys.
///
/// After every `set` the budget is respected, except when a single item larger
/// than the whole capacity is the only one left: it is kept and `remaining`
/// stays negative until something else is written.
pub struct EvictionCache<S> {
  inner: S,
  capacity: i64,
  state: Mutex<LruState>,
}

impl<S> fmt::Debug for EvictionCache<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("EvictionCache")
      .field("capacity", &self.capacity)
      .field("remaining", &state.remaining)
      .field("len", &state.list.len())
      .finish_non_exhaustive()
  }
}

impl<S: Store> EvictionCache<S> {
  /// Wraps `inner` with a budget of `capacity` bytes.
  ///
  /// The capacity must be non-zero and fit in an `i64`.
  pub fn new(inner: S, capacity: u64) -> Result<Self> {
    if capacity == 0 {
      return Err(Error::invalid("capacity", "must be greater than zero"));
    }
    let capacity = i64::try_from(capacity)
      .map_err(|_| Error::invalid("capacity", "must not exceed i64::MAX bytes"))?;

    Ok(Self {
      inner,
      capacity,
      state: Mutex::new(LruState {
        list: LruList::new(),
        remaining: capacity,
      }),
    })
  }
}

impl<S> EvictionCache<S> {
  /// The configured budget in bytes.
  pub fn capacity(&self) -> u64 {
    self.capacity as u64
  }

  /// Bytes left in the budget. Negative only while a single oversized item
  /// is resident.
  pub fn remaining(&self) -> i64 {
    self.state.lock().remaining
  }

  /// Number of tracked items.
  pub fn len(&self) -> usize {
    self.state.lock().list.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Whether `key` is tracked. Does not affect recency.
  pub fn contains(&self, key: &str) -> bool {
    self.state.lock().list.contains(key)
  }

  /// Tracked keys, most recently used first.
  pub fn keys(&self) -> Vec<String> {
    self.state.lock().list.keys()
  }

  /// The wrapped store.
  pub fn inner(&self) -> &S {
    &self.inner
  }
}

impl<S: Store> Store for EvictionCache<S> {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    if !self.state.lock().list.touch(key) {
      return None;
    }
    // The index is only a hint; a concurrent set or eviction may have removed
    // the value since, in which case this legitimately misses.
    self.inner.get(key)
  }

  fn set(&self, key: &str, value: &[u8]) {
    let mut victims = Vec::new();
    {
      let mut state = self.state.lock();
      let delta = state.list.upsert(key, value.len() as u64);
      state.remaining -= delta;

      while state.remaining < 0 && state.list.len() > 1 {
        match state.list.pop_back() {
          Some((victim, size)) => {
            state.remaining += size as i64;
            victims.push(victim);
          }
          None => break,
        }
      }

      if state.remaining < 0 {
        tracing::debug!(
          key,
          size = value.len(),
          capacity = self.capacity,
          "item exceeds cache capacity; keeping it as the only resident"
        );
      }
    }

    for victim in &victims {
      tracing::trace!(key = %victim, "evicting least recently used item");
      self.inner.delete(victim);
    }
    self.inner.set(key, value);
  }

  fn delete(&self, key: &str) {
    {
      let mut state = self.state.lock();
      if let Some(size) = state.list.remove(key) {
        state.remaining += size as i64;
      }
    }
    self.inner.delete(key);
  }
}
