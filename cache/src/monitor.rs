use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use serde::Serialize;

use crate::store::Store;

/// A counting decorator over another [`Store`].
///
/// Every counter is its own atomic, updated without locks. Gets are counted
/// before the inner call; sets and deletes are counted whether or not the
/// inner store manages to persist them.
pub struct Monitor<S> {
  inner: S,
  gets: CachePadded<AtomicU64>,
  hits: CachePadded<AtomicU64>,
  hit_bytes: CachePadded<AtomicU64>,
  misses: CachePadded<AtomicU64>,
  sets: CachePadded<AtomicU64>,
  set_bytes: CachePadded<AtomicU64>,
  deletes: CachePadded<AtomicU64>,
}

impl<S> fmt::Debug for Monitor<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Monitor")
      .field("stats", &self.stats())
      .finish_non_exhaustive()
  }
}

fn counter() -> CachePadded<AtomicU64> {
  CachePadded::new(AtomicU64::new(0))
}

impl<S> Monitor<S> {
  pub fn new(inner: S) -> Self {
    Self {
      inner,
      gets: counter(),
      hits: counter(),
      hit_bytes: counter(),
      misses: counter(),
      sets: counter(),
      set_bytes: counter(),
      deletes: counter(),
    }
  }

  /// A point-in-time snapshot.
  ///
  /// Each counter is read on its own, so an operation racing the snapshot may
  /// show up in some counters and not yet in others.
  pub fn stats(&self) -> Stats {
    Stats {
      gets: self.gets.load(Ordering::Relaxed),
      hits: self.hits.load(Ordering::Relaxed),
      hit_bytes: self.hit_bytes.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      sets: self.sets.load(Ordering::Relaxed),
      set_bytes: self.set_bytes.load(Ordering::Relaxed),
      deletes: self.deletes.load(Ordering::Relaxed),
    }
  }

  /// The wrapped store.
  pub fn inner(&self) -> &S {
    &self.inner
  }
}

impl<S: Store> Store for Monitor<S> {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    self.gets.fetch_add(1, Ordering::Relaxed);
    let value = self.inner.get(key);
    match &value {
      Some(bytes) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self
          .hit_bytes
          .fetch_add(bytes.len() as u64, Ordering::Relaxed);
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
      }
    }
    value
  }

  fn set(&self, key: &str, value: &[u8]) {
    self.sets.fetch_add(1, Ordering::Relaxed);
    self
      .set_bytes
      .fetch_add(value.len() as u64, Ordering::Relaxed);
    self.inner.set(key, value);
  }

  fn delete(&self, key: &str) {
    self.deletes.fetch_add(1, Ordering::Relaxed);
    self.inner.delete(key);
  }
}

/// Operational counters returned by [`Monitor::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
  /// Total lookups (hits + misses).
  pub gets: u64,
  /// Lookups that found a value.
  pub hits: u64,
  /// Bytes returned by hits.
  pub hit_bytes: u64,
  /// Lookups that found nothing.
  pub misses: u64,
  /// Total writes.
  pub sets: u64,
  /// Bytes submitted by writes.
  pub set_bytes: u64,
  /// Total deletion attempts.
  pub deletes: u64,
}

impl Stats {
  /// hits / gets, or 0.0 before the first lookup.
  pub fn hit_ratio(&self) -> f64 {
    if self.gets == 0 {
      0.0
    } else {
      self.hits as f64 / self.gets as f64
    }
  }
}
