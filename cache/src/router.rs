//! Consistent-hash routing of request keys onto a set of backends.
//!
//! Each backend occupies `replicas` virtual positions on a 32-bit ring. A key
//! is owned by the first position whose hash is greater than or equal to the
//! key's hash, wrapping around to the first position past the top of the ring.
//! Swapping the backend set only moves the keys whose owning positions changed.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{RouterConfig, DEFAULT_REPLICAS};
use crate::error::Result;
use crate::hash::{default_hash_fn, HashFn};

/// Picks a backend for a request key.
pub trait Picker: Send + Sync {
  /// Returns the backend owning `key`, or `None` when no backends are set.
  fn pick(&self, key: &str) -> Option<String>;

  /// Replaces the whole backend set.
  fn set(&self, backends: Vec<String>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RingEntry {
  hash: u32,
  replica: u32,
  // Index into `Ring::backends`, which is sorted, so ordering by index is
  // ordering by backend identifier.
  backend: u32,
}

/// An immutable, fully built ring.
///
/// Entries are sorted by `(hash, replica index, backend identifier)`, which
/// makes colliding positions resolve the same way on every build.
pub struct Ring {
  entries: Vec<RingEntry>,
  backends: Vec<String>,
}

impl fmt::Debug for Ring {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Ring")
      .field("backends", &self.backends)
      .field("entries", &self.entries.len())
      .finish()
  }
}

impl Ring {
  fn empty() -> Self {
    Self {
      entries: Vec::new(),
      backends: Vec::new(),
    }
  }

  fn build<I, B>(backends: I, replicas: usize, hash_fn: &HashFn) -> Self
  where
    I: IntoIterator<Item = B>,
    B: Into<String>,
  {
    let mut backends: Vec<String> = backends.into_iter().map(Into::into).collect();
    backends.sort();
    backends.dedup();

    let mut entries = Vec::with_capacity(backends.len() * replicas);
    for (backend_idx, backend) in backends.iter().enumerate() {
      for replica in 0..replicas {
        // The replica index is the salt, prefixed to the identifier.
        let salted = format!("{replica}{backend}");
        entries.push(RingEntry {
          hash: hash_fn(salted.as_bytes()),
          replica: replica as u32,
          backend: backend_idx as u32,
        });
      }
    }
    entries.sort_unstable();

    Self { entries, backends }
  }

  /// Returns the backend owning the ring position `hash`.
  pub fn locate(&self, hash: u32) -> Option<&str> {
    let idx = self.entries.partition_point(|entry| entry.hash < hash);
    let entry = self.entries.get(idx).or_else(|| self.entries.first())?;
    Some(self.backends[entry.backend as usize].as_str())
  }

  /// The configured backends, sorted and deduplicated.
  pub fn backends(&self) -> &[String] {
    &self.backends
  }

  /// Number of virtual positions on the ring.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// A thread-safe consistent-hash router.
///
/// The current [`Ring`] sits behind a read/write lock. `pick` takes the read
/// side. `set` builds the replacement ring first and only takes the write side
/// to swap it in, so readers see either the old ring or the new one.
pub struct HashRing {
  replicas: usize,
  hash_fn: HashFn,
  ring: RwLock<Arc<Ring>>,
}

impl fmt::Debug for HashRing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HashRing")
      .field("replicas", &self.replicas)
      .field("ring", &*self.ring.read())
      .finish_non_exhaustive()
  }
}

impl Default for HashRing {
  fn default() -> Self {
    Self::from_parts(DEFAULT_REPLICAS, default_hash_fn())
  }
}

impl HashRing {
  /// Creates an empty router using the default 32-bit xxHash.
  ///
  /// Fails if `config.replicas` is outside
  /// `1..=`[`MAX_REPLICAS`](crate::config::MAX_REPLICAS).
  pub fn new(config: RouterConfig) -> Result<Self> {
    Self::with_hash_fn(config, default_hash_fn())
  }

  /// Creates an empty router with a custom hash function.
  pub fn with_hash_fn(config: RouterConfig, hash_fn: HashFn) -> Result<Self> {
    config.validate()?;
    Ok(Self::from_parts(config.replicas, hash_fn))
  }

  fn from_parts(replicas: usize, hash_fn: HashFn) -> Self {
    Self {
      replicas,
      hash_fn,
      ring: RwLock::new(Arc::new(Ring::empty())),
    }
  }

  /// Replaces the backend set. The ring is rebuilt from scratch.
  pub fn configure<I, B>(&self, backends: I)
  where
    I: IntoIterator<Item = B>,
    B: Into<String>,
  {
    let ring = Arc::new(Ring::build(backends, self.replicas, &self.hash_fn));
    tracing::info!(
      backends = ring.backends().len(),
      positions = ring.len(),
      "hash ring reconfigured"
    );
    let old = std::mem::replace(&mut *self.ring.write(), ring);
    // The last reference to the old ring is freed outside the lock.
    drop(old);
  }

  /// Returns the backend owning `key`, or `None` if no backends are set.
  pub fn pick(&self, key: &str) -> Option<String> {
    let hash = (self.hash_fn)(key.as_bytes());
    let ring = self.ring.read();
    ring.locate(hash).map(str::to_string)
  }

  /// Returns the ring currently in use. Holding it does not block `configure`.
  pub fn ring(&self) -> Arc<Ring> {
    Arc::clone(&self.ring.read())
  }

  /// The configured backends, sorted and deduplicated.
  pub fn backends(&self) -> Vec<String> {
    self.ring.read().backends().to_vec()
  }

  /// Number of virtual positions on the current ring.
  pub fn len(&self) -> usize {
    self.ring.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.ring.read().is_empty()
  }

  pub fn replicas(&self) -> usize {
    self.replicas
  }
}

impl Picker for HashRing {
  fn pick(&self, key: &str) -> Option<String> {
    HashRing::pick(self, key)
  }

  fn set(&self, backends: Vec<String>) {
    self.configure(backends)
  }
}
