use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{CacheConfig, DEFAULT_MEMORY_CAPACITY};
use crate::disk::DiskStore;
use crate::error::Result;
use crate::eviction::EvictionCache;
use crate::monitor::{Monitor, Stats};
use crate::store::{MemoryStore, Store};
use crate::tiered::TwoTier;

/// The memory tier: counters over a byte-budgeted in-memory store.
pub type MemoryTier = Monitor<EvictionCache<MemoryStore>>;
/// The disk tier: counters over a byte-budgeted locked disk store.
pub type DiskTier = Monitor<EvictionCache<DiskStore>>;

/// A builder for the storage stack a proxy process hands to its caching
/// transport.
#[derive(Debug, Clone)]
pub struct StackBuilder {
  memory_capacity: u64,
  disk: Option<(PathBuf, u64)>,
}

impl Default for StackBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl StackBuilder {
  /// A memory-only stack with the default 25 MiB budget.
  pub fn new() -> Self {
    Self {
      memory_capacity: DEFAULT_MEMORY_CAPACITY,
      disk: None,
    }
  }

  /// Mirrors a loaded configuration. Disk is only set up if enabled there.
  pub fn from_config(config: &CacheConfig) -> Self {
    let builder = Self::new().memory_capacity(config.memory.capacity);
    if config.disk.enabled {
      builder.disk(config.disk.dir.clone(), config.disk.capacity)
    } else {
      builder
    }
  }

  /// Sets the memory tier budget in bytes.
  pub fn memory_capacity(mut self, capacity: u64) -> Self {
    self.memory_capacity = capacity;
    self
  }

  /// Adds a disk tier below the memory tier.
  pub fn disk(mut self, dir: impl Into<PathBuf>, capacity: u64) -> Self {
    self.disk = Some((dir.into(), capacity));
    self
  }

  /// Builds the stack: `Monitor -> EvictionCache -> store` per tier, and a
  /// [`TwoTier`] over both tiers when disk is enabled.
  ///
  /// The disk tier starts with an empty index, so records left in the
  /// directory by a previous process are not served.
  pub fn build(self) -> Result<CacheStack> {
    let memory = Arc::new(Monitor::new(EvictionCache::new(
      MemoryStore::new(),
      self.memory_capacity,
    )?));

    let (disk, store): (Option<Arc<DiskTier>>, Arc<dyn Store>) = match self.disk {
      Some((dir, capacity)) => {
        let disk = Arc::new(Monitor::new(EvictionCache::new(
          DiskStore::new(dir)?,
          capacity,
        )?));
        let tiered: Arc<dyn Store> =
          Arc::new(TwoTier::new(Arc::clone(&memory), Arc::clone(&disk)));
        (Some(disk), tiered)
      }
      None => {
        let store: Arc<dyn Store> = memory.clone();
        (None, store)
      }
    };

    tracing::info!(
      memory_capacity = self.memory_capacity,
      disk = disk.is_some(),
      "cache stack built"
    );

    Ok(CacheStack {
      memory,
      disk,
      store,
    })
  }
}

/// A composed, ready-to-use storage stack.
///
/// It implements [`Store`] itself by forwarding to the top layer, and keeps
/// handles on each tier's [`Monitor`] for reading counters.
#[derive(Clone)]
pub struct CacheStack {
  memory: Arc<MemoryTier>,
  disk: Option<Arc<DiskTier>>,
  store: Arc<dyn Store>,
}

impl fmt::Debug for CacheStack {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStack")
      .field("memory", &self.memory)
      .field("disk", &self.disk)
      .finish_non_exhaustive()
  }
}

impl CacheStack {
  pub fn builder() -> StackBuilder {
    StackBuilder::new()
  }

  /// The top of the stack, for handing to a caching transport.
  pub fn store(&self) -> Arc<dyn Store> {
    Arc::clone(&self.store)
  }

  pub fn memory(&self) -> &Arc<MemoryTier> {
    &self.memory
  }

  pub fn disk(&self) -> Option<&Arc<DiskTier>> {
    self.disk.as_ref()
  }

  pub fn memory_stats(&self) -> Stats {
    self.memory.stats()
  }

  pub fn disk_stats(&self) -> Option<Stats> {
    self.disk.as_ref().map(|disk| disk.stats())
  }
}

impl Store for CacheStack {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    self.store.get(key)
  }

  fn set(&self, key: &str, value: &[u8]) {
    self.store.set(key, value)
  }

  fn delete(&self, key: &str) {
    self.store.delete(key)
  }
}
