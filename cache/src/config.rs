//! Configuration for the router and the cache tiers.
//!
//! Every field has a documented default, so an empty mapping (`{}`) is a
//! valid configuration. A full document:
//!
//! ```yaml
//! router:
//!   replicas: 100
//! memory:
//!   capacity: 26214400
//! disk:
//!   enabled: true
//!   dir: /var/cache/proxy
//!   capacity: 104857600
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default number of virtual positions per backend on the ring.
pub const DEFAULT_REPLICAS: usize = 100;
/// Upper bound on virtual positions per backend.
pub const MAX_REPLICAS: usize = 10_000;
/// Default memory tier budget: 25 MiB.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 25 << 20;
/// Default disk tier budget: 100 MiB.
pub const DEFAULT_DISK_CAPACITY: u64 = 100 << 20;

fn default_replicas() -> usize {
  DEFAULT_REPLICAS
}

fn default_memory_capacity() -> u64 {
  DEFAULT_MEMORY_CAPACITY
}

fn default_disk_capacity() -> u64 {
  DEFAULT_DISK_CAPACITY
}

fn default_disk_dir() -> PathBuf {
  std::env::temp_dir()
}

// --- Top Level Config ---
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
  #[serde(default)]
  pub router: RouterConfig,
  #[serde(default)]
  pub memory: MemoryConfig,
  #[serde(default)]
  pub disk: DiskConfig,
}

/// Settings for the consistent-hash router.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
  /// Virtual positions per backend. More positions smooth the load at the
  /// cost of a larger ring.
  #[serde(default = "default_replicas")]
  pub replicas: usize,
}

impl Default for RouterConfig {
  fn default() -> Self {
    Self {
      replicas: DEFAULT_REPLICAS,
    }
  }
}

impl RouterConfig {
  /// Checks that `replicas` is within `1..=MAX_REPLICAS`.
  pub fn validate(&self) -> Result<()> {
    if self.replicas == 0 {
      return Err(Error::invalid("router.replicas", "must be greater than zero"));
    }
    if self.replicas > MAX_REPLICAS {
      return Err(Error::invalid(
        "router.replicas",
        format!("must not exceed {}", MAX_REPLICAS),
      ));
    }
    Ok(())
  }
}

/// Settings for the in-memory tier.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
  /// Byte budget.
  #[serde(default = "default_memory_capacity")]
  pub capacity: u64,
}

impl Default for MemoryConfig {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_MEMORY_CAPACITY,
    }
  }
}

/// Settings for the optional disk tier.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DiskConfig {
  #[serde(default)]
  pub enabled: bool,
  /// Existing directory holding the records.
  #[serde(default = "default_disk_dir")]
  pub dir: PathBuf,
  /// Byte budget.
  #[serde(default = "default_disk_capacity")]
  pub capacity: u64,
}

impl Default for DiskConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      dir: default_disk_dir(),
      capacity: DEFAULT_DISK_CAPACITY,
    }
  }
}

fn validate_capacity(field: &str, capacity: u64) -> Result<()> {
  if capacity == 0 {
    return Err(Error::invalid(field, "must be greater than zero"));
  }
  if capacity > i64::MAX as u64 {
    return Err(Error::invalid(field, "must not exceed i64::MAX bytes"));
  }
  Ok(())
}

impl CacheConfig {
  /// Parses and validates a YAML document.
  pub fn from_yaml_str(yaml: &str) -> Result<Self> {
    let config: CacheConfig =
      serde_yaml::from_str(yaml).map_err(|err| Error::ConfigParse(err.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  /// Reads, parses and validates a YAML file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let contents = fs::read_to_string(path.as_ref())?;
    Self::from_yaml_str(&contents)
  }

  /// Checks the values serde cannot.
  pub fn validate(&self) -> Result<()> {
    self.router.validate()?;
    validate_capacity("memory.capacity", self.memory.capacity)?;
    if self.disk.enabled {
      validate_capacity("disk.capacity", self.disk.capacity)?;
    }
    Ok(())
  }
}
