//! The storage and routing core of a sharded caching forward proxy.
//!
//! # Components
//! - **Routing**: [`HashRing`] maps a request origin to one backend proxy by
//!   consistent hashing, so that changing the backend set only remaps a small
//!   share of origins. [`ShardClient`] wraps it for the client side.
//! - **Eviction**: [`EvictionCache`] puts any [`Store`] under a byte budget,
//!   evicting least recently used entries.
//! - **Disk**: [`DiskStore`] persists one record per key with per-key
//!   read/write locking; different keys never block each other.
//! - **Observability**: [`Monitor`] counts gets, hits, misses, sets and
//!   deletes over any store.
//!
//! Every storage component implements [`Store`] and wraps another one, so a
//! stack such as `Monitor -> EvictionCache -> DiskStore` is composed at
//! construction time. [`StackBuilder`] assembles the usual memory and disk
//! tiers from a [`CacheConfig`].
//!
//! Storage failures never fail a request: they degrade to a miss.

// Public modules that form the API
pub mod builder;
pub mod client;
pub mod config;
pub mod disk;
pub mod error;
pub mod eviction;
pub mod hash;
pub mod monitor;
pub mod router;
pub mod store;
pub mod tiered;

// Internal, crate-only modules
mod lru_list;

// Re-export the primary user-facing types for convenience
pub use builder::{CacheStack, StackBuilder};
pub use client::{Route, ShardClient};
pub use config::{CacheConfig, DiskConfig, MemoryConfig, RouterConfig};
pub use disk::DiskStore;
pub use error::{Error, Result};
pub use eviction::EvictionCache;
pub use hash::HashFn;
pub use monitor::{Monitor, Stats};
pub use router::{HashRing, Picker, Ring};
pub use store::{MemoryStore, Store};
pub use tiered::TwoTier;
