#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fibre_proxy_cache::{HashFn, MemoryStore, Store};
use parking_lot::Mutex;
use rand::RngCore;

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// Random payload of `len` bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
  let mut bytes = vec![0u8; len];
  rand::rng().fill_bytes(&mut bytes);
  bytes
}

/// A hash function driven by a lookup table. Input bytes ending with a table
/// key hash to that key's value, so both `"{replica}{backend}"` salts and raw
/// request keys can be placed by hand. Unknown input hashes to `u32::MAX`.
pub fn table_hash(table: &[(&str, u32)]) -> HashFn {
  let table: Vec<(String, u32)> = table
    .iter()
    .map(|(suffix, hash)| (suffix.to_string(), *hash))
    .collect();
  Arc::new(move |data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    table
      .iter()
      .filter(|(suffix, _)| text.ends_with(suffix.as_str()))
      .max_by_key(|(suffix, _)| suffix.len())
      .map(|(_, hash)| *hash)
      .unwrap_or(u32::MAX)
  })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
  Get(String),
  Set(String, usize),
  Delete(String),
}

/// An in-memory store that records every call made to it.
#[derive(Default)]
pub struct RecordingStore {
  pub data: MemoryStore,
  pub ops: Mutex<Vec<Op>>,
}

impl RecordingStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn ops(&self) -> Vec<Op> {
    self.ops.lock().clone()
  }

  pub fn clear_ops(&self) {
    self.ops.lock().clear();
  }
}

impl Store for RecordingStore {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    self.ops.lock().push(Op::Get(key.to_string()));
    self.data.get(key)
  }

  fn set(&self, key: &str, value: &[u8]) {
    self.ops.lock().push(Op::Set(key.to_string(), value.len()));
    self.data.set(key, value)
  }

  fn delete(&self, key: &str) {
    self.ops.lock().push(Op::Delete(key.to_string()));
    self.data.delete(key)
  }
}

/// An in-memory store whose writes to keys starting with `slow_prefix` take
/// `delay`.
pub struct SlowStore {
  pub data: MemoryStore,
  pub slow_prefix: String,
  pub delay: Duration,
}

impl SlowStore {
  pub fn new(slow_prefix: &str, delay: Duration) -> Self {
    Self {
      data: MemoryStore::new(),
      slow_prefix: slow_prefix.to_string(),
      delay,
    }
  }
}

impl Store for SlowStore {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    self.data.get(key)
  }

  fn set(&self, key: &str, value: &[u8]) {
    if key.starts_with(&self.slow_prefix) {
      thread::sleep(self.delay);
    }
    self.data.set(key, value)
  }

  fn delete(&self, key: &str) {
    self.data.delete(key)
  }
}

/// A store with canned `get` answers, for checking decorators in isolation.
#[derive(Default)]
pub struct CannedStore {
  pub answers: HashMap<String, Vec<u8>>,
}

impl Store for CannedStore {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    self.answers.get(key).cloned()
  }

  fn set(&self, _key: &str, _value: &[u8]) {}

  fn delete(&self, _key: &str) {}
}
