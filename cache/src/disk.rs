//! A directory-backed store with per-key read/write exclusivity.
//!
//! Every key maps to one record file named after the SHA-256 fingerprint of
//! the key. Access to a record is guarded by a key lock taken from a
//! reference-counted registry owned by the store: readers of a key share it,
//! writers of a key exclude each other and readers, and different keys never
//! contend beyond the brief registry mutex.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::store::Store;

const RECORD_EXTENSION: &str = "cache";

/// Lowercase hex SHA-256 of `key`. Fixed length and filesystem safe.
///
/// Two keys sharing a fingerprint would share a record; that risk is accepted.
pub fn fingerprint(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  format!("{:x}", hasher.finalize())
}

struct RegistryEntry {
  lock: Arc<RwLock<()>>,
  refs: usize,
}

/// Key locks currently referenced by at least one caller.
///
/// An entry is created on first use and removed as soon as its reference
/// count drops back to zero, so exactly one lock exists per busy key.
#[derive(Default)]
pub(crate) struct LockRegistry {
  locks: Mutex<HashMap<String, RegistryEntry>>,
}

impl LockRegistry {
  pub(crate) fn new() -> Self {
    Self {
      locks: Mutex::new(HashMap::new()),
    }
  }

  pub(crate) fn acquire(&self, key: &str) -> KeyLock<'_> {
    let mut locks = self.locks.lock();
    let lock = match locks.get_mut(key) {
      Some(entry) => {
        entry.refs += 1;
        Arc::clone(&entry.lock)
      }
      None => {
        let lock = Arc::new(RwLock::new(()));
        locks.insert(
          key.to_string(),
          RegistryEntry {
            lock: Arc::clone(&lock),
            refs: 1,
          },
        );
        lock
      }
    };

    KeyLock {
      registry: self,
      key: key.to_string(),
      lock,
    }
  }

  fn release(&self, key: &str) {
    let mut locks = self.locks.lock();
    let Some(entry) = locks.get_mut(key) else {
      debug_assert!(false, "released a key lock that is not registered");
      tracing::error!(key, "released a key lock that is not registered");
      return;
    };

    debug_assert!(entry.refs > 0, "key lock reference count underflow");
    entry.refs = entry.refs.saturating_sub(1);
    if entry.refs == 0 {
      locks.remove(key);
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.locks.lock().len()
  }
}

/// A counted reference to one key's lock. Dropping it releases the reference.
///
/// Guards taken from it must be dropped first; declaring the guard after the
/// handle in the same scope gives that order.
pub(crate) struct KeyLock<'a> {
  registry: &'a LockRegistry,
  key: String,
  lock: Arc<RwLock<()>>,
}

impl KeyLock<'_> {
  pub(crate) fn read(&self) -> RwLockReadGuard<'_, ()> {
    self.lock.read()
  }

  pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ()> {
    self.lock.write()
  }
}

impl Drop for KeyLock<'_> {
  fn drop(&mut self) {
    self.registry.release(&self.key);
  }
}

/// The locked, persisted store.
pub struct DiskStore {
  dir: PathBuf,
  locks: LockRegistry,
}

impl fmt::Debug for DiskStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DiskStore")
      .field("dir", &self.dir)
      .field("active_locks", &self.active_locks())
      .finish()
  }
}

impl DiskStore {
  /// Opens a store over an existing directory.
  pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
    let dir = dir.into();
    if !dir.is_dir() {
      return Err(Error::CacheDirMissing(dir));
    }
    Ok(Self {
      dir,
      locks: LockRegistry::new(),
    })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Where the record for `key` lives.
  pub fn record_path(&self, key: &str) -> PathBuf {
    self
      .dir
      .join(format!("{}.{}", fingerprint(key), RECORD_EXTENSION))
  }

  /// Number of key locks currently registered. Zero when the store is idle.
  pub fn active_locks(&self) -> usize {
    self.locks.len()
  }

  // Writes into a temp file beside the record and renames it into place, so
  // the record is either the old content or the complete new one.
  fn write_record(&self, path: &Path, value: &[u8]) -> io::Result<()> {
    let mut tmp = tempfile::Builder::new()
      .prefix(".")
      .suffix(".partial")
      .tempfile_in(&self.dir)?;
    tmp.write_all(value)?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
  }
}

impl Store for DiskStore {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    let path = self.record_path(key);
    let key_lock = self.locks.acquire(key);
    let _guard = key_lock.read();

    match fs::read(&path) {
      Ok(bytes) => Some(bytes),
      Err(err) if err.kind() == io::ErrorKind::NotFound => None,
      Err(err) => {
        tracing::debug!(key, path = %path.display(), error = %err, "disk read failed; treating as miss");
        None
      }
    }
  }

  fn set(&self, key: &str, value: &[u8]) {
    let path = self.record_path(key);
    let key_lock = self.locks.acquire(key);
    let _guard = key_lock.write();

    if let Err(err) = self.write_record(&path, value) {
      tracing::debug!(key, path = %path.display(), error = %err, "disk write failed; dropping record");
      // The partial temp file is removed on drop. A stale record must not
      // outlive a failed replacement either.
      let _ = fs::remove_file(&path);
    }
  }

  fn delete(&self, key: &str) {
    let path = self.record_path(key);
    let key_lock = self.locks.acquire(key);
    let _guard = key_lock.write();

    match fs::remove_file(&path) {
      Ok(()) => {}
      Err(err) if err.kind() == io::ErrorKind::NotFound => {}
      Err(err) => {
        tracing::warn!(key, path = %path.display(), error = %err, "failed to delete disk record");
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use std::sync::mpsc;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn fingerprint_is_fixed_length_hex() {
    let short = fingerprint("a");
    let long = fingerprint(&"x".repeat(10_000));
    assert_eq!(short.len(), 64);
    assert_eq!(long.len(), 64);
    assert!(short.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(fingerprint("a"), short);
    assert_ne!(fingerprint("b"), short);
  }

  #[test]
  fn registry_shares_one_lock_per_key_and_cleans_up() {
    let registry = LockRegistry::new();
    let first = registry.acquire("k");
    let second = registry.acquire("k");
    assert!(Arc::ptr_eq(&first.lock, &second.lock));
    assert_eq!(registry.len(), 1);

    let other = registry.acquire("other");
    assert!(!Arc::ptr_eq(&first.lock, &other.lock));
    assert_eq!(registry.len(), 2);

    drop(first);
    assert_eq!(registry.len(), 2, "Still referenced by the second handle");
    drop(second);
    assert_eq!(registry.len(), 1);
    drop(other);
    assert_eq!(registry.len(), 0);
  }

  #[test]
  fn held_write_lock_does_not_block_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskStore::new(dir.path()).unwrap());

    // Simulate a slow writer parked on "slow".
    let slow_lock = store.locks.acquire("slow");
    let slow_guard = slow_lock.write();

    let (tx, rx) = mpsc::channel();
    let worker_store = Arc::clone(&store);
    let worker = thread::spawn(move || {
      worker_store.set("fast", b"value");
      let got = worker_store.get("fast");
      tx.send(got).unwrap();
    });

    let got = rx
      .recv_timeout(Duration::from_secs(5))
      .expect("operations on an unrelated key must not wait for the slow key");
    assert_eq!(got.as_deref(), Some(&b"value"[..]));
    worker.join().unwrap();

    drop(slow_guard);
    drop(slow_lock);
    assert_eq!(store.active_locks(), 0);
  }

  #[test]
  fn held_write_lock_blocks_same_key_reader() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskStore::new(dir.path()).unwrap());
    store.set("k", b"old");

    let key_lock = store.locks.acquire("k");
    let guard = key_lock.write();

    let (tx, rx) = mpsc::channel();
    let reader_store = Arc::clone(&store);
    let reader = thread::spawn(move || {
      tx.send(reader_store.get("k")).unwrap();
    });

    assert!(
      rx.recv_timeout(Duration::from_millis(100)).is_err(),
      "a reader of the same key must wait for the writer"
    );

    drop(guard);
    drop(key_lock);
    let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(got.as_deref(), Some(&b"old"[..]));
    reader.join().unwrap();
    assert_eq!(store.active_locks(), 0);
  }

  #[test]
  fn held_read_lock_admits_same_key_reader() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskStore::new(dir.path()).unwrap());
    store.set("k", b"shared");

    // Another reader is parked inside its hold on "k".
    let key_lock = store.locks.acquire("k");
    let guard = key_lock.read();

    let (tx, rx) = mpsc::channel();
    let reader_store = Arc::clone(&store);
    let reader = thread::spawn(move || {
      tx.send(reader_store.get("k")).unwrap();
    });

    let got = rx
      .recv_timeout(Duration::from_secs(5))
      .expect("readers of the same key must share the lock");
    assert_eq!(got.as_deref(), Some(&b"shared"[..]));
    reader.join().unwrap();

    // A writer still has to wait for the remaining reader.
    let (tx, rx) = mpsc::channel();
    let writer_store = Arc::clone(&store);
    let writer = thread::spawn(move || {
      writer_store.set("k", b"replaced");
      tx.send(()).unwrap();
    });
    assert!(
      rx.recv_timeout(Duration::from_millis(100)).is_err(),
      "a writer must wait for readers of the same key"
    );

    drop(guard);
    drop(key_lock);
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    writer.join().unwrap();
    assert_eq!(store.get("k").as_deref(), Some(&b"replaced"[..]));
    assert_eq!(store.active_locks(), 0);
  }
}
