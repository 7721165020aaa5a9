mod common;

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use common::random_bytes;
use fibre_proxy_cache::disk::fingerprint;
use fibre_proxy_cache::{DiskStore, Error, EvictionCache, Store};

#[test]
fn test_set_get_delete_round_trip() {
  common::init_tracing();
  let dir = tempfile::tempdir().unwrap();
  let store = DiskStore::new(dir.path()).unwrap();

  assert_eq!(store.get("http://origin.test/x"), None);

  let value = random_bytes(4_096);
  store.set("http://origin.test/x", &value);
  assert_eq!(store.get("http://origin.test/x"), Some(value));

  store.set("http://origin.test/x", b"shorter");
  assert_eq!(store.get("http://origin.test/x").as_deref(), Some(&b"shorter"[..]));

  store.delete("http://origin.test/x");
  assert_eq!(store.get("http://origin.test/x"), None);
  // Deleting again is a quiet no-op.
  store.delete("http://origin.test/x");

  assert_eq!(store.active_locks(), 0);
}

#[test]
fn test_records_are_named_by_fingerprint() {
  let dir = tempfile::tempdir().unwrap();
  let store = DiskStore::new(dir.path()).unwrap();
  let key = "http://origin.test/path?with=unsafe/../chars";

  store.set(key, b"body");

  let expected = dir.path().join(format!("{}.cache", fingerprint(key)));
  assert_eq!(store.record_path(key), expected);
  assert_eq!(fs::read(&expected).unwrap(), b"body");

  // Only the record remains; no partial temp files are left behind.
  let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
  assert_eq!(entries.len(), 1);
}

#[test]
fn test_missing_directory_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let missing = dir.path().join("does-not-exist");
  match DiskStore::new(&missing) {
    Err(Error::CacheDirMissing(path)) => assert_eq!(path, missing),
    other => panic!("expected CacheDirMissing, got {:?}", other),
  }

  let file = dir.path().join("a-file");
  fs::write(&file, b"").unwrap();
  assert!(matches!(DiskStore::new(&file), Err(Error::CacheDirMissing(_))));
}

#[test]
fn test_failed_write_leaves_a_clean_miss() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path().join("records");
  fs::create_dir(&root).unwrap();
  let store = DiskStore::new(&root).unwrap();

  store.set("k", b"old");
  assert!(store.get("k").is_some());

  // Pull the directory away so the replacement write fails.
  fs::remove_dir_all(&root).unwrap();
  store.set("k", b"new");
  assert_eq!(store.get("k"), None);

  // Once the directory is back, the store works again.
  fs::create_dir(&root).unwrap();
  store.set("k", b"new");
  assert_eq!(store.get("k").as_deref(), Some(&b"new"[..]));
  assert_eq!(store.active_locks(), 0);
}

#[test]
fn test_corrupt_record_location_reads_as_miss() {
  let dir = tempfile::tempdir().unwrap();
  let store = DiskStore::new(dir.path()).unwrap();

  // A directory where the record file should be cannot be read as a record.
  fs::create_dir(store.record_path("k")).unwrap();
  assert_eq!(store.get("k"), None);
}

#[test]
fn test_concurrent_same_key_writes_never_interleave() {
  let dir = tempfile::tempdir().unwrap();
  let store = Arc::new(DiskStore::new(dir.path()).unwrap());
  let writers = 8;
  let barrier = Arc::new(Barrier::new(writers));

  // Each writer submits a large, uniform payload of its own byte.
  let payloads: Vec<Vec<u8>> = (0..writers).map(|w| vec![w as u8; 256 * 1024]).collect();

  let handles: Vec<_> = payloads
    .iter()
    .cloned()
    .map(|payload| {
      let store = Arc::clone(&store);
      let barrier = Arc::clone(&barrier);
      thread::spawn(move || {
        barrier.wait();
        for _ in 0..5 {
          store.set("contended", &payload);
          if let Some(read) = store.get("contended") {
            assert_eq!(read.len(), payload.len());
            assert!(read.iter().all(|b| *b == read[0]), "read an interleaved record");
          }
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }

  let last = store.get("contended").unwrap();
  assert!(payloads.contains(&last), "final record must be one of the submitted values");
  assert_eq!(store.active_locks(), 0, "all key locks must be released");
}

#[test]
fn test_many_keys_in_parallel_release_every_lock() {
  let dir = tempfile::tempdir().unwrap();
  let store = Arc::new(DiskStore::new(dir.path()).unwrap());

  let handles: Vec<_> = (0..8)
    .map(|t| {
      let store = Arc::clone(&store);
      thread::spawn(move || {
        for i in 0..200 {
          let key = format!("key-{}", (t * 7 + i) % 32);
          match i % 3 {
            0 => store.set(&key, key.as_bytes()),
            1 => {
              if let Some(value) = store.get(&key) {
                assert_eq!(value, key.as_bytes());
              }
            }
            _ => store.delete(&key),
          }
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }
  assert_eq!(store.active_locks(), 0);
}

#[test]
fn test_disk_store_under_eviction_cache() {
  let dir = tempfile::tempdir().unwrap();
  let cache = EvictionCache::new(DiskStore::new(dir.path()).unwrap(), 100).unwrap();

  cache.set("a", &[1; 60]);
  cache.set("b", &[2; 60]);

  assert_eq!(cache.get("a"), None);
  assert!(!cache.inner().record_path("a").exists(), "evicted record is removed from disk");
  assert_eq!(cache.get("b"), Some(vec![2; 60]));
}
