use std::hash::Hasher;
use std::sync::Arc;

use twox_hash::XxHash32;

/// A pluggable 32-bit hash over raw bytes, used to place backends and keys on
/// the ring. It must be deterministic; it need not be cryptographic.
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// 32-bit xxHash with a zero seed. This is the default ring hash.
pub fn xxhash32(data: &[u8]) -> u32 {
  let mut hasher = XxHash32::with_seed(0);
  hasher.write(data);
  hasher.finish() as u32
}

pub(crate) fn default_hash_fn() -> HashFn {
  Arc::new(xxhash32)
}
