use std::fmt;

use crate::store::Store;

/// A fast tier stacked over a slow one, typically memory over disk.
///
/// Reads try the fast tier first. A value found only in the slow tier is
/// promoted: it is written back into the fast tier before being returned.
/// Writes and deletes go to both tiers, fast first.
pub struct TwoTier<F, S> {
  fast: F,
  slow: S,
}

impl<F, S> fmt::Debug for TwoTier<F, S>
where
  F: fmt::Debug,
  S: fmt::Debug,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TwoTier")
      .field("fast", &self.fast)
      .field("slow", &self.slow)
      .finish()
  }
}

impl<F: Store, S: Store> TwoTier<F, S> {
  pub fn new(fast: F, slow: S) -> Self {
    Self { fast, slow }
  }

  pub fn fast(&self) -> &F {
    &self.fast
  }

  pub fn slow(&self) -> &S {
    &self.slow
  }
}

impl<F: Store, S: Store> Store for TwoTier<F, S> {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    if let Some(value) = self.fast.get(key) {
      return Some(value);
    }
    let value = self.slow.get(key)?;
    tracing::trace!(key, size = value.len(), "promoting value into the fast tier");
    self.fast.set(key, &value);
    Some(value)
  }

  fn set(&self, key: &str, value: &[u8]) {
    self.fast.set(key, value);
    self.slow.set(key, value);
  }

  fn delete(&self, key: &str) {
    self.fast.delete(key);
    self.slow.delete(key);
  }
}
