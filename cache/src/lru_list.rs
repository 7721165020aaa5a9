use generational_arena::{Arena, Index};

use ahash::{HashMap, HashMapExt};

#[derive(Debug)]
struct Node {
  key: String,
  size: u64,
  next: Option<Index>,
  prev: Option<Index>,
}

/// Recency order over sized keys. Head is the most recently used item.
///
/// Nodes live in an arena and are linked by index, so moving an item to the
/// front or unlinking the tail is O(1).
#[derive(Debug)]
pub(crate) struct LruList {
  nodes: Arena<Node>,
  lookup: HashMap<String, Index>,
  head: Option<Index>,
  tail: Option<Index>,
}

impl LruList {
  pub(crate) fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
    }
  }

  // Detaches a node from its neighbours. Arena and lookup are left alone.
  fn unlink(&mut self, index: Index) {
    let prev = self.nodes[index].prev;
    let next = self.nodes[index].next;

    match prev {
      Some(prev_idx) => self.nodes[prev_idx].next = next,
      None => self.head = next,
    }
    match next {
      Some(next_idx) => self.nodes[next_idx].prev = prev,
      None => self.tail = prev,
    }
  }

  fn link_front(&mut self, index: Index) {
    let old_head = self.head;
    self.nodes[index].next = old_head;
    self.nodes[index].prev = None;
    self.head = Some(index);

    match old_head {
      Some(old) => self.nodes[old].prev = Some(index),
      None => self.tail = Some(index),
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.lookup.len()
  }

  pub(crate) fn contains(&self, key: &str) -> bool {
    self.lookup.contains_key(key)
  }

  /// Moves `key` to the front. Returns `false` if it is not tracked.
  pub(crate) fn touch(&mut self, key: &str) -> bool {
    match self.lookup.get(key) {
      Some(&index) => {
        if self.head != Some(index) {
          self.unlink(index);
          self.link_front(index);
        }
        true
      }
      None => false,
    }
  }

  /// Inserts or resizes `key` and moves it to the front.
  ///
  /// Returns the signed change in tracked bytes: the full size for a new key,
  /// `size - old_size` for an existing one.
  pub(crate) fn upsert(&mut self, key: &str, size: u64) -> i64 {
    if let Some(&index) = self.lookup.get(key) {
      let old = std::mem::replace(&mut self.nodes[index].size, size);
      self.touch(key);
      return size as i64 - old as i64;
    }

    let index = self.nodes.insert(Node {
      key: key.to_string(),
      size,
      next: None,
      prev: None,
    });
    self.lookup.insert(key.to_string(), index);
    self.link_front(index);
    size as i64
  }

  /// Removes and returns the least recently used item.
  pub(crate) fn pop_back(&mut self) -> Option<(String, u64)> {
    let tail = self.tail?;
    self.unlink(tail);
    let node = self.nodes.remove(tail)?;
    self.lookup.remove(&node.key);
    Some((node.key, node.size))
  }

  /// Removes `key`, returning its size if it was tracked.
  pub(crate) fn remove(&mut self, key: &str) -> Option<u64> {
    let index = self.lookup.remove(key)?;
    self.unlink(index);
    self.nodes.remove(index).map(|node| node.size)
  }

  /// Keys from most to least recently used.
  pub(crate) fn keys(&self) -> Vec<String> {
    let mut keys = Vec::with_capacity(self.len());
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}
