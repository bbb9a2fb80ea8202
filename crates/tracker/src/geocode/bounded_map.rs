#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::hash::Hash;

/// A map that holds at most `capacity` entries, evicting the oldest
/// insertion first. Overwriting a key keeps its original age.
#[derive(Debug, Clone)]
pub struct BoundedMap<K, V> {
    entries: HashMap<K, V>,
    insertion_order: Vec<K>,
    capacity: usize,
    ring_index: usize,
}

impl<K, V> BoundedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            insertion_order: Vec::with_capacity(capacity),
            capacity,
            ring_index: 0,
        }
    }

    /// Insert or overwrite, returning the evicted entry if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return None;
        }

        let evicted = if self.insertion_order.len() == self.capacity {
            let oldest = std::mem::replace(&mut self.insertion_order[self.ring_index], key.clone());
            self.ring_index = (self.ring_index + 1) % self.capacity;
            self.entries.remove_entry(&oldest)
        } else {
            self.insertion_order.push(key.clone());
            None
        };

        self.entries.insert(key, value);
        evicted
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
