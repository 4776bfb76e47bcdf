//! Keyed arena for marker/popup reuse.
//!
//! Map consumers keep one visual object per rendered feature. Instead of
//! imperative diffing scattered across call sites, reconciliation is a
//! pure set difference: given the currently held keys and the keys that
//! should exist next, [`KeyedArena::reconcile`] returns exactly what to
//! create and what to tear down, in sorted (deterministic) order. The
//! arena itself is a plain keyed store.

use crate::cluster::ClusterId;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::hash::Hash;

/// Canonical key for map-marker arenas: one per rendered feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKey {
    /// A cluster marker.
    Cluster(ClusterId),
    /// An individual record marker.
    Point(u32),
}

/// The outcome of a reconciliation pass: keys to create and keys to tear
/// down, each sorted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation<K> {
    /// Keys present in the new set but not yet held.
    pub to_add: Vec<K>,
    /// Held keys absent from the new set.
    pub to_remove: Vec<K>,
}

impl<K> Reconciliation<K> {
    /// Whether nothing changed.
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Pure reconciliation between two key sets.
pub fn reconcile<K>(old: &FxHashSet<K>, new: &FxHashSet<K>) -> Reconciliation<K>
where
    K: Eq + Hash + Ord + Clone,
{
    let mut to_add: Vec<K> = new.difference(old).cloned().collect();
    let mut to_remove: Vec<K> = old.difference(new).cloned().collect();
    to_add.sort_unstable();
    to_remove.sort_unstable();
    Reconciliation { to_add, to_remove }
}

/// A keyed store of visual objects with set-difference reconciliation.
#[derive(Debug, Clone)]
pub struct KeyedArena<K, V> {
    entries: FxHashMap<K, V>,
}

impl<K, V> KeyedArena<K, V>
where
    K: Eq + Hash + Ord + Clone,
{
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Number of held entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the arena holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a key is held.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Borrow an entry.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Borrow an entry mutably.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Insert an entry, returning any displaced value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Remove an entry, returning it if held.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    /// Diff the held keys against the keys that should exist next.
    pub fn reconcile(&self, new_keys: &FxHashSet<K>) -> Reconciliation<K> {
        let current: FxHashSet<K> = self.entries.keys().cloned().collect();
        reconcile(&current, new_keys)
    }

    /// Bring the arena in line with `new_keys`: create missing entries
    /// with `create` and drop stale ones, returning the removed values in
    /// key order.
    pub fn sync_with(
        &mut self,
        new_keys: &FxHashSet<K>,
        mut create: impl FnMut(&K) -> V,
    ) -> Vec<V> {
        let plan = self.reconcile(new_keys);
        let mut removed = Vec::with_capacity(plan.to_remove.len());
        for key in &plan.to_remove {
            if let Some(value) = self.entries.remove(key) {
                removed.push(value);
            }
        }
        for key in plan.to_add {
            let value = create(&key);
            self.entries.insert(key, value);
        }
        removed
    }
}

impl<K, V> Default for KeyedArena<K, V>
where
    K: Eq + Hash + Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
