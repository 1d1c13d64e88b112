//! Binary heap with an index map for keyed priority updates
//!
//! `BinaryHeap` from std cannot reprioritise an element already in the
//! heap. A*/Dijkstra need exactly that when a cheaper route to an open node
//! is found, so this heap keeps a `key -> slot` map that is fixed up on every
//! swap.
//!
//! # Ordering
//!
//! The heap is either a min-heap or a max-heap ([`HeapOrder`]). Entries with
//! equal priority are ordered by insertion sequence (first in, first out),
//! which keeps searches reproducible.
//!
//! # Performance
//!
//! | Operation                     | Time complexity |
//! |-------------------------------|-----------------|
//! | `enqueue` / `dequeue`         | O(log n)        |
//! | `change_priority` / `remove`  | O(log n)        |
//! | `contains_key` / `get`        | O(1)            |

use std::cmp::Ordering;
use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Which end of the priority range is served first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeapOrder {
    /// Lowest priority first
    #[default]
    Min,
    /// Highest priority first
    Max,
}

#[derive(Debug, Clone)]
struct Entry<K, V, P> {
    key: K,
    value: V,
    priority: P,
    seq: u64,
}

/// Priority queue of unique keys, each carrying a value and a priority
#[derive(Debug, Clone)]
pub struct MappedPriorityQueue<K, V, P> {
    heap: Vec<Entry<K, V, P>>,
    index: FxHashMap<K, usize>,
    order: HeapOrder,
    next_seq: u64,
}

impl<K, V, P> MappedPriorityQueue<K, V, P>
where
    K: Copy + Eq + Hash,
    P: PartialOrd + Copy,
{
    /// Create an empty queue with the given order
    #[must_use]
    pub fn new(order: HeapOrder) -> Self {
        Self {
            heap: Vec::new(),
            index: FxHashMap::default(),
            order,
            next_seq: 0,
        }
    }

    /// Create an empty min-queue
    #[must_use]
    pub fn min() -> Self {
        Self::new(HeapOrder::Min)
    }

    /// Create an empty max-queue
    #[must_use]
    pub fn max() -> Self {
        Self::new(HeapOrder::Max)
    }

    /// Heap order of this queue
    #[must_use]
    pub fn order(&self) -> HeapOrder {
        self.order
    }

    /// Number of queued keys
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if the queue is empty
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Check if `key` is queued
    #[must_use]
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Value stored for `key`
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.heap[i].value)
    }

    /// Current priority of `key`
    #[must_use]
    pub fn priority(&self, key: &K) -> Option<P> {
        self.index.get(key).map(|&i| self.heap[i].priority)
    }

    /// Slot currently holding `key`
    #[must_use]
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Entry that `dequeue` would return next
    #[must_use]
    pub fn peek(&self) -> Option<(&K, &V, P)> {
        self.heap.first().map(|e| (&e.key, &e.value, e.priority))
    }

    /// Iterate entries in heap (not priority) order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V, P)> + '_ {
        self.heap.iter().map(|e| (&e.key, &e.value, e.priority))
    }

    /// Insert `key` with `value` and `priority`
    ///
    /// Keys are unique: if `key` is already queued its value and priority
    /// are replaced instead and `false` is returned.
    pub fn enqueue(&mut self, key: K, value: V, priority: P) -> bool {
        if self.contains_key(&key) {
            self.change_value_and_priority(&key, value, priority);
            return false;
        }

        let slot = self.heap.len();
        self.heap.push(Entry {
            key,
            value,
            priority,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        self.index.insert(key, slot);
        self.sift_up(slot);
        true
    }

    /// Remove and return the root entry, `None` when empty
    pub fn dequeue(&mut self) -> Option<(K, V, P)> {
        self.remove_at(0)
    }

    /// Update the priority of `key`, returns `false` if it is not queued
    pub fn change_priority(&mut self, key: &K, priority: P) -> bool {
        let Some(&slot) = self.index.get(key) else {
            return false;
        };

        let old = self.heap[slot].priority;
        self.heap[slot].priority = priority;

        let toward_root = matches!(
            (priority.partial_cmp(&old), self.order),
            (Some(Ordering::Less), HeapOrder::Min) | (Some(Ordering::Greater), HeapOrder::Max)
        );
        if toward_root {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
        true
    }

    /// Replace the value and update the priority of `key`
    ///
    /// Returns `false` if `key` is not queued.
    pub fn change_value_and_priority(&mut self, key: &K, value: V, priority: P) -> bool {
        let Some(&slot) = self.index.get(key) else {
            return false;
        };
        self.heap[slot].value = value;
        self.change_priority(key, priority)
    }

    /// Remove `key` wherever it sits in the heap
    pub fn remove(&mut self, key: &K) -> Option<(V, P)> {
        let slot = self.index_of(key)?;
        self.remove_at(slot).map(|(_, value, priority)| (value, priority))
    }

    /// Remove the entry at heap slot `slot`
    ///
    /// The last entry is swapped into the hole and re-sifted.
    pub fn remove_at(&mut self, slot: usize) -> Option<(K, V, P)> {
        if slot >= self.heap.len() {
            return None;
        }

        let last = self.heap.len() - 1;
        self.swap(slot, last);
        let entry = self.heap.pop()?;
        self.index.remove(&entry.key);

        if slot < self.heap.len() {
            let slot = self.sift_up(slot);
            self.sift_down(slot);
        }

        Some((entry.key, entry.value, entry.priority))
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.heap.clear();
        self.index.clear();
    }

    /// Ordering between two entries: `Less` means `a` is served first
    fn compare(&self, a: &Entry<K, V, P>, b: &Entry<K, V, P>) -> Ordering {
        let by_priority = a
            .priority
            .partial_cmp(&b.priority)
            .unwrap_or(Ordering::Equal);
        let by_priority = match self.order {
            HeapOrder::Min => by_priority,
            HeapOrder::Max => by_priority.reverse(),
        };
        by_priority.then(a.seq.cmp(&b.seq))
    }

    #[inline]
    fn precedes(&self, i: usize, j: usize) -> bool {
        self.compare(&self.heap[i], &self.heap[j]) == Ordering::Less
    }

    fn swap(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        self.heap.swap(i, j);
        self.index.insert(self.heap[i].key, i);
        self.index.insert(self.heap[j].key, j);
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.precedes(slot, parent) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
        slot
    }

    fn sift_down(&mut self, mut slot: usize) -> usize {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut best = slot;

            if left < len && self.precedes(left, best) {
                best = left;
            }
            if right < len && self.precedes(right, best) {
                best = right;
            }
            if best == slot {
                return slot;
            }

            self.swap(slot, best);
            slot = best;
        }
    }

    /// Panic if the heap property or the key index is broken
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(self.index.len(), self.heap.len(), "index and heap sizes differ");
        for (slot, entry) in self.heap.iter().enumerate() {
            assert_eq!(self.index.get(&entry.key), Some(&slot), "stale index entry");
            if slot > 0 {
                let parent = (slot - 1) / 2;
                assert!(
                    !self.precedes(slot, parent),
                    "heap property violated at slot {slot}"
                );
            }
        }
    }
}

impl<K, V, P> Default for MappedPriorityQueue<K, V, P>
where
    K: Copy + Eq + Hash,
    P: PartialOrd + Copy,
{
    fn default() -> Self {
        Self::min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn drain(queue: &mut MappedPriorityQueue<u32, (), f32>) -> Vec<(u32, f32)> {
        let mut out = Vec::new();
        while let Some((key, _, priority)) = queue.dequeue() {
            out.push((key, priority));
        }
        out
    }

    #[test]
    fn test_min_queue_orders_by_priority() {
        let mut queue = MappedPriorityQueue::min();
        queue.enqueue(1, (), 5.0);
        queue.enqueue(2, (), 1.0);
        queue.enqueue(3, (), 3.0);

        let keys: Vec<_> = drain(&mut queue).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![2, 3, 1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_max_queue_orders_by_priority() {
        let mut queue = MappedPriorityQueue::max();
        queue.enqueue(1, (), 5.0);
        queue.enqueue(2, (), 1.0);
        queue.enqueue(3, (), 3.0);

        let keys: Vec<_> = drain(&mut queue).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![1, 3, 2]);
    }

    #[test]
    fn test_equal_priorities_are_fifo() {
        let mut queue = MappedPriorityQueue::min();
        for key in [9, 4, 7, 1, 8] {
            queue.enqueue(key, (), 2.0);
        }

        let keys: Vec<_> = drain(&mut queue).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![9, 4, 7, 1, 8]);
    }

    #[test]
    fn test_change_priority_both_directions() {
        let mut queue = MappedPriorityQueue::min();
        for key in 0..6 {
            queue.enqueue(key, (), key as f32);
        }

        // Toward the root
        assert!(queue.change_priority(&5, -1.0));
        queue.assert_invariants();
        assert_eq!(queue.peek().map(|(k, _, _)| *k), Some(5));

        // Away from the root
        assert!(queue.change_priority(&5, 10.0));
        queue.assert_invariants();
        assert_eq!(queue.peek().map(|(k, _, _)| *k), Some(0));

        assert!(!queue.change_priority(&42, 0.0));
    }

    #[test]
    fn test_duplicate_enqueue_updates_in_place() {
        let mut queue = MappedPriorityQueue::min();
        assert!(queue.enqueue(1, "old", 5.0));
        assert!(queue.enqueue(2, "other", 3.0));
        assert!(!queue.enqueue(1, "new", 1.0));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue(), Some((1, "new", 1.0)));
    }

    #[test]
    fn test_remove_by_key() {
        let mut queue = MappedPriorityQueue::min();
        for key in 0..10 {
            queue.enqueue(key, key * 10, key as f32);
        }

        assert_eq!(queue.remove(&4), Some((40, 4.0)));
        assert_eq!(queue.remove(&4), None);
        assert!(!queue.contains_key(&4));
        queue.assert_invariants();

        let slot = queue.index_of(&7).unwrap();
        assert_eq!(queue.remove_at(slot), Some((7, 70, 7.0)));
        assert_eq!(queue.remove_at(100), None);
        queue.assert_invariants();
        assert_eq!(queue.len(), 8);
    }

    #[test]
    fn test_dequeue_empty() {
        let mut queue: MappedPriorityQueue<u32, (), f32> = MappedPriorityQueue::default();
        assert!(queue.dequeue().is_none());
        assert!(queue.peek().is_none());
    }

    /// Random operation sequences keep the heap property and key uniqueness
    #[test]
    fn test_random_operations_keep_invariants() {
        for (seed, order) in [(7, HeapOrder::Min), (11, HeapOrder::Max), (23, HeapOrder::Min)] {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut queue: MappedPriorityQueue<u32, u32, f32> = MappedPriorityQueue::new(order);
            let mut mirror: FxHashMap<u32, f32> = FxHashMap::default();

            for _ in 0..2000 {
                let key = rng.gen_range(0..64);
                let priority = rng.gen_range(0..500) as f32 / 10.0;

                match rng.gen_range(0..5) {
                    0 | 1 => {
                        queue.enqueue(key, key, priority);
                        mirror.insert(key, priority);
                    }
                    2 => {
                        if let Some((k, v, p)) = queue.dequeue() {
                            assert_eq!(k, v);
                            // The root is never worse than anything left
                            for (_, _, other) in queue.iter() {
                                match order {
                                    HeapOrder::Min => assert!(p <= other),
                                    HeapOrder::Max => assert!(p >= other),
                                }
                            }
                            assert_eq!(mirror.remove(&k), Some(p));
                        }
                    }
                    3 => {
                        let changed = queue.change_priority(&key, priority);
                        assert_eq!(changed, mirror.contains_key(&key));
                        if changed {
                            mirror.insert(key, priority);
                        }
                    }
                    _ => {
                        let removed = queue.remove(&key).map(|(_, p)| p);
                        assert_eq!(removed, mirror.remove(&key));
                    }
                }

                queue.assert_invariants();
                assert_eq!(queue.len(), mirror.len());
                for k in 0..64 {
                    assert_eq!(queue.contains_key(&k), mirror.contains_key(&k));
                }
            }
        }
    }
}
