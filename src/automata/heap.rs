//! Binary min-heap with changeable priorities.
//!
//! The epsilon-elimination pass needs a priority queue whose entries can have
//! their priority adjusted after insertion, so alongside the usual array-backed
//! heap we keep a value→slot map that is updated on every swap.

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// A binary min-heap over (priority, value) pairs.
///
/// Supports `push`, `pop`, and `change_priority`. Each value may be present at
/// most once; pushing a value twice leaves the heap in an inconsistent state.
#[derive(Debug, Default)]
pub struct BinaryMinHeap<V, P> {
    /// The actual heap structure, as (priority, value) pairs.
    heap: Vec<(P, V)>,
    /// Maps values to their positions in the heap array.
    mapping: FxHashMap<V, usize>,
}

impl<V, P> BinaryMinHeap<V, P>
where
    V: Copy + Eq + Hash,
    P: Copy + Ord,
{
    pub fn new() -> Self {
        BinaryMinHeap {
            heap: Vec::new(),
            mapping: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Insert a value with the given priority.
    pub fn push(&mut self, val: V, priority: P) {
        let idx = self.heap.len();
        self.heap.push((priority, val));
        self.mapping.insert(val, idx);
        self.sift_up(idx);
    }

    /// Remove and return the value with the smallest priority.
    pub fn pop(&mut self) -> Option<V> {
        let (_, head) = *self.heap.first()?;
        self.mapping.remove(&head);
        let tail = self.heap.pop().expect("heap is non-empty");
        if !self.heap.is_empty() {
            self.heap[0] = tail;
            self.mapping.insert(tail.1, 0);
            self.sift_down(0);
        }
        Some(head)
    }

    /// Adjust the priority of a value already in the heap.
    ///
    /// Does nothing if the value is absent or the priority is unchanged.
    pub fn change_priority(&mut self, val: V, priority: P) {
        let Some(&idx) = self.mapping.get(&val) else {
            return;
        };
        let old_priority = self.heap[idx].0;
        if old_priority == priority {
            return;
        }
        self.heap[idx] = (priority, val);
        if priority < old_priority {
            self.sift_up(idx);
        } else {
            self.sift_down(idx);
        }
    }

    fn sift_up(&mut self, idx: usize) {
        let mut ptr_idx = idx;
        while ptr_idx > 0 {
            let parent_idx = parent_index(ptr_idx);
            if self.heap[ptr_idx].0 < self.heap[parent_idx].0 {
                self.heap.swap(ptr_idx, parent_idx);
                self.mapping.insert(self.heap[ptr_idx].1, ptr_idx);
                self.mapping.insert(self.heap[parent_idx].1, parent_idx);
                ptr_idx = parent_idx;
            } else {
                return;
            }
        }
    }

    fn sift_down(&mut self, idx: usize) {
        let mut ptr_idx = idx;
        loop {
            let mut child_idx = lchild_index(ptr_idx);
            if child_idx >= self.heap.len() {
                return;
            }
            let rchild_idx = rchild_index(ptr_idx);
            if rchild_idx < self.heap.len() && self.heap[rchild_idx].0 < self.heap[child_idx].0 {
                child_idx = rchild_idx;
            }
            if self.heap[ptr_idx].0 <= self.heap[child_idx].0 {
                return;
            }
            self.heap.swap(ptr_idx, child_idx);
            self.mapping.insert(self.heap[ptr_idx].1, ptr_idx);
            self.mapping.insert(self.heap[child_idx].1, child_idx);
            ptr_idx = child_idx;
        }
    }
}

#[inline]
fn parent_index(idx: usize) -> usize {
    (idx - 1) / 2
}

#[inline]
fn lchild_index(idx: usize) -> usize {
    2 * idx + 1
}

#[inline]
fn rchild_index(idx: usize) -> usize {
    2 * idx + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Asserts the heap invariant and that the value→slot map agrees with the
    /// array.
    fn check_heap(queue: &BinaryMinHeap<usize, usize>) {
        for i in 1..queue.heap.len() {
            assert!(queue.heap[i].0 >= queue.heap[parent_index(i)].0);
        }
        assert_eq!(queue.mapping.len(), queue.heap.len());
        for (&val, &idx) in &queue.mapping {
            assert_eq!(queue.heap[idx].1, val);
        }
    }

    fn some_heap() -> BinaryMinHeap<usize, usize> {
        let mut queue = BinaryMinHeap::new();
        for i in 0..12 {
            queue.push(3 * i, 2 * i);
        }
        queue
    }

    #[test]
    fn test_push_empty() {
        let mut queue = BinaryMinHeap::new();
        queue.push(5usize, 0usize);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.heap[0], (0, 5));
        assert_eq!(queue.mapping[&5], 0);
    }

    #[test]
    fn test_push_keeps_invariant() {
        let mut queue = some_heap();
        queue.push(100, 13);
        check_heap(&queue);
        queue.push(101, 1);
        check_heap(&queue);
    }

    #[test]
    fn test_pop_returns_minimum() {
        let mut queue = some_heap();
        let head = queue.pop();
        assert_eq!(head, Some(0));
        check_heap(&queue);
    }

    #[test]
    fn test_pop_empty() {
        let mut empty: BinaryMinHeap<usize, usize> = BinaryMinHeap::new();
        assert_eq!(empty.pop(), None);
    }

    #[test]
    fn test_pop_drains_in_priority_order() {
        let mut queue = BinaryMinHeap::new();
        for (i, &p) in [7usize, 3, 9, 1, 4, 8, 2].iter().enumerate() {
            queue.push(i, p);
            check_heap(&queue);
        }
        let mut last = 0;
        while let Some(val) = queue.pop() {
            check_heap(&queue);
            let prio = [7usize, 3, 9, 1, 4, 8, 2][val];
            assert!(prio >= last);
            last = prio;
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_can_increase_key() {
        let mut queue = some_heap();
        let top = queue.heap[0].1;
        queue.change_priority(top, 256);
        check_heap(&queue);
        assert_ne!(queue.heap[0].1, top);
    }

    #[test]
    fn test_can_decrease_key() {
        let mut queue = some_heap();
        let last = queue.heap[queue.len() - 1].1;
        queue.change_priority(last, 0);
        check_heap(&queue);
        assert_eq!(queue.pop(), Some(0));
        check_heap(&queue);
    }

    #[test]
    fn test_can_set_equal_key() {
        let mut queue = some_heap();
        let snapshot = queue.heap.clone();
        let (prio, val) = queue.heap[5];
        queue.change_priority(val, prio);
        assert_eq!(queue.heap, snapshot);
    }

    #[test]
    fn test_change_priority_absent_value_is_ignored() {
        let mut queue = some_heap();
        let snapshot = queue.heap.clone();
        queue.change_priority(9999, 0);
        assert_eq!(queue.heap, snapshot);
    }
}
