//! Fixed-capacity, newest-first buffer.
//!
//! Every operation is a pure transform: it returns a new buffer and leaves
//! the receiver untouched, so a reader holding the old value is never
//! affected by a concurrent mutation. Buffers in this system hold at most a
//! few dozen records, so the copy is cheap.

use serde::ser::{Serialize, Serializer};

use crate::id::OpaqueId;

/// Records that can be located in a buffer by id.
pub trait Keyed {
    fn key(&self) -> &OpaqueId;
}

/// Ordered collection capped at `capacity` elements.
///
/// Index 0 is the newest element. Inserting past capacity drops the oldest
/// (last) element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedBuffer<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Clone> BoundedBuffer<T> {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Build a buffer from newest-first items, keeping at most `capacity`.
    pub fn from_items(capacity: usize, items: impl IntoIterator<Item = T>) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: items.into_iter().take(capacity).collect(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Newest element.
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Oldest element.
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Prepend without checking ids, dropping the oldest element past capacity.
    fn prepend(&self, item: T) -> (Self, Option<T>) {
        let mut items = Vec::with_capacity(self.capacity);
        items.push(item);
        items.extend(self.items.iter().cloned());
        let evicted = if items.len() > self.capacity {
            items.pop()
        } else {
            None
        };
        (
            Self {
                items,
                capacity: self.capacity,
            },
            evicted,
        )
    }

    /// Remove and return the oldest element.
    #[must_use]
    pub fn pop_oldest(&self) -> (Option<T>, Self) {
        let mut items = self.items.clone();
        let removed = items.pop();
        (
            removed,
            Self {
                items,
                capacity: self.capacity,
            },
        )
    }
}

impl<T: Clone + Keyed> BoundedBuffer<T> {
    pub fn contains(&self, id: &OpaqueId) -> bool {
        self.items.iter().any(|item| item.key() == id)
    }

    pub fn get(&self, id: &OpaqueId) -> Option<&T> {
        self.items.iter().find(|item| item.key() == id)
    }

    /// Prepend `item`, dropping the oldest element if capacity is exceeded.
    ///
    /// An element already holding the same id is removed first, so pushing
    /// a record twice leaves a single copy at the front.
    #[must_use]
    pub fn push(&self, item: T) -> Self {
        self.push_evicting(item).0
    }

    /// Like `push`, also returning the element evicted by capacity, if any.
    ///
    /// A same-id element replaced by the push is not reported as evicted.
    #[must_use]
    pub fn push_evicting(&self, item: T) -> (Self, Option<T>) {
        let (_, without) = self.find_and_remove(item.key());
        without.prepend(item)
    }

    /// Remove the element with `id`, preserving the order of the rest.
    ///
    /// Removing an absent id returns `None` and an identical buffer.
    #[must_use]
    pub fn find_and_remove(&self, id: &OpaqueId) -> (Option<T>, Self) {
        let mut removed = None;
        let mut items = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if removed.is_none() && item.key() == id {
                removed = Some(item.clone());
            } else {
                items.push(item.clone());
            }
        }
        (
            removed,
            Self {
                items,
                capacity: self.capacity,
            },
        )
    }

    /// Apply `f` to the element with `id` in a copy of the buffer.
    ///
    /// Returns `None` when no element has that id.
    #[must_use]
    pub fn update(&self, id: &OpaqueId, f: impl FnOnce(&mut T)) -> Option<Self> {
        let pos = self.items.iter().position(|item| item.key() == id)?;
        let mut items = self.items.clone();
        f(&mut items[pos]);
        Some(Self {
            items,
            capacity: self.capacity,
        })
    }
}

impl<'a, T> IntoIterator for &'a BoundedBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize> Serialize for BoundedBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: OpaqueId,
        n: u32,
    }

    impl Keyed for Item {
        fn key(&self) -> &OpaqueId {
            &self.id
        }
    }

    fn item(n: u32) -> Item {
        Item {
            id: OpaqueId::from(format!("item-{n}")),
            n,
        }
    }

    #[test]
    fn test_push_prepends_and_caps() {
        let mut buf = BoundedBuffer::new(3);
        for n in 0..10 {
            buf = buf.push(item(n));
            assert!(buf.len() <= 3);
            assert_eq!(buf.first().unwrap().n, n);
        }
        let ns: Vec<u32> = buf.iter().map(|i| i.n).collect();
        assert_eq!(ns, vec![9, 8, 7]);
    }

    #[test]
    fn test_ninth_push_evicts_first() {
        let mut buf = BoundedBuffer::new(8);
        for n in 1..=8 {
            let (next, evicted) = buf.push_evicting(item(n));
            assert!(evicted.is_none());
            buf = next;
        }
        let (buf, evicted) = buf.push_evicting(item(9));
        assert_eq!(buf.len(), 8);
        assert_eq!(evicted.unwrap().n, 1);
        assert_eq!(buf.last().unwrap().n, 2);
    }

    #[test]
    fn test_push_leaves_original_untouched() {
        let a = BoundedBuffer::new(2).push(item(1));
        let b = a.push(item(2));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_pop_oldest() {
        let buf = BoundedBuffer::new(4).push(item(1)).push(item(2));
        let (removed, rest) = buf.pop_oldest();
        assert_eq!(removed.unwrap().n, 1);
        assert_eq!(rest.len(), 1);

        let (removed, empty) = rest.pop_oldest().1.pop_oldest();
        assert!(removed.is_none());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_find_and_remove_preserves_order_and_is_idempotent() {
        let buf = BoundedBuffer::new(5)
            .push(item(1))
            .push(item(2))
            .push(item(3));
        let id = item(2).id;

        let (removed, rest) = buf.find_and_remove(&id);
        assert_eq!(removed.unwrap().n, 2);
        let ns: Vec<u32> = rest.iter().map(|i| i.n).collect();
        assert_eq!(ns, vec![3, 1]);

        let (again, same) = rest.find_and_remove(&id);
        assert!(again.is_none());
        assert_eq!(same, rest);
    }

    #[test]
    fn test_push_same_id_twice_keeps_one() {
        let buf = BoundedBuffer::new(5).push(item(1)).push(item(1));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.first().unwrap().n, 1);
    }

    #[test]
    fn test_push_existing_id_moves_to_front() {
        let buf = BoundedBuffer::new(5).push(item(1)).push(item(2));
        let (buf, evicted) = buf.push_evicting(Item { n: 10, ..item(1) });
        assert!(evicted.is_none());
        let ns: Vec<u32> = buf.iter().map(|i| i.n).collect();
        assert_eq!(ns, vec![10, 2]);
    }

    #[test]
    fn test_repeated_id_at_capacity_evicts_nothing() {
        let buf = BoundedBuffer::new(2).push(item(1)).push(item(2));
        let (buf, evicted) = buf.push_evicting(item(1));
        assert!(evicted.is_none());
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.last().unwrap().n, 2);
    }

    #[test]
    fn test_update() {
        let buf = BoundedBuffer::new(2).push(item(1));
        let updated = buf.update(&item(1).id, |i| i.n = 42).unwrap();
        assert_eq!(updated.first().unwrap().n, 42);
        assert_eq!(buf.first().unwrap().n, 1);
        assert!(buf.update(&item(7).id, |i| i.n = 0).is_none());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let buf = BoundedBuffer::new(0).push(item(1)).push(item(2));
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_serializes_as_sequence() {
        let buf = BoundedBuffer::from_items(3, [2u32, 1]);
        assert_eq!(serde_json::to_string(&buf).unwrap(), "[2,1]");
    }
}
