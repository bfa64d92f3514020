use core::cmp::Ordering;

use smallvec::SmallVec;

use super::handle::BucketRef;
use crate::callbacks::Comparator;
use crate::order::Order;

/// Boxes moved by a single rotation stay inline up to this many.
type Moved<T> = SmallVec<[T; 16]>;

/// A B-tree node. Leaves and internal buckets share one layout.
///
/// ```text
///   * k[0] * k[1] * k[2] ... * k[used-1] *
/// ```
///
/// Each star is a child link: child[i] holds everything ordered before k[i], child[i + 1]
/// everything after it. A leaf has no child links at all; an internal bucket has exactly
/// `used + 1`.
pub(crate) struct Bucket<K> {
    keys: Vec<K>,
    children: Vec<BucketRef>,
}

/// The median of a split bucket, bubbling up to the parent together with both halves.
pub(crate) struct Promoted<K> {
    pub(crate) key: K,
    pub(crate) left: BucketRef,
    pub(crate) right: BucketRef,
}

impl<K> Bucket<K> {
    /// Creates an empty bucket with room for an overflowing split.
    pub(crate) fn new(order: Order) -> Self {
        Self {
            keys: Vec::with_capacity(order.max_keys()),
            children: Vec::with_capacity(order.max_keys() + 1),
        }
    }

    /// Number of keys in use.
    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    #[inline]
    pub(crate) fn child(&self, index: usize) -> Option<BucketRef> {
        self.children.get(index).copied()
    }

    pub(crate) fn children(&self) -> &[BucketRef] {
        &self.children
    }

    /// Resets the bucket for the free-list, keeping its allocations.
    pub(crate) fn clear(&mut self) {
        self.keys.clear();
        self.children.clear();
    }

    /// First position `i` with `key <= k[i]`, and whether `k[i]` equals `key`.
    pub(crate) fn lower_bound(&self, key: &K, cmp: &dyn Comparator<K>) -> (usize, bool) {
        let index = self.keys.partition_point(|k| cmp.compare(key, k) == Ordering::Greater);
        let equal = self.keys.get(index).is_some_and(|k| cmp.compare(key, k) == Ordering::Equal);
        (index, equal)
    }

    /// Greatest position `i` with `!(probe < k[i])`, scanning from the top down.
    pub(crate) fn floor(&self, probe: &K, cmp: &dyn Comparator<K>) -> Option<usize> {
        self.keys.iter().rposition(|k| cmp.compare(probe, k) != Ordering::Less)
    }

    /// Inserts a key into a leaf.
    pub(crate) fn insert_key(&mut self, index: usize, key: K) {
        debug_assert!(self.is_leaf());
        self.keys.insert(index, key);
    }

    /// Inserts a promoted median at `index`; `right` becomes child `index + 1`. The left half is
    /// already child `index`.
    pub(crate) fn insert_promoted(&mut self, index: usize, key: K, right: BucketRef) {
        debug_assert!(!self.is_leaf());
        self.keys.insert(index, key);
        self.children.insert(index + 1, right);
    }

    /// Turns an empty bucket into a root with a single key and two children.
    pub(crate) fn make_root(&mut self, promoted: Promoted<K>) {
        debug_assert!(self.keys.is_empty() && self.children.is_empty());
        self.keys.push(promoted.key);
        self.children.push(promoted.left);
        self.children.push(promoted.right);
    }

    /// Removes a key from a leaf.
    pub(crate) fn remove_key(&mut self, index: usize) -> K {
        debug_assert!(self.is_leaf());
        self.keys.remove(index)
    }

    /// Swaps in a new key at `index`, returning the old one.
    pub(crate) fn replace_key(&mut self, index: usize, key: K) -> K {
        core::mem::replace(&mut self.keys[index], key)
    }

    /// Removes `k[index]` and the child to its right.
    pub(crate) fn remove_separator(&mut self, index: usize) -> (K, BucketRef) {
        let key = self.keys.remove(index);
        let child = self.children.remove(index + 1);
        (key, child)
    }

    /// Splits an overflowing bucket. `self` keeps `[0, split_left)`, `right` (empty) receives
    /// `[split_right_start, max_keys)` plus the matching children, and the middle key is returned.
    pub(crate) fn split_into(&mut self, right: &mut Bucket<K>, order: Order) -> K {
        debug_assert_eq!(self.used(), order.max_keys());
        debug_assert!(right.keys.is_empty() && right.children.is_empty());

        right.keys.extend(self.keys.drain(order.split_right_start()..));
        if !self.is_leaf() {
            right.children.extend(self.children.drain(order.split_right_start()..));
        }
        let middle = self.keys.pop().expect("a full bucket has a middle key");
        debug_assert_eq!(self.used(), order.split_left());
        middle
    }

    /// Appends `separator` and everything in `right`, leaving `right` empty.
    pub(crate) fn absorb(&mut self, separator: K, right: &mut Bucket<K>) {
        self.keys.push(separator);
        self.keys.append(&mut right.keys);
        self.children.append(&mut right.children);
    }

    /// Takes the first `count` keys (and the first `count` children, if any) for a rotation to the
    /// left sibling. The last taken key becomes the new separator.
    pub(crate) fn take_front(&mut self, count: usize) -> (Moved<K>, K, Moved<BucketRef>) {
        let mut keys: Moved<K> = self.keys.drain(..count).collect();
        let separator = keys.pop().expect("rotation moves at least one key");
        let children = if self.is_leaf() { Moved::new() } else { self.children.drain(..count).collect() };
        (keys, separator, children)
    }

    /// Receives a rotation from the right sibling: the old separator, then the moved keys.
    pub(crate) fn push_back(&mut self, separator: K, keys: Moved<K>, children: Moved<BucketRef>) {
        self.keys.push(separator);
        self.keys.extend(keys);
        self.children.extend(children);
    }

    /// Takes the last `count` keys (and the last `count` children, if any) for a rotation to the
    /// right sibling. The first taken key becomes the new separator.
    pub(crate) fn take_back(&mut self, count: usize) -> (K, Moved<K>, Moved<BucketRef>) {
        let from = self.used() - count;
        let mut keys: Moved<K> = self.keys.drain(from..).collect();
        let separator = keys.remove(0);
        let children = if self.is_leaf() { Moved::new() } else { self.children.drain(from + 1..).collect() };
        (separator, keys, children)
    }

    /// Receives a rotation from the left sibling: the moved keys, then the old separator, all in
    /// front of the existing keys.
    pub(crate) fn push_front(&mut self, mut keys: Moved<K>, separator: K, children: Moved<BucketRef>) {
        keys.push(separator);
        self.keys.splice(0..0, keys);
        self.children.splice(0..0, children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::NaturalOrder;

    fn leaf(order: Order, keys: &[i32]) -> Bucket<i32> {
        let mut bucket = Bucket::new(order);
        for (i, &k) in keys.iter().enumerate() {
            bucket.insert_key(i, k);
        }
        bucket
    }

    fn refs(slots: core::ops::Range<usize>) -> Vec<BucketRef> {
        slots.map(BucketRef::from_slot).collect()
    }

    #[test]
    fn lower_bound_finds_first_not_less() {
        let bucket = leaf(Order::DEFAULT, &[10, 20, 30]);
        assert_eq!(bucket.lower_bound(&5, &NaturalOrder), (0, false));
        assert_eq!(bucket.lower_bound(&20, &NaturalOrder), (1, true));
        assert_eq!(bucket.lower_bound(&25, &NaturalOrder), (2, false));
        assert_eq!(bucket.lower_bound(&35, &NaturalOrder), (3, false));
    }

    #[test]
    fn floor_scans_from_the_top() {
        let bucket = leaf(Order::DEFAULT, &[10, 20, 30]);
        assert_eq!(bucket.floor(&5, &NaturalOrder), None);
        assert_eq!(bucket.floor(&20, &NaturalOrder), Some(1));
        assert_eq!(bucket.floor(&29, &NaturalOrder), Some(1));
        assert_eq!(bucket.floor(&99, &NaturalOrder), Some(2));
    }

    #[test]
    fn split_leaf_order_five() {
        let order = Order::new(5).unwrap();
        let mut left = leaf(order, &[1, 2, 3, 4, 5]);
        let mut right = Bucket::new(order);
        let middle = left.split_into(&mut right, order);
        assert_eq!(middle, 3);
        assert_eq!(left.keys(), &[1, 2]);
        assert_eq!(right.keys(), &[4, 5]);
        assert!(right.is_leaf());
    }

    #[test]
    fn split_internal_moves_trailing_children() {
        let order = Order::new(5).unwrap();
        let mut left = Bucket::new(order);
        left.keys = vec![10, 20, 30, 40, 50];
        left.children = refs(0..6);
        let mut right = Bucket::new(order);

        assert_eq!(left.split_into(&mut right, order), 30);
        assert_eq!(left.children(), refs(0..3).as_slice());
        assert_eq!(right.keys(), &[40, 50]);
        assert_eq!(right.children(), refs(3..6).as_slice());
    }

    #[test]
    fn rotation_right_to_left_through_separator() {
        let order = Order::new(7).unwrap();
        let mut left = Bucket::new(order);
        left.keys = vec![1];
        left.children = refs(0..2);
        let mut right = Bucket::new(order);
        right.keys = vec![11, 12, 13, 14, 15];
        right.children = refs(10..16);

        let (keys, new_separator, children) = right.take_front(2);
        left.push_back(10, keys, children);

        assert_eq!(new_separator, 12);
        assert_eq!(left.keys(), &[1, 10, 11]);
        assert_eq!(left.children(), [refs(0..2), refs(10..12)].concat().as_slice());
        assert_eq!(right.keys(), &[13, 14, 15]);
        assert_eq!(right.children(), refs(12..16).as_slice());
    }

    #[test]
    fn rotation_left_to_right_through_separator() {
        let order = Order::new(7).unwrap();
        let mut left = leaf(order, &[1, 2, 3, 4, 5]);
        let mut right = leaf(order, &[20]);

        let (new_separator, keys, children) = left.take_back(2);
        right.push_front(keys, 10, children);

        assert_eq!(new_separator, 4);
        assert_eq!(left.keys(), &[1, 2, 3]);
        assert_eq!(right.keys(), &[5, 10, 20]);
        assert!(right.is_leaf());
    }

    #[test]
    fn absorb_and_remove_separator() {
        let order = Order::new(5).unwrap();
        let mut parent = Bucket::new(order);
        parent.keys = vec![10, 20];
        parent.children = refs(0..3);
        let mut left = leaf(order, &[1]);
        let mut right = leaf(order, &[11, 12]);

        let (separator, dropped) = parent.remove_separator(0);
        left.absorb(separator, &mut right);

        assert_eq!(dropped, BucketRef::from_slot(1));
        assert_eq!(parent.keys(), &[20]);
        assert_eq!(parent.children(), &[BucketRef::from_slot(0), BucketRef::from_slot(2)]);
        assert_eq!(left.keys(), &[1, 10, 11, 12]);
        assert_eq!(right.used(), 0);
    }
}
