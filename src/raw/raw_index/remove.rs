use super::RawIndex;
use crate::error::{Error, Result};
use crate::raw::handle::BucketRef;

/// Which end of a subtree [`RawIndex::remove_edge`] extracts from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Edge {
    First,
    Last,
}

impl<K> RawIndex<K> {
    /// Removes one box equal to `key`. An absent key is not an error.
    pub(crate) fn remove(&mut self, key: &K) -> Result<Option<K>> {
        self.clear_error();
        let Some(root) = self.root else {
            return Ok(None);
        };

        match self.remove_searching(root, key) {
            Ok(removed) => {
                if removed.is_some() {
                    self.shrink_root(root);
                }
                Ok(removed)
            }
            Err(err) => Err(self.record(err)),
        }
    }

    /// Removes and returns the smallest box.
    pub(crate) fn pop_first(&mut self) -> Result<Option<K>> {
        self.pop_edge(Edge::First)
    }

    /// Removes and returns the greatest box.
    pub(crate) fn pop_last(&mut self) -> Result<Option<K>> {
        self.pop_edge(Edge::Last)
    }

    fn pop_edge(&mut self, edge: Edge) -> Result<Option<K>> {
        self.clear_error();
        let Some(root) = self.root else {
            return Ok(None);
        };

        match self.remove_edge(root, edge) {
            Ok(key) => {
                self.shrink_root(root);
                Ok(Some(key))
            }
            Err(err) => Err(self.record(err)),
        }
    }

    /// A root left without keys hands the tree over to its only child, or empties the tree.
    fn shrink_root(&mut self, root: BucketRef) {
        let bucket = self.pool.get(root);
        if bucket.used() > 0 {
            return;
        }
        self.root = bucket.child(0);
        self.release_bucket(root);
        match self.root {
            Some(new_root) => log::debug!("root collapsed into {new_root}, depth {}", self.depth()),
            None => log::debug!("last box removed, tree is empty"),
        }
    }

    /// Looks for `key` below `handle`.
    ///
    /// A hit in a leaf is removed in place. A hit in an internal bucket is replaced by its in-order
    /// successor, pulled out of the right subtree.
    fn remove_searching(&mut self, handle: BucketRef, key: &K) -> Result<Option<K>> {
        let bucket = self.pool.get(handle);
        let (index, equal) = bucket.lower_bound(key, &*self.comparator);

        let removed = if equal {
            if bucket.is_leaf() {
                return Ok(Some(self.pool.get_mut(handle).remove_key(index)));
            }
            let right = bucket.child(index + 1).ok_or(Error::RemoveInconsistency)?;
            let successor = self.remove_edge(right, Edge::First)?;
            self.pool.get_mut(handle).replace_key(index, successor)
        } else {
            let Some(child) = bucket.child(index) else {
                return Ok(None);
            };
            match self.remove_searching(child, key)? {
                Some(removed) => removed,
                None => return Ok(None),
            }
        };

        self.rebalance(handle, index)?;
        Ok(Some(removed))
    }

    /// Follows the first (or last) child down to a leaf and takes its edge key.
    fn remove_edge(&mut self, handle: BucketRef, edge: Edge) -> Result<K> {
        let bucket = self.pool.get(handle);
        let used = bucket.used();
        if used == 0 {
            return Err(Error::RemoveInconsistency);
        }
        let index = match edge {
            Edge::First => 0,
            Edge::Last => used,
        };

        if bucket.is_leaf() {
            return Ok(self.pool.get_mut(handle).remove_key(index.min(used - 1)));
        }
        let child = bucket.child(index).ok_or(Error::RemoveInconsistency)?;
        let key = self.remove_edge(child, edge)?;
        self.rebalance(handle, index)?;
        Ok(key)
    }

    /// Restores the key count of child `index` of `handle` after a removal below it, by rotating
    /// through the separator or merging with a sibling.
    fn rebalance(&mut self, handle: BucketRef, index: usize) -> Result<()> {
        let threshold = self.order.underflow_threshold();
        let parent = self.pool.get(handle);
        if parent.used() == 0 {
            return Err(Error::RemoveInconsistency);
        }

        let index = index.min(parent.used() - 1);
        let (Some(left), Some(right)) = (parent.child(index), parent.child(index + 1)) else {
            return Err(Error::RemoveInconsistency);
        };
        let l = self.pool.get(left).used();
        let r = self.pool.get(right).used();

        if l < threshold && r > threshold {
            self.rotate_to_left(handle, index, left, right, (r - l) / 2);
        } else if r < threshold && l > threshold {
            self.rotate_to_right(handle, index, left, right, (l - r) / 2);
        }
        if l + r < 2 * threshold {
            self.merge(handle, index, left, right);
        }
        Ok(())
    }

    /// Moves `count` keys from `right` over to `left` through separator `index` of `parent`.
    fn rotate_to_left(&mut self, parent: BucketRef, index: usize, left: BucketRef, right: BucketRef, count: usize) {
        let (keys, separator, children) = self.pool.get_mut(right).take_front(count);
        let separator = self.pool.get_mut(parent).replace_key(index, separator);
        self.pool.get_mut(left).push_back(separator, keys, children);
        log::trace!("borrowed {count} key(s) from {right} into {left}");
    }

    /// Moves `count` keys from `left` over to `right` through separator `index` of `parent`.
    fn rotate_to_right(&mut self, parent: BucketRef, index: usize, left: BucketRef, right: BucketRef, count: usize) {
        let (separator, keys, children) = self.pool.get_mut(left).take_back(count);
        let separator = self.pool.get_mut(parent).replace_key(index, separator);
        self.pool.get_mut(right).push_front(keys, separator, children);
        log::trace!("borrowed {count} key(s) from {left} into {right}");
    }

    /// Folds `right` and separator `index` into `left`, and releases `right`.
    fn merge(&mut self, parent: BucketRef, index: usize, left: BucketRef, right: BucketRef) {
        let (separator, dropped) = self.pool.get_mut(parent).remove_separator(index);
        debug_assert_eq!(dropped, right);
        let (left_bucket, right_bucket) = self.pool.pair_mut(left, right);
        left_bucket.absorb(separator, right_bucket);
        log::trace!("merged {right} into {left}, {} keys", left_bucket.used());
        self.release_bucket(right);
    }
}
