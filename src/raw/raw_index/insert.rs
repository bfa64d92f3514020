use super::RawIndex;
use crate::error::{Error, Result};
use crate::raw::bucket::Promoted;
use crate::raw::handle::BucketRef;

impl<K> RawIndex<K> {
    /// Inserts `key`, splitting full buckets on the way back up.
    ///
    /// Duplicates and pool exhaustion are both detected before the tree is touched.
    pub(crate) fn insert(&mut self, key: K) -> Result<()> {
        self.clear_error();

        let needed = match self.plan_insert(&key) {
            Ok(needed) => needed,
            Err(err) => return Err(self.record(err)),
        };
        let available = self.pool.available();
        if needed > available {
            log::warn!("bucket pool exhausted: insert needs {needed} bucket(s), {available} available");
            return Err(self.record(Error::OutOfMemory { needed, available }));
        }

        let Some(root) = self.root else {
            let root = self.alloc_bucket();
            self.pool.get_mut(root).insert_key(0, key);
            self.root = Some(root);
            return Ok(());
        };

        if let Some(promoted) = self.insert_into(root, key) {
            let new_root = self.alloc_bucket();
            self.pool.get_mut(new_root).make_root(promoted);
            self.root = Some(new_root);
            log::debug!("root split, {new_root} is the new root at depth {}", self.depth());
        }
        Ok(())
    }

    /// Read-only descent: rejects a duplicate and counts the buckets the insert will allocate.
    ///
    /// Every full bucket in the run ending at the leaf splits, and a run reaching the root also
    /// needs a new root.
    fn plan_insert(&self, key: &K) -> Result<usize> {
        let Some(mut current) = self.root else {
            return Ok(1);
        };

        let mut full_run = 0;
        let mut run_reaches_root = true;
        loop {
            let bucket = self.pool.get(current);
            let (index, equal) = bucket.lower_bound(key, &*self.comparator);
            if equal && self.unique {
                return Err(Error::DuplicateKey);
            }
            if bucket.used() == self.order.max_used() {
                full_run += 1;
            } else {
                full_run = 0;
                run_reaches_root = false;
            }
            match bucket.child(index) {
                Some(child) => current = child,
                None => break,
            }
        }
        Ok(full_run + usize::from(run_reaches_root))
    }

    /// Inserts below `handle` and returns the halves of `handle` if it had to split.
    fn insert_into(&mut self, handle: BucketRef, key: K) -> Option<Promoted<K>> {
        let bucket = self.pool.get(handle);
        let (index, _) = bucket.lower_bound(&key, &*self.comparator);
        match bucket.child(index) {
            None => self.pool.get_mut(handle).insert_key(index, key),
            Some(child) => {
                let promoted = self.insert_into(child, key)?;
                debug_assert_eq!(promoted.left, child);
                self.pool.get_mut(handle).insert_promoted(index, promoted.key, promoted.right);
            }
        }

        if self.pool.get(handle).used() < self.order.max_keys() {
            return None;
        }
        Some(self.split(handle))
    }

    fn split(&mut self, handle: BucketRef) -> Promoted<K> {
        let order = self.order;
        let right = self.alloc_bucket();
        let (left_bucket, right_bucket) = self.pool.pair_mut(handle, right);
        let key = left_bucket.split_into(right_bucket, order);
        log::trace!("split {handle}: {} | {}", left_bucket.used(), right_bucket.used());
        Promoted {
            key,
            left: handle,
            right,
        }
    }
}
