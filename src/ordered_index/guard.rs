use core::fmt;
use std::io::{Read, Write};

use parking_lot::MutexGuard;

use crate::error::{ErrorKind, Result};
use crate::raw::RawIndex;
use crate::statistics::Statistics;

/// Exclusive access to an [`OrderedIndex`](crate::OrderedIndex), held until dropped.
///
/// Created by [`OrderedIndex::enter_monitor`](crate::OrderedIndex::enter_monitor). Operations on the
/// guard behave like their namesakes on the index, without taking the lock again. Calling the index
/// itself while holding a guard on the same thread deadlocks.
pub struct IndexGuard<'a, K> {
    raw: MutexGuard<'a, RawIndex<K>>,
}

impl<'a, K> IndexGuard<'a, K> {
    pub(super) fn new(raw: MutexGuard<'a, RawIndex<K>>) -> Self {
        Self { raw }
    }

    /// Releases the lock.
    pub fn leave(self) {}

    /// Adds a box. See [`OrderedIndex::insert`](crate::OrderedIndex::insert).
    ///
    /// # Errors
    ///
    /// The same as [`OrderedIndex::insert`](crate::OrderedIndex::insert).
    pub fn insert(&mut self, key: K) -> Result<()> {
        self.raw.insert(key)
    }

    /// Removes and returns the first box equal to `key`.
    ///
    /// # Errors
    ///
    /// [`Error::RemoveInconsistency`](crate::Error::RemoveInconsistency) on a corrupted tree.
    pub fn remove(&mut self, key: &K) -> Result<Option<K>> {
        self.raw.remove(key)
    }

    /// # Errors
    ///
    /// [`Error::RemoveInconsistency`](crate::Error::RemoveInconsistency) on a corrupted tree.
    pub fn pop_min(&mut self) -> Result<Option<K>> {
        self.raw.pop_first()
    }

    /// # Errors
    ///
    /// [`Error::RemoveInconsistency`](crate::Error::RemoveInconsistency) on a corrupted tree.
    pub fn pop_max(&mut self) -> Result<Option<K>> {
        self.raw.pop_last()
    }

    /// The matching box, borrowed for as long as the guard is held.
    #[must_use]
    pub fn get(&self, probe: &K) -> Option<&K> {
        self.raw.find(probe)
    }

    #[must_use]
    pub fn contains(&self, probe: &K) -> bool {
        self.raw.find(probe).is_some()
    }

    /// Runs `f` on the matching box, if any.
    pub fn apply<R>(&self, probe: &K, f: impl FnOnce(&K) -> R) -> Option<R> {
        self.raw.find(probe).map(f)
    }

    /// Smallest box, borrowed.
    #[must_use]
    pub fn min(&self) -> Option<&K> {
        self.raw.first()
    }

    /// Largest box, borrowed.
    #[must_use]
    pub fn max(&self) -> Option<&K> {
        self.raw.last()
    }

    /// Visits every box in ascending order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns.
    pub fn map<E>(&self, mut f: impl FnMut(&K) -> core::result::Result<(), E>) -> core::result::Result<(), E> {
        self.raw.try_for_each(&mut f)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.raw.count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.raw.depth()
    }

    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.raw.statistics()
    }

    /// Saves the tree as it stands inside the monitor. See
    /// [`OrderedIndex::save`](crate::OrderedIndex::save).
    ///
    /// # Errors
    ///
    /// The same as [`OrderedIndex::save`](crate::OrderedIndex::save).
    pub fn save<W: Write>(&mut self, out: &mut W) -> Result<usize> {
        self.raw.save(out)
    }

    /// Loads boxes into the held tree. See [`OrderedIndex::load`](crate::OrderedIndex::load).
    ///
    /// # Errors
    ///
    /// The same as [`OrderedIndex::load`](crate::OrderedIndex::load).
    pub fn load<R: Read>(&mut self, input: &mut R) -> Result<usize> {
        self.raw.load(input)
    }

    #[must_use]
    pub fn last_error(&self) -> ErrorKind {
        self.raw.last_error()
    }

    #[must_use]
    pub fn last_error_message(&self) -> &str {
        self.raw.last_error_message()
    }
}

impl<K> fmt::Debug for IndexGuard<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexGuard").field("count", &self.raw.count()).finish_non_exhaustive()
    }
}
