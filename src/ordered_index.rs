use core::fmt;
use std::io::{Read, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::callbacks::{Comparator, NaturalOrder, RangePredicate};
use crate::codec::{BoxReader, BoxWriter};
use crate::error::{Error, ErrorKind, Result};
use crate::order::{Order, PoolConfig};
use crate::raw::RawIndex;
use crate::statistics::Statistics;

mod builder;
mod guard;

pub use builder::IndexBuilder;
pub use guard::IndexGuard;

/// A thread-safe ordered index of boxes, built on a B-tree.
///
/// Boxes are ordered by a [`Comparator`] chosen at construction. Lookups either match a box
/// exactly or, with a [`RangePredicate`] configured, find the box whose range contains a probe.
/// This makes the index a natural fit for tables of memory ranges: store `(start, len)` boxes and
/// ask which one an arbitrary address falls into.
///
/// All operations take `&self`. One [`parking_lot::Mutex`] guards the whole tree and each call
/// holds it for its own duration; use [`enter_monitor`](Self::enter_monitor) to group several
/// operations under a single acquisition.
///
/// Lookups that hand a box out of the lock ([`get`](Self::get), [`min`](Self::min),
/// [`max`](Self::max), [`keys`](Self::keys)) clone it. Store small handles or `Arc`s if boxes are
/// heavy, or use [`apply`](Self::apply) to work on a box in place.
///
/// It is a logic error for a box to change its ordering relative to the other boxes while it is in
/// the index, or to replace the comparator of a populated index.
///
/// # Examples
///
/// ```
/// use boxtree::OrderedIndex;
///
/// let index = OrderedIndex::new(true);
/// for key in [5, 3, 8, 1, 4, 7, 9] {
///     index.insert(key)?;
/// }
///
/// assert_eq!(index.get(&4), Some(4));
/// assert_eq!(index.get(&6), None);
/// assert_eq!(index.min(), Some(1));
/// assert_eq!(index.count(), 7);
///
/// // Re-inserting into a unique index fails and leaves it as it was.
/// assert!(index.insert(8).is_err());
/// assert_eq!(index.count(), 7);
/// # Ok::<(), boxtree::Error>(())
/// ```
///
/// Range lookups over `(start, len)` boxes:
///
/// ```
/// use boxtree::OrderedIndex;
///
/// let index = OrderedIndex::with_comparator(true, |a: &(u64, u64), b: &(u64, u64)| a.0.cmp(&b.0));
/// index.set_range_predicate(|probe: &(u64, u64), range: &(u64, u64)| probe.0 < range.0 + range.1);
///
/// index.insert((0x1000, 0x100))?;
/// index.insert((0x2000, 0x40))?;
///
/// assert_eq!(index.get(&(0x2010, 0)), Some((0x2000, 0x40)));
/// assert_eq!(index.get(&(0x1100, 0)), None);
/// # Ok::<(), boxtree::Error>(())
/// ```
pub struct OrderedIndex<K> {
    inner: Mutex<RawIndex<K>>,
}

impl<K: Ord> OrderedIndex<K> {
    /// Makes a new, empty index ordered by `K`'s [`Ord`] implementation.
    ///
    /// A `unique` index rejects boxes equal to one it already holds; a non-unique index keeps
    /// every copy.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::OrderedIndex;
    ///
    /// let index = OrderedIndex::new(false);
    /// index.insert(1)?;
    /// index.insert(1)?;
    /// assert_eq!(index.count(), 2);
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    #[must_use]
    pub fn new(unique: bool) -> Self {
        Self::with_comparator(unique, NaturalOrder)
    }

    /// Starts configuring an index ordered by `K`'s [`Ord`] implementation.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::{OrderedIndex, PoolConfig};
    ///
    /// let index = OrderedIndex::<u32>::builder()
    ///     .unique(true)
    ///     .order(5)
    ///     .pool(PoolConfig::new().preallocate(16))
    ///     .build()?;
    /// assert_eq!(index.order().get(), 5);
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    #[must_use]
    pub fn builder() -> IndexBuilder<K> {
        IndexBuilder::with_comparator(NaturalOrder)
    }
}

impl<K> OrderedIndex<K> {
    /// Makes a new, empty index of the default [`Order`], ordered by `compare`.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::OrderedIndex;
    ///
    /// let index = OrderedIndex::with_comparator(true, |a: &i32, b: &i32| b.cmp(a));
    /// index.insert(1)?;
    /// index.insert(2)?;
    /// assert_eq!(index.min(), Some(2));
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    #[must_use]
    pub fn with_comparator(unique: bool, compare: impl Comparator<K> + 'static) -> Self {
        Self::with_pool(unique, compare, Order::DEFAULT, PoolConfig::new())
    }

    /// Makes a new, empty index with an explicit order and bucket pool.
    ///
    /// With [`PoolConfig::max_buckets`] set, an insert that would need more buckets than the pool
    /// can supply fails with [`Error::OutOfMemory`] and leaves the index untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::{Error, NaturalOrder, Order, OrderedIndex, PoolConfig};
    ///
    /// let index = OrderedIndex::with_pool(true, NaturalOrder, Order::new(3)?, PoolConfig::new().max_buckets(1));
    /// index.insert(1)?;
    /// index.insert(2)?;
    /// // The only bucket is full and splitting it needs two more.
    /// assert!(matches!(index.insert(3), Err(Error::OutOfMemory { needed: 2, available: 0 })));
    /// assert_eq!(index.keys(), [1, 2]);
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    #[must_use]
    pub fn with_pool(unique: bool, compare: impl Comparator<K> + 'static, order: Order, pool: PoolConfig) -> Self {
        Self::from_raw(RawIndex::new(unique, Box::new(compare), order, pool))
    }

    pub(crate) fn from_raw(raw: RawIndex<K>) -> Self {
        Self {
            inner: Mutex::new(raw),
        }
    }

    /// The branching order the index was built with.
    #[must_use]
    pub fn order(&self) -> Order {
        self.inner.lock().order()
    }

    /// Whether the index rejects duplicates.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.inner.lock().is_unique()
    }

    /// Replaces the comparator.
    ///
    /// Only meaningful on an empty index: the existing buckets are not reordered.
    pub fn set_comparator(&self, compare: impl Comparator<K> + 'static) {
        self.inner.lock().set_comparator(Box::new(compare));
    }

    /// Makes lookups match any box whose range contains the probe, instead of an equal box.
    pub fn set_range_predicate(&self, contains: impl RangePredicate<K> + 'static) {
        self.inner.lock().set_range_predicate(Some(Box::new(contains)));
    }

    /// Sets the callback [`destroy`](Self::destroy) drains the index into.
    pub fn set_finalizer(&self, finalize: impl FnMut(K) + Send + 'static) {
        self.inner.lock().set_finalizer(Some(Box::new(finalize)));
    }

    /// Sets the codec [`save`](Self::save) writes through.
    pub fn set_writer(&self, writer: impl BoxWriter<K> + 'static) {
        self.inner.lock().set_writer(Some(Box::new(writer)));
    }

    /// Sets the codec [`load`](Self::load) reads through.
    pub fn set_reader(&self, reader: impl BoxReader<K> + 'static) {
        self.inner.lock().set_reader(Some(Box::new(reader)));
    }

    /// Locks the index until the returned guard is dropped.
    ///
    /// The guard offers the same operations without locking again, so a sequence of calls on it is
    /// atomic with respect to every other thread.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::OrderedIndex;
    ///
    /// let index = OrderedIndex::new(true);
    /// let mut guard = index.enter_monitor();
    /// if !guard.contains(&7) {
    ///     guard.insert(7)?;
    /// }
    /// guard.leave();
    /// assert_eq!(index.count(), 1);
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    pub fn enter_monitor(&self) -> IndexGuard<'_, K> {
        IndexGuard::new(self.inner.lock())
    }

    /// Inserts a box.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateKey`] if the index is unique and an equal box is met on the way down, and
    /// [`Error::OutOfMemory`] if a capped bucket pool cannot cover the splits. In both cases the
    /// index is unchanged.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn insert(&self, key: K) -> Result<()> {
        self.inner.lock().insert(key)
    }

    /// Removes a box equal to `key` and returns it. Removing an absent box is not an error.
    ///
    /// # Errors
    ///
    /// [`Error::RemoveInconsistency`] if the tree turns out to be missing a child link.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::OrderedIndex;
    ///
    /// let index = OrderedIndex::new(true);
    /// index.insert(3)?;
    /// assert_eq!(index.remove(&3)?, Some(3));
    /// assert_eq!(index.remove(&3)?, None);
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    pub fn remove(&self, key: &K) -> Result<Option<K>> {
        self.inner.lock().remove(key)
    }

    /// Removes and returns the smallest box.
    ///
    /// # Errors
    ///
    /// [`Error::RemoveInconsistency`] on a corrupted tree.
    pub fn pop_min(&self) -> Result<Option<K>> {
        self.inner.lock().pop_first()
    }

    /// Removes and returns the greatest box.
    ///
    /// # Errors
    ///
    /// [`Error::RemoveInconsistency`] on a corrupted tree.
    pub fn pop_max(&self) -> Result<Option<K>> {
        self.inner.lock().pop_last()
    }

    /// Returns a copy of the box matching `probe`.
    ///
    /// The match is the greatest box not ordered after `probe`, accepted if the range predicate
    /// says it contains `probe` or, without a predicate, if it equals `probe`.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn get(&self, probe: &K) -> Option<K>
    where
        K: Clone,
    {
        self.inner.lock().find(probe).cloned()
    }

    /// Whether some box matches `probe`, as [`get`](Self::get) decides it.
    #[must_use]
    pub fn contains(&self, probe: &K) -> bool {
        self.inner.lock().find(probe).is_some()
    }

    /// Looks up `probe` and hands the matching box to `f`, all under one lock acquisition.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::OrderedIndex;
    ///
    /// let index = OrderedIndex::new(true);
    /// index.insert(String::from("needle"))?;
    /// assert_eq!(index.apply(&"needle".into(), |s| s.len()), Some(6));
    /// assert_eq!(index.apply(&"hay".into(), |s| s.len()), None);
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    pub fn apply<R>(&self, probe: &K, f: impl FnOnce(&K) -> R) -> Option<R> {
        self.inner.lock().find(probe).map(f)
    }

    /// The smallest box.
    #[must_use]
    pub fn min(&self) -> Option<K>
    where
        K: Clone,
    {
        self.inner.lock().first().cloned()
    }

    /// The greatest box.
    #[must_use]
    pub fn max(&self) -> Option<K>
    where
        K: Clone,
    {
        self.inner.lock().last().cloned()
    }

    /// Calls `f` on every box in ascending order, stopping at the first error and returning it.
    ///
    /// The index stays locked for the whole walk; `f` must not call back into it.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::OrderedIndex;
    ///
    /// let index = OrderedIndex::new(true);
    /// for key in [30, 10, 20] {
    ///     index.insert(key)?;
    /// }
    ///
    /// let mut seen = Vec::new();
    /// let stopped = index.map(|&key| {
    ///     if key > 10 {
    ///         return Err(key);
    ///     }
    ///     seen.push(key);
    ///     Ok(())
    /// });
    /// assert_eq!(stopped, Err(20));
    /// assert_eq!(seen, [10]);
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    pub fn map<E>(&self, mut f: impl FnMut(&K) -> core::result::Result<(), E>) -> core::result::Result<(), E> {
        self.inner.lock().try_for_each(&mut f)
    }

    /// Every box in ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let mut keys = Vec::new();
        let _ = self.map(|key| {
            keys.push(key.clone());
            Ok::<(), core::convert::Infallible>(())
        });
        keys
    }

    /// Number of boxes.
    ///
    /// # Complexity
    ///
    /// O(n): every bucket is visited.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.lock().count()
    }

    /// Whether the index holds no boxes.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Levels from the root to the leaves; 0 for an empty index.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.lock().depth()
    }

    /// Number of boxes, as counted by a [`statistics`](Self::statistics) walk.
    #[must_use]
    pub fn box_count(&self) -> usize {
        self.statistics().box_count
    }

    /// Walks the tree and reports its shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::OrderedIndex;
    ///
    /// let index = OrderedIndex::new(true);
    /// for key in 0..1000 {
    ///     index.insert(key)?;
    /// }
    /// let stats = index.statistics();
    /// assert_eq!(stats.box_count, 1000);
    /// assert_eq!(stats.max_depth, 2);
    /// println!("{stats}");
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.inner.lock().statistics()
    }

    /// Writes every box, in ascending order, through the configured [`BoxWriter`]. Returns the
    /// number of boxes written.
    ///
    /// # Errors
    ///
    /// [`Error::NoWriter`] without a writer, [`Error::Save`] if the writer fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::OrderedIndex;
    /// use boxtree::codec::{BinaryCodec, FramedCodec};
    ///
    /// let index = OrderedIndex::new(true);
    /// index.set_writer(FramedCodec::new(BinaryCodec));
    /// index.insert(7u16)?;
    ///
    /// let mut bytes = Vec::new();
    /// assert_eq!(index.save(&mut bytes)?, 1);
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    pub fn save<W: Write>(&self, out: &mut W) -> Result<usize> {
        self.inner.lock().save(out)
    }

    /// Inserts every box the configured [`BoxReader`] produces. Returns the number of boxes read.
    ///
    /// # Errors
    ///
    /// [`Error::NoReader`] without a reader. [`Error::Corrupted`] if the stream ends early or fails
    /// to decode. [`Error::LoadRejected`] if the index refuses a box, carrying the insert error.
    /// Either way the boxes read up to that point stay in the index.
    pub fn load<R: Read>(&self, input: &mut R) -> Result<usize> {
        self.inner.lock().load(input)
    }

    /// Writes a Graphviz DOT rendering of the bucket graph to `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Visualize`] if the file cannot be written.
    #[cfg(feature = "visualize")]
    pub fn visualize(&self, path: impl AsRef<Path>) -> Result<()>
    where
        K: fmt::Debug,
    {
        self.inner.lock().visualize(path.as_ref())
    }

    /// Writes a Graphviz DOT rendering of the bucket graph to `path`.
    ///
    /// # Errors
    ///
    /// Always [`Error::VisualizationUnsupported`]: the crate was built without the `visualize`
    /// feature.
    #[cfg(not(feature = "visualize"))]
    pub fn visualize(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.lock().visualize(path.as_ref())
    }

    /// Kind of the last failure, [`ErrorKind::None`] once an insert or remove has started since.
    #[must_use]
    pub fn last_error(&self) -> ErrorKind {
        self.inner.lock().last_error()
    }

    /// Message of the last failure, empty when [`last_error`](Self::last_error) is
    /// [`ErrorKind::None`].
    #[must_use]
    pub fn last_error_message(&self) -> String {
        self.inner.lock().last_error_message().to_owned()
    }

    /// Tears the index down.
    ///
    /// With a finalizer, every box is removed smallest first and passed to it. Without one, only an
    /// empty index can be destroyed; a populated one comes back inside the error.
    ///
    /// Simply dropping an index drops its boxes without calling the finalizer.
    ///
    /// # Errors
    ///
    /// [`DestroyError`] wrapping [`Error::StillPopulated`] (or a remove failure), with the index
    /// recoverable through [`DestroyError::into_inner`].
    ///
    /// # Examples
    ///
    /// ```
    /// use boxtree::OrderedIndex;
    ///
    /// let index = OrderedIndex::new(true);
    /// index.insert(1)?;
    ///
    /// let index = index.destroy().unwrap_err().into_inner();
    /// index.set_finalizer(|key| println!("released {key}"));
    /// assert!(index.destroy().is_ok());
    /// # Ok::<(), boxtree::Error>(())
    /// ```
    pub fn destroy(self) -> core::result::Result<(), DestroyError<K>> {
        let mut raw = self.inner.into_inner();
        match raw.drain() {
            Ok(drained) => {
                log::debug!("index destroyed after draining {drained} box(es)");
                Ok(())
            }
            Err(error) => Err(DestroyError {
                index: Self::from_raw(raw),
                error,
            }),
        }
    }
}

impl<K: Ord> Default for OrderedIndex<K> {
    /// An empty unique index.
    fn default() -> Self {
        Self::new(true)
    }
}

impl<K> fmt::Debug for OrderedIndex<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.inner.lock();
        f.debug_struct("OrderedIndex")
            .field("order", &raw.order().get())
            .field("unique", &raw.is_unique())
            .field("count", &raw.count())
            .finish_non_exhaustive()
    }
}

/// The error returned by [`OrderedIndex::destroy`], carrying the index it refused to destroy.
#[derive(thiserror::Error)]
#[error("cannot destroy index: {error}")]
pub struct DestroyError<K> {
    index: OrderedIndex<K>,
    #[source]
    error: Error,
}

impl<K> DestroyError<K> {
    /// Why the index was not destroyed.
    #[must_use]
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Takes the index back.
    #[must_use]
    pub fn into_inner(self) -> OrderedIndex<K> {
        self.index
    }
}

impl<K> fmt::Debug for DestroyError<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyError").field("error", &self.error).finish_non_exhaustive()
    }
}
