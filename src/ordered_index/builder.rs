use core::fmt;

use super::OrderedIndex;
use crate::callbacks::{Comparator, Finalizer, RangePredicate};
use crate::codec::{BoxReader, BoxWriter};
use crate::error::Result;
use crate::order::{Order, PoolConfig};
use crate::raw::RawIndex;

/// Configures an [`OrderedIndex`] before it is shared.
///
/// Start from [`OrderedIndex::builder`] for `Ord` boxes, or from
/// [`IndexBuilder::with_comparator`] for any other ordering. Unless changed, the index is unique,
/// of order [`Order::DEFAULT`], and backed by an unbounded pool.
///
/// # Examples
///
/// ```
/// use boxtree::IndexBuilder;
/// use boxtree::codec::{BinaryCodec, FramedCodec};
///
/// let index = IndexBuilder::with_comparator(|a: &u64, b: &u64| a.cmp(b))
///     .range_predicate(|probe: &u64, start: &u64| *probe < *start + 4096)
///     .writer(FramedCodec::new(BinaryCodec))
///     .reader(FramedCodec::new(BinaryCodec))
///     .build()?;
///
/// index.insert(0x10000)?;
/// assert!(index.contains(&0x10fff));
/// assert!(!index.contains(&0x11000));
/// # Ok::<(), boxtree::Error>(())
/// ```
#[must_use = "a builder does nothing until `build` is called"]
pub struct IndexBuilder<K> {
    unique: bool,
    order: usize,
    pool: PoolConfig,
    comparator: Box<dyn Comparator<K>>,
    range: Option<Box<dyn RangePredicate<K>>>,
    finalizer: Option<Finalizer<K>>,
    writer: Option<Box<dyn BoxWriter<K>>>,
    reader: Option<Box<dyn BoxReader<K>>>,
}

impl<K> IndexBuilder<K> {
    pub fn with_comparator(compare: impl Comparator<K> + 'static) -> Self {
        Self {
            unique: true,
            order: Order::DEFAULT.get(),
            pool: PoolConfig::new(),
            comparator: Box::new(compare),
            range: None,
            finalizer: None,
            writer: None,
            reader: None,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Branching order; validated by [`build`](Self::build).
    pub fn order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn comparator(mut self, compare: impl Comparator<K> + 'static) -> Self {
        self.comparator = Box::new(compare);
        self
    }

    pub fn range_predicate(mut self, contains: impl RangePredicate<K> + 'static) -> Self {
        self.range = Some(Box::new(contains));
        self
    }

    pub fn finalizer(mut self, finalize: impl FnMut(K) + Send + 'static) -> Self {
        self.finalizer = Some(Box::new(finalize));
        self
    }

    pub fn writer(mut self, writer: impl BoxWriter<K> + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn reader(mut self, reader: impl BoxReader<K> + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Creates the index.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOrder`](crate::Error::InvalidOrder) if the order is even or below 3.
    pub fn build(self) -> Result<OrderedIndex<K>> {
        let order = Order::new(self.order)?;
        let mut raw = RawIndex::new(self.unique, self.comparator, order, self.pool);
        raw.set_range_predicate(self.range);
        raw.set_finalizer(self.finalizer);
        raw.set_writer(self.writer);
        raw.set_reader(self.reader);
        Ok(OrderedIndex::from_raw(raw))
    }
}

impl<K> fmt::Debug for IndexBuilder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("unique", &self.unique)
            .field("order", &self.order)
            .field("pool", &self.pool)
            .field("range_predicate", &self.range.is_some())
            .field("finalizer", &self.finalizer.is_some())
            .field("writer", &self.writer.is_some())
            .field("reader", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, OrderedIndex};

    #[test]
    fn invalid_order_is_reported_at_build() {
        let err = OrderedIndex::<i32>::builder().order(4).build().unwrap_err();
        assert!(matches!(err, Error::InvalidOrder(4)));
    }

    #[test]
    fn defaults_are_unique_and_order_101() {
        let index = OrderedIndex::<i32>::builder().build().unwrap();
        assert!(index.is_unique());
        assert_eq!(index.order().get(), 101);
    }

    #[test]
    fn finalizer_set_on_the_builder_drains_on_destroy() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let index = OrderedIndex::builder()
            .unique(false)
            .order(3)
            .finalizer(move |_: u8| {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .build()
            .unwrap();
        for key in [1, 1, 2, 3, 3, 3] {
            index.insert(key).unwrap();
        }
        index.destroy().unwrap();
        assert_eq!(released.load(Ordering::Relaxed), 6);
    }
}
