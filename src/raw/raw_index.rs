mod insert;
mod remove;
mod stats;

use core::cmp::Ordering;
use std::io::{self, Read, Write};

use super::bucket::Bucket;
use super::handle::BucketRef;
use super::pool::Pool;
use crate::callbacks::{Comparator, Finalizer, RangePredicate};
use crate::codec::{BoxReader, BoxWriter};
use crate::error::{Error, ErrorKind, Result};
use crate::order::{Order, PoolConfig};

/// The lock-free B-tree engine behind [`OrderedIndex`](crate::OrderedIndex).
///
/// Buckets live in a [`Pool`] and refer to their children by [`BucketRef`]. There are no parent
/// links; insert and remove recurse from the root and carry the path on the call stack.
pub(crate) struct RawIndex<K> {
    pool: Pool<Bucket<K>>,
    root: Option<BucketRef>,
    order: Order,
    unique: bool,
    comparator: Box<dyn Comparator<K>>,
    range: Option<Box<dyn RangePredicate<K>>>,
    finalizer: Option<Finalizer<K>>,
    writer: Option<Box<dyn BoxWriter<K>>>,
    reader: Option<Box<dyn BoxReader<K>>>,
    error: ErrorKind,
    message: String,
}

impl<K> RawIndex<K> {
    pub(crate) fn new(unique: bool, comparator: Box<dyn Comparator<K>>, order: Order, pool: PoolConfig) -> Self {
        Self {
            pool: Pool::new(pool.preallocate, pool.max_buckets),
            root: None,
            order,
            unique,
            comparator,
            range: None,
            finalizer: None,
            writer: None,
            reader: None,
            error: ErrorKind::None,
            message: String::new(),
        }
    }

    // ─── Configuration ───

    pub(crate) fn set_comparator(&mut self, comparator: Box<dyn Comparator<K>>) {
        self.comparator = comparator;
    }

    pub(crate) fn set_range_predicate(&mut self, range: Option<Box<dyn RangePredicate<K>>>) {
        self.range = range;
    }

    pub(crate) fn set_finalizer(&mut self, finalizer: Option<Finalizer<K>>) {
        self.finalizer = finalizer;
    }

    pub(crate) fn set_writer(&mut self, writer: Option<Box<dyn BoxWriter<K>>>) {
        self.writer = writer;
    }

    pub(crate) fn set_reader(&mut self, reader: Option<Box<dyn BoxReader<K>>>) {
        self.reader = reader;
    }

    pub(crate) fn order(&self) -> Order {
        self.order
    }

    pub(crate) fn is_unique(&self) -> bool {
        self.unique
    }

    // ─── Error bookkeeping ───

    pub(crate) fn last_error(&self) -> ErrorKind {
        self.error
    }

    pub(crate) fn last_error_message(&self) -> &str {
        &self.message
    }

    fn clear_error(&mut self) {
        self.error = ErrorKind::None;
        self.message.clear();
    }

    /// Remembers `err` as the last failure and hands it back for returning.
    fn record(&mut self, err: Error) -> Error {
        self.error = err.kind();
        self.message = err.to_string();
        err
    }

    // ─── Lookup ───

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn compare(&self, a: &K, b: &K) -> Ordering {
        self.comparator.compare(a, b)
    }

    /// Whether `candidate` answers a lookup for `probe`.
    fn covers(&self, probe: &K, candidate: &K) -> bool {
        match &self.range {
            Some(range) => range.contains(probe, candidate),
            None => self.compare(probe, candidate) == Ordering::Equal,
        }
    }

    /// Finds the box containing `probe`.
    ///
    /// Each bucket is scanned from the top for the greatest key not ordered after `probe`. If that
    /// key covers the probe the search ends, otherwise it continues in the child just right of it.
    pub(crate) fn find(&self, probe: &K) -> Option<&K> {
        let mut current = self.root?;
        loop {
            let bucket = self.pool.get(current);
            let next = match bucket.floor(probe, &*self.comparator) {
                Some(index) => {
                    let candidate = bucket.key(index);
                    if self.covers(probe, candidate) {
                        return Some(candidate);
                    }
                    index + 1
                }
                None => 0,
            };
            current = bucket.child(next)?;
        }
    }

    pub(crate) fn first(&self) -> Option<&K> {
        let mut current = self.root?;
        while let Some(child) = self.pool.get(current).child(0) {
            current = child;
        }
        self.pool.get(current).keys().first()
    }

    pub(crate) fn last(&self) -> Option<&K> {
        let mut current = self.root?;
        loop {
            let bucket = self.pool.get(current);
            match bucket.child(bucket.used()) {
                Some(child) => current = child,
                None => return bucket.keys().last(),
            }
        }
    }

    /// Calls `f` on every box in order, stopping at the first error.
    pub(crate) fn try_for_each<E, F>(&self, f: &mut F) -> core::result::Result<(), E>
    where
        F: FnMut(&K) -> core::result::Result<(), E>,
    {
        match self.root {
            Some(root) => self.walk(root, f),
            None => Ok(()),
        }
    }

    fn walk<E, F>(&self, handle: BucketRef, f: &mut F) -> core::result::Result<(), E>
    where
        F: FnMut(&K) -> core::result::Result<(), E>,
    {
        let bucket = self.pool.get(handle);
        for (index, key) in bucket.keys().iter().enumerate() {
            if let Some(child) = bucket.child(index) {
                self.walk(child, f)?;
            }
            f(key)?;
        }
        match bucket.child(bucket.used()) {
            Some(child) => self.walk(child, f),
            None => Ok(()),
        }
    }

    /// Number of boxes, summed over every reachable bucket.
    pub(crate) fn count(&self) -> usize {
        self.root.map_or(0, |root| self.count_from(root))
    }

    fn count_from(&self, handle: BucketRef) -> usize {
        let bucket = self.pool.get(handle);
        bucket.used() + bucket.children().iter().map(|&child| self.count_from(child)).sum::<usize>()
    }

    /// Levels from the root to the leaves.
    pub(crate) fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.root;
        while let Some(handle) = current {
            depth += 1;
            current = self.pool.get(handle).child(0);
        }
        depth
    }

    // ─── Lifecycle ───

    /// Feeds every box, smallest first, to the finalizer and leaves the index empty.
    ///
    /// Without a finalizer a populated index is left untouched.
    pub(crate) fn drain(&mut self) -> Result<usize> {
        let Some(mut finalize) = self.finalizer.take() else {
            if self.is_empty() {
                return Ok(0);
            }
            let count = self.count();
            log::warn!("refusing to destroy an index still holding {count} box(es) without a finalizer");
            return Err(self.record(Error::StillPopulated { count }));
        };

        let mut drained = 0;
        let result = loop {
            match self.pop_first() {
                Ok(Some(key)) => {
                    finalize(key);
                    drained += 1;
                }
                Ok(None) => break Ok(drained),
                Err(err) => break Err(err),
            }
        };
        self.finalizer = Some(finalize);
        log::debug!("drained {drained} box(es) through the finalizer");
        result
    }

    // ─── Save / load ───

    /// Streams every box, in order, through the configured writer.
    pub(crate) fn save(&mut self, out: &mut dyn Write) -> Result<usize> {
        let Some(mut writer) = self.writer.take() else {
            return Err(self.record(Error::NoWriter));
        };
        let count = self.count();
        let result = self.write_boxes(&mut *writer, out, count);
        self.writer = Some(writer);

        match result {
            Ok(()) => {
                log::debug!("saved {count} box(es)");
                Ok(count)
            }
            Err(err) => Err(self.record(Error::Save(err))),
        }
    }

    fn write_boxes(&self, writer: &mut dyn BoxWriter<K>, out: &mut dyn Write, count: usize) -> io::Result<()> {
        writer.begin(out, count)?;
        self.try_for_each(&mut |key: &K| writer.write_box(out, key, count))?;
        writer.end(out, count)
    }

    /// Inserts every box the configured reader produces. Boxes read before a failure stay in the
    /// index.
    pub(crate) fn load(&mut self, input: &mut dyn Read) -> Result<usize> {
        let Some(mut reader) = self.reader.take() else {
            return Err(self.record(Error::NoReader));
        };
        let result = self.read_boxes(&mut *reader, input);
        self.reader = Some(reader);

        match result {
            Ok(loaded) => {
                log::debug!("loaded {loaded} box(es)");
                Ok(loaded)
            }
            Err(err) => {
                log::warn!("{err}");
                Err(self.record(err))
            }
        }
    }

    fn read_boxes(&mut self, reader: &mut dyn BoxReader<K>, input: &mut dyn Read) -> Result<usize> {
        let expected = reader.begin(input).map_err(|source| Error::Corrupted {
            loaded: 0,
            expected: 0,
            source,
        })?;
        for loaded in 0..expected {
            let corrupted = |source: io::Error| Error::Corrupted {
                loaded,
                expected,
                source,
            };
            let key = reader.read_box(input).map_err(corrupted)?;
            self.insert(key).map_err(|err| Error::LoadRejected {
                loaded,
                expected,
                source: Box::new(err),
            })?;
        }
        reader.end(input).map_err(|source| Error::Corrupted {
            loaded: expected,
            expected,
            source,
        })?;
        Ok(expected)
    }

    // ─── Pool plumbing ───

    fn alloc_bucket(&mut self) -> BucketRef {
        let order = self.order;
        self.pool.alloc(|| Bucket::new(order))
    }

    fn release_bucket(&mut self, handle: BucketRef) {
        self.pool.get_mut(handle).clear();
        self.pool.release(handle);
    }
}
