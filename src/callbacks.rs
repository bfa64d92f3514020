//! Ordering and containment capabilities injected into an index.

use core::cmp::Ordering;

/// A total order over stored boxes.
///
/// Implementations must be consistent across calls: antisymmetric (`compare(a, b)` is the reverse
/// of `compare(b, a)`) and transitive. Two boxes comparing [`Ordering::Equal`] are duplicates as far
/// as a unique index is concerned.
///
/// Any `Fn(&K, &K) -> Ordering + Send + Sync` closure is a comparator.
pub trait Comparator<K>: Send + Sync {
    /// Compares two boxes.
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

impl<K, F> Comparator<K> for F
where
    F: Fn(&K, &K) -> Ordering + Send + Sync,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

/// Orders boxes by their [`Ord`] implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<K: Ord> Comparator<K> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Decides whether a probe falls inside the range a stored box covers.
///
/// Lookups only ask this of the greatest box not ordered after the probe, so a predicate for
/// `[start, start + len)` boxes only has to check the upper end. Without a predicate, lookups fall
/// back to comparator equality.
///
/// Any `Fn(&K, &K) -> bool + Send + Sync` closure taking `(probe, candidate)` is a predicate.
pub trait RangePredicate<K>: Send + Sync {
    /// Returns `true` if `probe` lies within `candidate`.
    fn contains(&self, probe: &K, candidate: &K) -> bool;
}

impl<K, F> RangePredicate<K> for F
where
    F: Fn(&K, &K) -> bool + Send + Sync,
{
    #[inline]
    fn contains(&self, probe: &K, candidate: &K) -> bool {
        self(probe, candidate)
    }
}

/// Receives each box drained by [`OrderedIndex::destroy`](crate::OrderedIndex::destroy).
pub type Finalizer<K> = Box<dyn FnMut(K) + Send>;
