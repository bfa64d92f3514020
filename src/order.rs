use crate::error::{Error, Result};

/// The branching order of an index, together with the thresholds derived from it.
///
/// A bucket overflows when it reaches [`max_keys`](Order::max_keys) keys, so outside of a split it
/// holds at most `max_keys - 1` keys and `max_keys` children. The order must be odd so that a full
/// bucket has an exact middle key to promote.
///
/// | order | `max_keys` | `split_left` | `middle_index` | `split_right_start` | `underflow_threshold` |
/// |-------|------------|--------------|----------------|---------------------|-----------------------|
/// | 101   | 101        | 50           | 50             | 51                  | 50                    |
/// | 5     | 5          | 2            | 2              | 3                   | 2                     |
///
/// # Examples
///
/// ```
/// use boxtree::Order;
///
/// let order = Order::new(5)?;
/// assert_eq!(order.middle_index(), 2);
/// assert_eq!(order.split_right_start(), 3);
///
/// assert!(Order::new(4).is_err());
/// assert_eq!(Order::default(), Order::DEFAULT);
/// # Ok::<(), boxtree::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Order(usize);

impl Order {
    /// Order 101: at most 100 keys per bucket, four levels hold well over a million boxes.
    pub const DEFAULT: Self = Self(101);

    /// Validates `order` (odd, at least 3).
    pub fn new(order: usize) -> Result<Self> {
        if order < 3 || order % 2 == 0 {
            return Err(Error::InvalidOrder(order));
        }
        Ok(Self(order))
    }

    /// The configured order.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Key count at which a bucket splits.
    #[must_use]
    pub const fn max_keys(self) -> usize {
        self.0
    }

    /// Most keys a bucket holds between operations.
    #[must_use]
    pub const fn max_used(self) -> usize {
        self.0 - 1
    }

    /// Keys kept by the left half of a split.
    #[must_use]
    pub const fn split_left(self) -> usize {
        self.0 / 2
    }

    /// Position of the key promoted by a split.
    #[must_use]
    pub const fn middle_index(self) -> usize {
        self.0 / 2
    }

    /// First key moved to the right half of a split.
    #[must_use]
    pub const fn split_right_start(self) -> usize {
        self.0 / 2 + 1
    }

    /// A non-root bucket with fewer keys than this is in underflow.
    #[must_use]
    pub const fn underflow_threshold(self) -> usize {
        self.0 / 2
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sizing of the bucket pool backing an index.
///
/// `preallocate` reserves slot storage up front. `max_buckets` caps the number of buckets the index
/// may ever hold; an insert that would need more fails with [`Error::OutOfMemory`] before touching
/// the tree. Buckets released by removals go to a free-list and count against the cap until reused.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolConfig {
    /// Bucket slots to reserve when the index is created.
    pub preallocate: usize,
    /// Upper bound on buckets, `None` for unbounded.
    pub max_buckets: Option<usize>,
}

impl PoolConfig {
    /// An unbounded pool with no preallocation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            preallocate: 0,
            max_buckets: None,
        }
    }

    #[must_use]
    pub const fn preallocate(mut self, buckets: usize) -> Self {
        self.preallocate = buckets;
        self
    }

    #[must_use]
    pub const fn max_buckets(mut self, buckets: usize) -> Self {
        self.max_buckets = Some(buckets);
        self
    }
}
