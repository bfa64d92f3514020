use core::fmt;
use core::num::NonZero;

#[cfg(test)]
type RawHandle = u16;
#[cfg(not(test))]
type RawHandle = u32;

/// Index of a bucket slot inside the [`Pool`](super::pool::Pool).
///
/// Zero is reserved so that `Option<BucketRef>` costs no extra space; slot `i` is stored as `i + 1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub(crate) struct BucketRef(NonZero<RawHandle>);

impl BucketRef {
    pub(crate) const MAX: usize = (RawHandle::MAX - 1) as usize;

    #[inline]
    pub(crate) const fn from_slot(slot: usize) -> Self {
        assert!(slot <= Self::MAX, "`BucketRef::from_slot()` - `slot` > `BucketRef::MAX`!");
        #[allow(clippy::cast_possible_truncation)]
        match NonZero::new((slot + 1) as RawHandle) {
            Some(raw) => Self(raw),
            None => unreachable!(),
        }
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

// Used as the node identifier in diagnostics output.
impl fmt::Display for BucketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bucket{}", self.slot())
    }
}
