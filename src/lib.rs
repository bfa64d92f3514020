//! A thread-safe B-tree index of boxes, with range lookups.
//!
//! [`OrderedIndex`] keeps opaque boxes in the order of a user-supplied [`Comparator`]. Besides
//! exact lookups it answers "which box contains this probe" queries through a [`RangePredicate`],
//! which is what a table of memory ranges needs: store one box per allocated region and look up
//! arbitrary interior addresses.
//!
//! # Example
//!
//! ```
//! use boxtree::OrderedIndex;
//!
//! #[derive(Clone, Copy, Debug, PartialEq)]
//! struct Region {
//!     start: usize,
//!     len: usize,
//! }
//!
//! let regions = OrderedIndex::with_comparator(true, |a: &Region, b: &Region| a.start.cmp(&b.start));
//! regions.set_range_predicate(|probe: &Region, r: &Region| probe.start < r.start + r.len);
//!
//! regions.insert(Region { start: 0x1000, len: 0x200 })?;
//! regions.insert(Region { start: 0x4000, len: 0x10 })?;
//!
//! let probe = Region { start: 0x11ff, len: 0 };
//! assert_eq!(regions.get(&probe), Some(Region { start: 0x1000, len: 0x200 }));
//!
//! regions.remove(&Region { start: 0x1000, len: 0 })?;
//! assert_eq!(regions.get(&probe), None);
//! # Ok::<(), boxtree::Error>(())
//! ```
//!
//! # Features
//!
//! - **Configurable order** - buckets of up to `order - 1` boxes, 101 by default
//! - **Bounded memory** - an optional bucket cap turns pool exhaustion into an [`Error`]
//! - **Pluggable persistence** - [`save`](OrderedIndex::save) and [`load`](OrderedIndex::load) go
//!   through [`codec::BoxWriter`] / [`codec::BoxReader`]; [`codec::FramedCodec`] is a CRC-checked
//!   stream format ready to use
//! - **`visualize`** (cargo feature) - Graphviz DOT output of the bucket graph
//!
//! # Implementation
//!
//! A classic B-tree: every bucket holds boxes, internal buckets also hold `used + 1` child links.
//! Buckets live in a pool and are addressed by compact handles; buckets freed by merges are kept on
//! a free-list and reused by later splits. Inserts split full buckets and bubble the median up;
//! removals rotate boxes between siblings or merge them to keep every bucket but the root at least
//! half full.

// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]

mod callbacks;
mod error;
mod order;
mod ordered_index;
mod raw;
mod statistics;

pub mod codec;

pub use callbacks::{Comparator, Finalizer, NaturalOrder, RangePredicate};
pub use error::{Error, ErrorKind, Result};
pub use order::{Order, PoolConfig};
pub use ordered_index::{DestroyError, IndexBuilder, IndexGuard, OrderedIndex};
pub use statistics::Statistics;

/// Name, version and threading model of this build.
///
/// ```
/// assert!(boxtree::version().starts_with("boxtree v"));
/// ```
#[must_use]
pub const fn version() -> &'static str {
    concat!("boxtree v", env!("CARGO_PKG_VERSION"), " (Thread Support)")
}
