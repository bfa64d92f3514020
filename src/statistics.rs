use core::fmt;

/// Shape of an index, as gathered by [`OrderedIndex::statistics`](crate::OrderedIndex::statistics).
///
/// The [`Display`](fmt::Display) implementation renders a plain-text report:
///
/// ```text
/// --------------------------------------------------
/// boxtree statistics
/// --------------------------------------------------
/// Maximum tree depth            :        2
/// Number of boxes stored        :      150
/// Number of buckets             :        4
/// Freelist depth                :        0
/// --------------------------------------------------
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Statistics {
    /// Levels from the root down to the leaves; 0 for an empty index.
    pub max_depth: usize,
    /// Boxes stored across all buckets.
    pub box_count: usize,
    /// Buckets reachable from the root.
    pub bucket_count: usize,
    /// Released buckets waiting on the free-list.
    pub freelist_depth: usize,
}

const RULE: &str = "--------------------------------------------------";

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "boxtree statistics")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Maximum tree depth            : {:8}", self.max_depth)?;
        writeln!(f, "Number of boxes stored        : {:8}", self.box_count)?;
        writeln!(f, "Number of buckets             : {:8}", self.bucket_count)?;
        writeln!(f, "Freelist depth                : {:8}", self.freelist_depth)?;
        writeln!(f, "{RULE}")
    }
}
