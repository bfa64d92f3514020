use std::io;

/// Result returning [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Category of the last failure recorded on an index.
///
/// Read it back with [`OrderedIndex::last_error`](crate::OrderedIndex::last_error). Insert and
/// remove reset it to [`ErrorKind::None`] before they start.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    #[default]
    None,
    DuplicateKeyOnInsert,
    RemoveInconsistency,
    Save,
    Load,
    Visualize,
    OutOfMemory,
    InvalidOrder,
    StillPopulated,
}

/// Errors returned by index operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Insertion of duplicate elements is not allowed in this btree")]
    DuplicateKey,

    #[error("btree is inconsistent: a bucket is missing a child link during remove")]
    RemoveInconsistency,

    #[error("No writer function, tree not written")]
    NoWriter,

    #[error("writer failed, tree not written completely: {0}")]
    Save(#[source] io::Error),

    #[error("No reader function, tree not read")]
    NoReader,

    #[error("Cannot read btree entirely ({loaded} of {expected} boxes), file and memory may be corrupted")]
    Corrupted {
        loaded: usize,
        expected: usize,
        #[source]
        source: io::Error,
    },

    /// The stream was intact but the index refused a box, e.g. a duplicate or a full pool.
    #[error("Cannot read btree entirely ({loaded} of {expected} boxes), box rejected: {source}")]
    LoadRejected {
        loaded: usize,
        expected: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("visualize has not been enabled in this distribution")]
    VisualizationUnsupported,

    #[error("cannot write visualization: {0}")]
    Visualize(#[source] io::Error),

    #[error("bucket pool exhausted: insert needs {needed} bucket(s), {available} available")]
    OutOfMemory { needed: usize, available: usize },

    #[error("order must be odd and at least 3, got {0}")]
    InvalidOrder(usize),

    #[error("tree still holds {count} box(es) and has no finalizer")]
    StillPopulated { count: usize },
}

impl Error {
    /// The [`ErrorKind`] this error is recorded as.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DuplicateKey => ErrorKind::DuplicateKeyOnInsert,
            Error::RemoveInconsistency => ErrorKind::RemoveInconsistency,
            Error::NoWriter | Error::Save(_) => ErrorKind::Save,
            Error::NoReader | Error::Corrupted { .. } | Error::LoadRejected { .. } => ErrorKind::Load,
            Error::VisualizationUnsupported | Error::Visualize(_) => ErrorKind::Visualize,
            Error::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Error::InvalidOrder(_) => ErrorKind::InvalidOrder,
            Error::StillPopulated { .. } => ErrorKind::StillPopulated,
        }
    }
}
