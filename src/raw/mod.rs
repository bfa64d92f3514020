mod bucket;
mod handle;
mod pool;
mod raw_index;

pub(crate) use raw_index::RawIndex;
