use smallvec::SmallVec;

use super::RawIndex;
use crate::raw::handle::BucketRef;
use crate::statistics::Statistics;

impl<K> RawIndex<K> {
    pub(crate) fn statistics(&self) -> Statistics {
        let mut stats = Statistics {
            freelist_depth: self.pool.free_len(),
            ..Statistics::default()
        };

        let mut stack: SmallVec<[(BucketRef, usize); 32]> = SmallVec::new();
        stack.extend(self.root.map(|root| (root, 1)));
        while let Some((handle, depth)) = stack.pop() {
            let bucket = self.pool.get(handle);
            stats.max_depth = stats.max_depth.max(depth);
            stats.box_count += bucket.used();
            stats.bucket_count += 1;
            stack.extend(bucket.children().iter().map(|&child| (child, depth + 1)));
        }
        stats
    }
}

#[cfg(not(feature = "visualize"))]
impl<K> RawIndex<K> {
    pub(crate) fn visualize(&mut self, _path: &std::path::Path) -> crate::error::Result<()> {
        Err(self.record(crate::error::Error::VisualizationUnsupported))
    }
}

#[cfg(feature = "visualize")]
mod dot {
    use core::fmt::Debug;
    use std::fs::File;
    use std::io::{self, BufWriter, Write};
    use std::path::Path;

    use super::RawIndex;
    use crate::error::{Error, Result};
    use crate::raw::handle::BucketRef;

    impl<K: Debug> RawIndex<K> {
        /// Writes the DOT rendering to a file at `path`.
        pub(crate) fn visualize(&mut self, path: &Path) -> Result<()> {
            let written = File::create(path).and_then(|file| {
                let mut out = BufWriter::new(file);
                self.write_dot(&mut out)?;
                out.flush()
            });
            match written {
                Ok(()) => {
                    log::debug!("wrote tree graph to {}", path.display());
                    Ok(())
                }
                Err(err) => Err(self.record(Error::Visualize(err))),
            }
        }

        /// Renders the bucket graph in Graphviz DOT. Each bucket is a record whose ports sit
        /// between the keys, one per child link.
        pub(crate) fn write_dot(&self, out: &mut dyn Write) -> io::Result<()> {
            writeln!(out, "digraph boxtree {{")?;
            writeln!(out, "    node [shape=record, fontname=\"monospace\"];")?;
            if let Some(root) = self.root {
                self.write_bucket(root, out)?;
            }
            writeln!(out, "}}")
        }

        fn write_bucket(&self, handle: BucketRef, out: &mut dyn Write) -> io::Result<()> {
            let bucket = self.pool.get(handle);

            write!(out, "    {handle} [label=\"<c0>")?;
            for (index, key) in bucket.keys().iter().enumerate() {
                write!(out, "|{}|<c{}>", escape(&format!("{key:?}")), index + 1)?;
            }
            writeln!(out, "\"];")?;

            for (index, &child) in bucket.children().iter().enumerate() {
                writeln!(out, "    {handle}:c{index} -> {child};")?;
            }
            for &child in bucket.children() {
                self.write_bucket(child, out)?;
            }
            Ok(())
        }
    }

    /// Escapes the characters that are structural inside a record label.
    fn escape(label: &str) -> String {
        let mut escaped = String::with_capacity(label.len());
        for c in label.chars() {
            if matches!(c, '"' | '\\' | '|' | '{' | '}' | '<' | '>') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }

}

#[cfg(test)]
mod tests {
    use crate::callbacks::NaturalOrder;
    use crate::order::{Order, PoolConfig};
    use crate::raw::RawIndex;

    #[test]
    fn statistics_follow_the_shape() {
        let mut tree = RawIndex::new(true, Box::new(NaturalOrder), Order::new(5).unwrap(), PoolConfig::new());
        assert_eq!(tree.statistics(), Default::default());

        for key in 0..5 {
            tree.insert(key).unwrap();
        }
        // [0 1] [2] [3 4]
        let stats = tree.statistics();
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.box_count, 5);
        assert_eq!(stats.bucket_count, 3);
        assert_eq!(stats.freelist_depth, 0);
        assert_eq!(stats.max_depth, tree.depth());

        for key in 0..3 {
            tree.remove(&key).unwrap();
        }
        let stats = tree.statistics();
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.box_count, 2);
        assert_eq!(stats.bucket_count, 1);
        assert_eq!(stats.freelist_depth, 2);
    }
}
