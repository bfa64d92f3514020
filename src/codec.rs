//! Bulk save/load plumbing.
//!
//! [`OrderedIndex::save`](crate::OrderedIndex::save) and [`load`](crate::OrderedIndex::load) drive a
//! [`BoxWriter`] / [`BoxReader`] pair configured on the index; the tree itself never decides how a
//! box is laid out. [`FramedCodec`] is a ready-made pair for boxes with a [`KeyCodec`].
//!
//! # Framed stream format
//!
//! ```text
//! +-----------+-------------+------------+---------+-- ... --+---------+-----------+
//! | "BTIX" 4B | version 1B  | count 8B   | record0 |         | recordN | "BTND" 4B |
//! +-----------+-------------+------------+---------+-- ... --+---------+-----------+
//!
//! record:
//! +---------+---------+--- ... ---+
//! | CRC 4B  | Len 4B  | Payload   |
//! +---------+---------+--- ... ---+
//! ```
//!
//! Integers are little-endian. The CRC32 covers the length bytes and the payload.

use std::io::{self, Read, Write};

use crc32fast::Hasher;

/// Magic bytes opening a framed stream.
pub const MAGIC: [u8; 4] = *b"BTIX";
/// Magic bytes closing a framed stream.
pub const TRAILER: [u8; 4] = *b"BTND";
/// Version byte written after [`MAGIC`].
pub const FORMAT_VERSION: u8 = 1;

/// Length of the per-record header: CRC (4 bytes) + length (4 bytes).
const RECORD_HEADER_SIZE: usize = 8;

/// Serializes the boxes of an index, in order.
///
/// `count` is the total number of boxes in the stream and is passed to every call.
pub trait BoxWriter<K>: Send {
    /// Called once before the first box.
    fn begin(&mut self, out: &mut dyn Write, count: usize) -> io::Result<()>;

    /// Called once per box, in ascending order.
    fn write_box(&mut self, out: &mut dyn Write, key: &K, count: usize) -> io::Result<()>;

    /// Called once after the last box.
    fn end(&mut self, out: &mut dyn Write, count: usize) -> io::Result<()>;
}

/// Deserializes boxes written by a matching [`BoxWriter`].
pub trait BoxReader<K>: Send {
    /// Reads the stream preamble and returns how many boxes follow.
    fn begin(&mut self, input: &mut dyn Read) -> io::Result<usize>;

    /// Reads the next box. A stream that ends early reports [`io::ErrorKind::UnexpectedEof`].
    fn read_box(&mut self, input: &mut dyn Read) -> io::Result<K>;

    /// Reads whatever follows the last box.
    fn end(&mut self, input: &mut dyn Read) -> io::Result<()>;
}

/// Converts a single box to and from bytes.
pub trait KeyCodec<K>: Send {
    /// Appends the encoding of `key` to `buf`.
    fn encode(&self, key: &K, buf: &mut Vec<u8>);

    /// Decodes a payload produced by [`encode`](KeyCodec::encode).
    fn decode(&self, bytes: &[u8]) -> io::Result<K>;
}

/// Fixed-width little-endian encoding for integers, raw bytes for `Vec<u8>`, UTF-8 for `String`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

macro_rules! binary_codec_int {
    ($($int:ty),* $(,)?) => {
        $(
            impl KeyCodec<$int> for BinaryCodec {
                fn encode(&self, key: &$int, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&key.to_le_bytes());
                }

                fn decode(&self, bytes: &[u8]) -> io::Result<$int> {
                    let raw = bytes.try_into().map_err(|_| {
                        invalid_data(format!(
                            "expected {} byte payload for {}, got {}",
                            core::mem::size_of::<$int>(),
                            stringify!($int),
                            bytes.len()
                        ))
                    })?;
                    Ok(<$int>::from_le_bytes(raw))
                }
            }
        )*
    };
}

binary_codec_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl KeyCodec<Vec<u8>> for BinaryCodec {
    fn encode(&self, key: &Vec<u8>, buf: &mut Vec<u8>) {
        buf.extend_from_slice(key);
    }

    fn decode(&self, bytes: &[u8]) -> io::Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

impl KeyCodec<String> for BinaryCodec {
    fn encode(&self, key: &String, buf: &mut Vec<u8>) {
        buf.extend_from_slice(key.as_bytes());
    }

    fn decode(&self, bytes: &[u8]) -> io::Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(invalid_data)
    }
}

/// A [`BoxWriter`] and [`BoxReader`] producing the CRC-checked framed format described in the
/// [module documentation](self).
///
/// # Examples
///
/// ```
/// use boxtree::OrderedIndex;
/// use boxtree::codec::{BinaryCodec, FramedCodec};
///
/// let index = OrderedIndex::new(true);
/// index.set_writer(FramedCodec::new(BinaryCodec));
/// for addr in [0x1000u64, 0x2000, 0x3000] {
///     index.insert(addr)?;
/// }
///
/// let mut bytes = Vec::new();
/// index.save(&mut bytes)?;
///
/// let copy = OrderedIndex::<u64>::new(true);
/// copy.set_reader(FramedCodec::new(BinaryCodec));
/// copy.load(&mut bytes.as_slice())?;
/// assert_eq!(copy.keys(), vec![0x1000, 0x2000, 0x3000]);
/// # Ok::<(), boxtree::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct FramedCodec<C> {
    codec: C,
    buf: Vec<u8>,
}

impl<C> FramedCodec<C> {
    pub fn new(codec: C) -> Self {
        Self { codec, buf: Vec::new() }
    }
}

impl<K, C: KeyCodec<K>> BoxWriter<K> for FramedCodec<C> {
    fn begin(&mut self, out: &mut dyn Write, count: usize) -> io::Result<()> {
        out.write_all(&MAGIC)?;
        out.write_all(&[FORMAT_VERSION])?;
        out.write_all(&(count as u64).to_le_bytes())
    }

    fn write_box(&mut self, out: &mut dyn Write, key: &K, _count: usize) -> io::Result<()> {
        self.buf.clear();
        self.buf.resize(RECORD_HEADER_SIZE, 0);
        self.codec.encode(key, &mut self.buf);

        let len = u32::try_from(self.buf.len() - RECORD_HEADER_SIZE)
            .map_err(|_| invalid_data("encoded box does not fit a 32-bit length"))?;
        self.buf[4..8].copy_from_slice(&len.to_le_bytes());

        let mut hasher = Hasher::new();
        hasher.update(&self.buf[4..]);
        let crc = hasher.finalize();
        self.buf[0..4].copy_from_slice(&crc.to_le_bytes());

        out.write_all(&self.buf)
    }

    fn end(&mut self, out: &mut dyn Write, _count: usize) -> io::Result<()> {
        out.write_all(&TRAILER)?;
        out.flush()
    }
}

impl<K, C: KeyCodec<K>> BoxReader<K> for FramedCodec<C> {
    fn begin(&mut self, input: &mut dyn Read) -> io::Result<usize> {
        let mut magic = [0u8; 4];
        input.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(invalid_data("stream does not start with the index magic"));
        }

        let mut version = [0u8; 1];
        input.read_exact(&mut version)?;
        if version[0] != FORMAT_VERSION {
            return Err(invalid_data(format!("unsupported format version {}", version[0])));
        }

        let mut count = [0u8; 8];
        input.read_exact(&mut count)?;
        usize::try_from(u64::from_le_bytes(count)).map_err(invalid_data)
    }

    fn read_box(&mut self, input: &mut dyn Read) -> io::Result<K> {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        input.read_exact(&mut header)?;
        let crc = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        // The buffer grows with the bytes actually read, never with the declared length.
        self.buf.clear();
        Read::take(&mut *input, u64::from(len)).read_to_end(&mut self.buf)?;
        if self.buf.len() != len as usize {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("box record declares {len} bytes, stream holds {}", self.buf.len()),
            ));
        }

        let mut hasher = Hasher::new();
        hasher.update(&header[4..]);
        hasher.update(&self.buf);
        if hasher.finalize() != crc {
            return Err(invalid_data("box record failed its checksum"));
        }

        self.codec.decode(&self.buf)
    }

    fn end(&mut self, input: &mut dyn Read) -> io::Result<()> {
        let mut trailer = [0u8; 4];
        input.read_exact(&mut trailer)?;
        if trailer != TRAILER {
            return Err(invalid_data("stream does not end with the index trailer"));
        }
        Ok(())
    }
}

fn invalid_data<E>(err: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, err)
}
