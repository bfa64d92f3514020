use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use boxtree::codec::{BinaryCodec, BoxReader, BoxWriter, FramedCodec};
use boxtree::{Error, ErrorKind, IndexBuilder, NaturalOrder, Order, OrderedIndex, PoolConfig};
use pretty_assertions::assert_eq;

// ─── Bulk insert ─────────────────────────────────────────────────────────────

#[test]
fn half_a_million_ascending_keys_stay_shallow() {
    let index = OrderedIndex::new(true);
    for key in 1..=500_000u64 {
        index.insert(key).unwrap();
    }

    let stats = index.statistics();
    assert_eq!(stats.box_count, 500_000);
    assert!(stats.max_depth <= 7, "{stats}");
    assert_eq!(stats.max_depth, 4);
    assert_eq!(index.get(&250_000), Some(250_000));
    assert_eq!(index.min(), Some(1));
    assert_eq!(index.max(), Some(500_000));
}

// ─── Small fixed scenarios ───────────────────────────────────────────────────

#[test]
fn duplicate_insert_is_rejected() {
    let index = OrderedIndex::new(true);
    for key in [10, 20, 30] {
        index.insert(key).unwrap();
    }
    assert!(matches!(index.insert(20), Err(Error::DuplicateKey)));
    assert_eq!(index.last_error(), ErrorKind::DuplicateKeyOnInsert);
    assert_eq!(index.count(), 3);
}

#[test]
fn lookup_hits_and_misses() {
    let index = OrderedIndex::new(true);
    for key in [5, 3, 8, 1, 4, 7, 9] {
        index.insert(key).unwrap();
    }
    assert_eq!(index.get(&4), Some(4));
    assert_eq!(index.get(&6), None);
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Span {
    start: u64,
    len: u64,
}

fn span_index() -> OrderedIndex<Span> {
    IndexBuilder::with_comparator(|a: &Span, b: &Span| a.start.cmp(&b.start))
        .order(5)
        .range_predicate(|probe: &Span, span: &Span| probe.start < span.start + span.len)
        .build()
        .unwrap()
}

fn pointer(start: u64) -> Span {
    Span { start, len: 0 }
}

#[test]
fn interior_pointers_find_their_span() {
    let index = span_index();
    // Spans of 16 bytes every 32 bytes, leaving a 16 byte hole after each.
    for n in 0..1_000 {
        index.insert(Span { start: n * 32, len: 16 }).unwrap();
    }

    assert_eq!(index.get(&pointer(0)), Some(Span { start: 0, len: 16 }));
    assert_eq!(index.get(&pointer(15)), Some(Span { start: 0, len: 16 }));
    assert_eq!(index.get(&pointer(16)), None);
    assert_eq!(index.get(&pointer(32 * 500 + 7)), Some(Span { start: 32 * 500, len: 16 }));
    assert_eq!(index.get(&pointer(32 * 999 + 15)), Some(Span { start: 32 * 999, len: 16 }));
    assert_eq!(index.get(&pointer(32 * 1_000)), None);

    for n in 0..1_000 {
        let probe = pointer(n * 32 + n % 16);
        assert!(index.contains(&probe), "{probe:?}");
        assert!(!index.contains(&pointer(n * 32 + 16 + n % 16)));
    }
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[test]
fn threads_inserting_disjoint_ranges() {
    const PER_THREAD: u64 = 10_000;
    let index = Arc::new(OrderedIndex::new(true));

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for key in t * PER_THREAD..(t + 1) * PER_THREAD {
                    index.insert(key).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.count(), 4 * PER_THREAD as usize);
    assert_eq!(index.keys(), (0..4 * PER_THREAD).collect::<Vec<_>>());
}

#[test]
fn readers_and_writers_share_one_index() {
    let index = Arc::new(OrderedIndex::new(true));
    for key in (0..2_000u32).step_by(2) {
        index.insert(key).unwrap();
    }

    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for key in (1..2_000u32).step_by(2) {
                index.insert(key).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for key in (0..2_000u32).step_by(2) {
                    assert_eq!(index.get(&key), Some(key));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(index.count(), 2_000);
}

// ─── Save / load ─────────────────────────────────────────────────────────────

#[test_log::test]
fn framed_round_trip() {
    let source = OrderedIndex::new(true);
    source.set_writer(FramedCodec::new(BinaryCodec));
    for key in (0..5_000i64).map(|k| k * 7 - 10_000) {
        source.insert(key).unwrap();
    }
    let mut bytes = Vec::new();
    assert_eq!(source.save(&mut bytes).unwrap(), 5_000);

    let copy = OrderedIndex::<i64>::with_pool(true, NaturalOrder, Order::new(9).unwrap(), PoolConfig::new());
    copy.set_reader(FramedCodec::new(BinaryCodec));
    assert_eq!(copy.load(&mut bytes.as_slice()).unwrap(), 5_000);
    assert_eq!(copy.keys(), source.keys());
}

/// Writes one decimal key per line after a count line.
struct TextCodec;

impl BoxWriter<u32> for TextCodec {
    fn begin(&mut self, out: &mut dyn Write, count: usize) -> io::Result<()> {
        writeln!(out, "{count}")
    }

    fn write_box(&mut self, out: &mut dyn Write, key: &u32, _count: usize) -> io::Result<()> {
        writeln!(out, "{key}")
    }

    fn end(&mut self, out: &mut dyn Write, _count: usize) -> io::Result<()> {
        out.flush()
    }
}

fn read_line(input: &mut dyn Read) -> io::Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        input.read_exact(&mut byte)?;
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    String::from_utf8(line).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn parse<T: std::str::FromStr>(line: &str) -> io::Result<T> {
    line.parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, format!("not a number: {line:?}")))
}

impl BoxReader<u32> for TextCodec {
    fn begin(&mut self, input: &mut dyn Read) -> io::Result<usize> {
        parse(&read_line(input)?)
    }

    fn read_box(&mut self, input: &mut dyn Read) -> io::Result<u32> {
        parse(&read_line(input)?)
    }

    fn end(&mut self, _input: &mut dyn Read) -> io::Result<()> {
        Ok(())
    }
}

#[test_log::test]
fn user_codec_round_trip() {
    let source = OrderedIndex::new(true);
    source.set_writer(TextCodec);
    for key in [42u32, 7, 1_000, 3] {
        source.insert(key).unwrap();
    }
    let mut text = Vec::new();
    source.save(&mut text).unwrap();
    assert_eq!(String::from_utf8(text.clone()).unwrap(), "4\n3\n7\n42\n1000\n");

    let copy = OrderedIndex::<u32>::new(true);
    copy.set_reader(TextCodec);
    copy.load(&mut text.as_slice()).unwrap();
    assert_eq!(copy.keys(), vec![3, 7, 42, 1_000]);
}

#[test_log::test]
fn load_reports_how_far_it_got() {
    let copy = OrderedIndex::<u32>::new(true);
    copy.set_reader(TextCodec);
    let err = copy.load(&mut "5\n1\n2\nthree\n4\n5\n".as_bytes()).unwrap_err();

    assert!(matches!(err, Error::Corrupted { loaded: 2, expected: 5, .. }), "{err:?}");
    assert_eq!(copy.last_error(), ErrorKind::Load);
    assert!(copy.last_error_message().starts_with("Cannot read btree entirely"));
    assert_eq!(copy.keys(), vec![1, 2]);
}

#[test_log::test]
fn loading_a_duplicate_rejects_the_box() {
    let copy = OrderedIndex::<u32>::new(true);
    copy.set_reader(TextCodec);
    copy.insert(2).unwrap();
    let err = copy.load(&mut "3\n1\n2\n3\n".as_bytes()).unwrap_err();
    match err {
        Error::LoadRejected { loaded, expected, source } => {
            assert_eq!((loaded, expected), (1, 3));
            assert!(matches!(*source, Error::DuplicateKey), "{source:?}");
        }
        other => panic!("expected a rejected box, got {other:?}"),
    }
    assert_eq!(copy.last_error(), ErrorKind::Load);
    assert_eq!(copy.keys(), vec![1, 2]);
}

#[test]
fn save_without_writer() {
    let index = OrderedIndex::<u32>::new(true);
    assert!(matches!(index.save(&mut io::sink()), Err(Error::NoWriter)));
    assert_eq!(index.last_error(), ErrorKind::Save);
    assert_eq!(index.last_error_message(), "No writer function, tree not written");
}

// ─── Pool limits ─────────────────────────────────────────────────────────────

#[test_log::test]
fn capped_pool_refuses_then_recycles() {
    let index = OrderedIndex::with_pool(true, NaturalOrder, Order::new(5).unwrap(), PoolConfig::new().max_buckets(4));
    let mut inserted = Vec::new();
    let mut next = 0;
    let err = loop {
        match index.insert(next) {
            Ok(()) => inserted.push(next),
            Err(err) => break err,
        }
        next += 1;
    };

    assert!(matches!(err, Error::OutOfMemory { .. }), "{err:?}");
    assert_eq!(index.last_error(), ErrorKind::OutOfMemory);
    assert_eq!(index.keys(), inserted);

    // Emptying the tree puts every bucket on the free-list, and the same inserts fit again.
    let buckets = index.statistics().bucket_count;
    for key in &inserted {
        index.remove(key).unwrap();
    }
    assert_eq!(index.statistics().freelist_depth, buckets);
    for &key in &inserted {
        index.insert(key).unwrap();
    }
    assert_eq!(index.statistics().freelist_depth, 0);
    assert!(matches!(index.insert(next), Err(Error::OutOfMemory { .. })));
}

// ─── Teardown ────────────────────────────────────────────────────────────────

#[test_log::test]
fn destroy_drains_in_order_through_the_finalizer() {
    let released = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&released);
    let index = OrderedIndex::new(true);
    index.set_finalizer(move |key: u16| sink.lock().unwrap().push(key));
    for key in (0..1_000u16).rev() {
        index.insert(key).unwrap();
    }

    index.destroy().unwrap();
    assert_eq!(*released.lock().unwrap(), (0..1_000u16).collect::<Vec<_>>());
}

#[test_log::test]
fn destroy_refuses_a_populated_index_without_finalizer() {
    let index = OrderedIndex::new(true);
    index.insert(1u8).unwrap();

    let err = index.destroy().unwrap_err();
    assert!(matches!(err.error(), Error::StillPopulated { count: 1 }));

    let index = err.into_inner();
    assert_eq!(index.last_error(), ErrorKind::StillPopulated);
    index.remove(&1).unwrap();
    index.destroy().unwrap();
}

#[test]
fn dropping_skips_the_finalizer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let index = OrderedIndex::new(true);
    index.set_finalizer(move |_: u8| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    index.insert(1).unwrap();
    drop(index);
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

// ─── Diagnostics ─────────────────────────────────────────────────────────────

#[test]
fn statistics_report_renders() {
    let index = OrderedIndex::new(true);
    for key in 0..10_000u32 {
        index.insert(key).unwrap();
    }
    let report = index.statistics().to_string();
    assert!(report.contains("Number of boxes stored        :    10000"), "{report}");
    assert!(report.contains("Freelist depth                :        0"), "{report}");
}

#[cfg(not(feature = "visualize"))]
#[test]
fn visualize_is_unsupported_by_default() {
    let index = OrderedIndex::<u8>::new(true);
    assert!(matches!(index.visualize("unused.dot"), Err(Error::VisualizationUnsupported)));
    assert_eq!(index.last_error(), ErrorKind::Visualize);
}

#[cfg(feature = "visualize")]
#[test]
fn visualize_writes_a_dot_file() {
    let index = OrderedIndex::new(true);
    for key in 0..500u32 {
        index.insert(key).unwrap();
    }
    let path = std::env::temp_dir().join(format!("boxtree-{}.dot", std::process::id()));
    index.visualize(&path).unwrap();

    let dot = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(dot.starts_with("digraph boxtree {"));
    assert_eq!(dot.matches("[label=").count(), index.statistics().bucket_count);
}
