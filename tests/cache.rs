mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rstest::rstest;
use seekio::io::RandomAccess;
use seekio::{Context, IoConfig, RandomAccessReader};

fn files(dir: &std::path::Path, n: usize) -> Vec<(String, Vec<u8>)> {
    (0..n)
        .map(|i| {
            let data = common::pattern(1000 + i);
            let path = common::write_plain(dir, &format!("f{i}.bin"), &data);
            (common::id(&path), data)
        })
        .collect()
}

#[test]
fn open_handles_stay_bounded_and_reads_survive_eviction() {
    let dir = tempfile::tempdir().unwrap();
    let sources = files(dir.path(), 30);
    let ctx = Context::new(IoConfig::default().with_max_open_handles(12));

    let mut readers = Vec::new();
    for (id, _) in &sources {
        readers.push(RandomAccessReader::open_in(Arc::clone(&ctx), id).unwrap());
        assert!(ctx.cache().open_count() <= 12);
    }
    assert!(readers.iter().filter(|r| !r.is_open()).count() >= 18);

    for round in 0..3u64 {
        for (r, (_, data)) in readers.iter_mut().zip(&sources) {
            let at = 100 * round + 7;
            r.seek(at).unwrap();
            let mut buf = [0u8; 16];
            r.read_fully(&mut buf).unwrap();
            assert_eq!(&buf, &data[at as usize..at as usize + 16]);
            assert!(ctx.cache().open_count() <= 12);
        }
    }
}

type Writer = fn(&Path, &str, &[u8]) -> PathBuf;

#[rstest]
#[case::gzip(common::write_gzip as Writer, "gz")]
#[case::bzip2(common::write_bzip2 as Writer, "bz2")]
fn evicted_compressed_readers_rebuild_their_windows(#[case] write: Writer, #[case] ext: &str) {
    let dir = tempfile::tempdir().unwrap();
    let sources: Vec<_> = (0..25)
        .map(|i| {
            let data = common::pattern(40_000 + i);
            let path = write(dir.path(), &format!("f{i}.bin.{ext}"), &data);
            (common::id(&path), data)
        })
        .collect();
    let ctx = Context::new(
        IoConfig::default()
            .with_max_open_handles(12)
            .with_max_overhead(4096)
            .with_mark_limit(16 * 1024),
    );

    let mut readers: Vec<_> = sources
        .iter()
        .map(|(id, _)| RandomAccessReader::open_in(Arc::clone(&ctx), id).unwrap())
        .collect();
    assert!(readers.iter().all(|r| r.is_compressed()));
    assert!(ctx.cache().open_count() <= 12);

    // past the prefix, inside it, then behind the mark left by the first read
    for at in [30_000u64, 100, 20_000] {
        for (r, (_, data)) in readers.iter_mut().zip(&sources) {
            r.seek(at).unwrap();
            let mut buf = [0u8; 64];
            r.read_fully(&mut buf).unwrap();
            assert_eq!(&buf[..], &data[at as usize..at as usize + 64]);
            assert!(ctx.cache().open_count() <= 12);
        }
    }
    assert!(readers.iter().filter(|r| !r.is_open()).count() >= 13);
}

#[test]
fn least_recently_read_readers_are_closed_first() {
    let dir = tempfile::tempdir().unwrap();
    let sources = files(dir.path(), 13);
    let ctx = Context::new(IoConfig::default().with_max_open_handles(12));

    let mut readers: Vec<_> = sources[..12]
        .iter()
        .map(|(id, _)| RandomAccessReader::open_in(Arc::clone(&ctx), id).unwrap())
        .collect();
    // touch the first reader last so it is the most recent
    readers[0].read_u8().unwrap();

    let newest = RandomAccessReader::open_in(Arc::clone(&ctx), &sources[12].0).unwrap();
    assert!(newest.is_open());
    assert!(readers[0].is_open());
    assert!(!readers[1].is_open());
    assert_eq!(ctx.cache().open_count(), 2);
}

#[test]
fn mapped_memory_readers_are_never_evicted() {
    let ctx = Context::new(IoConfig::default().with_max_open_handles(1));
    let readers: Vec<_> = (0..5u8)
        .map(|i| {
            let id = format!("virtual-{i}");
            ctx.location().map_bytes(&id, vec![i; 8]);
            RandomAccessReader::open_in(Arc::clone(&ctx), &id).unwrap()
        })
        .collect();
    assert!(readers.iter().all(|r| r.is_open()));
    assert_eq!(ctx.cache().open_count(), 5);
}

#[test]
fn dropping_a_reader_releases_its_slot() {
    let dir = tempfile::tempdir().unwrap();
    let sources = files(dir.path(), 2);
    let ctx = Context::new(IoConfig::default());
    let a = RandomAccessReader::open_in(Arc::clone(&ctx), &sources[0].0).unwrap();
    let _b = RandomAccessReader::open_in(Arc::clone(&ctx), &sources[1].0).unwrap();
    assert_eq!(ctx.cache().open_count(), 2);
    drop(a);
    assert_eq!(ctx.cache().open_count(), 1);
}

#[test]
fn id_mapping_redirects_reads() {
    let dir = tempfile::tempdir().unwrap();
    let sources = files(dir.path(), 1);
    let ctx = Context::new(IoConfig::default());
    ctx.location().map_id("alias.tif", &sources[0].0);
    let mut r = RandomAccessReader::open_in(Arc::clone(&ctx), "alias.tif").unwrap();
    assert_eq!(r.length(), 1000);
    assert_eq!(r.read_u8().unwrap(), sources[0].1[0]);
    assert!(ctx.location().check_valid_id("alias.tif", ctx.config()).is_ok());
    assert!(ctx.location().check_valid_id("no/such/file", ctx.config()).is_err());
}
