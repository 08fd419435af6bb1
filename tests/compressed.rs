mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rstest::rstest;
use seekio::io::{Origin, RandomAccess};
use seekio::{Context, Error, HandleKind, IoConfig, RandomAccessReader, RandomAccessWriter, StreamHandle};

const LEN: usize = 300_000;

#[derive(Debug, Clone, Copy)]
enum Fixture {
    Gzip,
    Bzip2,
    Zip,
}

impl Fixture {
    fn write(self, dir: &Path, data: &[u8]) -> PathBuf {
        match self {
            Fixture::Gzip => common::write_gzip(dir, "data.bin.gz", data),
            Fixture::Bzip2 => common::write_bzip2(dir, "data.bin.bz2", data),
            Fixture::Zip => common::write_zip(dir, "data.bin.zip", &[("data.bin", data)]),
        }
    }

    fn kind(self) -> HandleKind {
        match self {
            Fixture::Gzip => HandleKind::Gzip,
            Fixture::Bzip2 => HandleKind::Bzip2,
            Fixture::Zip => HandleKind::Zip,
        }
    }
}

fn small_windows(lazy_seek: bool) -> Arc<Context> {
    Context::new(
        IoConfig::default()
            .with_max_overhead(4096)
            .with_mark_limit(16 * 1024)
            .with_lazy_seek(lazy_seek),
    )
}

#[rstest]
#[case(Fixture::Gzip, false)]
#[case(Fixture::Bzip2, false)]
#[case(Fixture::Bzip2, true)]
#[case(Fixture::Zip, false)]
#[case(Fixture::Zip, true)]
fn seeking_matches_the_decoded_bytes(#[case] fixture: Fixture, #[case] lazy_seek: bool) {
    let dir = tempfile::tempdir().unwrap();
    let data = common::pattern(LEN);
    let path = fixture.write(dir.path(), &data);

    let mut r = RandomAccessReader::open_in(small_windows(lazy_seek), &common::id(&path)).unwrap();
    assert_eq!(r.kind(), fixture.kind());
    assert!(r.is_compressed());
    assert_eq!(r.length(), LEN as u64);

    // prefix, forward skips, rewinds inside and outside the mark window, the tail
    let offsets = [0, 100, 4000, 90_000, 89_000, 200_000, 10, 299_990, 150_000, 149_999];
    for &at in &offsets {
        r.seek(at).unwrap();
        let mut buf = vec![0u8; 32.min(LEN - at as usize)];
        r.read_fully(&mut buf).unwrap();
        assert_eq!(buf, data[at as usize..at as usize + buf.len()], "at offset {at}");
    }
}

#[rstest]
#[case(Fixture::Gzip)]
#[case(Fixture::Bzip2)]
#[case(Fixture::Zip)]
fn sequential_typed_reads_span_many_windows(#[case] fixture: Fixture) {
    let dir = tempfile::tempdir().unwrap();
    let data = common::pattern(LEN);
    let path = fixture.write(dir.path(), &data);

    let mut r = RandomAccessReader::open_in(small_windows(false), &common::id(&path)).unwrap();
    for chunk in data.chunks_exact(4).take(20_000) {
        let expected = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        assert_eq!(r.read_u32().unwrap(), expected);
    }
}

#[test]
fn zip_members_named_like_the_archive_are_chosen() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_zip(
        dir.path(),
        "data.bin.zip",
        &[("README.txt", b"read me"), ("nested/data.bin", b"payload")],
    );
    let mut r = RandomAccessReader::open_in(Context::new(IoConfig::default()), &common::id(&path)).unwrap();
    assert_eq!(r.read_string(64).unwrap(), "payload");

    let mut explicit = StreamHandle::zip_entry(&path, "README.txt").unwrap();
    let mut buf = [0u8; 7];
    explicit.read_fully(&mut buf).unwrap();
    assert_eq!(&buf, b"read me");
    assert!(StreamHandle::zip_entry(&path, "missing").is_err());
}

#[test]
fn mislabeled_archives_are_rejected_or_read_plain() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_plain(dir.path(), "notes.gz", b"just text");
    assert!(matches!(Origin::gzip(&path), Err(Error::FormatMismatch { .. })));

    let mut r = RandomAccessReader::open_in(Context::new(IoConfig::default()), &common::id(&path)).unwrap();
    assert_eq!(r.kind(), HandleKind::File);
    assert_eq!(r.read_string(4).unwrap(), "just");
}

#[test]
fn archives_can_be_read_as_plain_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_gzip(dir.path(), "data.gz", b"abc");
    let ctx = Context::new(IoConfig::default().with_allow_archives(false));
    let mut r = RandomAccessReader::open_in(ctx, &common::id(&path)).unwrap();
    assert_eq!(r.kind(), HandleKind::File);
    assert_eq!(r.read_u16().unwrap(), 0x1f8b);
}

#[test]
fn compressed_stores_refuse_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_gzip(dir.path(), "data.gz", b"abc");
    let ctx = Context::new(IoConfig::default());
    assert!(matches!(
        RandomAccessWriter::open_in(&ctx, &common::id(&path)),
        Err(Error::ReadOnly(_))
    ));

    let mut handle = StreamHandle::gzip(&path).unwrap();
    assert!(matches!(handle.write_u8(1), Err(Error::Unimplemented(_))));
}

#[test]
fn lines_are_found_across_the_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let text: String = (0..5000).map(|i| format!("line {i}\n")).collect();
    let path = common::write_bzip2(dir.path(), "log.txt.bz2", text.as_bytes());
    let ctx = Context::new(
        IoConfig::default()
            .with_max_overhead(4096)
            .with_mark_limit(16 * 1024)
            .with_block_size(64),
    );
    let mut r = RandomAccessReader::open_in(ctx, &common::id(&path)).unwrap();

    for i in 0..5000 {
        assert_eq!(r.read_line().unwrap(), Some(format!("line {i}")));
    }
    assert_eq!(r.read_line().unwrap(), None);
}
