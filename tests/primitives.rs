mod common;

use rstest::rstest;
use seekio::io::RandomAccess;
use seekio::{Endian, Error, Handle, MemoryHandle, RandomAccessReader, RandomAccessWriter};

fn written(order: Endian, f: impl FnOnce(&mut RandomAccessWriter)) -> RandomAccessReader {
    let mut w = RandomAccessWriter::in_memory();
    w.set_order(order);
    f(&mut w);
    let Handle::Memory(m) = w.into_handle() else {
        panic!("expected a memory store");
    };
    let mut r = RandomAccessReader::from_bytes(m.into_vec()).unwrap();
    r.set_order(order);
    r
}

#[rstest]
#[case(Endian::Big)]
#[case(Endian::Little)]
fn typed_values_survive_a_write_and_read(#[case] order: Endian) {
    let mut r = written(order, |w| {
        w.write_bool(true).unwrap();
        w.write_i8(-5).unwrap();
        w.write_u16(0xbeef).unwrap();
        w.write_i16(-1234).unwrap();
        w.write_u32(0xdead_beef).unwrap();
        w.write_i32(i32::MIN).unwrap();
        w.write_u64(0x0123_4567_89ab_cdef).unwrap();
        w.write_i64(-42).unwrap();
        w.write_f32(1.5).unwrap();
        w.write_f64(-0.125).unwrap();
        w.write_utf("nul\0 and \u{1f600}").unwrap();
    });
    assert!(r.read_bool().unwrap());
    assert_eq!(r.read_i8().unwrap(), -5);
    assert_eq!(r.read_u16().unwrap(), 0xbeef);
    assert_eq!(r.read_i16().unwrap(), -1234);
    assert_eq!(r.read_u32().unwrap(), 0xdead_beef);
    assert_eq!(r.read_i32().unwrap(), i32::MIN);
    assert_eq!(r.read_u64().unwrap(), 0x0123_4567_89ab_cdef);
    assert_eq!(r.read_i64().unwrap(), -42);
    assert_eq!(r.read_f32().unwrap(), 1.5);
    assert_eq!(r.read_f64().unwrap(), -0.125);
    assert_eq!(r.read_utf().unwrap(), "nul\0 and \u{1f600}");
    assert_eq!(r.position(), r.length());
}

#[test]
fn little_endian_bytes_read_big_endian_are_swapped() {
    let mut r = written(Endian::Little, |w| w.write_u32(0x0102_0304).unwrap());
    assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
    r.seek(0).unwrap();
    r.set_order(Endian::Big);
    assert_eq!(r.read_u32().unwrap(), 0x0403_0201);
}

#[test]
fn memory_grows_to_twice_the_needed_size() {
    let mut m = MemoryHandle::with_capacity(4);
    m.write(&[7; 10]).unwrap();
    assert_eq!(m.length(), 10);
    assert_eq!(m.capacity(), 20);

    m.seek(30).unwrap();
    m.write_u8(1).unwrap();
    assert_eq!(m.length(), 31);
    assert_eq!(m.capacity(), 62);
    // the gap reads as zeros
    m.seek(10).unwrap();
    let mut gap = [0xffu8; 20];
    m.read_fully(&mut gap).unwrap();
    assert_eq!(gap, [0u8; 20]);
}

#[test]
fn end_of_stream_is_deterministic() {
    let mut r = RandomAccessReader::from_bytes(vec![1, 2, 3]).unwrap();
    r.seek(1).unwrap();
    for _ in 0..3 {
        let err = r.read_u32().unwrap_err();
        assert!(matches!(err, Error::EndOfStream));
        assert_eq!(err.to_string(), "EOF reached");
        assert_eq!(r.position(), 1);
    }
    assert_eq!(r.read_u16().unwrap(), 0x0203);
    assert!(matches!(r.read_u8(), Err(Error::EndOfStream)));
}

#[test]
fn raw_reads_are_short_at_the_end() {
    let mut r = RandomAccessReader::from_bytes(vec![1, 2, 3]).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(r.read(&mut buf).unwrap(), 3);
    assert_eq!(r.read(&mut buf).unwrap(), 0);
}

#[test]
fn extension_pads_with_zeros_after_real_data() {
    let mut r = RandomAccessReader::from_bytes(vec![0xaa, 0xbb]).unwrap();
    r.set_extend(2);
    assert_eq!(r.read_u32().unwrap(), 0xaabb_0000);
    assert!(matches!(r.read_u8(), Err(Error::EndOfStream)));
}

#[test]
fn files_round_trip_through_writer_and_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_plain(dir.path(), "scratch.bin", &[]);
    let ctx = seekio::Context::new(seekio::IoConfig::default());

    let mut w = RandomAccessWriter::open_in(&ctx, &common::id(&path)).unwrap();
    w.set_order(Endian::Little);
    w.write_u16(0x4949).unwrap();
    w.write_u16(42).unwrap();
    w.write_u32(8).unwrap();
    w.close().unwrap();

    let mut r = RandomAccessReader::open_in(ctx, &common::id(&path)).unwrap();
    assert_eq!(r.read_u16().unwrap(), 0x4949);
    r.set_order(Endian::Little);
    assert_eq!(r.read_u16().unwrap(), 42);
    assert_eq!(r.read_u32().unwrap(), 8);
}

#[test]
fn writes_to_a_mapped_id_are_read_back() {
    let ctx = seekio::Context::new(seekio::IoConfig::default());
    let bytes = seekio::SharedBytes::new(vec![0; 4]);
    ctx.location().map_bytes("out.bin", bytes.clone());

    let mut w = RandomAccessWriter::open_in(&ctx, "out.bin").unwrap();
    w.write_u32(0xdead_beef).unwrap();
    w.write_u16(0x0102).unwrap();
    w.close().unwrap();

    let mut r = RandomAccessReader::open_in(ctx, "out.bin").unwrap();
    assert_eq!(r.length(), 6);
    assert_eq!(r.read_u32().unwrap(), 0xdead_beef);
    assert_eq!(r.read_u16().unwrap(), 0x0102);
    assert_eq!(bytes.into_vec(), [0xde, 0xad, 0xbe, 0xef, 1, 2]);
}
