//! Primitive encoding shared by every store.
//!
//! Multi-byte values go through [`byteorder`] in whichever order the store is
//! configured for. Strings use the modified UTF-8 form of `DataInput`/`DataOutput`:
//! NUL is written as `C0 80` and supplementary characters as two 3-byte
//! surrogates, behind a 2-byte length prefix.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Byte order of multi-byte primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

macro_rules! codec_pair {
    ($get:ident, $put:ident, $ty:ty, $read:ident, $write:ident) => {
        pub fn $get(self, buf: &[u8]) -> $ty {
            match self {
                Endian::Big => BigEndian::$read(buf),
                Endian::Little => LittleEndian::$read(buf),
            }
        }

        pub fn $put(self, buf: &mut [u8], v: $ty) {
            match self {
                Endian::Big => BigEndian::$write(buf, v),
                Endian::Little => LittleEndian::$write(buf, v),
            }
        }
    };
}

impl Endian {
    pub fn is_little(self) -> bool {
        self == Endian::Little
    }

    pub fn from_little(little: bool) -> Self {
        if little { Endian::Little } else { Endian::Big }
    }

    codec_pair!(get_u16, put_u16, u16, read_u16, write_u16);
    codec_pair!(get_i16, put_i16, i16, read_i16, write_i16);
    codec_pair!(get_u32, put_u32, u32, read_u32, write_u32);
    codec_pair!(get_i32, put_i32, i32, read_i32, write_i32);
    codec_pair!(get_u64, put_u64, u64, read_u64, write_u64);
    codec_pair!(get_i64, put_i64, i64, read_i64, write_i64);
    codec_pair!(get_f32, put_f32, f32, read_f32, write_f32);
    codec_pair!(get_f64, put_f64, f64, read_f64, write_f64);
}

/// Encode `s` as modified UTF-8, without the length prefix.
pub fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | ((unit >> 6) & 0x1f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | ((unit >> 12) & 0x0f) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

/// Decode modified UTF-8 bytes (without the length prefix).
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b >> 4 {
            0..=7 => {
                units.push(b as u16);
                i += 1;
            }
            12 | 13 => {
                let b2 = *bytes.get(i + 1).ok_or(Error::InvalidUtf)?;
                if b2 & 0xc0 != 0x80 {
                    return Err(Error::InvalidUtf);
                }
                units.push((((b & 0x1f) as u16) << 6) | (b2 & 0x3f) as u16);
                i += 2;
            }
            14 => {
                let (b2, b3) = match (bytes.get(i + 1), bytes.get(i + 2)) {
                    (Some(b2), Some(b3)) => (*b2, *b3),
                    _ => return Err(Error::InvalidUtf),
                };
                if b2 & 0xc0 != 0x80 || b3 & 0xc0 != 0x80 {
                    return Err(Error::InvalidUtf);
                }
                units.push(
                    (((b & 0x0f) as u16) << 12) | (((b2 & 0x3f) as u16) << 6) | (b3 & 0x3f) as u16,
                );
                i += 3;
            }
            _ => return Err(Error::InvalidUtf),
        }
    }
    String::from_utf16(&units).map_err(|_| Error::InvalidUtf)
}
