//! Backing stores and the random-access contract they share.
//!
//! Every store implements [`RandomAccess`]: positioned reads and writes of
//! raw bytes and typed primitives in a configurable byte order. The set of
//! store kinds is closed and gathered in [`Handle`].

pub mod compressed;
pub mod file;
pub mod http;
pub(crate) mod local;
pub mod memory;
pub mod pipeline;
pub mod stream;

pub use compressed::CompressedHandle;
pub use file::FileHandle;
pub use http::UrlSource;
pub use local::LocalFileReader;
pub use memory::{MemoryHandle, SharedBytes};
pub use pipeline::{Format, Origin};
pub use stream::StreamHandle;

use crate::codec::{Endian, decode_modified_utf8, encode_modified_utf8};
use crate::error::{Error, Result};

/// Positioned reads that leave no cursor behind.
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

macro_rules! read_primitive {
    ($name:ident, $ty:ty, $n:expr, $get:ident) => {
        fn $name(&mut self) -> Result<$ty> {
            let b = self.read_array::<$n>()?;
            Ok(self.order().$get(&b))
        }
    };
}

macro_rules! write_primitive {
    ($name:ident, $ty:ty, $n:expr, $put:ident) => {
        fn $name(&mut self, v: $ty) -> Result<()> {
            let mut b = [0u8; $n];
            self.order().$put(&mut b, v);
            self.write(&b)
        }
    };
}

/// The capability every backing store provides.
///
/// Reading past [`length`](RandomAccess::length) is never an error for raw
/// [`read`](RandomAccess::read) calls, which return fewer bytes; fixed-width
/// reads fail with [`Error::EndOfStream`] without consuming anything. Writing
/// past the end extends the store.
pub trait RandomAccess {
    /// Read up to `buf.len()` bytes at the current position.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `buf` at the current position.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    fn seek(&mut self, pos: u64) -> Result<()>;

    fn position(&self) -> u64;

    fn length(&self) -> u64;

    /// Resize the store, zero-filling any growth.
    fn set_length(&mut self, len: u64) -> Result<()>;

    fn order(&self) -> Endian;

    fn set_order(&mut self, order: Endian);

    fn close(&mut self) -> Result<()>;

    /// Fill `buf` completely or fail with end of stream.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..])? {
                0 => return Err(Error::EndOfStream),
                n => filled += n,
            }
        }
        Ok(())
    }

    /// Read `N` bytes, failing before touching the store if they are not all there.
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        if self.position().saturating_add(N as u64) > self.length() {
            return Err(Error::EndOfStream);
        }
        let mut b = [0u8; N];
        self.read_fully(&mut b)?;
        Ok(b)
    }

    /// Advance by up to `n` bytes, stopping at the end of the store.
    fn skip_bytes(&mut self, n: u64) -> Result<u64> {
        let pos = self.position();
        let skipped = n.min(self.length().saturating_sub(pos));
        self.seek(pos + skipped)?;
        Ok(skipped)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_primitive!(read_u16, u16, 2, get_u16);
    read_primitive!(read_i16, i16, 2, get_i16);
    read_primitive!(read_u32, u32, 4, get_u32);
    read_primitive!(read_i32, i32, 4, get_i32);
    read_primitive!(read_u64, u64, 8, get_u64);
    read_primitive!(read_i64, i64, 8, get_i64);
    read_primitive!(read_f32, f32, 4, get_f32);
    read_primitive!(read_f64, f64, 8, get_f64);

    /// Read a length-prefixed modified UTF-8 string.
    fn read_utf(&mut self) -> Result<String> {
        let start = self.position();
        let len = self.read_u16()? as u64;
        if self.position() + len > self.length() {
            self.seek(start)?;
            return Err(Error::EndOfStream);
        }
        let mut bytes = vec![0u8; len as usize];
        self.read_fully(&mut bytes)?;
        decode_modified_utf8(&bytes)
    }

    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write(&[v])
    }

    fn write_i8(&mut self, v: i8) -> Result<()> {
        self.write(&[v as u8])
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write(&[v as u8])
    }

    write_primitive!(write_u16, u16, 2, put_u16);
    write_primitive!(write_i16, i16, 2, put_i16);
    write_primitive!(write_u32, u32, 4, put_u32);
    write_primitive!(write_i32, i32, 4, put_i32);
    write_primitive!(write_u64, u64, 8, put_u64);
    write_primitive!(write_i64, i64, 8, put_i64);
    write_primitive!(write_f32, f32, 4, put_f32);
    write_primitive!(write_f64, f64, 8, put_f64);

    /// Write a length-prefixed modified UTF-8 string.
    fn write_utf(&mut self, s: &str) -> Result<()> {
        let bytes = encode_modified_utf8(s);
        let len = u16::try_from(bytes.len()).map_err(|_| Error::OutOfBounds(bytes.len() as u64))?;
        let mut prefix = [0u8; 2];
        self.order().put_u16(&mut prefix, len);
        self.write(&prefix)?;
        self.write(&bytes)
    }
}

/// Which concrete store backs a [`Handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Memory,
    File,
    Gzip,
    Bzip2,
    Zip,
    Url,
}

/// One open resource.
pub enum Handle {
    Memory(MemoryHandle),
    File(FileHandle),
    Stream(StreamHandle),
    Compressed(CompressedHandle),
}

macro_rules! dispatch {
    ($self:expr, $h:ident => $body:expr) => {
        match $self {
            Handle::Memory($h) => $body,
            Handle::File($h) => $body,
            Handle::Stream($h) => $body,
            Handle::Compressed($h) => $body,
        }
    };
}

impl Handle {
    pub fn kind(&self) -> HandleKind {
        match self {
            Handle::Memory(_) => HandleKind::Memory,
            Handle::File(_) => HandleKind::File,
            Handle::Stream(h) => h.origin().kind(),
            Handle::Compressed(h) => h.origin().kind(),
        }
    }

    /// Forward-only stores cannot seek backward without a restart.
    pub fn is_compressed(&self) -> bool {
        matches!(self, Handle::Stream(_) | Handle::Compressed(_))
    }
}

impl RandomAccess for Handle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        dispatch!(self, h => h.read(buf))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        dispatch!(self, h => h.write(buf))
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        dispatch!(self, h => h.seek(pos))
    }

    fn position(&self) -> u64 {
        dispatch!(self, h => h.position())
    }

    fn length(&self) -> u64 {
        dispatch!(self, h => h.length())
    }

    fn set_length(&mut self, len: u64) -> Result<()> {
        dispatch!(self, h => h.set_length(len))
    }

    fn order(&self) -> Endian {
        dispatch!(self, h => h.order())
    }

    fn set_order(&mut self, order: Endian) {
        dispatch!(self, h => h.set_order(order))
    }

    fn close(&mut self) -> Result<()> {
        dispatch!(self, h => h.close())
    }
}

impl From<MemoryHandle> for Handle {
    fn from(h: MemoryHandle) -> Self {
        Handle::Memory(h)
    }
}

impl From<FileHandle> for Handle {
    fn from(h: FileHandle) -> Self {
        Handle::File(h)
    }
}

impl From<StreamHandle> for Handle {
    fn from(h: StreamHandle) -> Self {
        Handle::Stream(h)
    }
}

impl From<CompressedHandle> for Handle {
    fn from(h: CompressedHandle) -> Self {
        Handle::Compressed(h)
    }
}
