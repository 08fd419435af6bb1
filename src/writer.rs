//! The writing facade over a store.

use std::io;
use std::sync::Arc;

use crate::codec::Endian;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::io::{Handle, MemoryHandle, RandomAccess};

/// Positioned writes of bytes and typed primitives through [`RandomAccess`].
///
/// Writing past the end grows the store. Compressed and remote stores are
/// read-only; opening them for writing fails.
pub struct RandomAccessWriter {
    id: Option<String>,
    handle: Handle,
}

impl RandomAccessWriter {
    /// Open `id` for writing through the process-wide context.
    pub fn open(id: &str) -> Result<Self> {
        Self::open_in(&Context::global(), id)
    }

    pub fn open_in(ctx: &Arc<Context>, id: &str) -> Result<Self> {
        let handle = ctx.location().open_handle(id, true, ctx.config())?;
        if handle.is_compressed() {
            return Err(Error::ReadOnly(id.to_string()));
        }
        Ok(Self {
            id: Some(id.to_string()),
            handle,
        })
    }

    pub fn from_handle(handle: impl Into<Handle>) -> Self {
        Self {
            id: None,
            handle: handle.into(),
        }
    }

    /// A writer over a fresh in-memory store sized by the process-wide
    /// configuration.
    pub fn in_memory() -> Self {
        Self::in_memory_in(&Context::global())
    }

    pub fn in_memory_in(ctx: &Arc<Context>) -> Self {
        Self::from_handle(MemoryHandle::with_capacity(ctx.config().memory_capacity))
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn into_handle(self) -> Handle {
        self.handle
    }

    /// Write the low byte of each character, as latin-1 text.
    pub fn write_bytes(&mut self, s: &str) -> Result<()> {
        let bytes: Vec<u8> = s.chars().map(|c| c as u32 as u8).collect();
        self.handle.write(&bytes)
    }

    /// Write each character as a two-byte code unit in the writer's order.
    pub fn write_chars(&mut self, s: &str) -> Result<()> {
        let order = self.order();
        let mut bytes = Vec::with_capacity(s.len() * 2);
        for unit in s.encode_utf16() {
            let mut b = [0u8; 2];
            order.put_u16(&mut b, unit);
            bytes.extend_from_slice(&b);
        }
        self.handle.write(&bytes)
    }
}

impl RandomAccess for RandomAccessWriter {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::Unimplemented("read"))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.handle.write(buf)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.handle.seek(pos)
    }

    fn position(&self) -> u64 {
        self.handle.position()
    }

    fn length(&self) -> u64 {
        self.handle.length()
    }

    fn set_length(&mut self, len: u64) -> Result<()> {
        self.handle.set_length(len)
    }

    fn order(&self) -> Endian {
        self.handle.order()
    }

    fn set_order(&mut self, order: Endian) {
        self.handle.set_order(order)
    }

    fn close(&mut self) -> Result<()> {
        self.handle.close()
    }
}

impl io::Write for RandomAccessWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RandomAccess::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for RandomAccessWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomAccessWriter")
            .field("id", &self.id)
            .field("kind", &self.handle.kind())
            .field("position", &self.position())
            .finish()
    }
}
