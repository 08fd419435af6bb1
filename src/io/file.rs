use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::RandomAccess;
use crate::buffer::{Buffer, BufferAllocator, MapMode};
use crate::codec::Endian;
use crate::config::DEFAULT_FILE_BUFFER;
use crate::error::{Error, Result};

struct Window {
    offset: u64,
    buffer: Buffer,
}

impl Window {
    fn covers(&self, pos: u64) -> bool {
        pos >= self.offset && pos < self.offset + self.buffer.len() as u64
    }
}

/// A local file. Reads are served from a window materialized by the
/// process [`BufferAllocator`]; writes go straight to the file.
pub struct FileHandle {
    path: PathBuf,
    file: File,
    writable: bool,
    position: u64,
    length: u64,
    order: Endian,
    allocator: BufferAllocator,
    window_size: usize,
    window: Option<Window>,
}

impl FileHandle {
    pub fn open(path: impl AsRef<Path>, writable: bool) -> Result<Self> {
        Self::with_buffer_size(path, writable, DEFAULT_FILE_BUFFER)
    }

    pub fn with_buffer_size(path: impl AsRef<Path>, writable: bool, window_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .create(writable)
            .truncate(false)
            .open(&path)?;
        let length = file.metadata()?.len();
        log::trace!("opened {} ({length} bytes, writable={writable})", path.display());
        Ok(Self {
            path,
            file,
            writable,
            position: 0,
            length,
            order: Endian::Big,
            allocator: BufferAllocator::global(),
            window_size: window_size.max(1),
            window: None,
        })
    }

    pub fn with_allocator(mut self, allocator: BufferAllocator) -> Self {
        self.allocator = allocator;
        self.window = None;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_window(&mut self) -> Result<&Window> {
        let stale = !matches!(&self.window, Some(w) if w.covers(self.position));
        if stale {
            // drop the old mapping before creating a new one
            self.window = None;
            let size = (self.length - self.position).min(self.window_size as u64) as usize;
            let buffer = self
                .allocator
                .allocate(&self.file, self.position, size, MapMode::ReadOnly)?;
            self.window = Some(Window {
                offset: self.position,
                buffer,
            });
        }
        self.window.as_ref().ok_or(Error::Closed)
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(Error::ReadOnly(self.path.display().to_string()))
        }
    }
}

impl RandomAccess for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() && self.position < self.length {
            let pos = self.position;
            let window = self.ensure_window()?;
            let start = (pos - window.offset) as usize;
            let n = (buf.len() - filled).min(window.buffer.len() - start);
            buf[filled..filled + n].copy_from_slice(&window.buffer[start..start + n]);
            filled += n;
            self.position += n as u64;
        }
        Ok(filled)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.check_writable()?;
        self.window = None;
        self.file.seek(SeekFrom::Start(self.position))?;
        self.file.write_all(buf)?;
        self.position += buf.len() as u64;
        self.length = self.length.max(self.position);
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > i64::MAX as u64 {
            return Err(Error::OutOfBounds(pos));
        }
        self.position = pos;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn set_length(&mut self, len: u64) -> Result<()> {
        self.check_writable()?;
        self.window = None;
        self.file.set_len(len)?;
        self.length = len;
        self.position = self.position.min(len);
        Ok(())
    }

    fn order(&self) -> Endian {
        self.order
    }

    fn set_order(&mut self, order: Endian) {
        self.order = order;
    }

    fn close(&mut self) -> Result<()> {
        self.window = None;
        if self.writable {
            self.file.flush()?;
        }
        Ok(())
    }
}
