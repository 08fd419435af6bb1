//! Materializing regions of a file in memory.
//!
//! A region is either copied into a heap buffer with a positioned read or
//! memory-mapped. Which one is decided once per process: mapping is used on
//! 64-bit targets, and on narrower targets only when the runtime version is
//! known to be at least the configured minimum.

use std::fs::File;
use std::ops::{Deref, DerefMut};

use memmap2::{Mmap, MmapMut, MmapOptions};
use once_cell::sync::Lazy;

use crate::config::{IoConfig, Version};
use crate::error::{Error, Result};
use crate::io::local::read_file_at;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Copy,
    Map,
}

impl Strategy {
    pub fn choose(pointer_width: u32, runtime: Option<Version>, minimum: Version) -> Self {
        if pointer_width >= 64 {
            return Strategy::Map;
        }
        match runtime {
            Some(v) if v >= minimum => Strategy::Map,
            _ => Strategy::Copy,
        }
    }

    fn detect(config: &IoConfig) -> Self {
        let strategy = Self::choose(
            usize::BITS,
            config.runtime_version,
            config.mmap_min_version,
        );
        log::debug!("buffer allocation strategy: {strategy:?}");
        strategy
    }
}

static GLOBAL: Lazy<BufferAllocator> = Lazy::new(|| BufferAllocator {
    strategy: Strategy::detect(&IoConfig::from_env()),
});

/// A materialized file region.
pub enum Buffer {
    Heap(Vec<u8>),
    Mapped(Mmap),
    MappedMut(MmapMut),
}

impl Buffer {
    pub fn is_mapped(&self) -> bool {
        !matches!(self, Buffer::Heap(_))
    }

    /// Persist changes made through a writable mapping.
    pub fn flush(&self) -> Result<()> {
        if let Buffer::MappedMut(m) = self {
            m.flush()?;
        }
        Ok(())
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Buffer::Heap(v) => v,
            Buffer::Mapped(m) => m,
            Buffer::MappedMut(m) => m,
        }
    }
}

impl DerefMut for Buffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            Buffer::Heap(v) => v,
            // read-only maps expose no bytes for writing
            Buffer::Mapped(_) => &mut [],
            Buffer::MappedMut(m) => m,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BufferAllocator {
    strategy: Strategy,
}

impl BufferAllocator {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    /// The allocator chosen for this process.
    pub fn global() -> Self {
        *GLOBAL
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Materialize `size` bytes of `file` starting at `offset`.
    ///
    /// Callers validate the region against the file length; a copy that comes
    /// up short is reported as end of stream.
    pub fn allocate(&self, file: &File, offset: u64, size: usize, mode: MapMode) -> Result<Buffer> {
        match self.strategy {
            Strategy::Copy => {
                let mut buf = vec![0u8; size];
                let n = read_file_at(file, offset, &mut buf)?;
                if n < size {
                    return Err(Error::EndOfStream);
                }
                Ok(Buffer::Heap(buf))
            }
            Strategy::Map => {
                let mut options = MmapOptions::new();
                options.offset(offset).len(size);
                // SAFETY: the file stays open for the lifetime of the owning
                // store and every write through the store drops the mapping first.
                let buffer = match mode {
                    MapMode::ReadOnly => Buffer::Mapped(unsafe { options.map(file)? }),
                    MapMode::ReadWrite => Buffer::MappedMut(unsafe { options.map_mut(file)? }),
                };
                Ok(buffer)
            }
        }
    }
}
