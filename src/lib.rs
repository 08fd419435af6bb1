//! # seekio
//!
//! Random-access byte I/O over files, memory, compressed archives and URLs.
//!
//! Every backing store implements [`RandomAccess`]: positioned reads and
//! writes of bytes and big- or little-endian primitives. On top of the stores
//! sit two facades:
//!
//! - [`RandomAccessReader`] serves reads from a decoded prefix cache, a
//!   sequential decoder with a rewind window, or the store itself, so
//!   gzip, bzip2, zip and URL sources can be read at arbitrary offsets.
//! - [`RandomAccessWriter`] writes through seekable stores.
//!
//! Named readers register with a process-wide [`HandleCache`], which closes
//! the least recently used ones when too many are open and lets them reopen
//! transparently on their next read.
//!
//! ## Example
//!
//! ```no_run
//! use seekio::{Endian, RandomAccess, RandomAccessReader};
//!
//! fn main() -> seekio::Result<()> {
//!     let mut reader = RandomAccessReader::open("image.tif.gz")?;
//!     reader.set_order(Endian::Little);
//!     reader.seek(4)?;
//!     let ifd = reader.read_u32()?;
//!     println!("first IFD at {ifd}");
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod io;
pub mod location;
pub mod reader;
pub mod region;
pub mod writer;
pub mod zip;

pub use buffer::{BufferAllocator, MapMode, Strategy};
pub use cache::HandleCache;
pub use cli::Cli;
pub use codec::Endian;
pub use config::IoConfig;
pub use context::Context;
pub use error::{Error, Result};
pub use io::{CompressedHandle, FileHandle, Handle, HandleKind, MemoryHandle, RandomAccess, SharedBytes, StreamHandle};
pub use location::Location;
pub use reader::RandomAccessReader;
pub use region::Region;
pub use writer::RandomAccessWriter;
pub use zip::{ZipFileEntry, ZipParser};
