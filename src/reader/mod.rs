//! The adaptive random-access reader.
//!
//! [`RandomAccessReader`] owns one [`Handle`] and serves each read from the
//! cheapest place [`dispatch::classify`] picks: the decoded prefix of a
//! compressed store, a sequential decoder that rewinds within its mark
//! window, or the store itself. Named readers register with the context's
//! [`HandleCache`](crate::cache::HandleCache), which may close them when too
//! many are open; the next operation reopens them from their name.

mod decoder;
pub mod dispatch;
mod text;

use std::io::{self, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::cache::{self, Evictable, Token};
use crate::codec::Endian;
use crate::config::IoConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::io::{Handle, HandleKind, MemoryHandle, RandomAccess};

use decoder::SequentialDecoder;
use dispatch::{ReadPath, Request, classify};

struct Slot {
    handle: Option<Handle>,
    decoder: SequentialDecoder,
    prefix: Option<Vec<u8>>,
}

impl Slot {
    /// Take ownership of a freshly opened handle, caching its decoded prefix
    /// if it is compressed.
    fn install(&mut self, mut handle: Handle, config: &IoConfig) -> Result<()> {
        if handle.is_compressed() {
            handle.seek(0)?;
            let len = config.max_overhead.min(handle.length()) as usize;
            let mut prefix = vec![0u8; len];
            let mut got = 0;
            while got < len {
                match handle.read(&mut prefix[got..])? {
                    0 => break,
                    n => got += n,
                }
            }
            prefix.truncate(got);
            self.decoder = SequentialDecoder::new(config.mark_limit);
            self.decoder.prime(&prefix);
            self.prefix = Some(prefix);
        } else {
            self.decoder.detach();
            self.prefix = None;
        }
        self.handle = Some(handle);
        Ok(())
    }

    fn close_handle(&mut self) -> Result<()> {
        self.decoder.detach();
        self.prefix = None;
        match self.handle.take() {
            Some(mut handle) => handle.close(),
            None => Ok(()),
        }
    }
}

/// The part of a reader the handle cache can reach.
struct Shared {
    slot: Mutex<Slot>,
    last_used: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Evictable for Shared {
    fn try_evict(&self) -> bool {
        let mut slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::WouldBlock) => return false,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
        };
        if let Err(e) = slot.close_handle() {
            log::warn!("closing an evicted handle failed: {e}");
        }
        true
    }

    fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }
}

/// Read-only random access over any store, with typed reads through
/// [`RandomAccess`].
///
/// Bytes past the real end of the store up to [`extend`](Self::extend) read
/// as zeros.
pub struct RandomAccessReader {
    ctx: Arc<Context>,
    id: Option<String>,
    token: Token,
    shared: Arc<Shared>,
    kind: HandleKind,
    compressed: bool,
    afp: u64,
    length: u64,
    extend: u64,
    order: Endian,
    user_mark: Option<u64>,
}

impl RandomAccessReader {
    /// Open `id` through the process-wide context.
    pub fn open(id: &str) -> Result<Self> {
        Self::open_in(Context::global(), id)
    }

    pub fn open_in(ctx: Arc<Context>, id: &str) -> Result<Self> {
        let handle = ctx.location().open_handle(id, false, ctx.config())?;
        let reopenable = handle.kind() != HandleKind::Memory && ctx.location().is_reopenable(id);
        Self::build(ctx, Some(id.to_string()), handle, reopenable)
    }

    /// Wrap an already open store. It has no name, so it is never evicted.
    pub fn from_handle(handle: impl Into<Handle>) -> Result<Self> {
        Self::from_handle_in(Context::global(), handle)
    }

    pub fn from_handle_in(ctx: Arc<Context>, handle: impl Into<Handle>) -> Result<Self> {
        Self::build(ctx, None, handle.into(), false)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_handle(MemoryHandle::from_vec(bytes))
    }

    fn build(ctx: Arc<Context>, id: Option<String>, handle: Handle, reopenable: bool) -> Result<Self> {
        let mut slot = Slot {
            handle: None,
            decoder: SequentialDecoder::new(ctx.config().mark_limit),
            prefix: None,
        };
        let kind = handle.kind();
        let compressed = handle.is_compressed();
        let length = handle.length();
        let order = handle.order();
        slot.install(handle, ctx.config())?;

        let shared = Arc::new(Shared {
            slot: Mutex::new(slot),
            last_used: AtomicU64::new(ctx.cache().tick()),
        });
        let target = reopenable.then(|| cache::downgrade(&shared));
        let token = ctx.cache().register(target);
        log::trace!("opened {} as {kind:?} ({length} bytes)", id.as_deref().unwrap_or("<anonymous>"));

        Ok(Self {
            ctx,
            id,
            token,
            shared,
            kind,
            compressed,
            afp: 0,
            length,
            extend: 0,
            order,
            user_mark: None,
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Whether the backing handle is currently open.
    pub fn is_open(&self) -> bool {
        self.shared.lock().handle.is_some()
    }

    pub fn extend(&self) -> u64 {
        self.extend
    }

    /// Treat `extend` zero bytes past the end of the store as readable.
    pub fn set_extend(&mut self, extend: u64) {
        self.extend = extend;
    }

    /// Where the sequential decoder currently stands, if one is attached.
    pub fn decoder_position(&self) -> Option<u64> {
        self.shared.lock().decoder.cursor().map(|c| c.fp)
    }

    /// Remember the current position. Compressed stores can return to it
    /// without restarting as long as at most `read_limit` bytes are read in
    /// between.
    pub fn mark(&mut self, read_limit: u64) -> Result<()> {
        self.user_mark = Some(self.afp);
        if !self.compressed {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let mut slot = shared.lock();
        self.ensure_open(&mut slot)?;
        let slot = &mut *slot;
        let handle = slot.handle.as_mut().ok_or(Error::Closed)?;
        if slot.decoder.cursor().is_none() {
            handle.seek(self.afp)?;
            slot.decoder.attach(handle.position());
        }
        slot.decoder.seek(self.afp, handle)?;
        slot.decoder.mark_here(read_limit);
        Ok(())
    }

    /// Return to the last [`mark`](Self::mark).
    pub fn reset(&mut self) -> Result<()> {
        let Some(mark) = self.user_mark else {
            return Err(Error::Unimplemented("reset without mark"));
        };
        if self.compressed {
            let mut slot = self.shared.lock();
            if slot.decoder.cursor().is_some_and(|c| c.mark == mark) {
                slot.decoder.reset();
                self.afp = slot.decoder.fp();
                return Ok(());
            }
        }
        self.afp = mark;
        Ok(())
    }

    /// Reopen the handle if the cache or [`close`](RandomAccess::close)
    /// released it.
    fn ensure_open(&mut self, slot: &mut Slot) -> Result<()> {
        if slot.handle.is_some() {
            return Ok(());
        }
        let Some(id) = self.id.as_deref() else {
            return Err(Error::Closed);
        };
        log::debug!("reopening {id}");
        let mut handle = self.ctx.location().open_handle(id, false, self.ctx.config())?;
        handle.set_order(self.order);
        let length = handle.length();
        if length != self.length {
            log::debug!("{id} changed length from {} to {length} while closed", self.length);
            self.length = length;
        }
        slot.install(handle, self.ctx.config())?;
        self.ctx.cache().reopened(self.token);
        Ok(())
    }

    /// One read of real store bytes at `afp`.
    fn read_store(&mut self, buf: &mut [u8]) -> Result<usize> {
        let shared = Arc::clone(&self.shared);
        let mut slot = shared.lock();
        shared.last_used.store(self.ctx.cache().tick(), Ordering::Relaxed);
        self.ensure_open(&mut slot)?;

        let slot = &mut *slot;
        let handle = slot.handle.as_mut().ok_or(Error::Closed)?;
        let request = Request {
            afp: self.afp,
            len: buf.len() as u64,
            compressed: self.compressed,
            prefix_len: slot.prefix.as_ref().map(|p| p.len() as u64),
            max_overhead: self.ctx.config().max_overhead,
            decoder: slot.decoder.cursor(),
        };
        let n = match classify(&request) {
            ReadPath::Prefix => {
                let prefix = slot.prefix.as_deref().ok_or(Error::Closed)?;
                let start = self.afp as usize;
                buf.copy_from_slice(&prefix[start..start + buf.len()]);
                buf.len()
            }
            ReadPath::Sequential => {
                slot.decoder.seek(self.afp, handle)?;
                slot.decoder.read(buf, handle)?
            }
            ReadPath::Direct => {
                handle.seek(self.afp)?;
                let n = handle.read(buf)?;
                if self.compressed {
                    slot.decoder.attach(handle.position());
                }
                n
            }
        };
        self.afp += n as u64;
        Ok(n)
    }
}

impl RandomAccess for RandomAccessReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let total = self.length();
        if buf.is_empty() || self.afp >= total {
            return Ok(0);
        }
        let want = buf.len().min((total - self.afp) as usize);
        let real = (want as u64).min(self.length.saturating_sub(self.afp)) as usize;

        let mut n = 0;
        while n < real {
            match self.read_store(&mut buf[n..real])? {
                0 => break,
                got => n += got,
            }
        }
        if n == real && want > real {
            buf[real..want].fill(0);
            self.afp += (want - real) as u64;
            n = want;
        }
        Ok(n)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        Err(Error::Unimplemented("write"))
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > i64::MAX as u64 {
            return Err(Error::OutOfBounds(pos));
        }
        self.afp = pos;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.afp
    }

    fn length(&self) -> u64 {
        self.length.saturating_add(self.extend)
    }

    fn set_length(&mut self, _len: u64) -> Result<()> {
        Err(Error::Unimplemented("set_length"))
    }

    fn order(&self) -> Endian {
        self.order
    }

    fn set_order(&mut self, order: Endian) {
        self.order = order;
        if let Some(handle) = self.shared.lock().handle.as_mut() {
            handle.set_order(order);
        }
    }

    fn close(&mut self) -> Result<()> {
        let result = self.shared.lock().close_handle();
        self.ctx.cache().closed(self.token);
        result
    }
}

impl io::Read for RandomAccessReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        RandomAccess::read(self, buf).map_err(Into::into)
    }
}

impl io::Seek for RandomAccessReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.length().checked_add_signed(d),
            SeekFrom::Current(d) => self.afp.checked_add_signed(d),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        RandomAccess::seek(self, target)?;
        Ok(target)
    }
}

impl Drop for RandomAccessReader {
    fn drop(&mut self) {
        self.ctx.cache().remove(self.token);
    }
}

impl std::fmt::Debug for RandomAccessReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomAccessReader")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("afp", &self.afp)
            .field("length", &self.length)
            .field("extend", &self.extend)
            .finish()
    }
}
