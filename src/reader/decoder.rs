use crate::error::Result;
use crate::io::RandomAccess;

use super::dispatch::DecoderCursor;

const FILL_CHUNK: usize = 64 * 1024;

/// Sequential reads over a forward-only store with a bounded rewind window.
///
/// Bytes pulled from the store are retained from `mark` onward, so the
/// decoder pointer can move back to any position at or after the mark
/// without touching the store. Once the pointer passes `next_mark` the
/// window is cut and the mark moves up to the pointer.
///
/// The store is always positioned at [`source_position`](Self::source_position),
/// the end of the retained window.
pub(crate) struct SequentialDecoder {
    window: Vec<u8>,
    mark: u64,
    cursor: usize,
    next_mark: u64,
    limit: u64,
    attached: bool,
}

impl SequentialDecoder {
    pub(crate) fn new(limit: u64) -> Self {
        Self {
            window: Vec::new(),
            mark: 0,
            cursor: 0,
            next_mark: limit,
            limit: limit.max(1),
            attached: false,
        }
    }

    /// Bytes retained past the decoder pointer.
    pub(crate) fn available(&self) -> usize {
        self.window.len() - self.cursor
    }

    pub(crate) fn source_position(&self) -> u64 {
        self.mark + self.window.len() as u64
    }

    pub(crate) fn fp(&self) -> u64 {
        self.source_position() - self.available() as u64
    }

    pub(crate) fn cursor(&self) -> Option<DecoderCursor> {
        self.attached.then(|| DecoderCursor {
            fp: self.fp(),
            mark: self.mark,
        })
    }

    /// Start over with an empty window at `at`, where the store now sits.
    pub(crate) fn attach(&mut self, at: u64) {
        self.window.clear();
        self.mark = at;
        self.cursor = 0;
        self.next_mark = at.saturating_add(self.limit);
        self.attached = true;
    }

    /// Start with `prefix` (the store's first bytes) retained and consumed.
    pub(crate) fn prime(&mut self, prefix: &[u8]) {
        self.window.clear();
        self.window.extend_from_slice(prefix);
        self.mark = 0;
        self.cursor = prefix.len();
        self.next_mark = self.limit;
        self.attached = true;
    }

    pub(crate) fn detach(&mut self) {
        self.window = Vec::new();
        self.cursor = 0;
        self.attached = false;
    }

    /// Rewind the pointer to the mark.
    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Drop everything before the pointer and mark there.
    pub(crate) fn reset_mark(&mut self) {
        self.window.drain(..self.cursor);
        self.mark += self.cursor as u64;
        self.cursor = 0;
        self.next_mark = self.mark.saturating_add(self.limit);
    }

    /// Mark at the pointer with a new rewind span.
    pub(crate) fn mark_here(&mut self, limit: u64) {
        self.limit = limit.max(1);
        self.reset_mark();
    }

    fn fill<S: RandomAccess + ?Sized>(&mut self, store: &mut S, want: usize) -> Result<usize> {
        let start = self.window.len();
        let n = want.max(FILL_CHUNK);
        self.window.resize(start + n, 0);
        let mut got = 0;
        while got < n {
            match store.read(&mut self.window[start + got..]) {
                Ok(0) => break,
                Ok(r) => got += r,
                Err(e) => {
                    self.window.truncate(start + got);
                    return Err(e);
                }
            }
        }
        self.window.truncate(start + got);
        Ok(got)
    }

    /// Move the pointer to `target`, pulling from the store if it lies ahead.
    pub(crate) fn seek<S: RandomAccess + ?Sized>(&mut self, target: u64, store: &mut S) -> Result<()> {
        if target < self.mark {
            store.seek(target)?;
            self.attach(target);
            return Ok(());
        }
        let gap = target.saturating_sub(self.source_position());
        if gap > FILL_CHUNK as u64 {
            // far ahead: let the store skip instead of buffering
            store.seek(target)?;
            self.attach(target);
            return Ok(());
        }
        while self.source_position() < target {
            let want = (target - self.source_position()) as usize;
            if self.fill(store, want)? == 0 {
                break;
            }
        }
        self.cursor = ((target - self.mark) as usize).min(self.window.len());
        Ok(())
    }

    /// Read at the pointer, advancing it.
    pub(crate) fn read<S: RandomAccess + ?Sized>(&mut self, buf: &mut [u8], store: &mut S) -> Result<usize> {
        let mut n = 0;
        loop {
            let take = self.available().min(buf.len() - n);
            buf[n..n + take].copy_from_slice(&self.window[self.cursor..self.cursor + take]);
            self.cursor += take;
            n += take;
            if n == buf.len() {
                break;
            }

            let rest = buf.len() - n;
            if rest as u64 >= self.limit {
                // too large to retain: read straight through
                let mut got = 0;
                while got < rest {
                    match store.read(&mut buf[n + got..])? {
                        0 => break,
                        r => got += r,
                    }
                }
                n += got;
                self.attach(store.position());
                break;
            }
            if self.fill(store, rest)? == 0 {
                break;
            }
        }
        if self.fp() > self.next_mark {
            self.reset_mark();
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryHandle;

    fn store(len: usize) -> (MemoryHandle, Vec<u8>) {
        let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
        (MemoryHandle::from_vec(data.clone()), data)
    }

    #[test]
    fn rewinds_within_the_window_without_the_store() {
        let (mut s, data) = store(1000);
        let mut d = SequentialDecoder::new(4096);
        d.attach(0);
        let mut buf = [0u8; 10];
        d.seek(100, &mut s).unwrap();
        d.read(&mut buf, &mut s).unwrap();
        assert_eq!(&buf, &data[100..110]);
        let pulled = s.position();

        d.seek(50, &mut s).unwrap();
        d.read(&mut buf, &mut s).unwrap();
        assert_eq!(&buf, &data[50..60]);
        assert_eq!(s.position(), pulled);
        assert_eq!(d.fp(), 60);
    }

    #[test]
    fn mark_moves_once_the_limit_is_passed() {
        let (mut s, _) = store(200_000);
        let mut d = SequentialDecoder::new(1000);
        d.attach(0);
        let mut buf = [0u8; 600];
        d.read(&mut buf, &mut s).unwrap();
        assert_eq!(d.cursor().unwrap().mark, 0);
        d.read(&mut buf, &mut s).unwrap();
        assert_eq!(d.cursor().unwrap().mark, 1200);
        assert_eq!(d.available(), d.window.len());
    }

    #[test]
    fn reset_returns_to_the_mark() {
        let (mut s, data) = store(500);
        let mut d = SequentialDecoder::new(4096);
        d.attach(0);
        let mut buf = [0u8; 20];
        d.seek(30, &mut s).unwrap();
        d.mark_here(100);
        d.read(&mut buf, &mut s).unwrap();
        d.reset();
        assert_eq!(d.fp(), 30);
        d.read(&mut buf, &mut s).unwrap();
        assert_eq!(&buf, &data[30..50]);
    }

    #[test]
    fn large_reads_bypass_the_window() {
        let (mut s, data) = store(10_000);
        let mut d = SequentialDecoder::new(100);
        d.attach(0);
        let mut buf = vec![0u8; 5000];
        assert_eq!(d.read(&mut buf, &mut s).unwrap(), 5000);
        assert_eq!(buf, data[..5000]);
        assert_eq!(d.available(), 0);
        assert_eq!(d.fp(), 5000);
        assert_eq!(d.source_position(), s.position());
    }

    #[test]
    fn primed_prefix_counts_as_consumed() {
        let (mut s, data) = store(300);
        s.seek(100).unwrap();
        let mut d = SequentialDecoder::new(4096);
        d.prime(&data[..100]);
        assert_eq!(d.fp(), 100);
        let mut buf = [0u8; 8];
        d.seek(96, &mut s).unwrap();
        d.read(&mut buf, &mut s).unwrap();
        assert_eq!(&buf, &data[96..104]);
    }
}
