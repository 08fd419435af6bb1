use super::RandomAccessReader;
use crate::error::{Error, Result};
use crate::io::RandomAccess;

/// Index just past the earliest terminator starting at or after `from`.
fn match_end(haystack: &[u8], from: usize, terminators: &[&str]) -> Option<usize> {
    (from..haystack.len()).find_map(|i| {
        terminators
            .iter()
            .map(|t| t.as_bytes())
            .find(|t| !t.is_empty() && haystack[i..].starts_with(t))
            .map(|t| i + t.len())
    })
}

impl RandomAccessReader {
    /// Read up to `n` bytes as text, stopping at the end of the store.
    pub fn read_string(&mut self, n: usize) -> Result<String> {
        let avail = self.length().saturating_sub(self.position());
        let n = n.min(avail as usize);
        let mut bytes = vec![0u8; n];
        self.read_fully(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read up to the next NUL, which is consumed but not returned.
    pub fn read_cstring(&mut self) -> Result<Option<String>> {
        let mut s = self.find_string(&["\0"])?;
        if s.is_empty() {
            return Ok(None);
        }
        if s.ends_with('\0') {
            s.pop();
        }
        Ok(Some(s))
    }

    /// Read one line without its `\n` or `\r\n`; `None` at the end of the store.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut s = self.find_string(&["\n"])?;
        if s.is_empty() {
            return Ok(None);
        }
        if s.ends_with('\n') {
            s.pop();
            if s.ends_with('\r') {
                s.pop();
            }
        }
        Ok(Some(s))
    }

    /// Read through the first occurrence of any terminator, returning the
    /// text including it. At the end of the store the rest is returned.
    pub fn find_string(&mut self, terminators: &[&str]) -> Result<String> {
        let block_size = self.ctx.config().block_size;
        self.find_string_with(true, block_size, terminators)
    }

    /// Like [`find_string`](Self::find_string), scanning `block_size` bytes at
    /// a time. With `save` false the text is skipped and an empty string is
    /// returned.
    ///
    /// Fails with [`Error::SearchLimit`] once the configured maximum search
    /// length is scanned without a match; the position is left unchanged.
    pub fn find_string_with(&mut self, save: bool, block_size: usize, terminators: &[&str]) -> Result<String> {
        let start = self.position();
        let longest = terminators.iter().map(|t| t.len()).max().unwrap_or(0);
        if longest == 0 {
            return Ok(String::new());
        }
        let block_size = block_size.max(1) as u64;
        let max_search = self.ctx.config().max_search;
        let remaining = self.length().saturating_sub(start);

        let mut scanned = Vec::new();
        // absolute position of scanned[0]
        let mut base = start;
        loop {
            let consumed = base - start + scanned.len() as u64;
            if consumed >= remaining {
                return Ok(if save {
                    String::from_utf8_lossy(&scanned).into_owned()
                } else {
                    String::new()
                });
            }
            if consumed >= max_search {
                self.seek(start)?;
                return Err(Error::SearchLimit(max_search));
            }

            let chunk = block_size.min(remaining - consumed).min(max_search - consumed) as usize;
            let old_len = scanned.len();
            scanned.resize(old_len + chunk, 0);
            if let Err(e) = self.read_fully(&mut scanned[old_len..]) {
                self.seek(start)?;
                return Err(e);
            }

            let from = old_len.saturating_sub(longest - 1);
            if let Some(end) = match_end(&scanned, from, terminators) {
                self.seek(base + end as u64)?;
                return Ok(if save {
                    String::from_utf8_lossy(&scanned[..end]).into_owned()
                } else {
                    String::new()
                });
            }
            if !save {
                // only a partial terminator can straddle the next block
                let keep = scanned.len().min(longest - 1);
                let drop = scanned.len() - keep;
                scanned.drain(..drop);
                base += drop as u64;
            }
        }
    }
}
