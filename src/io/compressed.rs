use std::path::Path;

use super::pipeline::{Origin, Pipeline};
use super::RandomAccess;
use crate::codec::Endian;
use crate::error::{Error, Result};

/// A lazily seeking, read-only view of a bzip2 stream or zip member.
///
/// `seek` only moves the logical cursor `fp`. The decoder is reconciled with
/// it on the next read: skipped forward when behind, rebuilt from the origin
/// when ahead.
pub struct CompressedHandle {
    origin: Origin,
    pipeline: Option<Pipeline>,
    fp: u64,
    length: u64,
    order: Endian,
}

impl CompressedHandle {
    pub fn new(origin: Origin) -> Result<Self> {
        let length = origin.measure()?;
        Ok(Self {
            origin,
            pipeline: None,
            fp: 0,
            length,
            order: Endian::Big,
        })
    }

    pub fn bzip2(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Origin::bzip2(path)?)
    }

    pub fn zip(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Origin::zip(path, None)?)
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Position the decoder has consumed up to, if one is open.
    pub fn decoder_position(&self) -> Option<u64> {
        self.pipeline.as_ref().map(Pipeline::position)
    }

    fn reconcile(&mut self) -> Result<&mut Pipeline> {
        let stale = match &self.pipeline {
            Some(p) => p.position() > self.fp,
            None => true,
        };
        if stale {
            if self.pipeline.is_some() {
                log::debug!(
                    "restarting {} to read back at {}",
                    self.origin.describe(),
                    self.fp
                );
            }
            self.pipeline = Some(self.origin.open_at(self.fp.min(self.length))?);
        }
        let fp = self.fp;
        let pipeline = self.pipeline.as_mut().ok_or(Error::Closed)?;
        let at = pipeline.position();
        if at < fp {
            pipeline.skip(fp - at)?;
        }
        Ok(pipeline)
    }
}

impl RandomAccess for CompressedHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.fp >= self.length {
            return Ok(0);
        }
        let n = buf.len().min((self.length - self.fp) as usize);
        let read = self.reconcile()?.read(&mut buf[..n])?;
        self.fp += read as u64;
        Ok(read)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        Err(Error::Unimplemented("write"))
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.fp = pos;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.fp
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn set_length(&mut self, _len: u64) -> Result<()> {
        Err(Error::Unimplemented("set_length"))
    }

    fn order(&self) -> Endian {
        self.order
    }

    fn set_order(&mut self, order: Endian) {
        self.order = order;
    }

    fn close(&mut self) -> Result<()> {
        self.pipeline = None;
        Ok(())
    }
}
