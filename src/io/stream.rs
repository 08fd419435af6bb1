use std::path::Path;

use super::pipeline::{Origin, Pipeline};
use super::RandomAccess;
use crate::codec::Endian;
use crate::error::{Error, Result};

/// A read-only store over a forward-only decoder (gzip, bzip2, a zip
/// member, or a URL).
///
/// The stream is decoded once up front to learn its length. Seeking ahead
/// skips decoded bytes; seeking behind rebuilds the pipeline from its origin
/// and skips forward again.
pub struct StreamHandle {
    origin: Origin,
    pipeline: Option<Pipeline>,
    position: u64,
    length: u64,
    order: Endian,
}

impl StreamHandle {
    pub fn new(origin: Origin) -> Result<Self> {
        let length = origin.measure()?;
        let mut handle = Self {
            origin,
            pipeline: None,
            position: 0,
            length,
            order: Endian::Big,
        };
        handle.reset_stream()?;
        Ok(handle)
    }

    pub fn gzip(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Origin::gzip(path)?)
    }

    pub fn bzip2(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Origin::bzip2(path)?)
    }

    /// The member of the archive chosen by [`resolve_entry`](crate::zip::resolve_entry).
    pub fn zip(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Origin::zip(path, None)?)
    }

    pub fn zip_entry(path: impl AsRef<Path>, entry: &str) -> Result<Self> {
        Self::new(Origin::zip(path, Some(entry))?)
    }

    pub fn url(url: &str) -> Result<Self> {
        Self::new(Origin::url(url)?)
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Rebuild the pipeline at the start of the stream.
    pub fn reset_stream(&mut self) -> Result<()> {
        self.pipeline = Some(self.origin.open_at(0)?);
        self.position = 0;
        Ok(())
    }

    fn pipeline(&mut self) -> Result<&mut Pipeline> {
        if self.pipeline.is_none() {
            // closed handles rebuild lazily
            self.pipeline = Some(self.origin.open_at(self.position.min(self.length))?);
        }
        self.pipeline.as_mut().ok_or(Error::Closed)
    }
}

impl RandomAccess for StreamHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.position >= self.length {
            return Ok(0);
        }
        let n = buf.len().min((self.length - self.position) as usize);
        let read = self.pipeline()?.read(&mut buf[..n])?;
        self.position += read as u64;
        Ok(read)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        Err(Error::Unimplemented("write"))
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        let target = pos.min(self.length);
        match self.pipeline.as_ref().map(Pipeline::position) {
            // closed: open straight at the target
            None => self.pipeline = Some(self.origin.open_at(target)?),
            Some(current) if target < current => {
                log::debug!(
                    "restarting {} to seek back from {current} to {target}",
                    self.origin.describe()
                );
                self.pipeline = Some(self.origin.open_at(target)?);
            }
            Some(current) if target > current => {
                self.pipeline()?.skip(target - current)?;
            }
            Some(_) => {}
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

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip_of(data: &[u8]) -> tempfile::TempPath {
        let tmp = tempfile::Builder::new().suffix(".gz").tempfile().unwrap();
        let mut enc = GzEncoder::new(tmp.as_file(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap();
        tmp.into_temp_path()
    }

    #[test]
    fn closed_streams_reopen_at_the_seek_target() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let path = gzip_of(&data);
        let mut h = StreamHandle::gzip(&path).unwrap();
        assert_eq!(h.length(), data.len() as u64);

        h.seek(40_000).unwrap();
        h.close().unwrap();
        h.seek(1_000).unwrap();
        assert_eq!(h.pipeline.as_ref().map(Pipeline::position), Some(1_000));
        let mut buf = [0u8; 16];
        h.read_fully(&mut buf).unwrap();
        assert_eq!(buf, data[1_000..1_016]);

        h.close().unwrap();
        h.seek(45_000).unwrap();
        assert_eq!(h.pipeline.as_ref().map(Pipeline::position), Some(45_000));
        h.read_fully(&mut buf).unwrap();
        assert_eq!(buf, data[45_000..45_016]);
    }
}
