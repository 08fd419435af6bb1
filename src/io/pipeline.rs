//! Forward-only decoder pipelines and the origins they are rebuilt from.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bzip2::read::MultiBzDecoder;
use flate2::read::{DeflateDecoder, MultiGzDecoder};

use super::http::UrlSource;
use super::local::LocalFileReader;
use super::HandleKind;
use crate::error::{Error, Result};
use crate::zip::{CompressionMethod, ZipFileEntry, ZipParser, resolve_entry};

/// Compressed container formats recognized by name and magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Gzip,
    Bzip2,
    Zip,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Gzip => "gzip",
            Format::Bzip2 => "bzip2",
            Format::Zip => "zip",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Format::Gzip => ".gz",
            Format::Bzip2 => ".bz2",
            Format::Zip => ".zip",
        }
    }

    /// Guess the format from a resource name's extension.
    pub fn from_name(id: &str) -> Option<Self> {
        let lower = id.to_lowercase();
        [Format::Zip, Format::Gzip, Format::Bzip2]
            .into_iter()
            .find(|f| lower.ends_with(f.extension()))
    }

    /// Whether the first two bytes of a resource carry this format's magic.
    pub fn magic_matches(self, head: &[u8]) -> bool {
        if head.len() < 2 {
            return false;
        }
        match self {
            Format::Gzip => u16::from_le_bytes([head[0], head[1]]) == 0x8b1f,
            Format::Bzip2 => &head[..2] == b"BZ",
            Format::Zip => &head[..2] == b"PK",
        }
    }

    /// Extension and magic check done before any decoding.
    pub fn check(self, path: &Path) -> Result<()> {
        let id = path.display().to_string();
        let mismatch = || Error::FormatMismatch {
            id: id.clone(),
            format: self.name(),
        };
        if Format::from_name(&id) != Some(self) {
            return Err(mismatch());
        }
        let mut head = [0u8; 2];
        let n = File::open(path)?.read(&mut head)?;
        if !self.magic_matches(&head[..n]) {
            return Err(mismatch());
        }
        Ok(())
    }

    pub fn kind(self) -> HandleKind {
        match self {
            Format::Gzip => HandleKind::Gzip,
            Format::Bzip2 => HandleKind::Bzip2,
            Format::Zip => HandleKind::Zip,
        }
    }
}

/// Where a forward-only store decodes its bytes from. Every restart
/// rebuilds the pipeline from here.
#[derive(Clone)]
pub enum Origin {
    Gzip(PathBuf),
    Bzip2(PathBuf),
    Zip {
        path: PathBuf,
        entry: ZipFileEntry,
        data_offset: u64,
    },
    Url(Arc<UrlSource>),
}

impl Origin {
    pub fn gzip(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Format::Gzip.check(path)?;
        Ok(Origin::Gzip(path.to_path_buf()))
    }

    pub fn bzip2(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Format::Bzip2.check(path)?;
        Ok(Origin::Bzip2(path.to_path_buf()))
    }

    /// A member of a zip archive, chosen by [`resolve_entry`].
    pub fn zip(path: impl AsRef<Path>, wanted: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        Format::Zip.check(path)?;
        let parser = ZipParser::new(LocalFileReader::new(path)?);
        let entries = parser.list_files()?;
        let entry = resolve_entry(path, &entries, wanted)?.clone();
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            return Err(Error::InvalidZip(format!(
                "{}: unsupported compression method {method}",
                entry.file_name
            )));
        }
        let data_offset = parser.data_offset(&entry)?;
        log::debug!("{} resolved to entry {}", path.display(), entry.file_name);
        Ok(Origin::Zip {
            path: path.to_path_buf(),
            entry,
            data_offset,
        })
    }

    pub fn url(url: &str) -> Result<Self> {
        Ok(Origin::Url(Arc::new(UrlSource::new(url.to_string())?)))
    }

    pub fn kind(&self) -> HandleKind {
        match self {
            Origin::Gzip(_) => HandleKind::Gzip,
            Origin::Bzip2(_) => HandleKind::Bzip2,
            Origin::Zip { .. } => HandleKind::Zip,
            Origin::Url(_) => HandleKind::Url,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Origin::Gzip(p) | Origin::Bzip2(p) => p.display().to_string(),
            Origin::Zip { path, entry, .. } => format!("{}!{}", path.display(), entry.file_name),
            Origin::Url(u) => u.url().to_string(),
        }
    }

    /// Decoded length when the container records it.
    pub fn known_length(&self) -> Option<u64> {
        match self {
            Origin::Zip { entry, .. } => Some(entry.uncompressed_size),
            Origin::Url(u) => u.length(),
            Origin::Gzip(_) | Origin::Bzip2(_) => None,
        }
    }

    /// Decoded length, decoding the whole stream once if nothing records it.
    pub fn measure(&self) -> Result<u64> {
        if let Some(len) = self.known_length() {
            return Ok(len);
        }
        let mut pipeline = self.open_at(0)?;
        let len = io::copy(&mut pipeline.reader, &mut io::sink())?;
        log::trace!("measured {} at {len} bytes", self.describe());
        Ok(len)
    }

    /// Build a fresh pipeline positioned at `offset`.
    pub(crate) fn open_at(&self, offset: u64) -> Result<Pipeline> {
        let (reader, start): (Box<dyn Read + Send>, u64) = match self {
            Origin::Gzip(path) => (
                Box::new(MultiGzDecoder::new(BufReader::new(File::open(path)?))),
                0,
            ),
            Origin::Bzip2(path) => (
                Box::new(MultiBzDecoder::new(BufReader::new(File::open(path)?))),
                0,
            ),
            Origin::Zip {
                path,
                entry,
                data_offset,
            } => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(*data_offset))?;
                let raw = BufReader::new(file).take(entry.compressed_size);
                let reader: Box<dyn Read + Send> = match entry.compression_method {
                    CompressionMethod::Deflate => Box::new(DeflateDecoder::new(raw)),
                    _ => Box::new(raw),
                };
                (reader, 0)
            }
            Origin::Url(source) => {
                let (resp, start) = source.open(offset)?;
                (Box::new(resp) as Box<dyn Read + Send>, start)
            }
        };
        let mut pipeline = Pipeline {
            reader,
            position: start,
        };
        if offset > start {
            pipeline.skip(offset - start)?;
        }
        Ok(pipeline)
    }
}

/// A decoder that only moves forward.
pub(crate) struct Pipeline {
    reader: Box<dyn Read + Send>,
    position: u64,
}

impl Pipeline {
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    /// Discard up to `n` decoded bytes, returning how many were available.
    pub(crate) fn skip(&mut self, n: u64) -> Result<u64> {
        let skipped = io::copy(&mut (&mut self.reader).take(n), &mut io::sink())?;
        self.position += skipped;
        Ok(skipped)
    }

    /// Read until `buf` is full or the stream ends.
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }
}
