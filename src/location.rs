//! Resolving resource names to backing stores.
//!
//! A name is first looked up in the id map, which can redirect it to another
//! path or bind it to an in-memory array. URLs open remote stores, archive
//! names open compressed stores when their magic bytes agree, and everything
//! else is a local file.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::IoConfig;
use crate::error::{Error, Result};
use crate::io::{
    CompressedHandle, FileHandle, Format, Handle, MemoryHandle, Origin, RandomAccess, SharedBytes, StreamHandle,
};

#[derive(Debug, Clone)]
pub enum Mapping {
    Path(String),
    Bytes(SharedBytes),
}

#[derive(Debug, Default)]
pub struct Location {
    ids: RwLock<HashMap<String, Mapping>>,
}

pub fn is_url(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
}

/// Strip a `file:` scheme, leaving a local path.
fn file_url_path(id: &str) -> &str {
    match id.strip_prefix("file:") {
        Some(rest) => rest.strip_prefix("//").unwrap_or(rest),
        None => id,
    }
}

impl Location {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Mapping>> {
        self.ids.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Mapping>> {
        self.ids.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Read `id` from `filename` instead.
    pub fn map_id(&self, id: &str, filename: &str) {
        self.write().insert(id.to_string(), Mapping::Path(filename.to_string()));
        log::debug!("map_id: {id} -> {filename}");
    }

    /// Serve `id` from memory. Every handle opened for `id` shares `bytes`,
    /// so writes through one are seen by later opens and by the caller.
    pub fn map_bytes(&self, id: &str, bytes: impl Into<SharedBytes>) {
        let bytes = bytes.into();
        log::debug!("map_bytes: {id} -> {} bytes", bytes.len());
        self.write().insert(id.to_string(), Mapping::Bytes(bytes));
    }

    pub fn unmap(&self, id: &str) {
        self.write().remove(id);
    }

    /// The filename `id` is read from.
    pub fn mapped_id(&self, id: &str) -> String {
        match self.read().get(id) {
            Some(Mapping::Path(p)) => p.clone(),
            _ => id.to_string(),
        }
    }

    /// Whether a closed handle for `id` can be rebuilt from its name alone.
    pub fn is_reopenable(&self, id: &str) -> bool {
        !matches!(self.read().get(id), Some(Mapping::Bytes(_)))
    }

    /// Open the store `id` names.
    pub fn open_handle(&self, id: &str, writable: bool, config: &IoConfig) -> Result<Handle> {
        log::trace!("open_handle(id = {id}, writable = {writable})");
        if let Some(Mapping::Bytes(bytes)) = self.read().get(id) {
            return Ok(MemoryHandle::from_shared(bytes.clone()).into());
        }

        let mapped = self.mapped_id(id);
        if is_url(&mapped) {
            if writable {
                return Err(Error::ReadOnly(mapped));
            }
            return Ok(StreamHandle::url(&mapped)?.into());
        }

        let path = file_url_path(&mapped);
        if config.allow_archives {
            if let Some(handle) = open_archive(path, config)? {
                return Ok(handle);
            }
        }
        Ok(FileHandle::with_buffer_size(path, writable, config.file_buffer_size)?.into())
    }

    /// Fail unless `id` names something that can be opened.
    pub fn check_valid_id(&self, id: &str, config: &IoConfig) -> Result<()> {
        self.open_handle(id, false, config)?.close()
    }
}

/// Open `path` as a compressed store, or `None` if it is not one.
fn open_archive(path: &str, config: &IoConfig) -> Result<Option<Handle>> {
    let Some(format) = Format::from_name(path) else {
        return Ok(None);
    };
    let origin = match format {
        Format::Gzip => Origin::gzip(path),
        Format::Bzip2 => Origin::bzip2(path),
        Format::Zip => Origin::zip(path, None),
    };
    let origin = match origin {
        Ok(origin) => origin,
        Err(Error::FormatMismatch { .. }) => {
            log::debug!("{path} is named like {} but is not one", format.name());
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let handle = if config.lazy_seek && format != Format::Gzip {
        CompressedHandle::new(origin)?.into()
    } else {
        StreamHandle::new(origin)?.into()
    };
    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::HandleKind;
    use std::io::Write;

    #[test]
    fn file_urls_become_paths() {
        assert_eq!(file_url_path("file:///tmp/a.tif"), "/tmp/a.tif");
        assert_eq!(file_url_path("file:rel/a.tif"), "rel/a.tif");
        assert_eq!(file_url_path("/tmp/a.tif"), "/tmp/a.tif");
    }

    #[test]
    fn mapped_bytes_open_in_memory() {
        let location = Location::new();
        location.map_bytes("virtual.bin", vec![1, 2, 3]);
        let mut h = location
            .open_handle("virtual.bin", false, &IoConfig::default())
            .unwrap();
        assert_eq!(h.kind(), HandleKind::Memory);
        assert_eq!(h.read_u8().unwrap(), 1);
        assert!(!location.is_reopenable("virtual.bin"));
        location.unmap("virtual.bin");
        assert!(location.is_reopenable("virtual.bin"));
    }

    #[test]
    fn writes_to_mapped_bytes_reach_later_opens() {
        let location = Location::new();
        let bytes = SharedBytes::new(vec![0; 4]);
        location.map_bytes("out.bin", bytes.clone());
        let config = IoConfig::default();

        let mut w = location.open_handle("out.bin", true, &config).unwrap();
        w.seek(2).unwrap();
        w.write_u32(0xdead_beef).unwrap();
        w.close().unwrap();

        let mut r = location.open_handle("out.bin", false, &config).unwrap();
        assert_eq!(r.length(), 6);
        r.seek(2).unwrap();
        assert_eq!(r.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(bytes.to_vec(), [0, 0, 0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn mapped_ids_redirect_to_files() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"payload").unwrap();
        let location = Location::new();
        let target = tmp.path().display().to_string();
        location.map_id("renamed.tif", &target);
        assert_eq!(location.mapped_id("renamed.tif"), target);
        let h = location
            .open_handle("renamed.tif", false, &IoConfig::default())
            .unwrap();
        assert_eq!(h.kind(), HandleKind::File);
        assert_eq!(h.length(), 7);
    }

    #[test]
    fn misnamed_archives_open_as_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.gz");
        std::fs::write(&path, b"plain text").unwrap();
        let h = Location::new()
            .open_handle(&path.display().to_string(), false, &IoConfig::default())
            .unwrap();
        assert_eq!(h.kind(), HandleKind::File);
    }
}
