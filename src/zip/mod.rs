//! ZIP archive parsing and member selection.
//!
//! A zip-backed store exposes exactly one member of the archive. When no
//! member is named explicitly, [`resolve_entry`] picks the one that shares
//! the archive's base name, falling back to the first file.
//!
//! Supported: standard and ZIP64 central directories, STORED and DEFLATE
//! members. Not supported: encryption, multi-disk archives.

mod parser;
mod structures;

pub use parser::ZipParser;
pub use structures::*;

use std::path::Path;

use crate::error::{Error, Result};

/// The stem a member should share with the archive: the file name up to its
/// first `.`, so `data.bin.zip` yields `data`.
fn archive_stem(archive: &Path) -> Option<String> {
    let name = archive.file_name()?.to_string_lossy();
    let stem = name.split('.').next().unwrap_or(&name);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_lowercase())
    }
}

/// Choose which member of `entries` a store over `archive` exposes.
///
/// `wanted` selects by exact name. Otherwise the first file whose base name
/// starts with the archive stem wins, then the first file of any name.
pub fn resolve_entry<'a>(
    archive: &Path,
    entries: &'a [ZipFileEntry],
    wanted: Option<&str>,
) -> Result<&'a ZipFileEntry> {
    let mut files = entries.iter().filter(|e| !e.is_directory);
    if let Some(name) = wanted {
        return files
            .find(|e| e.file_name == name)
            .ok_or_else(|| Error::InvalidZip(format!("no entry named {name}")));
    }

    if let Some(stem) = archive_stem(archive) {
        let matched = entries
            .iter()
            .filter(|e| !e.is_directory)
            .find(|e| e.base_name().to_lowercase().starts_with(&stem));
        if let Some(entry) = matched {
            return Ok(entry);
        }
    }

    files
        .next()
        .ok_or_else(|| Error::InvalidZip(format!("{} has no file entries", archive.display())))
}
