//! Low-level ZIP archive parser.
//!
//! ZIP files are read from the end: the End of Central Directory record
//! (and its ZIP64 counterpart when present) locates the Central Directory,
//! which lists every member without touching the member data itself.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
const MAX_COMMENT_SIZE: u64 = 65535;

/// Parses archive structures from any [`ReadAt`] source.
pub struct ZipParser<R: ReadAt> {
    reader: R,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if self.reader.read_at(offset, buf)? < buf.len() {
            return Err(Error::InvalidZip("truncated archive".into()));
        }
        Ok(())
    }

    /// Locate the End of Central Directory record, returning it with its offset.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        // Common case first: no archive comment.
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = [0u8; EndOfCentralDirectory::SIZE];
            self.read_exact_at(offset, &mut buf)?;
            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
                return Ok((EndOfCentralDirectory::from_bytes(&buf)?, offset));
            }
        }

        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(Error::InvalidZip("file too small".into()));
        }
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;
        let mut buf = vec![0u8; search_size as usize];
        self.read_exact_at(search_start, &mut buf)?;

        for i in (0..=buf.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            // the comment must run exactly to the end of the file
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
        }

        Err(Error::InvalidZip("end of central directory not found".into()))
    }

    fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| Error::InvalidZip("missing zip64 locator".into()))?;
        let mut locator_buf = [0u8; Zip64EOCDLocator::SIZE];
        self.read_exact_at(locator_offset, &mut locator_buf)?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = [0u8; Zip64EOCD::MIN_SIZE];
        self.read_exact_at(locator.eocd64_offset, &mut eocd64_buf)?;
        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// List every member in central directory order.
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd()?;
        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset)?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (eocd.cd_offset as u64, eocd.cd_size as u64, eocd.total_entries as u64)
        };
        if cd_offset.saturating_add(cd_size) > self.size {
            return Err(Error::InvalidZip("central directory past end of file".into()));
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.read_exact_at(cd_offset, &mut cd_data)?;

        let mut cursor = Cursor::new(cd_data.as_slice());
        (0..total_entries).map(|_| parse_cdfh(&mut cursor)).collect()
    }

    /// Offset of the first byte of member data, past the local header.
    pub fn data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh = [0u8; LFH_SIZE];
        self.read_exact_at(entry.lfh_offset, &mut lfh)?;
        if &lfh[0..4] != LFH_SIGNATURE {
            return Err(Error::InvalidZip("bad local file header".into()));
        }
        let file_name_length = u16::from_le_bytes([lfh[26], lfh[27]]) as u64;
        let extra_field_length = u16::from_le_bytes([lfh[28], lfh[29]]) as u64;
        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }
}

fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(Error::InvalidZip("bad central directory file header".into()));
    }

    // version made by, version needed, flags
    cursor.set_position(cursor.position() + 6);
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    // modification time and date
    cursor.set_position(cursor.position() + 4);
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    // disk number start, internal and external attributes
    cursor.set_position(cursor.position() + 8);
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();
    let is_directory = file_name.ends_with('/');

    let extra_field_end = cursor.position() + extra_field_length as u64;
    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()? as u64;
        let field_end = cursor.position() + field_size;
        if header_id == 0x0001 {
            // ZIP64 values appear only for header fields saturated at 0xFFFFFFFF
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }

    cursor.set_position(extra_field_end + file_comment_length as u64);

    Ok(ZipFileEntry {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        is_directory,
    })
}
