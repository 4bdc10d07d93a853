use crate::cursor::ByteCursor;
use crate::errors::{Error, ErrorKind};
use crate::{CentralDirectoryEntry, FLAG_DATA_DESCRIPTOR};

pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub(crate) const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

/// Field offsets within a local file header (4.3.7)
pub(crate) struct LocalHeader;

impl LocalHeader {
    pub(crate) const SIZE: usize = 30;
    pub(crate) const FLAGS: usize = 6;
    pub(crate) const CRC32: usize = 14;
    pub(crate) const COMPRESSED_SIZE: usize = 18;
    pub(crate) const UNCOMPRESSED_SIZE: usize = 22;
    pub(crate) const FILENAME_LENGTH: usize = 26;
    pub(crate) const EXTRA_FIELD_LENGTH: usize = 28;
}

/// The final values an entry's local file header should carry inline.
///
/// Produced for every central directory entry by [`resolve`] and consumed
/// while the archive is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalHeaderPatch {
    /// Offset of the local file header in the source buffer
    pub local_header_offset: usize,

    /// Length of the local file header including its name and extra field
    pub header_len: usize,

    /// Offset of the trailing data descriptor in the source buffer, when the
    /// entry was written in streaming mode
    pub data_descriptor_offset: Option<usize>,

    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl LocalHeaderPatch {
    /// One past the last byte of the entry's compressed data
    pub fn data_end(&self) -> usize {
        self.local_header_offset + self.header_len + self.compressed_size as usize
    }

    /// Length of the local header and compressed data, excluding any data
    /// descriptor
    pub fn entry_len(&self) -> usize {
        self.header_len + self.compressed_size as usize
    }
}

/// Locates the local file header of `entry` and determines its authoritative
/// CRC-32 and sizes.
///
/// The data descriptor position is computed from the header layout and the
/// central directory's compressed size rather than scanned for, as a scan
/// could match a signature that happens to appear in the compressed data. The
/// name and extra field lengths come from the local header itself, they are
/// allowed to differ from the central directory copy.
///
/// A descriptor is recognized with or without its optional signature (4.3.9.3).
/// Whichever record supplies the values, its CRC-32 and both sizes must agree
/// with the central directory.
pub fn resolve<B>(
    cursor: &ByteCursor<B>,
    entry: &CentralDirectoryEntry,
) -> Result<LocalHeaderPatch, Error>
where
    B: AsRef<[u8]>,
{
    let offset = entry.local_header_offset as usize;
    cursor.expect_signature(offset, LOCAL_FILE_HEADER_SIGNATURE)?;
    cursor.copy_range(offset, offset.saturating_add(LocalHeader::SIZE))?;

    let flags = cursor.read_u16_le(offset + LocalHeader::FLAGS)?;
    let filename_length = cursor.read_u16_le(offset + LocalHeader::FILENAME_LENGTH)?;
    let extra_field_length = cursor.read_u16_le(offset + LocalHeader::EXTRA_FIELD_LENGTH)?;
    let header_len = LocalHeader::SIZE + filename_length as usize + extra_field_length as usize;

    // Position immediately following the compressed data
    let data_pos = offset
        .checked_add(header_len)
        .and_then(|x| x.checked_add(entry.compressed_size as usize))
        .ok_or_else(|| Error::out_of_range(offset, header_len, cursor.len()))?;
    cursor.copy_range(offset, data_pos)?;

    let (values, data_descriptor_offset) = if flags & FLAG_DATA_DESCRIPTOR == 0 {
        let values = EntryValues::read(cursor, offset + LocalHeader::CRC32)?;
        values.check(entry)?;
        (values, None)
    } else {
        (read_data_descriptor(cursor, data_pos, entry)?, Some(data_pos))
    };

    Ok(LocalHeaderPatch {
        local_header_offset: offset,
        header_len,
        data_descriptor_offset,
        crc32: values.crc32,
        compressed_size: values.compressed_size,
        uncompressed_size: values.uncompressed_size,
    })
}

/// Reads the descriptor at `pos`.
///
/// The descriptor signature is optional, so four bytes that match it may
/// just as well be the CRC-32 of an unsigned descriptor. The layout whose
/// values agree with the central directory is the one taken. When neither
/// does, the error from the signed reading is reported.
fn read_data_descriptor<B>(
    cursor: &ByteCursor<B>,
    pos: usize,
    entry: &CentralDirectoryEntry,
) -> Result<EntryValues, Error>
where
    B: AsRef<[u8]>,
{
    let unsigned = || EntryValues::read(cursor, pos).and_then(|values| values.checked(entry));
    if cursor.read_u32_le(pos)? != DATA_DESCRIPTOR_SIGNATURE {
        return unsigned();
    }

    match EntryValues::read(cursor, pos + 4).and_then(|values| values.checked(entry)) {
        Ok(values) => Ok(values),
        Err(err) => {
            let values = unsigned().map_err(|_| err)?;
            log::trace!("unsigned data descriptor at {} starts with its signature", pos);
            Ok(values)
        }
    }
}

/// CRC-32 and sizes as recorded by a local header or data descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntryValues {
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
}

impl EntryValues {
    fn read<B>(cursor: &ByteCursor<B>, offset: usize) -> Result<EntryValues, Error>
    where
        B: AsRef<[u8]>,
    {
        Ok(EntryValues {
            crc32: cursor.read_u32_le(offset)?,
            compressed_size: cursor.read_u32_le(offset.saturating_add(4))?,
            uncompressed_size: cursor.read_u32_le(offset.saturating_add(8))?,
        })
    }

    fn check(&self, entry: &CentralDirectoryEntry) -> Result<(), Error> {
        let mismatch = if self.compressed_size != entry.compressed_size {
            ErrorKind::InvalidSize {
                expected: u64::from(entry.compressed_size),
                actual: u64::from(self.compressed_size),
            }
        } else if self.uncompressed_size != entry.uncompressed_size {
            ErrorKind::InvalidSize {
                expected: u64::from(entry.uncompressed_size),
                actual: u64::from(self.uncompressed_size),
            }
        } else if self.crc32 != entry.crc32 {
            ErrorKind::InvalidChecksum {
                expected: entry.crc32,
                actual: self.crc32,
            }
        } else {
            return Ok(());
        };

        Err(Error::from(mismatch))
    }

    fn checked(self, entry: &CentralDirectoryEntry) -> Result<EntryValues, Error> {
        self.check(entry).map(|()| self)
    }
}
