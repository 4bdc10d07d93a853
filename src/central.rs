use crate::cursor::ByteCursor;
use crate::errors::{Error, ErrorKind};
use crate::EndOfCentralDirectoryRecord;

pub(crate) const CENTRAL_HEADER_SIGNATURE: u32 = 0x02014b50;

/// A central directory file header (4.3.12).
///
/// Only the fields needed to find the entry's local header and to size the
/// entry are decoded. The remainder of the record is copied through verbatim
/// when the archive is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    /// Position of the record's signature in the source buffer
    pub signature_offset: usize,
    pub flags: u16,
    pub crc32: u32,
    /// Authoritative compressed size of the entry's data
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub filename_length: u16,
    pub extra_field_length: u16,
    pub comment_length: u16,
    /// Offset of the local file header in the source buffer
    pub local_header_offset: u32,
}

impl CentralDirectoryEntry {
    pub const SIZE: usize = 46;

    pub(crate) const FLAGS: usize = 8;
    pub(crate) const CRC32: usize = 16;
    pub(crate) const COMPRESSED_SIZE: usize = 20;
    pub(crate) const UNCOMPRESSED_SIZE: usize = 24;
    pub(crate) const FILENAME_LENGTH: usize = 28;
    pub(crate) const EXTRA_FIELD_LENGTH: usize = 30;
    pub(crate) const COMMENT_LENGTH: usize = 32;
    pub(crate) const LOCAL_HEADER_OFFSET: usize = 42;

    pub fn parse<B>(cursor: &ByteCursor<B>, offset: usize) -> Result<CentralDirectoryEntry, Error>
    where
        B: AsRef<[u8]>,
    {
        cursor.expect_signature(offset, CENTRAL_HEADER_SIGNATURE)?;
        cursor.copy_range(offset, offset.saturating_add(Self::SIZE))?;

        let entry = CentralDirectoryEntry {
            signature_offset: offset,
            flags: cursor.read_u16_le(offset + Self::FLAGS)?,
            crc32: cursor.read_u32_le(offset + Self::CRC32)?,
            compressed_size: cursor.read_u32_le(offset + Self::COMPRESSED_SIZE)?,
            uncompressed_size: cursor.read_u32_le(offset + Self::UNCOMPRESSED_SIZE)?,
            filename_length: cursor.read_u16_le(offset + Self::FILENAME_LENGTH)?,
            extra_field_length: cursor.read_u16_le(offset + Self::EXTRA_FIELD_LENGTH)?,
            comment_length: cursor.read_u16_le(offset + Self::COMMENT_LENGTH)?,
            local_header_offset: cursor.read_u32_le(offset + Self::LOCAL_HEADER_OFFSET)?,
        };

        if entry.is_zip64() {
            return Err(Error::from(ErrorKind::Zip64Unsupported));
        }

        Ok(entry)
    }

    /// Length of the record including the name, extra field, and comment
    pub fn record_len(&self) -> usize {
        Self::SIZE
            + self.filename_length as usize
            + self.extra_field_length as usize
            + self.comment_length as usize
    }

    /// Describes if the entry is flagged as having a data descriptor follow
    /// its compressed data (4.3.9.1)
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & crate::FLAG_DATA_DESCRIPTOR != 0
    }

    fn is_zip64(&self) -> bool {
        self.compressed_size == u32::MAX
            || self.uncompressed_size == u32::MAX
            || self.local_header_offset == u32::MAX
    }
}

/// Walks the central directory one record at a time.
///
/// Iteration stops once the bytes consumed reach the central directory size
/// recorded in the end of central directory record. The first error fuses the
/// iterator.
#[derive(Debug, Clone)]
pub struct CentralDirectoryEntries<'data> {
    cursor: ByteCursor<&'data [u8]>,
    start: usize,
    size: u32,
    consumed: usize,
    done: bool,
}

impl<'data> CentralDirectoryEntries<'data> {
    pub fn new(data: &'data [u8], eocd: &EndOfCentralDirectoryRecord) -> Self {
        CentralDirectoryEntries {
            cursor: ByteCursor::new(data),
            start: eocd.central_directory_offset as usize,
            size: eocd.central_directory_size,
            consumed: 0,
            done: false,
        }
    }

    pub fn next_entry(&mut self) -> Result<Option<CentralDirectoryEntry>, Error> {
        if self.done || self.consumed >= self.size as usize {
            return Ok(None);
        }

        let result = self.parse_next();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn parse_next(&mut self) -> Result<Option<CentralDirectoryEntry>, Error> {
        let offset = self
            .start
            .checked_add(self.consumed)
            .ok_or_else(|| Error::out_of_range(self.start, self.consumed, self.cursor.len()))?;
        let entry = CentralDirectoryEntry::parse(&self.cursor, offset)?;

        // The variable length tail must be present for the record to be
        // copied later on
        self.cursor
            .copy_range(offset, offset.saturating_add(entry.record_len()))?;

        self.consumed += entry.record_len();
        if self.consumed > self.size as usize {
            return Err(Error::from(ErrorKind::CentralDirectoryOverrun {
                size: self.size,
                consumed: self.consumed,
            }));
        }

        Ok(Some(entry))
    }
}

impl Iterator for CentralDirectoryEntries<'_> {
    type Item = Result<CentralDirectoryEntry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

/// Parses every central directory entry in file order.
///
/// The number of entries must agree with the total recorded in the end of
/// central directory record.
pub fn parse_central_directory(
    data: &[u8],
    eocd: &EndOfCentralDirectoryRecord,
) -> Result<Vec<CentralDirectoryEntry>, Error> {
    let entries = CentralDirectoryEntries::new(data, eocd).collect::<Result<Vec<_>, _>>()?;

    if entries.len() != eocd.total_entries as usize {
        return Err(Error::from(ErrorKind::EntryCountMismatch {
            expected: u64::from(eocd.total_entries),
            actual: entries.len() as u64,
        }));
    }

    Ok(entries)
}
