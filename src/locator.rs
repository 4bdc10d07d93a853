use crate::cursor::ByteCursor;
use crate::errors::{Error, ErrorKind};

pub(crate) const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x06054b50;
pub(crate) const END_OF_CENTRAL_DIR_SIGNATURE_BYTES: [u8; 4] =
    END_OF_CENTRAL_DIR_SIGNATURE.to_le_bytes();

/// Finds the end of central directory record of an in-memory archive.
///
/// The record is the only one without a predictable position as it trails a
/// variable length comment, so the buffer is scanned from the last byte
/// backwards and the match closest to the end of the buffer wins.
#[derive(Debug, Clone)]
pub struct EocdLocator {
    max_search_space: Option<usize>,
}

impl Default for EocdLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl EocdLocator {
    /// A locator that searches the whole buffer
    pub fn new() -> Self {
        EocdLocator {
            max_search_space: None,
        }
    }

    /// The maximum number of trailing bytes to search for the end of central
    /// directory signature
    pub fn max_search_space(mut self, max_search_space: usize) -> Self {
        self.max_search_space = Some(max_search_space);
        self
    }

    /// Finds the end of central directory record closest to the end of `data`.
    ///
    /// Fails with `MissingEndOfCentralDirectory` when no signature is found
    /// within the search space, and with `OutOfRange` when the match is too
    /// close to the end to hold the fixed portion of the record.
    pub fn locate(&self, data: &[u8]) -> Result<EndOfCentralDirectoryRecord, Error> {
        let max_search_space = self.max_search_space.unwrap_or(data.len());
        let location = find_end_of_central_dir_signature(data, max_search_space)
            .ok_or(ErrorKind::MissingEndOfCentralDirectory)?;

        EndOfCentralDirectoryRecord::parse(&ByteCursor::new(data), location)
    }
}

/// The end of central directory record that closes every archive (4.3.16)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectoryRecord {
    /// Position of the record's signature in the source buffer
    pub signature_offset: usize,
    pub total_entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub comment_length: u16,
}

impl EndOfCentralDirectoryRecord {
    pub const SIZE: usize = 22;

    pub(crate) const TOTAL_ENTRIES: usize = 10;
    pub(crate) const CENTRAL_DIRECTORY_SIZE: usize = 12;
    pub(crate) const CENTRAL_DIRECTORY_OFFSET: usize = 16;
    pub(crate) const COMMENT_LENGTH: usize = 20;

    /// Parses the record whose signature starts at `offset`, `OutOfRange` if
    /// its 22 fixed bytes are not all within the buffer
    pub fn parse<B>(
        cursor: &ByteCursor<B>,
        offset: usize,
    ) -> Result<EndOfCentralDirectoryRecord, Error>
    where
        B: AsRef<[u8]>,
    {
        cursor.expect_signature(offset, END_OF_CENTRAL_DIR_SIGNATURE)?;

        // The fixed portion must be present even though only a few fields are
        // consulted
        cursor.copy_range(offset, offset.saturating_add(Self::SIZE))?;

        Ok(EndOfCentralDirectoryRecord {
            signature_offset: offset,
            total_entries: cursor.read_u16_le(offset + Self::TOTAL_ENTRIES)?,
            central_directory_size: cursor.read_u32_le(offset + Self::CENTRAL_DIRECTORY_SIZE)?,
            central_directory_offset: cursor
                .read_u32_le(offset + Self::CENTRAL_DIRECTORY_OFFSET)?,
            comment_length: cursor.read_u16_le(offset + Self::COMMENT_LENGTH)?,
        })
    }

    /// Length of the record including its comment
    pub fn record_len(&self) -> usize {
        Self::SIZE + self.comment_length as usize
    }

    /// Sentinel values signal that the real figures live in a zip64 record
    pub fn is_zip64(&self) -> bool {
        self.total_entries == u16::MAX
            || self.central_directory_size == u32::MAX
            || self.central_directory_offset == u32::MAX
    }
}

pub(crate) fn find_end_of_central_dir_signature(
    data: &[u8],
    max_search_space: usize,
) -> Option<usize> {
    let start_search = data.len().saturating_sub(max_search_space);
    backwards_find(&data[start_search..], &END_OF_CENTRAL_DIR_SIGNATURE_BYTES)
        .map(|pos| pos + start_search)
}

fn backwards_find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
