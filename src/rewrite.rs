use crate::central::parse_central_directory;
use crate::cursor::ByteCursor;
use crate::descriptor::{resolve, LocalHeader, LocalHeaderPatch};
use crate::errors::{Error, ErrorKind};
use crate::utils::archive_offset;
use crate::{
    CentralDirectoryEntry, EndOfCentralDirectoryRecord, EocdLocator, FLAG_DATA_DESCRIPTOR,
};
use std::collections::HashMap;

/// Statistics about a completed rewrite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Number of entries in the archive
    pub entries: usize,

    /// Number of data descriptors that were dropped
    pub descriptors_removed: usize,

    /// Offset of the central directory in the rewritten archive
    pub central_directory_offset: u32,

    pub input_len: usize,
    pub output_len: usize,
}

/// Rewrites an archive so that every local file header carries its CRC-32
/// and sizes inline and no entry is followed by a data descriptor.
///
/// The input is never modified. The returned buffer holds, in order, each
/// entry's patched local header and compressed data, the central directory
/// with corrected offsets, and the end of central directory record.
///
/// ```rust
/// use std::io::Write;
///
/// let mut archive = zipfix::StreamingZipWriter::new(Vec::new());
/// let mut file = archive
///     .new_file("hello.txt")
///     .compression_method(zipfix::CompressionMethod::Store)
///     .create()?;
/// let mut writer = zipfix::ZipDataWriter::new(&mut file);
/// writer.write_all(b"Hello, world!")?;
/// let (_, output) = writer.finish()?;
/// file.finish(output)?;
/// let streamed = archive.finish()?;
///
/// let rewritten = zipfix::rewrite(&streamed)?;
/// assert_eq!(rewritten.len(), streamed.len() - 16);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn rewrite(data: &[u8]) -> Result<Vec<u8>, Error> {
    rewrite_with_summary(data).map(|(output, _)| output)
}

/// Same as [`rewrite`] but also reports what was done.
pub fn rewrite_with_summary(data: &[u8]) -> Result<(Vec<u8>, RewriteSummary), Error> {
    let input = ByteCursor::new(data);
    let eocd = EocdLocator::new().locate(data)?;
    if eocd.is_zip64() {
        return Err(Error::from(ErrorKind::Zip64Unsupported));
    }

    let entries = parse_central_directory(data, &eocd)?;
    let patches = entries
        .iter()
        .map(|entry| resolve(&input, entry))
        .collect::<Result<Vec<_>, _>>()?;

    let mut emitter = Emitter::new(&input);
    emitter.push_local_entries(&patches)?;
    let central_directory_offset = emitter.position()?;
    for entry in &entries {
        emitter.push_central_entry(entry)?;
    }
    emitter.push_end_of_central_directory(&eocd, central_directory_offset)?;

    let output = emitter.into_output();
    let summary = RewriteSummary {
        entries: entries.len(),
        descriptors_removed: patches
            .iter()
            .filter(|p| p.data_descriptor_offset.is_some())
            .count(),
        central_directory_offset,
        input_len: data.len(),
        output_len: output.len(),
    };

    Ok((output, summary))
}

/// Builds the rewritten archive in a buffer separate from the input.
struct Emitter<'a> {
    input: &'a ByteCursor<&'a [u8]>,
    output: Vec<u8>,

    /// Original local header offset to its offset in `output`
    new_offsets: HashMap<u32, u32>,
}

impl<'a> Emitter<'a> {
    fn new(input: &'a ByteCursor<&'a [u8]>) -> Self {
        Emitter {
            input,
            output: Vec::with_capacity(input.len()),
            new_offsets: HashMap::new(),
        }
    }

    fn position(&self) -> Result<u32, Error> {
        archive_offset(self.output.len())
    }

    /// Appends `[start, end)` of the input and returns a cursor over the
    /// freshly appended bytes.
    fn append(&mut self, start: usize, end: usize) -> Result<ByteCursor<&mut [u8]>, Error> {
        let input = self.input;
        let region = input.copy_range(start, end)?;
        let pos = self.output.len();
        self.output.extend_from_slice(region);
        Ok(ByteCursor::new(&mut self.output[pos..]))
    }

    /// Emits the local entries in the order they physically appear in the
    /// input, so the central directory order has no bearing on correctness.
    fn push_local_entries(&mut self, patches: &[LocalHeaderPatch]) -> Result<(), Error> {
        let mut ordered: Vec<&LocalHeaderPatch> = patches.iter().collect();
        ordered.sort_by_key(|p| p.local_header_offset);

        let mut previous_end = 0;
        for patch in ordered {
            if patch.local_header_offset < previous_end {
                return Err(Error::from(ErrorKind::OverlappingEntries {
                    offset: patch.local_header_offset,
                }));
            }
            previous_end = patch.data_end();
            self.push_local_entry(patch)?;
        }

        Ok(())
    }

    fn push_local_entry(&mut self, patch: &LocalHeaderPatch) -> Result<(), Error> {
        let new_offset = self.position()?;
        let original_offset = archive_offset(patch.local_header_offset)?;
        log::trace!(
            "local header {} -> {} (crc {:08x}, {} -> {} bytes)",
            original_offset,
            new_offset,
            patch.crc32,
            patch.uncompressed_size,
            patch.compressed_size
        );

        let mut header = self.append(patch.local_header_offset, patch.data_end())?;
        let flags = header.read_u16_le(LocalHeader::FLAGS)?;
        header.write_u16_le(LocalHeader::FLAGS, flags & !FLAG_DATA_DESCRIPTOR)?;
        header.write_u32_le(LocalHeader::CRC32, patch.crc32)?;
        header.write_u32_le(LocalHeader::COMPRESSED_SIZE, patch.compressed_size)?;
        header.write_u32_le(LocalHeader::UNCOMPRESSED_SIZE, patch.uncompressed_size)?;

        self.new_offsets.insert(original_offset, new_offset);
        Ok(())
    }

    fn push_central_entry(&mut self, entry: &CentralDirectoryEntry) -> Result<(), Error> {
        let new_offset = *self
            .new_offsets
            .get(&entry.local_header_offset)
            .ok_or(ErrorKind::MissingLocalHeader {
                offset: entry.local_header_offset,
            })?;

        let start = entry.signature_offset;
        let mut record = self.append(start, start.saturating_add(entry.record_len()))?;
        let flags = record.read_u16_le(CentralDirectoryEntry::FLAGS)?;
        record.write_u16_le(CentralDirectoryEntry::FLAGS, flags & !FLAG_DATA_DESCRIPTOR)?;
        record.write_u32_le(CentralDirectoryEntry::LOCAL_HEADER_OFFSET, new_offset)?;
        Ok(())
    }

    fn push_end_of_central_directory(
        &mut self,
        eocd: &EndOfCentralDirectoryRecord,
        central_directory_offset: u32,
    ) -> Result<(), Error> {
        let start = eocd.signature_offset;
        let mut record = self.append(start, start.saturating_add(eocd.record_len()))?;
        record.write_u32_le(
            EndOfCentralDirectoryRecord::CENTRAL_DIRECTORY_OFFSET,
            central_directory_offset,
        )?;
        Ok(())
    }

    fn into_output(self) -> Vec<u8> {
        self.output
    }
}
