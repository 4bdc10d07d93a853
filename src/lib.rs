#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]
#![forbid(unsafe_code)]

mod archive;
mod central;
mod crc;
mod cursor;
mod descriptor;
mod errors;
mod locator;
mod process;
mod rewrite;
mod time;
mod utils;
mod writer;

pub use archive::{archive, archive_unprocessed, ArchiveOptions};
pub use central::{parse_central_directory, CentralDirectoryEntries, CentralDirectoryEntry};
pub use crc::crc32;
pub use cursor::ByteCursor;
pub use descriptor::{resolve, LocalHeaderPatch};
pub use errors::{Error, ErrorKind};
pub use locator::{EndOfCentralDirectoryRecord, EocdLocator};
pub use process::process;
pub use rewrite::{rewrite, rewrite_with_summary, RewriteSummary};
pub use time::DosDateTime;
pub use writer::{
    CompressionMethod, DataDescriptorOutput, StreamingZipWriter, ZipDataWriter, ZipDirBuilder,
    ZipEntryWriter, ZipFileBuilder,
};

/// General purpose bit 3: sizes and CRC-32 trail the data in a descriptor
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 0x08;

/// General purpose bit 11: name is UTF-8
pub(crate) const FLAG_UTF8_ENCODING: u16 = 0x800;
