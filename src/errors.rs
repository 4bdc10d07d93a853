/// The error type for every fallible operation in this crate.
///
/// Use [`Error::kind`] to inspect what went wrong, or one of the
/// classification helpers ([`Error::is_not_found`],
/// [`Error::is_format_error`], [`Error::is_out_of_range`]) when only the broad
/// category matters.
#[derive(Debug)]
pub struct Error {
    inner: ErrorInner,
}

impl Error {
    pub(crate) fn io(err: std::io::Error) -> Error {
        Error::from(ErrorKind::Io(err))
    }

    pub(crate) fn out_of_range(offset: usize, width: usize, len: usize) -> Error {
        Error::from(ErrorKind::OutOfRange { offset, width, len })
    }

    pub(crate) fn invalid_input(msg: impl Into<String>) -> Error {
        Error::from(ErrorKind::InvalidInput { msg: msg.into() })
    }

    /// The specific reason for the failure
    pub fn kind(&self) -> &ErrorKind {
        &self.inner.kind
    }

    /// Consumes the error and returns the underlying kind
    pub fn into_kind(self) -> ErrorKind {
        self.inner.kind
    }

    /// The buffer holds no end of central directory record, so it is either
    /// not a zip archive or it has been truncated.
    pub fn is_not_found(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::MissingEndOfCentralDirectory)
    }

    /// A record was found but its contents are inconsistent with the rest of
    /// the archive.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self.inner.kind,
            ErrorKind::InvalidSignature { .. }
                | ErrorKind::CentralDirectoryOverrun { .. }
                | ErrorKind::EntryCountMismatch { .. }
                | ErrorKind::InvalidSize { .. }
                | ErrorKind::InvalidChecksum { .. }
                | ErrorKind::OverlappingEntries { .. }
                | ErrorKind::MissingLocalHeader { .. }
        )
    }

    /// An offset computed from the archive points outside of the buffer.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::OutOfRange { .. })
    }
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
}

/// The kind of failure that occurred.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No end of central directory signature exists in the buffer
    MissingEndOfCentralDirectory,

    /// The record at `offset` does not start with the expected signature
    InvalidSignature {
        expected: u32,
        actual: u32,
        offset: usize,
    },

    /// The central directory entries walk past the size recorded in the end
    /// of central directory record
    CentralDirectoryOverrun { size: u32, consumed: usize },

    /// The end of central directory entry count disagrees with the number of
    /// central directory entries
    EntryCountMismatch { expected: u64, actual: u64 },

    /// A data descriptor or local header records a size that disagrees with
    /// the central directory
    InvalidSize { expected: u64, actual: u64 },

    /// A data descriptor or local header records a CRC-32 that disagrees
    /// with the central directory
    InvalidChecksum { expected: u32, actual: u32 },

    /// Two entries claim overlapping regions of the archive
    OverlappingEntries { offset: usize },

    /// A central directory entry references a local header that was never
    /// emitted
    MissingLocalHeader { offset: u32 },

    /// Reading or writing `width` bytes at `offset` exceeds the buffer
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// The archive needs zip64 extensions, which are not supported
    Zip64Unsupported,

    /// The caller supplied something that cannot be represented in an archive
    InvalidInput { msg: String },

    /// An underlying I/O error
    Io(std::io::Error),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.inner.kind {
            ErrorKind::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.inner.kind)?;
        Ok(())
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::MissingEndOfCentralDirectory => {
                write!(f, "Missing end of central directory")
            }
            ErrorKind::InvalidSignature {
                expected,
                actual,
                offset,
            } => {
                write!(
                    f,
                    "Invalid signature at offset {}: expected 0x{:08x}, got 0x{:08x}",
                    offset, expected, actual
                )
            }
            ErrorKind::CentralDirectoryOverrun { size, consumed } => {
                write!(
                    f,
                    "Central directory entries span {} bytes but the directory is {} bytes",
                    consumed, size
                )
            }
            ErrorKind::EntryCountMismatch { expected, actual } => {
                write!(
                    f,
                    "Entry count mismatch: expected {}, found {}",
                    expected, actual
                )
            }
            ErrorKind::InvalidSize { expected, actual } => {
                write!(f, "Invalid size: expected {}, got {}", expected, actual)
            }
            ErrorKind::InvalidChecksum { expected, actual } => {
                write!(
                    f,
                    "Invalid checksum: expected 0x{:08x}, got 0x{:08x}",
                    expected, actual
                )
            }
            ErrorKind::OverlappingEntries { offset } => {
                write!(f, "Entry at offset {} overlaps the previous entry", offset)
            }
            ErrorKind::MissingLocalHeader { offset } => {
                write!(f, "No local file header was emitted for offset {}", offset)
            }
            ErrorKind::OutOfRange { offset, width, len } => {
                write!(
                    f,
                    "Out of range: {} bytes at offset {} exceeds buffer of {} bytes",
                    width, offset, len
                )
            }
            ErrorKind::Zip64Unsupported => {
                write!(f, "Zip64 archives are not supported")
            }
            ErrorKind::InvalidInput { ref msg } => {
                write!(f, "Invalid input: {}", msg)
            }
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: ErrorInner { kind },
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::io(err)
    }
}
