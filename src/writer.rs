use crate::central::CENTRAL_HEADER_SIGNATURE;
use crate::descriptor::{DATA_DESCRIPTOR_SIGNATURE, LOCAL_FILE_HEADER_SIGNATURE};
use crate::errors::{Error, ErrorKind};
use crate::locator::END_OF_CENTRAL_DIR_SIGNATURE_BYTES;
use crate::time::{DosDateTime, EXTENDED_TIMESTAMP_ID};
use crate::{FLAG_DATA_DESCRIPTOR, FLAG_UTF8_ENCODING};
use std::io::{self, Write};

const VERSION_NEEDED: u16 = 20; // 2.0
const CREATOR_UNIX: u16 = 3;

/// The compression methods the writer can record for an entry.
///
/// The writer never compresses on its own: the caller wraps the entry writer
/// in the matching encoder (eg: a `flate2::write::DeflateEncoder`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMethod {
    Store,
    #[default]
    Deflate,
}

impl CompressionMethod {
    /// The method ID stored in local and central headers
    pub const fn as_id(&self) -> u16 {
        match self {
            CompressionMethod::Store => 0,
            CompressionMethod::Deflate => 8,
        }
    }
}

#[derive(Debug)]
struct CountWriter<W> {
    writer: W,
    count: u64,
}

impl<W> CountWriter<W> {
    fn new(writer: W) -> Self {
        CountWriter { writer, count: 0 }
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> Write for CountWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.writer.write(buf)?;
        self.count += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Writes a zip archive in a single forward pass, the way a streaming
/// producer does when sizes are not known until the data has been written.
///
/// Every file entry has general purpose bit 3 set, zeroes in its local header
/// CRC-32 and size fields, and a signed data descriptor after its data. Such
/// an archive is exactly the input [`rewrite`](crate::rewrite) exists for.
/// Directory entries are empty and written without a descriptor.
///
/// Zip64 is not produced: exceeding the 32-bit limits is an error.
///
/// ```rust
/// use std::io::Write;
///
/// let mut archive = zipfix::StreamingZipWriter::new(Vec::new());
/// archive.new_dir("docs/").create()?;
/// let mut file = archive.new_file("docs/readme.txt").create()?;
/// let mut writer = zipfix::ZipDataWriter::new(&mut file);
/// writer.write_all(b"Hello, world!")?;
/// let (_, output) = writer.finish()?;
/// file.finish(output)?;
/// let data = archive.finish()?;
/// assert!(data.starts_with(b"PK\x03\x04"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct StreamingZipWriter<W> {
    files: Vec<FileHeader>,
    writer: CountWriter<W>,
}

impl<W> StreamingZipWriter<W> {
    /// Creates a new `StreamingZipWriter` that writes to `writer`.
    pub fn new(writer: W) -> Self {
        StreamingZipWriter {
            files: Vec::new(),
            writer: CountWriter::new(writer),
        }
    }
}

/// A builder for creating a new file entry in an archive.
#[derive(Debug)]
pub struct ZipFileBuilder<'a, W> {
    archive: &'a mut StreamingZipWriter<W>,
    name: &'a str,
    options: EntryOptions,
}

impl<'a, W> ZipFileBuilder<'a, W>
where
    W: Write,
{
    /// Sets the compression method recorded for the file entry.
    pub fn compression_method(mut self, compression_method: CompressionMethod) -> Self {
        self.options.compression_method = compression_method;
        self
    }

    /// Sets the modification time, in seconds since the Unix epoch.
    ///
    /// Stored both as an MS-DOS date and time and as an extended timestamp
    /// extra field.
    pub fn last_modified(mut self, unix_seconds: i64) -> Self {
        self.options.modification_time = Some(unix_seconds);
        self
    }

    /// Sets the Unix permissions for the file entry.
    ///
    /// When set, the central directory records a Unix "version made by" so
    /// readers interpret the external attributes as a Unix mode.
    pub fn unix_permissions(mut self, permissions: u32) -> Self {
        self.options.unix_permissions = Some(permissions);
        self
    }

    /// Writes the local file header and returns a writer for the file's
    /// (already compressed) content.
    pub fn create(self) -> Result<ZipEntryWriter<'a, W>, Error> {
        self.archive.new_file_with_options(self.name, self.options)
    }
}

/// A builder for creating a new directory entry in an archive.
#[derive(Debug)]
pub struct ZipDirBuilder<'a, W> {
    archive: &'a mut StreamingZipWriter<W>,
    name: &'a str,
    options: EntryOptions,
}

impl<W> ZipDirBuilder<'_, W>
where
    W: Write,
{
    /// See [`ZipFileBuilder::last_modified`] for details.
    pub fn last_modified(mut self, unix_seconds: i64) -> Self {
        self.options.modification_time = Some(unix_seconds);
        self
    }

    /// See [`ZipFileBuilder::unix_permissions`] for details.
    pub fn unix_permissions(mut self, permissions: u32) -> Self {
        self.options.unix_permissions = Some(permissions);
        self
    }

    /// Writes the directory entry.
    pub fn create(self) -> Result<(), Error> {
        self.archive.new_dir_with_options(self.name, self.options)
    }
}

impl<W> StreamingZipWriter<W>
where
    W: Write,
{
    fn write_local_header(
        &mut self,
        name: &str,
        flags: u16,
        options: &EntryOptions,
    ) -> Result<(), Error> {
        let (dos_time, dos_date) = options.dos_parts();

        self.writer
            .write_all(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes())?;
        self.writer.write_all(&VERSION_NEEDED.to_le_bytes())?;
        self.writer.write_all(&flags.to_le_bytes())?;
        self.writer
            .write_all(&options.compression_method.as_id().to_le_bytes())?;
        self.writer.write_all(&dos_time.to_le_bytes())?;
        self.writer.write_all(&dos_date.to_le_bytes())?;

        // CRC-32, compressed and uncompressed size are unknown at this point
        self.writer.write_all(&[0u8; 12])?;

        self.writer.write_all(&(name.len() as u16).to_le_bytes())?;
        self.writer
            .write_all(&extended_timestamp_extra_field_size(options.modification_time).to_le_bytes())?;
        self.writer.write_all(name.as_bytes())?;
        write_extended_timestamp_field(&mut self.writer, options.modification_time)?;
        Ok(())
    }

    /// Creates a builder for adding a new directory to the archive.
    ///
    /// The name of the directory must end with a `/`.
    #[must_use]
    pub fn new_dir<'a>(&'a mut self, name: &'a str) -> ZipDirBuilder<'a, W> {
        ZipDirBuilder {
            archive: self,
            name,
            options: EntryOptions::new(CompressionMethod::Store),
        }
    }

    fn new_dir_with_options(&mut self, name: &str, options: EntryOptions) -> Result<(), Error> {
        if !name.ends_with('/') {
            return Err(Error::invalid_input("directory name must end with a slash"));
        }

        let name = validate_name(name)?;
        let local_header_offset = self.local_header_offset()?;
        let flags = name_flags(name);
        self.write_local_header(name, flags, &options)?;

        self.files.push(FileHeader {
            name: name.to_string(),
            local_header_offset,
            compressed_size: 0,
            uncompressed_size: 0,
            crc: 0,
            flags,
            options,
        });

        Ok(())
    }

    /// Creates a builder for adding a new file to the archive.
    ///
    /// Entries are recorded as deflated unless another method is selected.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use std::io::Write;
    /// # let mut archive = zipfix::StreamingZipWriter::new(Vec::new());
    /// let mut file = archive.new_file("my-file")
    ///     .compression_method(zipfix::CompressionMethod::Deflate)
    ///     .unix_permissions(0o644)
    ///     .create()?;
    /// let encoder = flate2::write::DeflateEncoder::new(&mut file, flate2::Compression::default());
    /// let mut writer = zipfix::ZipDataWriter::new(encoder);
    /// writer.write_all(b"Hello, world!")?;
    /// let (encoder, output) = writer.finish()?;
    /// encoder.finish()?;
    /// file.finish(output)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn new_file<'a>(&'a mut self, name: &'a str) -> ZipFileBuilder<'a, W> {
        ZipFileBuilder {
            archive: self,
            name,
            options: EntryOptions::new(CompressionMethod::Deflate),
        }
    }

    fn new_file_with_options(
        &mut self,
        name: &str,
        options: EntryOptions,
    ) -> Result<ZipEntryWriter<'_, W>, Error> {
        let name = validate_name(name.trim_end_matches('/'))?;
        let local_header_offset = self.local_header_offset()?;
        let flags = FLAG_DATA_DESCRIPTOR | name_flags(name);
        self.write_local_header(name, flags, &options)?;

        Ok(ZipEntryWriter {
            inner: self,
            compressed_bytes: 0,
            header: FileHeader {
                name: name.to_string(),
                local_header_offset,
                compressed_size: 0,
                uncompressed_size: 0,
                crc: 0,
                flags,
                options,
            },
        })
    }

    fn local_header_offset(&self) -> Result<u32, Error> {
        fits_u32(self.writer.count())
    }

    /// Finishes writing the archive and returns the underlying writer.
    ///
    /// This writes the central directory and the end of central directory
    /// record.
    pub fn finish(mut self) -> Result<W, Error> {
        let central_directory_offset = fits_u32(self.writer.count())?;
        let total_entries =
            u16::try_from(self.files.len()).map_err(|_| ErrorKind::Zip64Unsupported)?;
        if total_entries == u16::MAX {
            return Err(Error::from(ErrorKind::Zip64Unsupported));
        }

        for file in &self.files {
            self.writer
                .write_all(&CENTRAL_HEADER_SIGNATURE.to_le_bytes())?;

            // Set version_made_by to indicate Unix when Unix permissions are present
            let version_made_by_hi = file
                .options
                .unix_permissions
                .map(|_| CREATOR_UNIX)
                .unwrap_or(0);
            let version_made_by = (version_made_by_hi << 8) | VERSION_NEEDED;
            self.writer.write_all(&version_made_by.to_le_bytes())?;
            self.writer.write_all(&VERSION_NEEDED.to_le_bytes())?;

            self.writer.write_all(&file.flags.to_le_bytes())?;
            self.writer
                .write_all(&file.options.compression_method.as_id().to_le_bytes())?;

            let (dos_time, dos_date) = file.options.dos_parts();
            self.writer.write_all(&dos_time.to_le_bytes())?;
            self.writer.write_all(&dos_date.to_le_bytes())?;

            self.writer.write_all(&file.crc.to_le_bytes())?;
            self.writer.write_all(&file.compressed_size.to_le_bytes())?;
            self.writer
                .write_all(&file.uncompressed_size.to_le_bytes())?;
            self.writer
                .write_all(&(file.name.len() as u16).to_le_bytes())?;
            self.writer.write_all(
                &extended_timestamp_extra_field_size(file.options.modification_time).to_le_bytes(),
            )?;

            // File comment length, disk number start, internal file attributes
            self.writer.write_all(&[0u8; 6])?;

            let external_attrs = file
                .options
                .unix_permissions
                .map(|x| x << 16)
                .unwrap_or(0);
            self.writer.write_all(&external_attrs.to_le_bytes())?;
            self.writer
                .write_all(&file.local_header_offset.to_le_bytes())?;

            self.writer.write_all(file.name.as_bytes())?;
            write_extended_timestamp_field(&mut self.writer, file.options.modification_time)?;
        }

        let central_directory_end = fits_u32(self.writer.count())?;
        let central_directory_size = central_directory_end - central_directory_offset;

        self.writer.write_all(&END_OF_CENTRAL_DIR_SIGNATURE_BYTES)?;

        // Disk numbers
        self.writer.write_all(&[0u8; 4])?;

        self.writer.write_all(&total_entries.to_le_bytes())?;
        self.writer.write_all(&total_entries.to_le_bytes())?;
        self.writer
            .write_all(&central_directory_size.to_le_bytes())?;
        self.writer
            .write_all(&central_directory_offset.to_le_bytes())?;

        // Comment length
        self.writer.write_all(&0u16.to_le_bytes())?;

        self.writer.flush()?;
        Ok(self.writer.writer)
    }
}

/// A writer for a file in an archive.
///
/// Created by [`StreamingZipWriter::new_file`]. Bytes written here land in
/// the archive verbatim, so they must already be compressed with the method
/// the entry was created with.
///
/// After writing all data, call `finish` to write the data descriptor.
#[derive(Debug)]
pub struct ZipEntryWriter<'a, W> {
    inner: &'a mut StreamingZipWriter<W>,
    compressed_bytes: u64,
    header: FileHeader,
}

impl<W> ZipEntryWriter<'_, W> {
    /// Returns the total number of bytes successfully written (bytes out).
    pub fn compressed_bytes(&self) -> u64 {
        self.compressed_bytes
    }

    /// Finishes writing the file entry.
    ///
    /// This writes the signed data descriptor and queues the entry for the
    /// central directory. Returns the number of compressed bytes.
    pub fn finish(self, output: DataDescriptorOutput) -> Result<u64, Error>
    where
        W: Write,
    {
        let compressed_size = fits_u32(self.compressed_bytes)?;
        let uncompressed_size = fits_u32(output.uncompressed_size)?;

        let writer = &mut self.inner.writer;
        writer.write_all(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes())?;
        writer.write_all(&output.crc.to_le_bytes())?;
        writer.write_all(&compressed_size.to_le_bytes())?;
        writer.write_all(&uncompressed_size.to_le_bytes())?;

        self.inner.files.push(FileHeader {
            compressed_size,
            uncompressed_size,
            crc: output.crc,
            ..self.header
        });

        Ok(self.compressed_bytes)
    }
}

impl<W> Write for ZipEntryWriter<'_, W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.inner.writer.write(buf)?;
        self.compressed_bytes += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.writer.flush()
    }
}

/// A writer for the uncompressed data of a zip file entry.
///
/// This writer will keep track of the data necessary to write the data
/// descriptor (ie: number of bytes written and the CRC32 checksum).
///
/// Once all the data has been written, invoke the `finish` method to receive the
/// `DataDescriptorOutput` necessary to finalize the entry.
#[derive(Debug)]
pub struct ZipDataWriter<W> {
    inner: W,
    uncompressed_bytes: u64,
    crc: flate2::Crc,
}

impl<W> ZipDataWriter<W> {
    /// Creates a new `ZipDataWriter` that writes to an underlying writer.
    pub fn new(inner: W) -> Self {
        ZipDataWriter {
            inner,
            uncompressed_bytes: 0,
            crc: flate2::Crc::new(),
        }
    }

    /// Gets a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consumes self and returns the inner writer and the data descriptor to be
    /// passed to a `ZipEntryWriter`.
    ///
    /// The writer is returned so a compressor can be told that no more data
    /// will be written and emit its epilogue.
    pub fn finish(mut self) -> Result<(W, DataDescriptorOutput), Error>
    where
        W: Write,
    {
        self.flush()?;
        let output = DataDescriptorOutput {
            crc: self.crc.sum(),
            uncompressed_size: self.uncompressed_bytes,
        };

        Ok((self.inner, output))
    }
}

impl<W> Write for ZipDataWriter<W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.inner.write(buf)?;
        self.uncompressed_bytes += bytes_written as u64;
        self.crc.update(&buf[..bytes_written]);
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Contains information written in the data descriptor after the file data.
#[derive(Debug, Clone)]
pub struct DataDescriptorOutput {
    crc: u32,
    uncompressed_size: u64,
}

impl DataDescriptorOutput {
    /// Returns the CRC32 checksum of the uncompressed data.
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Returns the uncompressed size of the data.
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }
}

#[derive(Debug, Clone, Copy)]
struct EntryOptions {
    compression_method: CompressionMethod,
    modification_time: Option<i64>,
    unix_permissions: Option<u32>,
}

impl EntryOptions {
    fn new(compression_method: CompressionMethod) -> Self {
        EntryOptions {
            compression_method,
            modification_time: None,
            unix_permissions: None,
        }
    }

    fn dos_parts(&self) -> (u16, u16) {
        self.modification_time
            .map(|secs| DosDateTime::from_unix(secs).into_parts())
            .unwrap_or((0, 0))
    }
}

#[derive(Debug)]
struct FileHeader {
    name: String,
    local_header_offset: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    crc: u32,
    flags: u16,
    options: EntryOptions,
}

fn fits_u32(value: u64) -> Result<u32, Error> {
    u32::try_from(value).map_err(|_| Error::from(ErrorKind::Zip64Unsupported))
}

fn validate_name(name: &str) -> Result<&str, Error> {
    let name = name.trim_start_matches('/');
    if name.is_empty() {
        return Err(Error::invalid_input("entry name is empty"));
    } else if name.len() > usize::from(u16::MAX) {
        return Err(Error::invalid_input("entry name too long"));
    } else if name.contains('\\') {
        return Err(Error::invalid_input("entry name must use forward slashes"));
    }

    Ok(name)
}

fn name_flags(name: &str) -> u16 {
    if name.is_ascii() {
        0
    } else {
        FLAG_UTF8_ENCODING
    }
}

fn extended_timestamp_extra_field_size(modification_time: Option<i64>) -> u16 {
    if modification_time.is_some() {
        9 // 2 bytes ID + 2 bytes size + 1 byte flags + 4 bytes timestamp
    } else {
        0
    }
}

fn write_extended_timestamp_field<W>(
    writer: &mut W,
    modification_time: Option<i64>,
) -> Result<(), Error>
where
    W: Write,
{
    let Some(seconds) = modification_time else {
        return Ok(());
    };

    // The field is 32 bits, clamp out of range times
    let unix_time = seconds.clamp(0, i64::from(u32::MAX)) as u32;
    writer.write_all(&EXTENDED_TIMESTAMP_ID.to_le_bytes())?;
    writer.write_all(&5u16.to_le_bytes())?; // Size: 1 byte flags + 4 bytes timestamp
    writer.write_all(&1u8.to_le_bytes())?; // Flags: modification time present
    writer.write_all(&unix_time.to_le_bytes())?;
    Ok(())
}
