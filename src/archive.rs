use crate::errors::Error;
use crate::process::{process, write_atomic};
use crate::time::unix_seconds;
use crate::writer::{CompressionMethod, StreamingZipWriter, ZipDataWriter};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::fs::{self, Metadata};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Controls how [`archive`] and [`archive_unprocessed`] lay out entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    exclude_base_dir: bool,
    compression: CompressionMethod,
    compression_level: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveOptions {
    /// Deflate at level 6, with the source directory as the top level entry
    pub fn new() -> Self {
        ArchiveOptions {
            exclude_base_dir: false,
            compression: CompressionMethod::Deflate,
            compression_level: 6,
        }
    }

    /// When archiving a directory, omit the directory itself and name
    /// entries relative to it.
    pub fn exclude_base_dir(mut self, exclude_base_dir: bool) -> Self {
        self.exclude_base_dir = exclude_base_dir;
        self
    }

    pub fn compression_method(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    /// Deflate level from 0 to 9, larger values are clamped
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}

/// Zips `source` into `target` and then rewrites `target` in place so that
/// its local headers carry their sizes and CRC-32 inline.
///
/// ```rust
/// let dir = tempfile::tempdir()?;
/// let source = dir.path().join("site");
/// std::fs::create_dir(&source)?;
/// std::fs::write(source.join("index.html"), "<html></html>")?;
///
/// let target = dir.path().join("site.zip");
/// zipfix::archive(&source, &target, zipfix::ArchiveOptions::new())?;
///
/// let data = std::fs::read(&target)?;
/// let eocd = zipfix::EocdLocator::new().locate(&data)?;
/// let entries = zipfix::parse_central_directory(&data, &eocd)?;
/// assert_eq!(entries.len(), 2);
/// assert!(entries.iter().all(|entry| !entry.has_data_descriptor()));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn archive(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    options: ArchiveOptions,
) -> Result<(), Error> {
    let target = target.as_ref();
    archive_unprocessed(source, target, options)?;
    process(target, target)
}

/// Zips `source` into `target` the way a streaming producer does: every file
/// entry is followed by a data descriptor.
///
/// A directory source is walked recursively with entries in lexical order.
/// A file source becomes a single entry named after the file.
pub fn archive_unprocessed(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    options: ArchiveOptions,
) -> Result<(), Error> {
    let source = source.as_ref();
    let target = target.as_ref();
    let metadata = fs::metadata(source).map_err(Error::io)?;

    write_atomic(target, |temp| {
        let skip = [resolve_path(temp.path()), resolve_path(target)];
        let mut archive = StreamingZipWriter::new(BufWriter::new(temp.as_file_mut()));
        let mut walker = Walker {
            archive: &mut archive,
            options,
            skip: skip.into_iter().flatten().collect(),
            entries: 0,
        };

        if !metadata.is_dir() {
            let name = base_name(source)?;
            walker.add_file(source, &name, &metadata)?;
        } else if options.exclude_base_dir {
            walker.add_children(source, "")?;
        } else {
            let prefix = format!("{}/", base_name(source)?);
            walker.add_dir(&prefix, &metadata)?;
            walker.add_children(source, &prefix)?;
        }

        let entries = walker.entries;
        archive.finish()?.flush().map_err(Error::io)?;
        log::debug!("archived {} entries from {}", entries, source.display());
        Ok(())
    })
}

struct Walker<'a, W> {
    archive: &'a mut StreamingZipWriter<W>,
    options: ArchiveOptions,

    /// Files that must not end up inside the archive they are part of
    skip: Vec<PathBuf>,
    entries: usize,
}

impl<W> Walker<'_, W>
where
    W: Write,
{
    fn add_children(&mut self, dir: &Path, prefix: &str) -> Result<(), Error> {
        let mut children = fs::read_dir(dir)
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|e| e.path()))
                    .collect::<io::Result<Vec<_>>>()
            })
            .map_err(Error::io)?;
        children.sort();

        for path in children {
            let name = format!("{}{}", prefix, base_name(&path)?);
            let link = fs::symlink_metadata(&path).map_err(Error::io)?;
            let is_symlink = link.file_type().is_symlink();
            let metadata = if is_symlink {
                match fs::metadata(&path) {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        log::warn!("skipping broken symlink {}: {}", path.display(), err);
                        continue;
                    }
                }
            } else {
                link
            };

            if metadata.is_dir() {
                if is_symlink {
                    log::warn!("skipping symlinked directory {}", path.display());
                    continue;
                }

                let prefix = format!("{}/", name);
                self.add_dir(&prefix, &metadata)?;
                self.add_children(&path, &prefix)?;
            } else if metadata.is_file() {
                if self.is_skipped(&path) {
                    log::debug!("skipping {}, it is the archive being written", path.display());
                    continue;
                }

                self.add_file(&path, &name, &metadata)?;
            } else {
                log::warn!("skipping {}: not a regular file", path.display());
            }
        }

        Ok(())
    }

    fn add_dir(&mut self, name: &str, metadata: &Metadata) -> Result<(), Error> {
        log::trace!("adding directory {}", name);
        let mut builder = self.archive.new_dir(name);
        if let Some(seconds) = modified(metadata) {
            builder = builder.last_modified(seconds);
        }
        if let Some(mode) = unix_mode(metadata) {
            builder = builder.unix_permissions(mode);
        }

        builder.create()?;
        self.entries += 1;
        Ok(())
    }

    fn add_file(&mut self, path: &Path, name: &str, metadata: &Metadata) -> Result<(), Error> {
        log::trace!("adding file {} ({} bytes)", name, metadata.len());
        let mut source = fs::File::open(path).map_err(Error::io)?;

        let mut builder = self
            .archive
            .new_file(name)
            .compression_method(self.options.compression);
        if let Some(seconds) = modified(metadata) {
            builder = builder.last_modified(seconds);
        }
        if let Some(mode) = unix_mode(metadata) {
            builder = builder.unix_permissions(mode);
        }

        let mut entry = builder.create()?;
        let output = match self.options.compression {
            CompressionMethod::Store => {
                let mut writer = ZipDataWriter::new(&mut entry);
                io::copy(&mut source, &mut writer).map_err(Error::io)?;
                let (_, output) = writer.finish()?;
                output
            }
            CompressionMethod::Deflate => {
                let level = Compression::new(self.options.compression_level);
                let encoder = DeflateEncoder::new(&mut entry, level);
                let mut writer = ZipDataWriter::new(encoder);
                io::copy(&mut source, &mut writer).map_err(Error::io)?;
                let (encoder, output) = writer.finish()?;
                encoder.finish().map_err(Error::io)?;
                output
            }
        };

        entry.finish(output)?;
        self.entries += 1;
        Ok(())
    }

    fn is_skipped(&self, path: &Path) -> bool {
        let name = path.file_name();
        self.skip
            .iter()
            .any(|skip| skip.file_name() == name && resolve_path(path).as_ref() == Some(skip))
    }
}

/// The last path component as UTF-8, resolving `.` and `..` against the
/// filesystem
fn base_name(path: &Path) -> Result<String, Error> {
    let resolved;
    let name = match path.file_name() {
        Some(name) => name,
        None => {
            resolved = path.canonicalize().map_err(Error::io)?;
            resolved
                .file_name()
                .ok_or_else(|| Error::invalid_input("path has no file name"))?
        }
    };

    name.to_str()
        .map(String::from)
        .ok_or_else(|| Error::invalid_input(format!("{} is not valid UTF-8", path.display())))
}

/// An absolute path for `path` without following its final component
fn resolve_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|dir| dir.join(name))
}

fn modified(metadata: &Metadata) -> Option<i64> {
    metadata.modified().ok().map(unix_seconds)
}

#[cfg(unix)]
fn unix_mode(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &Metadata) -> Option<u32> {
    None
}
