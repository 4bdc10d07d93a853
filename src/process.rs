use crate::errors::Error;
use crate::rewrite::rewrite_with_summary;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const TEMP_PREFIX: &str = ".zipfix";

/// Rewrites the archive at `source` so that no entry depends on a data
/// descriptor, and writes the result to `target`.
///
/// The source is read entirely into memory. `source` and `target` may name
/// the same file. The destination is written to a temporary file next to it
/// and renamed into place, so on failure an existing `target` is left as it
/// was and a missing one is not created.
pub fn process(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<(), Error> {
    let source = source.as_ref();
    let target = target.as_ref();

    let data = std::fs::read(source).map_err(Error::io)?;
    log::debug!("read {} bytes from {}", data.len(), source.display());

    let (output, summary) = rewrite_with_summary(&data)?;
    log::debug!(
        "rewrote {} entries ({} data descriptors removed), central directory at {}",
        summary.entries,
        summary.descriptors_removed,
        summary.central_directory_offset
    );

    write_atomic(target, |temp| temp.write_all(&output).map_err(Error::io))?;
    log::debug!("wrote {} bytes to {}", output.len(), target.display());
    Ok(())
}

/// Populates a temporary file in `target`'s directory with `fill` then
/// renames it over `target`.
pub(crate) fn write_atomic<F>(target: &Path, fill: F) -> Result<(), Error>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), Error>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(Error::io)?;

    fill(&mut temp)?;
    temp.as_file().sync_all().map_err(Error::io)?;

    // Close the file before persisting it
    temp.into_temp_path()
        .persist(target)
        .map_err(|err| Error::io(err.error))?;
    Ok(())
}
