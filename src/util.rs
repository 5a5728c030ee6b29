use memmap2::Mmap;
use std::fs::{self, Permissions};
use std::io::Write;
use std::ops::Deref;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Read-only contents of an input file.
pub enum FileBytes {
    Mapped(Mmap),
    /// Zero-length files are not mapped.
    Empty,
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Mapped(map) => &map[..],
            FileBytes::Empty => &[],
        }
    }
}

/// Memory-map a file for read-only access.
///
/// # Safety
/// The mapping is read-only. Callers must not concurrently truncate or replace
/// the underlying file while the `FileBytes` is live.
pub fn map_file(path: &Path) -> Result<FileBytes> {
    let file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let len = file.metadata().map_err(|e| Error::io(path, e))?.len();
    if len == 0 {
        return Ok(FileBytes::Empty);
    }
    // SAFETY: We only read from this mapping; inputs are not modified while patching.
    let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
    Ok(FileBytes::Mapped(map))
}

/// Write `data` to `path` through a temp file in the same directory, then
/// rename it into place. On any failure the temp file is removed and `path`
/// is left untouched.
pub fn write_atomic(path: &Path, data: &[u8], permissions: Option<Permissions>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::io(path, e))?;
    temp.write_all(data).map_err(|e| Error::io(path, e))?;
    temp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
    if let Some(permissions) = permissions {
        temp.as_file()
            .set_permissions(permissions)
            .map_err(|e| Error::io(path, e))?;
    }
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Compute the BLAKE3 hash of a byte slice.
pub fn hash_bytes(data: &[u8]) -> blake3::Hash {
    blake3::hash(data)
}
