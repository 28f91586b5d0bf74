//! Filesystem helpers: timestamped backups and atomic replacement of a file.

use chrono::NaiveDateTime;
use std::fs;
use std::fs::File;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Prefix of every backup file name.
pub const BACKUP_PREFIX: &str = "BACKUP_";

/// `Path::parent` returns `Some("")` for bare file names, which means the current directory.
fn parent_dir_or_dot(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Returns `BACKUP_<YYYYMMDD_HHMMSS>_<file name>` next to `path`.
pub fn backup_path(path: &Path, timestamp: NaiveDateTime) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup_name = format!("{}{}_{}", BACKUP_PREFIX, timestamp.format("%Y%m%d_%H%M%S"), file_name);
    parent_dir_or_dot(path).join(backup_name)
}

/// Copies `path` to its backup location, keeping permissions and modification time.
pub fn create_backup(path: &Path, timestamp: NaiveDateTime) -> io::Result<PathBuf> {
    let backup = backup_path(path, timestamp);
    let metadata = fs::metadata(path)?;
    fs::copy(path, &backup)?;
    if let Ok(modified) = metadata.modified() {
        File::options().write(true).open(&backup)?.set_modified(modified)?;
    }
    Ok(backup)
}

/// Writes `bytes` to a temp file in the destination directory, syncs it and
/// renames it over `dest`. On failure `dest` is left as it was.
/// An existing `dest` keeps its permissions.
pub fn atomic_write_bytes(dest: &Path, bytes: &[u8]) -> Result<(), crate::error::RosterSyncError> {
    let mut tmp = NamedTempFile::new_in(parent_dir_or_dot(dest))?;
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    match fs::metadata(dest) {
        Ok(metadata) => tmp.as_file().set_permissions(metadata.permissions())?,
        Err(error) if error.kind() == io::ErrorKind::NotFound => (),
        Err(error) => return Err(error.into()),
    }
    tmp.as_file().sync_all()?;
    tmp.persist(dest)?;
    Ok(())
}
