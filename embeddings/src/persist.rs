//! Write-once file publication for the on-disk stores.

use std::io::{self, ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `content` to `path` unless a file is already there.
///
/// The content is staged in a uniquely named file inside `dir` and only
/// linked to `path` once complete. Readers see either no file or the whole
/// file. Returns `false` if `path` already existed.
pub async fn write_new(dir: &Path, path: &Path, content: Vec<u8>) -> io::Result<bool> {
    let dir = dir.to_path_buf();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_new_blocking(&dir, &path, &content))
        .await
        .map_err(io::Error::other)?
}

fn write_new_blocking(dir: &Path, path: &Path, content: &[u8]) -> io::Result<bool> {
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(content)?;
    match staged.persist_noclobber(path) {
        Ok(_) => Ok(true),
        // Dropping the returned handle removes the staged file.
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}
