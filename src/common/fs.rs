use std::{fs, io::ErrorKind, path::Path, thread, time::Duration};

use anyhow::{Context, Result};
use tracing::warn;

use crate::error::TileError;

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Create the parent directory of `path` if it has one.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Remove a file, retrying while another process holds it open.
///
/// A file that is already gone counts as removed. Any other error is retried
/// `retries` times with `delay` between attempts before giving up with
/// [`TileError::StoreLocked`].
pub(crate) fn remove_file_with_retries(path: &Path, retries: u32, delay: Duration) -> Result<()> {
    let attempts = retries.max(1);
    let mut attempt = 1;
    loop {
        let err = match fs::remove_file(path) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => err,
        };
        if attempt >= attempts {
            return Err(anyhow::Error::new(err)
                .context(TileError::StoreLocked { path: path.to_path_buf(), attempts }));
        }
        warn!(path = %path.display(), attempt, error = %err, "could not remove file, retrying");
        thread::sleep(delay);
        attempt += 1;
    }
}
