//! Existence probes. A missing file is an ordinary answer here, never an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Returns `path` if something exists there.
pub fn existing(path: impl AsRef<Path>) -> Option<PathBuf> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(_) => Some(path.to_path_buf()),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => {
            tracing::debug!("cannot probe {}: {err}", path.display());
            None
        }
    }
}

/// First candidate that exists, in order.
pub fn first_existing<I, P>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    candidates.into_iter().find_map(existing)
}

/// Returns `path` if it is an existing directory.
pub fn dir_if_exists(path: impl AsRef<Path>) -> Option<PathBuf> {
    let path = path.as_ref();
    path.is_dir().then(|| path.to_path_buf())
}

/// Resolves a bare command name through the ambient `PATH`.
pub fn on_search_path(command: &str) -> Option<PathBuf> {
    which::which(command).ok()
}
