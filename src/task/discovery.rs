//! Walks a directory tree looking for task directories.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::manifest::MANIFEST_FILE;

/// Finds every directory under `root` (including `root` itself) that holds a
/// task manifest.
///
/// The walk is in file-name order and does not descend into a task
/// directory once found, so nested manifests (for example inside a
/// solution) are ignored. An unreadable `root` is an error; unreadable
/// subdirectories are logged and skipped.
pub fn discover_task_dirs(root: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut task_dirs = Vec::new();
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path during discovery");
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        if entry.path().join(MANIFEST_FILE).is_file() {
            debug!(path = %entry.path().display(), "Found task directory");
            task_dirs.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }

    Ok(task_dirs)
}
