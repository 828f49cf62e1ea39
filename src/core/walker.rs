//! Enumeration of the regular files under a tree root.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// On-disk metadata folder the host OS keeps for volume bookkeeping.
/// Matched by substring against directory names.
pub const RESERVED_DIR_MARKER: &str = "System Volume Information";

/// A regular file found under a walk root.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Path relative to the walk root; the join key between source and
    /// target digest maps. Unique within one enumeration.
    pub relative: PathBuf,
    /// Absolute path on disk.
    pub absolute: PathBuf,
}

/// Enumerate every regular file under `root`, recursing into subdirectories.
///
/// Directories whose name contains [`RESERVED_DIR_MARKER`] are skipped, as is
/// any subtree that fails to enumerate: an unreadable directory costs its
/// own files, never the rest of the walk. Symlinks and special files are not
/// part of the contract and are skipped.
pub fn walk_tree(root: &Path) -> Vec<FileRecord> {
    let mut files = Vec::new();
    walk_into(root, root, &mut files);
    files
}

fn walk_into(root: &Path, current: &Path, files: &mut Vec<FileRecord>) {
    let entries = match fs::read_dir(current) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %current.display(), error = %e, "Skipping unreadable directory");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %current.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();

        // symlink_metadata so symlinks are not followed
        let metadata = match path.symlink_metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if metadata.is_dir() {
            let reserved = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().contains(RESERVED_DIR_MARKER));
            if reserved {
                continue;
            }
            walk_into(root, &path, files);
        } else if metadata.is_file() {
            let relative = path
                .strip_prefix(root)
                .expect("entry should be under the walk root")
                .to_path_buf();
            files.push(FileRecord {
                relative,
                absolute: path,
            });
        }
    }
}
