//! Overwrite-always directory replication.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Buffer size for file I/O (128KB).
const BUFFER_SIZE: usize = 128 * 1024;

/// Bytes copied between progress log lines.
const PROGRESS_LOG_INTERVAL: u64 = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error("source directory does not exist: {0}")]
    SourceMissing(PathBuf),
    #[error("failed to create destination directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
}

/// A file or subtree that could not be copied while the rest kept going.
#[derive(Debug, Clone)]
pub struct CopyFailure {
    pub relative: PathBuf,
    pub message: String,
}

/// Outcome of one drive's copy.
#[derive(Debug, Default, Clone)]
pub struct CopyStats {
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub failures: Vec<CopyFailure>,
}

/// Knobs threaded through a copy.
#[derive(Debug, Clone, Copy)]
pub struct CopyOptions {
    /// fsync every file after writing. Slower, but the drive may be yanked
    /// the moment the operator sees "done".
    pub sync_files: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self { sync_files: true }
    }
}

/// Mirror the tree under `source` onto `dest`.
///
/// Creates `dest` and every intermediate directory, copies every regular
/// file, and always overwrites what is already there (last write wins), no
/// content comparison first. Every subdirectory is copied, including the OS
/// metadata folder the walker skips. A file that fails to copy is logged,
/// recorded in the stats, and skipped; only a missing source or an
/// uncreatable destination root fails the whole call.
pub fn copy_tree(
    source: &Path,
    dest: &Path,
    options: CopyOptions,
) -> Result<CopyStats, ReplicateError> {
    if !source.is_dir() {
        return Err(ReplicateError::SourceMissing(source.to_path_buf()));
    }

    fs::create_dir_all(dest).map_err(|e| ReplicateError::CreateDir {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut stats = CopyStats::default();
    let mut last_logged: u64 = 0;
    copy_dir(source, source, dest, options, &mut stats, &mut last_logged);

    if stats.failures.is_empty() {
        info!(
            files = stats.files_copied,
            bytes = stats.bytes_copied,
            dest = %dest.display(),
            "Copy complete"
        );
    } else {
        warn!(
            files = stats.files_copied,
            failures = stats.failures.len(),
            dest = %dest.display(),
            "Copy finished with failures"
        );
    }

    Ok(stats)
}

fn copy_dir(
    root: &Path,
    current: &Path,
    dest_root: &Path,
    options: CopyOptions,
    stats: &mut CopyStats,
    last_logged: &mut u64,
) {
    let entries = match fs::read_dir(current) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %current.display(), error = %e, "Failed to enumerate directory");
            record_failure(root, current, &e.to_string(), stats);
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %current.display(), error = %e, "Failed to read directory entry");
                record_failure(root, current, &e.to_string(), stats);
                continue;
            }
        };

        let path = entry.path();
        let metadata = match path.symlink_metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to stat entry");
                record_failure(root, &path, &e.to_string(), stats);
                continue;
            }
        };

        let relative = path
            .strip_prefix(root)
            .expect("entry should be under the copy root");
        let target_path = dest_root.join(relative);

        if metadata.is_dir() {
            if let Err(e) = fs::create_dir_all(&target_path) {
                warn!(path = %target_path.display(), error = %e, "Failed to create directory");
                record_failure(root, &path, &e.to_string(), stats);
                continue;
            }
            copy_dir(root, &path, dest_root, options, stats, last_logged);
        } else if metadata.is_file() {
            match copy_file(&path, &target_path, options.sync_files) {
                Ok(bytes) => {
                    stats.files_copied += 1;
                    stats.bytes_copied += bytes;
                    if stats.bytes_copied - *last_logged >= PROGRESS_LOG_INTERVAL {
                        debug!(
                            bytes = stats.bytes_copied,
                            dest = %dest_root.display(),
                            "Copy progress"
                        );
                        *last_logged = stats.bytes_copied;
                    }
                }
                Err(e) => {
                    warn!(file = %relative.display(), error = %e, "Failed to copy file");
                    stats.failures.push(CopyFailure {
                        relative: relative.to_path_buf(),
                        message: e.to_string(),
                    });
                }
            }
        }
        // Symlinks and special files are skipped, matching the walker.
    }
}

fn record_failure(root: &Path, path: &Path, message: &str, stats: &mut CopyStats) {
    let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    stats.failures.push(CopyFailure {
        relative,
        message: message.to_string(),
    });
}

/// Copy one file, truncating any existing destination, preserving timestamps.
fn copy_file(source: &Path, dest: &Path, sync_file: bool) -> io::Result<u64> {
    let source_file = File::open(source)?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);
    let dest_file = File::create(dest)?;
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut bytes_written: u64 = 0;
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
        bytes_written += bytes_read as u64;
    }

    writer.flush()?;
    if sync_file {
        let inner = writer.into_inner().map_err(|e| e.into_error())?;
        inner.sync_all()?;
    }

    if let Err(e) = preserve_timestamps(source, dest) {
        debug!(dest = %dest.display(), error = %e, "Failed to preserve timestamps");
    }

    Ok(bytes_written)
}

fn preserve_timestamps(source: &Path, dest: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    let atime = filetime::FileTime::from_last_access_time(&metadata);
    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(dest, atime, mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_file(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn copies_nested_tree() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");
        create_file(&source.join("a.txt"), b"hello");
        create_file(&source.join("sub/b.txt"), b"world");

        let stats = copy_tree(&source, &dest, CopyOptions::default()).unwrap();

        assert_eq!(stats.files_copied, 2);
        assert_eq!(stats.bytes_copied, 10);
        assert!(stats.failures.is_empty());
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"hello");
        assert_eq!(fs::read(dest.join("sub/b.txt")).unwrap(), b"world");
    }

    #[test]
    fn fails_when_source_is_missing() {
        let temp = tempdir().unwrap();
        let result = copy_tree(
            &temp.path().join("nope"),
            &temp.path().join("dest"),
            CopyOptions::default(),
        );
        assert!(matches!(result, Err(ReplicateError::SourceMissing(_))));
    }

    #[test]
    fn overwrites_existing_files() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");
        create_file(&source.join("a.txt"), b"new content");
        create_file(&dest.join("a.txt"), b"stale");

        copy_tree(&source, &dest, CopyOptions::default()).unwrap();

        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"new content");
    }

    #[test]
    fn copies_reserved_metadata_directory() {
        // The walker skips this folder; the copy must not.
        let temp = tempdir().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");
        create_file(
            &source.join("System Volume Information/guid"),
            b"bookkeeping",
        );

        let stats = copy_tree(&source, &dest, CopyOptions::default()).unwrap();

        assert_eq!(stats.files_copied, 1);
        assert_eq!(
            fs::read(dest.join("System Volume Information/guid")).unwrap(),
            b"bookkeeping"
        );
    }

    #[test]
    fn copy_is_idempotent() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");
        create_file(&source.join("a.txt"), b"hello");
        create_file(&source.join("sub/b.txt"), b"world");

        let first = copy_tree(&source, &dest, CopyOptions::default()).unwrap();
        let second = copy_tree(&source, &dest, CopyOptions::default()).unwrap();

        assert_eq!(first.files_copied, second.files_copied);
        assert_eq!(first.bytes_copied, second.bytes_copied);
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"hello");
        assert_eq!(fs::read(dest.join("sub/b.txt")).unwrap(), b"world");
    }

    #[test]
    fn preserves_modification_time() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");
        create_file(&source.join("a.txt"), b"hello");

        let stamp = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(source.join("a.txt"), stamp).unwrap();

        copy_tree(&source, &dest, CopyOptions::default()).unwrap();

        let copied = fs::metadata(dest.join("a.txt")).unwrap();
        let copied_mtime = filetime::FileTime::from_last_modification_time(&copied);
        assert_eq!(copied_mtime.unix_seconds(), stamp.unix_seconds());
    }

    #[test]
    fn uncopyable_file_is_recorded_and_skipped() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");
        create_file(&source.join("ok.txt"), b"fine");
        create_file(&source.join("blocked.txt"), b"blocked");
        // A directory squatting on the destination path makes this one file
        // fail while the rest of the copy keeps going.
        fs::create_dir_all(dest.join("blocked.txt")).unwrap();

        let stats = copy_tree(&source, &dest, CopyOptions::default()).unwrap();

        assert_eq!(stats.files_copied, 1);
        assert_eq!(stats.failures.len(), 1);
        assert_eq!(stats.failures[0].relative, PathBuf::from("blocked.txt"));
        assert_eq!(fs::read(dest.join("ok.txt")).unwrap(), b"fine");
    }
}
