//! Content digesting for the verification pass.

use std::collections::HashMap;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::warn;

use super::walker::{self, FileRecord};

/// Buffer size for streaming file digests (128KB).
const BUFFER_SIZE: usize = 128 * 1024;

/// Relative path -> lowercase hex content digest, one map per tree snapshot.
///
/// Built by exactly one task, read-only afterwards.
pub type DigestMap = HashMap<PathBuf, String>;

/// Stream one file through BLAKE3 and return the lowercase hex digest.
pub fn digest_file(path: &Path) -> io::Result<String> {
    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Build the digest map for the tree under `root`.
///
/// The walk runs on one blocking task; digesting fans out over a small pool
/// of blocking workers, one chunk of the file list each. A file that cannot
/// be read is logged and left out of the map; if it mattered, the forward
/// check reports it.
pub async fn digest_tree(root: &Path) -> Result<DigestMap> {
    let walk_root = root.to_path_buf();
    let files = tokio::task::spawn_blocking(move || walker::walk_tree(&walk_root)).await?;

    if files.is_empty() {
        return Ok(DigestMap::new());
    }

    let workers = thread::available_parallelism()
        .map_or(4, usize::from)
        .min(files.len());
    let chunk_size = files.len().div_ceil(workers);

    let mut set = JoinSet::new();
    for chunk in files.chunks(chunk_size) {
        let chunk: Vec<FileRecord> = chunk.to_vec();
        set.spawn_blocking(move || digest_batch(chunk));
    }

    let mut map = DigestMap::new();
    while let Some(batch) = set.join_next().await {
        for (relative, digest) in batch? {
            map.insert(relative, digest);
        }
    }

    Ok(map)
}

fn digest_batch(files: Vec<FileRecord>) -> Vec<(PathBuf, String)> {
    let mut digests = Vec::with_capacity(files.len());
    for record in files {
        match digest_file(&record.absolute) {
            Ok(digest) => digests.push((record.relative, digest)),
            Err(e) => {
                warn!(
                    file = %record.absolute.display(),
                    error = %e,
                    "Failed to digest file, leaving it out of the map"
                );
            }
        }
    }
    digests
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn digest_file_matches_reference_hash() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("file.txt");
        std::fs::write(&path, b"hello world").unwrap();

        let digest = digest_file(&path).unwrap();
        assert_eq!(digest, blake3::hash(b"hello world").to_hex().to_string());
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("file.txt");
        std::fs::write(&path, b"abc").unwrap();

        let digest = digest_file(&path).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn digest_file_fails_on_missing_file() {
        let temp = tempdir().unwrap();
        assert!(digest_file(&temp.path().join("nope.txt")).is_err());
    }

    #[tokio::test]
    async fn digest_tree_keys_by_relative_path() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("sub/b.txt"), b"world").unwrap();

        let map = digest_tree(temp.path()).await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&PathBuf::from("a.txt")).unwrap(),
            &blake3::hash(b"hello").to_hex().to_string()
        );
        assert_eq!(
            map.get(&PathBuf::from("sub/b.txt")).unwrap(),
            &blake3::hash(b"world").to_hex().to_string()
        );
    }

    #[tokio::test]
    async fn digest_tree_of_empty_root_is_empty() {
        let temp = tempdir().unwrap();
        assert!(digest_tree(temp.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn digest_tree_skips_reserved_directory() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(temp.path().join("System Volume Information")).unwrap();
        std::fs::write(
            temp.path().join("System Volume Information/guid"),
            b"bookkeeping",
        )
        .unwrap();

        let map = digest_tree(temp.path()).await.unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&PathBuf::from("a.txt")));
    }
}
