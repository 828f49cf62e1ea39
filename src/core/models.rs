use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A mounted volume addressed by a single-letter designator.
///
/// Rebuilt from a fresh scan on every orchestration pass; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DriveTarget {
    pub letter: char,
    pub root: PathBuf,
}

impl DriveTarget {
    pub fn new(letter: char, root: impl Into<PathBuf>) -> Self {
        Self {
            letter: letter.to_ascii_uppercase(),
            root: root.into(),
        }
    }
}

impl fmt::Display for DriveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

/// Parameters for a volume format: NTFS, quick, 8K clusters, no label,
/// no compression unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub filesystem: String,
    pub quick: bool,
    pub cluster_size: u32,
    pub label: String,
    pub compression: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            filesystem: "NTFS".to_string(),
            quick: true,
            cluster_size: 8192,
            label: String::new(),
            compression: false,
        }
    }
}
