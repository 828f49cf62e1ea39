//! Directory-backed volumes for tests and non-Windows runs.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use super::VolumeAdapter;
use crate::core::formatter::FormatError;
use crate::core::models::{DriveTarget, FormatOptions};

/// Fakes a set of mounted volumes as subdirectories of one base directory:
/// letter `E` is mounted iff `<base>/E` exists.
pub struct SimulatedAdapter {
    base: PathBuf,
    elevated: bool,
}

impl SimulatedAdapter {
    pub fn new(base: PathBuf) -> Self {
        Self {
            base,
            elevated: true,
        }
    }

    /// An adapter that pretends the process is not elevated.
    pub fn without_elevation(base: PathBuf) -> Self {
        Self {
            base,
            elevated: false,
        }
    }

    fn volume_root(&self, letter: char) -> PathBuf {
        self.base.join(letter.to_ascii_uppercase().to_string())
    }
}

impl VolumeAdapter for SimulatedAdapter {
    fn scan(&self, letters: &[char]) -> Vec<DriveTarget> {
        letters
            .iter()
            .map(|letter| letter.to_ascii_uppercase())
            .filter_map(|letter| {
                let root = self.volume_root(letter);
                root.is_dir().then(|| DriveTarget::new(letter, root))
            })
            .collect()
    }

    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn format_volume(
        &self,
        target: &DriveTarget,
        options: &FormatOptions,
    ) -> Result<(), FormatError> {
        if !target.root.is_dir() {
            return Err(FormatError::VolumeNotFound(target.letter));
        }

        let fail = |e: std::io::Error| FormatError::Failed {
            letter: target.letter,
            message: e.to_string(),
        };

        // A format leaves an empty volume behind: drop everything under the
        // root but keep the root itself mounted.
        for entry in fs::read_dir(&target.root).map_err(fail)? {
            let path = entry.map_err(fail)?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path).map_err(fail)?;
            } else {
                fs::remove_file(&path).map_err(fail)?;
            }
        }

        info!(drive = %target, filesystem = %options.filesystem, "Simulated format emptied volume");
        Ok(())
    }
}
