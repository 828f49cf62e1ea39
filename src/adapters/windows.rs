//! Real drive-letter volumes.

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};

use super::VolumeAdapter;
use crate::core::formatter::FormatError;
use crate::core::models::{DriveTarget, FormatOptions};

pub struct WindowsAdapter;

impl WindowsAdapter {
    fn drive_root(letter: char) -> PathBuf {
        PathBuf::from(format!("{}:\\", letter.to_ascii_uppercase()))
    }
}

impl VolumeAdapter for WindowsAdapter {
    fn scan(&self, letters: &[char]) -> Vec<DriveTarget> {
        letters
            .iter()
            .map(|letter| letter.to_ascii_uppercase())
            .filter_map(|letter| {
                let root = Self::drive_root(letter);
                root.is_dir().then(|| DriveTarget::new(letter, root))
            })
            .collect()
    }

    fn is_elevated(&self) -> bool {
        // `net session` succeeds only from an elevated process.
        Command::new("net")
            .arg("session")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn format_volume(
        &self,
        target: &DriveTarget,
        options: &FormatOptions,
    ) -> Result<(), FormatError> {
        if !target.root.is_dir() {
            return Err(FormatError::VolumeNotFound(target.letter));
        }

        let mut command = Command::new("format.com");
        command
            .arg(format!("{}:", target.letter))
            .arg(format!("/FS:{}", options.filesystem))
            .arg(format!("/A:{}", options.cluster_size))
            .arg(format!("/V:{}", options.label))
            .arg("/Y");
        if options.quick {
            command.arg("/Q");
        }
        if options.compression {
            command.arg("/C");
        }

        debug!(drive = %target, filesystem = %options.filesystem, "Invoking volume format");
        let output = command.output().map_err(|e| FormatError::Failed {
            letter: target.letter,
            message: e.to_string(),
        })?;

        if !output.status.success() {
            warn!(drive = %target, status = %output.status, "Volume format reported failure");
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FormatError::Failed {
                letter: target.letter,
                message: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}
