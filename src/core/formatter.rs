//! Guard rail in front of the destructive volume-format stage.

use thiserror::Error;
use tracing::info;

use super::models::{DriveTarget, FormatOptions};
use crate::adapters::VolumeAdapter;

/// The boot volume designator. Never formatted.
pub const SYSTEM_DRIVE: char = 'C';

#[derive(Debug, Clone, Error)]
pub enum FormatError {
    #[error("target '{0}' is not an alphabetic drive designator")]
    InvalidTarget(char),
    #[error("refusing to format the system volume {0}:")]
    SystemVolume(char),
    #[error("administrative privileges are required to format drives")]
    PrivilegeDenied,
    #[error("no mounted volume found for {0}:")]
    VolumeNotFound(char),
    #[error("formatting {letter}: failed: {message}")]
    Failed { letter: char, message: String },
}

/// Format one target volume once the safety guards pass.
///
/// Guard order: designator shape, system-volume reject, elevation. The
/// system-volume reject holds regardless of privilege, and no guard failure
/// touches the volume.
pub fn format_target(
    adapter: &dyn VolumeAdapter,
    target: &DriveTarget,
    options: &FormatOptions,
) -> Result<(), FormatError> {
    let letter = target.letter;

    if !letter.is_ascii_alphabetic() {
        return Err(FormatError::InvalidTarget(letter));
    }
    if letter.eq_ignore_ascii_case(&SYSTEM_DRIVE) {
        return Err(FormatError::SystemVolume(letter));
    }
    if !adapter.is_elevated() {
        return Err(FormatError::PrivilegeDenied);
    }

    adapter.format_volume(target, options)?;
    info!(drive = %target, filesystem = %options.filesystem, "Format complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedAdapter;
    use tempfile::tempdir;

    fn mounted_target(base: &std::path::Path, letter: char) -> DriveTarget {
        let root = base.join(letter.to_string());
        std::fs::create_dir_all(&root).unwrap();
        DriveTarget::new(letter, root)
    }

    #[test]
    fn rejects_system_volume_even_when_elevated() {
        let temp = tempdir().unwrap();
        let adapter = SimulatedAdapter::new(temp.path().to_path_buf());
        let target = mounted_target(temp.path(), 'C');

        let result = format_target(&adapter, &target, &FormatOptions::default());
        assert!(matches!(result, Err(FormatError::SystemVolume('C'))));
        // Guard fired before the format: the volume contents are untouched.
        assert!(target.root.exists());
    }

    #[test]
    fn rejects_system_volume_without_elevation_too() {
        let temp = tempdir().unwrap();
        let adapter = SimulatedAdapter::without_elevation(temp.path().to_path_buf());
        let target = mounted_target(temp.path(), 'c');

        let result = format_target(&adapter, &target, &FormatOptions::default());
        assert!(matches!(result, Err(FormatError::SystemVolume(_))));
    }

    #[test]
    fn rejects_non_alphabetic_designator() {
        let temp = tempdir().unwrap();
        let adapter = SimulatedAdapter::new(temp.path().to_path_buf());
        let target = DriveTarget::new('1', temp.path().join("1"));

        let result = format_target(&adapter, &target, &FormatOptions::default());
        assert!(matches!(result, Err(FormatError::InvalidTarget('1'))));
    }

    #[test]
    fn denies_format_without_elevation() {
        let temp = tempdir().unwrap();
        let adapter = SimulatedAdapter::without_elevation(temp.path().to_path_buf());
        let target = mounted_target(temp.path(), 'E');
        std::fs::write(target.root.join("keep.txt"), b"keep").unwrap();

        let result = format_target(&adapter, &target, &FormatOptions::default());
        assert!(matches!(result, Err(FormatError::PrivilegeDenied)));
        // Denied before anything destructive happened.
        assert!(target.root.join("keep.txt").exists());
    }

    #[test]
    fn surfaces_missing_volume_as_error() {
        let temp = tempdir().unwrap();
        let adapter = SimulatedAdapter::new(temp.path().to_path_buf());
        let target = DriveTarget::new('E', temp.path().join("E"));

        let result = format_target(&adapter, &target, &FormatOptions::default());
        assert!(matches!(result, Err(FormatError::VolumeNotFound('E'))));
    }

    #[test]
    fn format_empties_the_volume() {
        let temp = tempdir().unwrap();
        let adapter = SimulatedAdapter::new(temp.path().to_path_buf());
        let target = mounted_target(temp.path(), 'E');
        std::fs::write(target.root.join("old.txt"), b"stale").unwrap();
        std::fs::create_dir(target.root.join("olddir")).unwrap();

        format_target(&adapter, &target, &FormatOptions::default()).unwrap();

        assert!(target.root.exists());
        assert_eq!(std::fs::read_dir(&target.root).unwrap().count(), 0);
    }
}
