//! OS seam: volume discovery, elevation, and formatting.

use std::sync::Arc;

use anyhow::Result;

use crate::config::AppConfig;
use crate::core::formatter::FormatError;
use crate::core::models::{DriveTarget, FormatOptions};

mod simulated;
#[cfg(windows)]
mod windows;

pub use simulated::SimulatedAdapter;

/// Everything the pipeline needs from the host's volume management.
pub trait VolumeAdapter: Send + Sync {
    /// Resolve candidate letters to mounted, accessible roots, preserving
    /// candidate order.
    fn scan(&self, letters: &[char]) -> Vec<DriveTarget>;

    /// Whether the current process holds the privilege formatting requires.
    fn is_elevated(&self) -> bool;

    /// Issue the raw OS format for the volume behind `target`.
    ///
    /// Safety guards live in [`crate::core::formatter`]; the adapter only
    /// checks that the volume is actually mounted.
    fn format_volume(&self, target: &DriveTarget, options: &FormatOptions)
    -> Result<(), FormatError>;
}

/// Pick the adapter for this run.
pub fn get_adapter(config: &AppConfig) -> Result<Arc<dyn VolumeAdapter>> {
    if let Some(root) = &config.simulation_root {
        return Ok(Arc::new(SimulatedAdapter::new(root.clone())));
    }

    #[cfg(windows)]
    {
        return Ok(Arc::new(windows::WindowsAdapter));
    }

    #[cfg(not(windows))]
    {
        anyhow::bail!(
            "drive-letter volumes exist only on Windows; pass --simulation-root to run against directory-backed volumes"
        )
    }
}
