use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::core::models::FormatOptions;

/// Default seconds between drive-discovery polls.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

/// One invocation's full configuration, layered: built-in defaults <-
/// `usbfill.toml` <- `USBFILL_*` environment <- command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source directory to duplicate.
    pub source: PathBuf,
    /// Candidate drive letters, concatenated (e.g. "ABCD").
    pub copyto: String,
    /// Skip the verification pass.
    #[serde(default)]
    pub no_verify: bool,
    /// Expected drive count; 0 uses whatever is mounted right now.
    #[serde(default)]
    pub drives: u32,
    /// Format each target drive before copying.
    #[serde(default)]
    pub format: bool,
    /// Prompt and run again after completion.
    #[serde(default)]
    pub repeat: bool,
    /// Seconds between discovery polls while waiting for drives.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// fsync every copied file before moving to the next.
    #[serde(default = "default_true")]
    pub sync_files: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub json_logs: bool,
    /// Back volumes with subdirectories of this directory instead of real
    /// drive letters.
    #[serde(default)]
    pub simulation_root: Option<PathBuf>,
    #[serde(default)]
    pub format_options: FormatOptions,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Layer the configuration sources; the (pre-serialized) CLI arguments
    /// win over file and environment.
    pub fn new<A: Serialize>(cli: &A) -> Result<Self> {
        let config: AppConfig = Figment::new()
            .merge(Toml::file("usbfill.toml"))
            .merge(Env::prefixed("USBFILL_"))
            .merge(Serialized::defaults(cli))
            .extract()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.candidate_letters().is_empty() {
            bail!("copyto must name at least one drive letter");
        }
        Ok(())
    }

    /// Candidate designators: uppercased, deduplicated, order preserved,
    /// non-letters dropped.
    pub fn candidate_letters(&self) -> Vec<char> {
        let mut letters = Vec::new();
        for c in self.copyto.chars() {
            if c.is_ascii_alphabetic() {
                let letter = c.to_ascii_uppercase();
                if !letters.contains(&letter) {
                    letters.push(letter);
                }
            }
        }
        letters
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
