//! The run pipeline: discover drives, optionally format, copy, optionally
//! verify, one task per drive, with a barrier between stages.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{error, info, warn};

use super::formatter::{self, FormatError};
use super::models::DriveTarget;
use super::replicator::{self, CopyOptions, CopyStats};
use super::verifier::{self, VerificationResult};
use crate::context::AppContext;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source directory does not exist: {0}")]
    SourceMissing(PathBuf),
    #[error("none of the candidate drives are mounted")]
    NoDrivesFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Per-drive outcome of one pass.
#[derive(Debug)]
pub struct DriveReport {
    pub target: DriveTarget,
    /// `None` when formatting was not requested.
    pub format: Option<Result<(), FormatError>>,
    /// The copy either ran (possibly with per-file failures in the stats) or
    /// fell over before it could start.
    pub copy: Result<CopyStats, String>,
    /// `None` when verification was skipped.
    pub verification: Option<VerificationResult>,
}

/// Aggregated outcome of a whole invocation, across repeats.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub runs: u32,
    pub drives_filled: usize,
    pub format_failures: usize,
    pub copy_failures: usize,
    pub verification_failures: usize,
}

impl RunSummary {
    fn absorb(&mut self, reports: &[DriveReport]) {
        for report in reports {
            self.drives_filled += 1;
            if matches!(report.format, Some(Err(_))) {
                self.format_failures += 1;
            }
            match &report.copy {
                Ok(stats) if stats.failures.is_empty() => {}
                _ => self.copy_failures += 1,
            }
            if report.verification.as_ref().is_some_and(|v| !v.passed()) {
                self.verification_failures += 1;
            }
        }
    }
}

pub struct Orchestrator {
    ctx: AppContext,
}

impl Orchestrator {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Run the pipeline once, or repeatedly with an operator prompt between
    /// passes when repeat mode is on.
    pub async fn start(&self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        if self.ctx.config.repeat {
            info!("Starting in continuous mode");
        }

        loop {
            let reports = self.run_once().await?;
            summary.runs += 1;
            summary.absorb(&reports);

            if !self.ctx.config.repeat {
                break;
            }

            println!(
                "\nThis was run {} with {} drives each, you should be at {} drives total.",
                summary.runs,
                reports.len(),
                summary.drives_filled
            );
            println!("Hit Enter for another run, Ctrl+C to exit.");
            if !wait_for_operator().await? {
                info!("Input closed, leaving continuous mode");
                break;
            }
        }

        Ok(summary)
    }

    /// One full pass. The drive set is discovered fresh and dropped at the
    /// end; nothing carries over between passes.
    pub async fn run_once(&self) -> Result<Vec<DriveReport>, PipelineError> {
        let config = &self.ctx.config;

        if !config.source.is_dir() {
            return Err(PipelineError::SourceMissing(config.source.clone()));
        }

        let targets = self.discover_drives().await?;

        let mut format_results = if config.format {
            Some(self.format_stage(&targets).await?)
        } else {
            None
        };

        let mut copy_results = self.copy_stage(&targets).await?;

        let mut verify_results = if config.no_verify {
            None
        } else {
            Some(
                verifier::verify_targets(&config.source, &targets)
                    .await
                    .map_err(PipelineError::Internal)?,
            )
        };

        let reports: Vec<DriveReport> = targets
            .into_iter()
            .map(|target| DriveReport {
                format: format_results.as_mut().and_then(|m| m.remove(&target)),
                copy: copy_results
                    .remove(&target)
                    .unwrap_or_else(|| Err("copy task did not report".to_string())),
                verification: verify_results.as_mut().and_then(|m| m.remove(&target)),
                target,
            })
            .collect();

        Ok(reports)
    }

    /// Scan for candidate drives, polling until the expected count shows up
    /// when one is configured. The poll has no timeout; the operator plugs
    /// drives in one at a time and kills the process to give up.
    async fn discover_drives(&self) -> Result<Vec<DriveTarget>, PipelineError> {
        let config = &self.ctx.config;
        let letters = config.candidate_letters();
        let expected = config.drives as usize;

        if expected > 0 {
            info!(expected, "Waiting for expected drive count");
            loop {
                let targets = self.ctx.adapter.scan(&letters);
                info!(found = targets.len(), expected, "Found drives to fill");
                if targets.len() == expected {
                    return Ok(targets);
                }
                time::sleep(config.poll_interval()).await;
            }
        }

        let targets = self.ctx.adapter.scan(&letters);
        info!(found = targets.len(), "Found drives to fill");
        if targets.is_empty() {
            return Err(PipelineError::NoDrivesFound);
        }
        Ok(targets)
    }

    async fn format_stage(
        &self,
        targets: &[DriveTarget],
    ) -> Result<HashMap<DriveTarget, Result<(), FormatError>>, PipelineError> {
        let mut set = JoinSet::new();
        for target in targets {
            let target = target.clone();
            let adapter = Arc::clone(&self.ctx.adapter);
            let options = self.ctx.config.format_options.clone();
            set.spawn_blocking(move || {
                info!(drive = %target, "Format started");
                let result = formatter::format_target(adapter.as_ref(), &target, &options);
                if let Err(e) = &result {
                    error!(drive = %target, error = %e, "Format failed");
                }
                (target, result)
            });
        }
        collect_stage(set).await
    }

    async fn copy_stage(
        &self,
        targets: &[DriveTarget],
    ) -> Result<HashMap<DriveTarget, Result<CopyStats, String>>, PipelineError> {
        let options = CopyOptions {
            sync_files: self.ctx.config.sync_files,
        };
        let source = self.ctx.config.source.clone();

        let mut set = JoinSet::new();
        for target in targets {
            let target = target.clone();
            let source = source.clone();
            set.spawn_blocking(move || {
                info!(drive = %target, "Copy started");
                let result =
                    replicator::copy_tree(&source, &target.root, options).map_err(|e| e.to_string());
                match &result {
                    Ok(stats) => {
                        info!(drive = %target, files = stats.files_copied, "Copy finished")
                    }
                    Err(e) => error!(drive = %target, error = %e, "Copy failed"),
                }
                (target, result)
            });
        }
        collect_stage(set).await
    }
}

/// Join one stage's fan-out. The join is the barrier: every drive's task
/// finishes (or fails locally) before the pipeline moves on, and one drive's
/// failure never cancels a sibling.
async fn collect_stage<T: Send + 'static>(
    mut set: JoinSet<(DriveTarget, T)>,
) -> Result<HashMap<DriveTarget, T>, PipelineError> {
    let mut results = HashMap::new();
    while let Some(joined) = set.join_next().await {
        let (target, result) = joined.map_err(anyhow::Error::new)?;
        results.insert(target, result);
    }
    Ok(results)
}

/// Block until the operator confirms the next pass with a newline. Returns
/// false when stdin is closed or unreadable.
async fn wait_for_operator() -> Result<bool, PipelineError> {
    let confirmed = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Failed to read operator confirmation");
                false
            }
        }
    })
    .await
    .map_err(anyhow::Error::new)?;
    Ok(confirmed)
}
