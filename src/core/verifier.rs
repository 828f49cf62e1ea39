//! Hash verification of duplicated trees.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::digest::{self, DigestMap};
use super::models::DriveTarget;

/// Outcome of verifying one target against the source.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Every source relative path exists on the target.
    pub forward_ok: bool,
    /// Every shared relative path carries a matching digest.
    pub content_ok: bool,
    /// Source paths absent from the target, sorted.
    pub missing: Vec<PathBuf>,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        self.forward_ok && self.content_ok
    }
}

/// Verify every target against `source`.
///
/// The source digest map is built once; each target builds and compares its
/// own map on its own task, so a slow or failing target never disturbs its
/// siblings.
pub async fn verify_targets(
    source: &Path,
    targets: &[DriveTarget],
) -> Result<HashMap<DriveTarget, VerificationResult>> {
    info!(source = %source.display(), targets = targets.len(), "Building source digest map");
    let source_map = Arc::new(digest::digest_tree(source).await?);
    info!(files = source_map.len(), "Source digest map ready");

    let mut set = JoinSet::new();
    for target in targets {
        let target = target.clone();
        let source_map = Arc::clone(&source_map);
        set.spawn(async move {
            info!(drive = %target, "Hash check started");
            let target_map = match digest::digest_tree(&target.root).await {
                Ok(map) => map,
                Err(e) => {
                    // An unreadable target ends up with an empty map; every
                    // source file then shows up in the forward check.
                    warn!(drive = %target, error = %e, "Failed to build target digest map");
                    DigestMap::new()
                }
            };
            let result = compare_maps(&source_map, &target_map);
            report(&target, &result);
            (target, result)
        });
    }

    let mut results = HashMap::new();
    while let Some(joined) = set.join_next().await {
        let (target, result) = joined?;
        results.insert(target, result);
    }
    Ok(results)
}

/// Compare a target digest map against the source map.
///
/// Forward check: every source path must exist on the target; each missing
/// path is logged and collected. Content check: shared paths must carry
/// equal digests, hex compared case-insensitively; mismatches are logged but
/// only the boolean is aggregated. Paths present only on the target are
/// ignored.
pub fn compare_maps(source: &DigestMap, target: &DigestMap) -> VerificationResult {
    let mut missing = Vec::new();
    let mut content_ok = true;

    for (relative, source_digest) in source {
        match target.get(relative) {
            None => {
                warn!(file = %relative.display(), "Missing on target");
                missing.push(relative.clone());
            }
            Some(target_digest) => {
                if !source_digest.eq_ignore_ascii_case(target_digest) {
                    warn!(file = %relative.display(), "Content digest mismatch");
                    content_ok = false;
                }
            }
        }
    }

    missing.sort();
    VerificationResult {
        forward_ok: missing.is_empty(),
        content_ok,
        missing,
    }
}

fn report(target: &DriveTarget, result: &VerificationResult) {
    if result.passed() {
        info!(drive = %target, "Verification passed");
    } else {
        warn!(
            drive = %target,
            forward_ok = result.forward_ok,
            content_ok = result.content_ok,
            missing = result.missing.len(),
            "Verification failed"
        );
    }
}
