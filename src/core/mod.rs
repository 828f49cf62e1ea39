pub mod digest;
pub mod formatter;
pub mod models;
pub mod orchestrator;
pub mod replicator;
pub mod verifier;
pub mod walker;

pub use digest::{DigestMap, digest_file, digest_tree};
pub use models::{DriveTarget, FormatOptions};
pub use orchestrator::{Orchestrator, PipelineError, RunSummary};
pub use replicator::{CopyOptions, CopyStats, copy_tree};
pub use verifier::{VerificationResult, verify_targets};
