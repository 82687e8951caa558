//! Deployment orchestration: prepare, push, start, verify.

mod orchestrator;
mod session;

pub use orchestrator::{DeployTuning, DeploymentOrchestrator};
pub use session::{ActiveDeployments, AlreadyInProgress, DeployGuard};

use crate::types::AppName;

/// Terminal outcome of one deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Content delivered and the app confirmed running.
    Started,
    /// Content delivered and a start was issued, but the app did not report
    /// running within the verification window. Probably still starting;
    /// this is not a failure of the push.
    StartUnconfirmed,
    /// Content delivered; no start requested (push-only mode).
    Pushed,
}

/// What one deployment attempt produced.
#[derive(Debug)]
pub struct DeployReport {
    pub app: AppName,
    pub outcome: DeployOutcome,
    /// Whether the application had to be created remotely first.
    pub created: bool,
    /// File entries actually transmitted. For a ready-made archive payload
    /// this counts the single archive blob.
    pub uploaded_files: usize,
    /// File entries whose fingerprint came straight from the cache.
    pub reused_files: usize,
    pub warnings: Vec<String>,
}
