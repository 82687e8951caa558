//! Hoist Core Library
//!
//! Incremental deployment engine for a remote PaaS controller:
//! content-fingerprinted archive diffing, partial uploads, and resilient
//! remote operations with login retry and time budgets.

pub mod archive;
pub mod cancel;
pub mod config;
pub mod context;
pub mod deploy;
pub mod fingerprint;
pub mod poll;
pub mod remote;
pub mod resource;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Archive construction
    pub use crate::archive::{ArchiveBuilder, ArchiveEntry, LeafPolicy};

    // Fingerprints
    pub use crate::fingerprint::{ContentHash, FingerprintCache, FingerprintEntry};

    // Remote operations
    pub use crate::remote::{
        AppState, Authenticator, ControllerGateway, Remediation, RemoteError, RequestBudget,
        ResilientExecutor,
    };

    // Deployment
    pub use crate::deploy::{
        DeployOutcome, DeployReport, DeployTuning, DeploymentOrchestrator,
    };

    // Waiting and cancellation
    pub use crate::cancel::CancellationToken;
    pub use crate::poll::{WaitOutcome, wait_until};

    // Resources
    pub use crate::resource::{FsTreeProvider, ResourceNode, ResourceProvider};

    // Session
    pub use crate::config::HoistConfig;
    pub use crate::context::AppContext;
    pub use crate::types::{AppName, DeployMode, DeployPayload, DeploymentDescriptor};
}
