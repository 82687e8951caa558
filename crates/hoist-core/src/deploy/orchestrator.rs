//! Sequencing of one deployment attempt.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};

use super::session::ActiveDeployments;
use super::{DeployOutcome, DeployReport};
use crate::archive::{ArchiveBuilder, LeafPolicy, pack, select};
use crate::cancel::CancellationToken;
use crate::fingerprint::FingerprintCache;
use crate::poll::{WaitOutcome, wait_until};
use crate::remote::{
    Authenticator, ControllerGateway, CreateApplicationRequest, ManifestEntry, RemoteError,
    RequestBudget, ResilientExecutor, StartKind, classify_default,
};
use crate::types::{AppName, DeployMode, DeployPayload, DeploymentDescriptor};

/// Timeout and polling knobs for one orchestrator.
///
/// Uploads get a long budget class of their own; status checks and other
/// control-plane calls stay on a short one so a wedged controller surfaces
/// quickly.
#[derive(Debug, Clone)]
pub struct DeployTuning {
    /// Budget for content uploads (manifest and archive).
    pub upload_budget: Duration,
    /// Budget for short control-plane calls (list, create, start, stop).
    pub control_budget: Duration,
    /// Attempt cap for the started-state verification poll.
    pub start_poll_attempts: u32,
    /// Cadence of the started-state verification poll.
    pub start_poll_interval: Duration,
}

impl Default for DeployTuning {
    fn default() -> Self {
        Self {
            upload_budget: Duration::from_secs(10 * 60),
            control_budget: Duration::from_secs(60),
            start_poll_attempts: 60,
            start_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Runs one deployment attempt end to end: resolve or create the remote
/// application, push content, stop/start, and poll until started.
pub struct DeploymentOrchestrator {
    gateway: Arc<dyn ControllerGateway>,
    auth: Arc<dyn Authenticator>,
    cache: Arc<FingerprintCache>,
    active: ActiveDeployments,
    tuning: DeployTuning,
}

struct PushSummary {
    uploaded_files: usize,
    reused_files: usize,
    warnings: Vec<String>,
}

impl DeploymentOrchestrator {
    pub fn new(
        gateway: Arc<dyn ControllerGateway>,
        auth: Arc<dyn Authenticator>,
        cache: Arc<FingerprintCache>,
        tuning: DeployTuning,
    ) -> Self {
        Self {
            gateway,
            auth,
            cache,
            active: ActiveDeployments::new(),
            tuning,
        }
    }

    /// Deploy per the descriptor.
    ///
    /// Preparing and Pushing failures abort the attempt. A Verifying timeout
    /// does not: the content was delivered, so the report comes back with
    /// [`DeployOutcome::StartUnconfirmed`].
    pub fn deploy(
        &self,
        desc: &DeploymentDescriptor,
        policy: &LeafPolicy<'_>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<DeployReport> {
        let _claim = self.active.begin(&desc.app)?;
        let executor = ResilientExecutor::new(self.auth.as_ref(), cancel);

        info!(app = %desc.app, mode = ?desc.mode, "deployment started");

        let created = self
            .prepare(&executor, desc)
            .with_context(|| format!("Failed preparing application {}", desc.app))?;

        let push = self
            .push(&executor, desc, policy)
            .with_context(|| format!("Failed pushing application {}", desc.app))?;

        let outcome = if desc.mode == DeployMode::PushOnly {
            DeployOutcome::Pushed
        } else {
            if cancel.is_cancelled() {
                return Err(RemoteError::Cancelled.into());
            }
            let kind = if desc.mode == DeployMode::Debug {
                StartKind::Debug
            } else {
                StartKind::Normal
            };
            self.start(&executor, &desc.app, kind)
                .with_context(|| format!("Failed starting application {}", desc.app))?;
            self.verify(&desc.app, cancel)
                .with_context(|| format!("Failed verifying application {}", desc.app))?
        };

        info!(app = %desc.app, outcome = ?outcome, "deployment finished");
        Ok(DeployReport {
            app: desc.app.clone(),
            outcome,
            created,
            uploaded_files: push.uploaded_files,
            reused_files: push.reused_files,
            warnings: push.warnings,
        })
    }

    /// Returns whether the application had to be created.
    fn prepare(
        &self,
        executor: &ResilientExecutor<'_>,
        desc: &DeploymentDescriptor,
    ) -> Result<bool, RemoteError> {
        let apps = executor.execute(
            RequestBudget::new(self.tuning.control_budget),
            classify_default,
            || self.gateway.list_applications(),
        )?;
        if apps.iter().any(|app| app.name == desc.app.as_str()) {
            return Ok(false);
        }

        debug!(app = %desc.app, "application not present remotely; creating");
        let request = CreateApplicationRequest {
            name: desc.app.as_str().to_string(),
            memory_mb: desc.memory_mb,
            routes: desc.routes.clone(),
            services: desc.services.clone(),
            start_command: desc.start_command.clone(),
        };
        executor.execute(
            RequestBudget::new(self.tuning.control_budget),
            classify_default,
            || self.gateway.create_application(&request),
        )?;
        Ok(true)
    }

    fn push(
        &self,
        executor: &ResilientExecutor<'_>,
        desc: &DeploymentDescriptor,
        policy: &LeafPolicy<'_>,
    ) -> anyhow::Result<PushSummary> {
        match &desc.payload {
            DeployPayload::ArchiveFile(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read archive {}", path.display()))?;
                executor.execute(
                    RequestBudget::new(self.tuning.upload_budget),
                    classify_default,
                    || self.gateway.upload_archive(&desc.app, &bytes),
                )?;
                Ok(PushSummary {
                    uploaded_files: 1,
                    reused_files: 0,
                    warnings: Vec::new(),
                })
            }
            DeployPayload::Tree(nodes) => self.push_tree(executor, desc, nodes, policy),
        }
    }

    fn push_tree(
        &self,
        executor: &ResilientExecutor<'_>,
        desc: &DeploymentDescriptor,
        nodes: &[crate::resource::ResourceNode],
        policy: &LeafPolicy<'_>,
    ) -> anyhow::Result<PushSummary> {
        let builder = ArchiveBuilder::new(Arc::clone(&self.cache));
        let build = builder.build(&desc.app, nodes, policy);

        let manifest: Vec<ManifestEntry> = build
            .entries
            .iter()
            .filter_map(|entry| match (entry.hash, entry.size) {
                (Some(hash), Some(size)) if !entry.is_directory => Some(ManifestEntry {
                    path: entry.path.clone(),
                    hash: hash.to_hex(),
                    size,
                }),
                _ => None,
            })
            .collect();

        // Phase 1: the manifest always goes up, even when nothing changed;
        // only the controller can make the changed/unchanged determination.
        let missing = executor.execute(
            RequestBudget::new(self.tuning.upload_budget),
            classify_default,
            || self.gateway.upload_manifest(&desc.app, &manifest),
        )?;

        let changed: HashSet<String> = missing.into_iter().collect();
        let selected = select(&build.entries, &changed);
        let uploaded_files = selected.iter().filter(|entry| !entry.is_directory).count();

        // Phase 2: only the missing entries' bytes travel.
        if uploaded_files == 0 {
            debug!(app = %desc.app, "controller reports no missing content; skipping upload");
        } else {
            debug!(
                app = %desc.app,
                files = uploaded_files,
                reused = build.stats.reused,
                "uploading partial archive"
            );
            let payload = pack(&selected).context("Failed to pack partial archive")?;
            executor.execute(
                RequestBudget::new(self.tuning.upload_budget),
                classify_default,
                || self.gateway.upload_archive(&desc.app, &payload),
            )?;
        }

        let mut warnings = Vec::new();
        if build.stats.skipped > 0 {
            warnings.push(format!(
                "{} resource(s) had no readable content and were not uploaded",
                build.stats.skipped
            ));
        }

        Ok(PushSummary {
            uploaded_files,
            reused_files: build.stats.reused,
            warnings,
        })
    }

    fn start(
        &self,
        executor: &ResilientExecutor<'_>,
        app: &AppName,
        kind: StartKind,
    ) -> Result<(), RemoteError> {
        // Stop first so a running instance restarts cleanly instead of the
        // start no-opping.
        let stopped = executor.execute(
            RequestBudget::new(self.tuning.control_budget),
            classify_default,
            || self.gateway.stop_application(app),
        );
        match stopped {
            Ok(()) => {}
            // Never ran or instance already gone: nothing to stop.
            Err(RemoteError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        executor.execute(
            RequestBudget::new(self.tuning.control_budget),
            classify_default,
            || self.gateway.start_application(app, kind),
        )
    }

    fn verify(&self, app: &AppName, cancel: &CancellationToken) -> anyhow::Result<DeployOutcome> {
        let result = wait_until(
            self.tuning.start_poll_attempts,
            self.tuning.start_poll_interval,
            cancel,
            || self.gateway.application_state(app),
            |state| state.is_running(),
        );

        match result {
            Ok(WaitOutcome::Satisfied(_)) => Ok(DeployOutcome::Started),
            Ok(WaitOutcome::Exhausted(state)) => {
                warn!(
                    app = %app,
                    state = ?state,
                    "start not confirmed within the verification window"
                );
                Ok(DeployOutcome::StartUnconfirmed)
            }
            Err(err) => Err(err).context("Failed polling application state"),
        }
    }

    /// Stop-then-start without a content push, e.g. `hoist restart`.
    pub fn restart(
        &self,
        app: &AppName,
        kind: StartKind,
        cancel: &CancellationToken,
    ) -> anyhow::Result<DeployOutcome> {
        let executor = ResilientExecutor::new(self.auth.as_ref(), cancel);
        self.start(&executor, app, kind)
            .with_context(|| format!("Failed restarting application {app}"))?;
        self.verify(app, cancel)
    }
}
