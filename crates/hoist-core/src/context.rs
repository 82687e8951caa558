//! Session context wiring the engine's collaborators together.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::config::HoistConfig;
use crate::deploy::{DeployTuning, DeploymentOrchestrator};
use crate::fingerprint::FingerprintCache;
use crate::remote::{
    AppState, AppSummary, Authenticator, ControllerGateway, Credentials, HttpGateway, RemoteError,
    RequestBudget, ResilientExecutor, StartKind, classify_default, classify_no_backoff,
};
use crate::types::AppName;

/// One user-facing session against one controller.
///
/// Owns the fingerprint cache for the lifetime of the process session and
/// hands `Arc` shares of it to every orchestrator it builds; frontends
/// create this once and route commands through it.
pub struct AppContext {
    cache: Arc<FingerprintCache>,
    gateway: Arc<dyn ControllerGateway>,
    auth: Arc<dyn Authenticator>,
    tuning: DeployTuning,
}

impl AppContext {
    /// Build a session against the configured controller over HTTP.
    pub fn connect(config: &HoistConfig, password: String) -> anyhow::Result<Self> {
        let credentials = Credentials {
            username: config.username.clone().unwrap_or_default(),
            password,
        };
        let gateway = Arc::new(HttpGateway::new(config.controller.clone(), credentials)?);
        let auth: Arc<dyn Authenticator> = gateway.clone();
        let remote: Arc<dyn ControllerGateway> = gateway;
        Ok(Self::with_gateway(remote, auth, config.timeouts.tuning()))
    }

    /// Build a session over an arbitrary gateway, e.g. a fake in tests.
    pub fn with_gateway(
        gateway: Arc<dyn ControllerGateway>,
        auth: Arc<dyn Authenticator>,
        tuning: DeployTuning,
    ) -> Self {
        Self {
            cache: Arc::new(FingerprintCache::new()),
            gateway,
            auth,
            tuning,
        }
    }

    pub fn cache(&self) -> &Arc<FingerprintCache> {
        &self.cache
    }

    pub fn orchestrator(&self) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.auth),
            Arc::clone(&self.cache),
            self.tuning.clone(),
        )
    }

    /// List applications known to the controller.
    pub fn list_apps(&self, cancel: &CancellationToken) -> anyhow::Result<Vec<AppSummary>> {
        let executor = ResilientExecutor::new(self.auth.as_ref(), cancel);
        let apps = executor.execute(
            RequestBudget::new(self.tuning.control_budget),
            classify_default,
            || self.gateway.list_applications(),
        )?;
        Ok(apps)
    }

    /// One-shot state query.
    pub fn app_state(&self, app: &AppName, cancel: &CancellationToken) -> anyhow::Result<AppState> {
        let executor = ResilientExecutor::new(self.auth.as_ref(), cancel);
        let state = executor.execute(
            RequestBudget::new(self.tuning.control_budget),
            classify_default,
            || self.gateway.application_state(app),
        )?;
        Ok(state)
    }

    pub fn start_app(
        &self,
        app: &AppName,
        kind: StartKind,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let executor = ResilientExecutor::new(self.auth.as_ref(), cancel);
        executor.execute(
            RequestBudget::new(self.tuning.control_budget),
            classify_default,
            || self.gateway.start_application(app, kind),
        )?;
        Ok(())
    }

    pub fn stop_app(&self, app: &AppName, cancel: &CancellationToken) -> anyhow::Result<()> {
        let executor = ResilientExecutor::new(self.auth.as_ref(), cancel);
        executor.execute(
            RequestBudget::new(self.tuning.control_budget),
            classify_default,
            || self.gateway.stop_application(app),
        )?;
        Ok(())
    }

    /// Delete the remote application and forget its fingerprints.
    ///
    /// A target that is already gone counts as deleted. Deletion never waits
    /// out a staging window; a transient state fails the call instead.
    pub fn delete_app(&self, app: &AppName, cancel: &CancellationToken) -> anyhow::Result<()> {
        let executor = ResilientExecutor::new(self.auth.as_ref(), cancel);
        let result = executor.execute(
            RequestBudget::new(self.tuning.control_budget),
            classify_no_backoff,
            || self.gateway.delete_application(app),
        );
        match result {
            Ok(()) | Err(RemoteError::NotFound(_)) => {
                self.cache.forget(app);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
