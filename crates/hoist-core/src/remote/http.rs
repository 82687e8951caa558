//! Blocking JSON gateway to the controller's HTTP API.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{
    AppState, AppSummary, Authenticator, ControllerGateway, CreateApplicationRequest,
    ManifestEntry, RemoteError, StartKind,
};
use crate::types::AppName;

/// Backoff handed to the executor when a response carries no explicit retry
/// hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);

/// Per-request transport timeout. Generous because archive uploads ride on
/// the same client; the executor's budget is the real cap.
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(120);

/// Login credentials for the controller session.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Blocking HTTP implementation of [`ControllerGateway`].
///
/// Holds the current session token behind a lock so the [`Authenticator`]
/// half can refresh it while calls are in flight on other workers.
pub struct HttpGateway {
    client: Client,
    base: Url,
    credentials: Credentials,
    token: Mutex<Option<String>>,
}

impl HttpGateway {
    pub fn new(base: Url, credentials: Credentials) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("hoist/", env!("CARGO_PKG_VERSION")))
            .timeout(TRANSPORT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base,
            credentials,
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base
            .join(path)
            .map_err(|err| RemoteError::Fatal(format!("invalid endpoint {path}: {err}")))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        match token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        check_status(response)
    }

    fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, RemoteError> {
        response
            .json()
            .map_err(|err| RemoteError::Fatal(format!("malformed controller response: {err}")))
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
///
/// The controller answers 423 while the target is staging and 409 for other
/// temporarily disallowed states; both are transient. 5xx responses are not
/// retried here; the executor's classifier decides, and the default treats
/// them as fatal.
fn classify_status(status: StatusCode, body: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth(body),
        StatusCode::NOT_FOUND => RemoteError::NotFound(body),
        StatusCode::LOCKED => RemoteError::Staging {
            retry_after: DEFAULT_RETRY_AFTER,
        },
        StatusCode::CONFLICT => RemoteError::TransientState {
            state: body,
            retry_after: DEFAULT_RETRY_AFTER,
        },
        _ => RemoteError::Fatal(format!("HTTP {status}: {body}")),
    }
}

fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(classify_status(status, body))
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct MissingPathsResponse {
    missing: Vec<String>,
}

#[derive(Deserialize)]
struct StateResponse {
    state: AppState,
}

impl ControllerGateway for HttpGateway {
    fn list_applications(&self) -> Result<Vec<AppSummary>, RemoteError> {
        let url = self.endpoint("v1/apps")?;
        let response = self.send(self.authorized(self.client.get(url)))?;
        Self::decode(response)
    }

    fn create_application(&self, req: &CreateApplicationRequest) -> Result<(), RemoteError> {
        let url = self.endpoint("v1/apps")?;
        self.send(self.authorized(self.client.post(url).json(req)))?;
        Ok(())
    }

    fn upload_manifest(
        &self,
        app: &AppName,
        manifest: &[ManifestEntry],
    ) -> Result<Vec<String>, RemoteError> {
        let url = self.endpoint(&format!("v1/apps/{app}/manifest"))?;
        let response = self.send(self.authorized(self.client.put(url).json(&manifest)))?;
        let decoded: MissingPathsResponse = Self::decode(response)?;
        Ok(decoded.missing)
    }

    fn upload_archive(&self, app: &AppName, archive: &[u8]) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("v1/apps/{app}/archive"))?;
        debug!(app = %app, bytes = archive.len(), "uploading archive");
        self.send(self.authorized(self.client.put(url).body(archive.to_vec())))?;
        Ok(())
    }

    fn start_application(&self, app: &AppName, kind: StartKind) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("v1/apps/{app}/start"))?;
        let body = json!({ "debug": matches!(kind, StartKind::Debug) });
        self.send(self.authorized(self.client.post(url).json(&body)))?;
        Ok(())
    }

    fn stop_application(&self, app: &AppName) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("v1/apps/{app}/stop"))?;
        self.send(self.authorized(self.client.post(url)))?;
        Ok(())
    }

    fn application_state(&self, app: &AppName) -> Result<AppState, RemoteError> {
        let url = self.endpoint(&format!("v1/apps/{app}/state"))?;
        let response = self.send(self.authorized(self.client.get(url)))?;
        let decoded: StateResponse = Self::decode(response)?;
        Ok(decoded.state)
    }

    fn delete_application(&self, app: &AppName) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("v1/apps/{app}"))?;
        self.send(self.authorized(self.client.delete(url)))?;
        Ok(())
    }
}

impl Authenticator for HttpGateway {
    fn reauthenticate(&self) -> Result<(), RemoteError> {
        let url = self.endpoint("v1/auth/token")?;
        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });
        // Deliberately unauthorized: a stale token must not poison the login.
        let response = self.send(self.client.post(url).json(&body))?;
        let decoded: TokenResponse = Self::decode(response)?;

        let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        *token = Some(decoded.token);
        debug!("controller session re-established");
        Ok(())
    }
}
