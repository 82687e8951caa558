//! In-memory fake controller and tree helpers shared by integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use hoist_core::remote::{
    AppState, AppSummary, Authenticator, ControllerGateway, CreateApplicationRequest,
    ManifestEntry, RemoteError, StartKind,
};
use hoist_core::resource::{BytesSource, LeafSource, ResourceNode};
use hoist_core::types::AppName;

/// One application as the fake controller sees it.
#[derive(Debug, Clone, Default)]
pub struct FakeApp {
    pub memory_mb: u32,
    /// path -> hex hash the controller already holds.
    pub known: HashMap<String, String>,
    /// File paths received per archive upload, in upload order.
    pub uploads: Vec<Vec<String>>,
    pub starts: Vec<StartKind>,
    pub stops: usize,
}

#[derive(Debug)]
struct State {
    apps: HashMap<String, FakeApp>,
    /// Last manifest received per app: path -> entry.
    manifests: HashMap<String, HashMap<String, ManifestEntry>>,
    /// Scripted failures, popped per operation name.
    failures: HashMap<&'static str, VecDeque<RemoteError>>,
    /// States returned by `application_state`, then `default_state` forever.
    state_sequence: VecDeque<AppState>,
    default_state: AppState,
}

/// In-memory [`ControllerGateway`] with scripted failures.
///
/// `upload_manifest` answers with the paths whose hash the controller does
/// not hold yet; `upload_archive` unpacks the zip payload and marks its
/// entries as held.
pub struct FakeGateway {
    state: Mutex<State>,
    reauths: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                apps: HashMap::new(),
                manifests: HashMap::new(),
                failures: HashMap::new(),
                state_sequence: VecDeque::new(),
                default_state: AppState::Started,
            }),
            reauths: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_app(&self, name: &str) {
        self.lock().apps.insert(name.to_string(), FakeApp::default());
    }

    /// Queue `err` for the next call to the named operation
    /// (`list`, `create`, `manifest`, `upload`, `start`, `stop`, `state`,
    /// `delete`).
    pub fn fail_next(&self, op: &'static str, err: RemoteError) {
        self.lock().failures.entry(op).or_default().push_back(err);
    }

    /// States handed out by `application_state`, in order; the default state
    /// afterwards.
    pub fn set_state_sequence(&self, states: Vec<AppState>) {
        self.lock().state_sequence = states.into();
    }

    pub fn set_default_state(&self, state: AppState) {
        self.lock().default_state = state;
    }

    pub fn app(&self, name: &str) -> Option<FakeApp> {
        self.lock().apps.get(name).cloned()
    }

    pub fn reauth_count(&self) -> usize {
        self.reauths.load(Ordering::SeqCst)
    }

    fn take_failure(&self, op: &'static str) -> Result<(), RemoteError> {
        let mut state = self.lock();
        if let Some(queue) = state.failures.get_mut(op) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }
        Ok(())
    }
}

impl ControllerGateway for FakeGateway {
    fn list_applications(&self) -> Result<Vec<AppSummary>, RemoteError> {
        self.take_failure("list")?;
        let state = self.lock();
        Ok(state
            .apps
            .iter()
            .map(|(name, app)| AppSummary {
                name: name.clone(),
                state: state.default_state,
                memory_mb: app.memory_mb,
                routes: Vec::new(),
            })
            .collect())
    }

    fn create_application(&self, req: &CreateApplicationRequest) -> Result<(), RemoteError> {
        self.take_failure("create")?;
        let mut state = self.lock();
        state.apps.insert(
            req.name.clone(),
            FakeApp {
                memory_mb: req.memory_mb,
                ..FakeApp::default()
            },
        );
        Ok(())
    }

    fn upload_manifest(
        &self,
        app: &AppName,
        manifest: &[ManifestEntry],
    ) -> Result<Vec<String>, RemoteError> {
        self.take_failure("manifest")?;
        let mut state = self.lock();
        let known = state
            .apps
            .get(app.as_str())
            .ok_or_else(|| RemoteError::NotFound(format!("no such app: {app}")))?
            .known
            .clone();

        let missing: Vec<String> = manifest
            .iter()
            .filter(|entry| known.get(&entry.path) != Some(&entry.hash))
            .map(|entry| entry.path.clone())
            .collect();

        state.manifests.insert(
            app.as_str().to_string(),
            manifest
                .iter()
                .map(|entry| (entry.path.clone(), entry.clone()))
                .collect(),
        );
        Ok(missing)
    }

    fn upload_archive(&self, app: &AppName, archive: &[u8]) -> Result<(), RemoteError> {
        self.take_failure("upload")?;

        let mut zip = zip::ZipArchive::new(Cursor::new(archive.to_vec()))
            .map_err(|err| RemoteError::Fatal(format!("unreadable archive: {err}")))?;
        let mut files = Vec::new();
        for i in 0..zip.len() {
            let entry = zip
                .by_index(i)
                .map_err(|err| RemoteError::Fatal(format!("unreadable archive entry: {err}")))?;
            if !entry.is_dir() {
                files.push(entry.name().to_string());
            }
        }

        let mut state = self.lock();
        let manifest = state.manifests.get(app.as_str()).cloned().unwrap_or_default();
        let record = state
            .apps
            .get_mut(app.as_str())
            .ok_or_else(|| RemoteError::NotFound(format!("no such app: {app}")))?;
        for path in &files {
            if let Some(entry) = manifest.get(path) {
                record.known.insert(path.clone(), entry.hash.clone());
            }
        }
        record.uploads.push(files);
        Ok(())
    }

    fn start_application(&self, app: &AppName, kind: StartKind) -> Result<(), RemoteError> {
        self.take_failure("start")?;
        let mut state = self.lock();
        let record = state
            .apps
            .get_mut(app.as_str())
            .ok_or_else(|| RemoteError::NotFound(format!("no such app: {app}")))?;
        record.starts.push(kind);
        Ok(())
    }

    fn stop_application(&self, app: &AppName) -> Result<(), RemoteError> {
        self.take_failure("stop")?;
        let mut state = self.lock();
        let record = state
            .apps
            .get_mut(app.as_str())
            .ok_or_else(|| RemoteError::NotFound(format!("no such app: {app}")))?;
        record.stops += 1;
        Ok(())
    }

    fn application_state(&self, app: &AppName) -> Result<AppState, RemoteError> {
        self.take_failure("state")?;
        let mut state = self.lock();
        if !state.apps.contains_key(app.as_str()) {
            return Err(RemoteError::NotFound(format!("no such app: {app}")));
        }
        Ok(state
            .state_sequence
            .pop_front()
            .unwrap_or(state.default_state))
    }

    fn delete_application(&self, app: &AppName) -> Result<(), RemoteError> {
        self.take_failure("delete")?;
        let mut state = self.lock();
        if state.apps.remove(app.as_str()).is_none() {
            return Err(RemoteError::NotFound(format!("no such app: {app}")));
        }
        Ok(())
    }
}

impl Authenticator for FakeGateway {
    fn reauthenticate(&self) -> Result<(), RemoteError> {
        self.reauths.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory leaf.
pub fn leaf(name: &str, content: &[u8]) -> ResourceNode {
    ResourceNode::leaf(name, Utc::now(), Box::new(BytesSource(content.to_vec())))
}

/// In-memory leaf that counts how many times its bytes were opened.
pub fn counting_leaf(name: &str, content: &[u8]) -> (ResourceNode, Arc<AtomicUsize>) {
    let opens = Arc::new(AtomicUsize::new(0));
    let node = ResourceNode::leaf(
        name,
        Utc::now(),
        Box::new(CountingSource {
            data: content.to_vec(),
            opens: Arc::clone(&opens),
        }),
    );
    (node, opens)
}

#[derive(Debug)]
struct CountingSource {
    data: Vec<u8>,
    opens: Arc<AtomicUsize>,
}

impl LeafSource for CountingSource {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Cursor::new(self.data.as_slice())))
    }
}
