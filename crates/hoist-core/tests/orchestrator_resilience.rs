//! Failure-path behavior of the orchestrator and session commands.

mod support;

use std::sync::Arc;
use std::time::Duration;

use hoist_core::archive::LeafPolicy;
use hoist_core::cancel::CancellationToken;
use hoist_core::context::AppContext;
use hoist_core::deploy::{DeployOutcome, DeployTuning, DeploymentOrchestrator};
use hoist_core::fingerprint::FingerprintCache;
use hoist_core::remote::RemoteError;
use hoist_core::types::{AppName, DeployMode, DeployPayload, DeploymentDescriptor};

use support::{FakeGateway, leaf};

fn fast_tuning() -> DeployTuning {
    DeployTuning {
        upload_budget: Duration::from_secs(5),
        control_budget: Duration::from_secs(5),
        start_poll_attempts: 3,
        start_poll_interval: Duration::from_millis(1),
    }
}

fn orchestrator(
    gateway: &Arc<FakeGateway>,
    cache: &Arc<FingerprintCache>,
) -> DeploymentOrchestrator {
    DeploymentOrchestrator::new(
        gateway.clone(),
        gateway.clone(),
        Arc::clone(cache),
        fast_tuning(),
    )
}

fn descriptor(app: &str) -> DeploymentDescriptor {
    DeploymentDescriptor {
        app: AppName::new(app),
        memory_mb: 128,
        routes: Vec::new(),
        services: Vec::new(),
        start_command: None,
        mode: DeployMode::Start,
        payload: DeployPayload::Tree(vec![leaf("a.txt", b"x")]),
    }
}

#[test]
fn auth_rejection_mid_push_triggers_relogin_and_succeeds() {
    let gateway = Arc::new(FakeGateway::new());
    let cache = Arc::new(FingerprintCache::new());
    let orch = orchestrator(&gateway, &cache);
    let cancel = CancellationToken::new();

    gateway.fail_next("manifest", RemoteError::Auth("token expired".into()));

    let report = orch
        .deploy(&descriptor("demo"), &LeafPolicy::Reuse, &cancel)
        .expect("deploy should succeed after relogin");

    assert_eq!(gateway.reauth_count(), 1);
    assert_eq!(report.outcome, DeployOutcome::Started);
}

#[test]
fn staging_window_during_upload_is_waited_out() {
    let gateway = Arc::new(FakeGateway::new());
    let cache = Arc::new(FingerprintCache::new());
    let orch = orchestrator(&gateway, &cache);
    let cancel = CancellationToken::new();

    gateway.fail_next(
        "upload",
        RemoteError::Staging {
            retry_after: Duration::from_millis(5),
        },
    );
    gateway.fail_next(
        "upload",
        RemoteError::TransientState {
            state: "locked".into(),
            retry_after: Duration::from_millis(5),
        },
    );

    let report = orch
        .deploy(&descriptor("demo"), &LeafPolicy::Reuse, &cancel)
        .expect("deploy should ride out the staging window");

    assert_eq!(report.uploaded_files, 1);
    let app = gateway.app("demo").expect("app should exist remotely");
    assert_eq!(app.uploads.len(), 1);
    assert_eq!(gateway.reauth_count(), 0, "transient state must not relogin");
}

#[test]
fn fatal_error_during_create_aborts_the_attempt() {
    let gateway = Arc::new(FakeGateway::new());
    let cache = Arc::new(FingerprintCache::new());
    let orch = orchestrator(&gateway, &cache);
    let cancel = CancellationToken::new();

    gateway.fail_next("create", RemoteError::Fatal("quota exceeded".into()));

    let err = orch
        .deploy(&descriptor("demo"), &LeafPolicy::Reuse, &cancel)
        .expect_err("deploy should abort");

    assert!(err.to_string().contains("Failed preparing application demo"));
    assert!(gateway.app("demo").is_none(), "no content push after abort");
}

#[test]
fn pre_cancelled_attempt_does_not_touch_the_controller() {
    let gateway = Arc::new(FakeGateway::new());
    let cache = Arc::new(FingerprintCache::new());
    let orch = orchestrator(&gateway, &cache);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orch
        .deploy(&descriptor("demo"), &LeafPolicy::Reuse, &cancel)
        .expect_err("deploy should acknowledge cancellation");

    assert_eq!(err.root_cause().to_string(), "operation cancelled");
    assert!(gateway.app("demo").is_none());
}

#[test]
fn transient_state_errors_during_verify_are_polled_through() {
    let gateway = Arc::new(FakeGateway::new());
    let cache = Arc::new(FingerprintCache::new());
    let orch = orchestrator(&gateway, &cache);
    let cancel = CancellationToken::new();

    // First state poll errors; the poller records it and keeps going.
    gateway.fail_next(
        "state",
        RemoteError::Staging {
            retry_after: Duration::from_millis(5),
        },
    );

    let report = orch
        .deploy(&descriptor("demo"), &LeafPolicy::Reuse, &cancel)
        .expect("deploy should succeed despite one failed poll");

    assert_eq!(report.outcome, DeployOutcome::Started);
}

#[test]
fn delete_tolerates_an_already_missing_app() {
    let gateway = Arc::new(FakeGateway::new());
    let ctx = AppContext::with_gateway(
        gateway.clone(),
        gateway.clone(),
        fast_tuning(),
    );
    let cancel = CancellationToken::new();

    ctx.delete_app(&AppName::new("never-existed"), &cancel)
        .expect("deleting a missing app is a soft condition");
}

#[test]
fn delete_removes_the_app_and_its_fingerprints() {
    let gateway = Arc::new(FakeGateway::new());
    let ctx = AppContext::with_gateway(
        gateway.clone(),
        gateway.clone(),
        fast_tuning(),
    );
    let cancel = CancellationToken::new();
    let app = AppName::new("demo");

    gateway.add_app("demo");
    let desc = DeploymentDescriptor {
        app: app.clone(),
        memory_mb: 128,
        routes: Vec::new(),
        services: Vec::new(),
        start_command: None,
        mode: DeployMode::PushOnly,
        payload: DeployPayload::Tree(vec![leaf("a.txt", b"x")]),
    };
    ctx.orchestrator()
        .deploy(&desc, &LeafPolicy::Reuse, &cancel)
        .expect("deploy should succeed");
    assert!(ctx.cache().get(&app, "a.txt").is_some());

    ctx.delete_app(&app, &cancel).expect("delete should succeed");
    assert!(gateway.app("demo").is_none());
    assert!(
        ctx.cache().get(&app, "a.txt").is_none(),
        "fingerprints die with the app"
    );
}

#[test]
fn delete_does_not_wait_out_a_staging_window() {
    let gateway = Arc::new(FakeGateway::new());
    let ctx = AppContext::with_gateway(
        gateway.clone(),
        gateway.clone(),
        fast_tuning(),
    );
    let cancel = CancellationToken::new();

    gateway.add_app("demo");
    gateway.fail_next(
        "delete",
        RemoteError::Staging {
            retry_after: Duration::from_secs(30),
        },
    );

    let start = std::time::Instant::now();
    let result = ctx.delete_app(&AppName::new("demo"), &cancel);
    assert!(result.is_err(), "staging must fail a delete, not stall it");
    assert!(start.elapsed() < Duration::from_secs(5));
}
