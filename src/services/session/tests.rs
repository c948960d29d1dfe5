//! Tests for the scan session state machine

use super::*;
use crate::domain::journey::{ProductInfo, StepStatus};
use crate::io::camera::{CameraScript, ScriptedCamera};
use crate::io::decoder::TaggedFrameDecoder;
use crate::io::repository::StaticJourneyStore;
use async_trait::async_trait;
use smallvec::smallvec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Test harness holding the presentation-side handles alive
struct TestSession {
    session: ScanSession,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    stopped: Arc<AtomicBool>,
}

impl std::ops::Deref for TestSession {
    type Target = ScanSession;
    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl std::ops::DerefMut for TestSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

fn test_config() -> Config {
    Config::default().with_frame_interval_ms(5)
}

fn create_session(camera: ScriptedCamera, store: Arc<dyn JourneyStore>) -> TestSession {
    let stopped = camera.stopped_flag();
    let (session, snapshot_rx) = ScanSession::new(
        &test_config(),
        Arc::new(camera),
        Arc::new(TaggedFrameDecoder),
        store,
    );
    TestSession { session, snapshot_rx, stopped }
}

/// Camera that shows "PROD-001" after one warmup and two blank frames
fn demo_camera() -> ScriptedCamera {
    ScriptedCamera::new(CameraScript {
        warmup_ticks: 1,
        blank_ticks: 2,
        payload: Some("PROD-001".to_string()),
    })
}

fn demo_store() -> Arc<dyn JourneyStore> {
    Arc::new(StaticJourneyStore::with_demo_journeys())
}

/// Receive the next settlement and feed it to the session
async fn settle(session: &mut TestSession) {
    let event = session.events_rx.recv().await.expect("settlement event");
    session.handle_event(event);
}

fn state_name(session: &TestSession) -> &'static str {
    session.state().name()
}

/// Store whose lookups always fail with a transport error
struct FailingStore;

#[async_trait]
impl JourneyStore for FailingStore {
    async fn lookup(
        &self,
        _id: &ProductIdentifier,
    ) -> Result<Option<ProductJourney>, StoreError> {
        Err(StoreError::Transport("connection refused".to_string()))
    }
}

/// Store with a configurable per-identifier settle delay
struct DelayedStore {
    inner: StaticJourneyStore,
    delays: HashMap<String, Duration>,
}

#[async_trait]
impl JourneyStore for DelayedStore {
    async fn lookup(
        &self,
        id: &ProductIdentifier,
    ) -> Result<Option<ProductJourney>, StoreError> {
        if let Some(delay) = self.delays.get(id.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.lookup(id).await
    }
}

fn named_journey(name: &str) -> ProductJourney {
    ProductJourney {
        product: ProductInfo { name: name.to_string(), image_ref: String::new() },
        steps: smallvec![],
    }
}

#[tokio::test]
async fn test_grant_transitions_to_scanning() {
    let mut session = create_session(demo_camera(), demo_store());

    session.begin().await;

    assert_eq!(state_name(&session), "scanning");
    assert_eq!(session.permission(), CameraPermission::Granted);
    assert!(session.controller.is_armed());
}

#[tokio::test]
async fn test_camera_decode_resolves_journey() {
    let mut session = create_session(demo_camera(), demo_store());
    session.begin().await;

    // Warmup and blank frames keep the loop scanning
    for _ in 0..3 {
        session.on_tick();
        assert_eq!(state_name(&session), "scanning");
    }

    // Payload frame: decode stops the loop and starts resolution
    session.on_tick();
    assert_eq!(state_name(&session), "resolving");
    assert!(!session.controller.is_armed());

    settle(&mut session).await;

    let ScanSessionState::Found(journey) = session.state() else {
        panic!("expected Found, got {}", state_name(&session));
    };
    assert_eq!(journey.product.name, "Organic Tomatoes");
    assert_eq!(journey.steps.len(), 5);
    assert_eq!(
        journey.steps.iter().filter(|s| s.status == StepStatus::Current).count(),
        1
    );
}

#[tokio::test]
async fn test_decode_fires_exactly_once() {
    let mut session = create_session(demo_camera(), demo_store());
    session.begin().await;

    for _ in 0..4 {
        session.on_tick();
    }
    assert_eq!(state_name(&session), "resolving");

    // Further ticks while resolving never issue another lookup
    for _ in 0..5 {
        session.on_tick();
    }
    settle(&mut session).await;
    assert_eq!(state_name(&session), "found");
    assert!(session.events_rx.try_recv().is_err(), "only one settlement expected");
}

#[tokio::test]
async fn test_denied_camera_leaves_manual_entry() {
    let mut session = create_session(ScriptedCamera::denied(), demo_store());

    session.begin().await;
    assert_eq!(state_name(&session), "permission_denied");
    assert_eq!(session.permission(), CameraPermission::Denied);

    // Ticks do nothing without a camera
    session.on_tick();
    assert_eq!(state_name(&session), "permission_denied");

    // Manual entry still resolves
    session.handle_command(SessionCommand::ManualSubmit("PROD-001".to_string()));
    assert_eq!(state_name(&session), "resolving");

    settle(&mut session).await;
    assert_eq!(state_name(&session), "found");
}

#[tokio::test]
async fn test_empty_manual_submit_rejected() {
    let mut session = create_session(demo_camera(), demo_store());
    session.begin().await;

    session.handle_command(SessionCommand::ManualSubmit(String::new()));

    // No transition and no lookup issued
    assert_eq!(state_name(&session), "scanning");
    assert!(session.resolver.is_current(0));
}

#[tokio::test]
async fn test_unknown_id_settles_not_found() {
    let mut session = create_session(demo_camera(), demo_store());
    session.begin().await;

    session.handle_command(SessionCommand::ManualSubmit("PROD-999".to_string()));
    settle(&mut session).await;

    assert_eq!(state_name(&session), "not_found");
    assert!(session.snapshot().last_error.is_none());
}

#[tokio::test]
async fn test_transport_error_falls_back_to_idle() {
    let mut session = create_session(demo_camera(), Arc::new(FailingStore));
    session.begin().await;

    session.handle_command(SessionCommand::ManualSubmit("PROD-001".to_string()));
    settle(&mut session).await;

    assert_eq!(state_name(&session), "idle");
    let snapshot = session.snapshot();
    assert!(snapshot.last_error.unwrap().contains("connection refused"));

    // The published snapshot carries the retryable failure too
    let published = session.snapshot_rx.borrow().clone();
    assert_eq!(published.state.name(), "idle");
    assert!(published.last_error.is_some());
}

#[tokio::test]
async fn test_later_resolve_wins_over_slower_earlier_one() {
    let mut inner = StaticJourneyStore::new();
    inner.insert(ProductIdentifier::from("SLOW-A"), named_journey("Slow Batch"));
    inner.insert(ProductIdentifier::from("FAST-B"), named_journey("Fast Batch"));
    let store = Arc::new(DelayedStore {
        inner,
        delays: HashMap::from([
            ("SLOW-A".to_string(), Duration::from_millis(80)),
            ("FAST-B".to_string(), Duration::from_millis(5)),
        ]),
    });

    let mut session = create_session(demo_camera(), store);
    session.begin().await;

    session.handle_command(SessionCommand::ManualSubmit("SLOW-A".to_string()));
    session.handle_command(SessionCommand::ManualSubmit("FAST-B".to_string()));

    // The later-issued lookup settles first and is honored
    settle(&mut session).await;
    let ScanSessionState::Found(journey) = session.state() else {
        panic!("expected Found, got {}", state_name(&session));
    };
    assert_eq!(journey.product.name, "Fast Batch");

    // The superseded lookup settles afterwards and is discarded
    settle(&mut session).await;
    let ScanSessionState::Found(journey) = session.state() else {
        panic!("expected Found, got {}", state_name(&session));
    };
    assert_eq!(journey.product.name, "Fast Batch");
}

#[tokio::test]
async fn test_scan_another_rearms_loop() {
    let mut session = create_session(demo_camera(), demo_store());
    session.begin().await;

    session.handle_command(SessionCommand::ManualSubmit("PROD-001".to_string()));
    settle(&mut session).await;
    assert_eq!(state_name(&session), "found");

    session.handle_command(SessionCommand::ScanAnother);
    assert_eq!(state_name(&session), "scanning");
    assert!(session.controller.is_armed());
}

#[tokio::test]
async fn test_scan_another_after_denial_stays_denied() {
    let mut session = create_session(ScriptedCamera::denied(), demo_store());
    session.begin().await;

    session.handle_command(SessionCommand::ManualSubmit("PROD-001".to_string()));
    settle(&mut session).await;
    assert_eq!(state_name(&session), "found");

    // Permission was denied once for the session; the camera path stays
    // closed and is never re-requested
    session.handle_command(SessionCommand::ScanAnother);
    assert_eq!(state_name(&session), "permission_denied");
    assert!(!session.controller.is_armed());
}

#[tokio::test]
async fn test_stop_scan_is_idempotent() {
    let mut session = create_session(demo_camera(), demo_store());
    session.begin().await;

    session.handle_command(SessionCommand::StopScan);
    assert_eq!(state_name(&session), "idle");
    assert!(!session.controller.is_armed());

    session.handle_command(SessionCommand::StopScan);
    assert_eq!(state_name(&session), "idle");
}

#[tokio::test]
async fn test_manual_submit_while_scanning_stops_loop() {
    let mut session = create_session(demo_camera(), demo_store());
    session.begin().await;
    assert!(session.controller.is_armed());

    session.handle_command(SessionCommand::ManualSubmit("PROD-001".to_string()));

    assert_eq!(state_name(&session), "resolving");
    assert!(!session.controller.is_armed());
}

#[tokio::test]
async fn test_start_scan_ignored_while_resolving() {
    let mut session = create_session(demo_camera(), demo_store());
    session.begin().await;

    session.handle_command(SessionCommand::ManualSubmit("PROD-001".to_string()));
    assert_eq!(state_name(&session), "resolving");

    session.handle_command(SessionCommand::StartScan);
    assert_eq!(state_name(&session), "resolving");

    settle(&mut session).await;
    assert_eq!(state_name(&session), "found");
}

#[tokio::test]
async fn test_run_releases_camera_on_shutdown() {
    let TestSession { session, mut snapshot_rx, stopped } =
        create_session(demo_camera(), demo_store());

    let (command_tx, command_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(session.run(command_rx, shutdown_rx));

    // Session comes up scanning
    snapshot_rx.changed().await.unwrap();
    assert_eq!(snapshot_rx.borrow_and_update().state.name(), "scanning");

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    assert!(stopped.load(Ordering::SeqCst), "camera stream must be released");
    drop(command_tx);
}
