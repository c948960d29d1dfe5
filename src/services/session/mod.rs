//! Scan/track session state machine
//!
//! The session coordinates camera permission, the per-frame decode loop,
//! and journey resolution into a single display state consumed by the
//! presentation layer. One tokio task owns everything: frame ticks are
//! strictly sequential, only the newest lookup settlement is honored, and
//! the camera stream is released on every exit path.
//!
//! Presentation boundary: commands arrive on an mpsc channel and state is
//! published as `SessionSnapshot` values over a watch channel.

#[cfg(test)]
mod tests;

use crate::domain::journey::{ProductIdentifier, ProductJourney};
use crate::infra::config::Config;
use crate::io::camera::{Camera, FrameSource};
use crate::io::decoder::SymbolDecoder;
use crate::io::repository::{JourneyStore, StoreError};
use crate::services::resolver::JourneyResolver;
use crate::services::scan_loop::ScanLoopController;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of the single per-session camera permission request.
/// Never re-queried automatically after a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPermission {
    Unknown,
    Granted,
    Denied,
}

impl CameraPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraPermission::Unknown => "unknown",
            CameraPermission::Granted => "granted",
            CameraPermission::Denied => "denied",
        }
    }
}

/// Display state of the session. Exactly one is active at a time.
#[derive(Debug, Clone)]
pub enum ScanSessionState {
    Idle,
    Scanning,
    Resolving,
    Found(ProductJourney),
    NotFound,
    PermissionDenied,
}

impl ScanSessionState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanSessionState::Idle => "idle",
            ScanSessionState::Scanning => "scanning",
            ScanSessionState::Resolving => "resolving",
            ScanSessionState::Found(_) => "found",
            ScanSessionState::NotFound => "not_found",
            ScanSessionState::PermissionDenied => "permission_denied",
        }
    }
}

/// Value published to the presentation layer on every transition.
/// `last_error` flags a retryable lookup failure (transport, not a miss).
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: ScanSessionState,
    pub permission: CameraPermission,
    pub last_error: Option<String>,
}

/// Commands issued by the presentation layer
#[derive(Debug)]
pub enum SessionCommand {
    StartScan,
    StopScan,
    ManualSubmit(String),
    ScanAnother,
}

/// Internal settlements delivered to the session task
#[derive(Debug)]
pub enum SessionEvent {
    LookupSettled {
        generation: u64,
        id: ProductIdentifier,
        result: Result<Option<ProductJourney>, StoreError>,
    },
}

/// Top-level scan/track session
pub struct ScanSession {
    sid: String,
    frames: FrameSource,
    controller: ScanLoopController,
    resolver: JourneyResolver,
    pub(crate) events_rx: mpsc::Receiver<SessionEvent>,
    frame_interval: Duration,
    state: ScanSessionState,
    permission: CameraPermission,
    last_error: Option<String>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl ScanSession {
    /// Build a session around the host capabilities. Returns the session
    /// and the snapshot receiver handed to the presentation layer.
    pub fn new(
        config: &Config,
        camera: Arc<dyn Camera>,
        decoder: Arc<dyn SymbolDecoder>,
        store: Arc<dyn JourneyStore>,
    ) -> (Self, watch::Receiver<SessionSnapshot>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot {
            state: ScanSessionState::Idle,
            permission: CameraPermission::Unknown,
            last_error: None,
        });

        let session = Self {
            sid: Uuid::now_v7().to_string(),
            frames: FrameSource::new(camera, config.camera_facing()),
            controller: ScanLoopController::new(decoder),
            resolver: JourneyResolver::new(store, events_tx),
            events_rx,
            frame_interval: Duration::from_millis(config.frame_interval_ms()),
            state: ScanSessionState::Idle,
            permission: CameraPermission::Unknown,
            last_error: None,
            snapshot_tx,
        };
        (session, snapshot_rx)
    }

    /// Drive the session until shutdown or the command channel closes.
    /// The camera stream is released before returning.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(sid = %self.sid, "scan_session_started");
        self.begin().await;

        let mut tick = interval(self.frame_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(sid = %self.sid, "scan_session_shutdown");
                        break;
                    }
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => break, // Presentation side dropped
                    }
                }
                event = self.events_rx.recv() => {
                    if let Some(event) = event {
                        self.handle_event(event);
                    }
                }
                _ = tick.tick() => {
                    self.on_tick();
                }
            }
        }

        self.frames.release();
        info!(sid = %self.sid, "scan_session_stopped");
    }

    /// One-time session startup: the single permission request. On grant
    /// the scan loop arms immediately; on refusal the camera path closes
    /// for the rest of the session and only manual entry remains.
    pub(crate) async fn begin(&mut self) {
        match self.frames.acquire().await {
            Ok(()) => {
                self.permission = CameraPermission::Granted;
                self.controller.start();
                self.set_state(ScanSessionState::Scanning);
            }
            Err(e) => {
                self.permission = CameraPermission::Denied;
                warn!(sid = %self.sid, error = %e, "camera_permission_denied");
                self.set_state(ScanSessionState::PermissionDenied);
            }
        }
    }

    pub(crate) fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::StartScan | SessionCommand::ScanAnother => self.start_scanning(),
            SessionCommand::StopScan => self.stop_scanning(),
            SessionCommand::ManualSubmit(raw) => self.manual_submit(raw),
        }
    }

    pub(crate) fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::LookupSettled { generation, id, result } => {
                if !self.resolver.is_current(generation) {
                    debug!(sid = %self.sid, generation = %generation, "stale_lookup_discarded");
                    return;
                }
                if !matches!(self.state, ScanSessionState::Resolving) {
                    debug!(sid = %self.sid, state = %self.state.name(), "lookup_settled_ignored");
                    return;
                }
                match result {
                    Ok(Some(journey)) => {
                        info!(sid = %self.sid, id = %id, steps = %journey.steps.len(), "journey_found");
                        self.set_state(ScanSessionState::Found(journey));
                    }
                    Ok(None) => {
                        info!(sid = %self.sid, id = %id, "journey_not_found");
                        self.set_state(ScanSessionState::NotFound);
                    }
                    Err(e) => {
                        warn!(sid = %self.sid, id = %id, error = %e, "journey_lookup_failed");
                        self.last_error = Some(e.to_string());
                        self.set_state(ScanSessionState::Idle);
                    }
                }
            }
        }
    }

    /// One frame tick: attempt a decode while scanning. A decoded payload
    /// stops the loop (inside the controller) and starts resolution.
    pub(crate) fn on_tick(&mut self) {
        if !matches!(self.state, ScanSessionState::Scanning) {
            return;
        }
        let frame = self.frames.current_frame();
        if let Some(payload) = self.controller.tick(frame.as_ref()) {
            info!(sid = %self.sid, payload = %payload, "symbol_decoded");
            self.begin_resolve(ProductIdentifier(payload));
        }
    }

    pub fn state(&self) -> &ScanSessionState {
        &self.state
    }

    pub fn permission(&self) -> CameraPermission {
        self.permission
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.clone(),
            permission: self.permission,
            last_error: self.last_error.clone(),
        }
    }

    fn start_scanning(&mut self) {
        if matches!(self.state, ScanSessionState::Resolving) {
            // A lookup is settling; scanning resumes via "scan another"
            debug!(sid = %self.sid, "start_scan_ignored_while_resolving");
            return;
        }
        match self.permission {
            CameraPermission::Granted => {
                self.last_error = None;
                self.controller.start();
                self.set_state(ScanSessionState::Scanning);
            }
            _ => {
                // Permission is requested once per session; after a denial
                // the camera path stays closed and only manual entry leaves
                // this state.
                self.set_state(ScanSessionState::PermissionDenied);
            }
        }
    }

    fn stop_scanning(&mut self) {
        self.controller.stop();
        if matches!(self.state, ScanSessionState::Scanning) {
            self.set_state(ScanSessionState::Idle);
        }
    }

    fn manual_submit(&mut self, raw: String) {
        // Identifiers are exact-match lookup keys: no trimming or case
        // folding before resolution.
        if raw.is_empty() {
            debug!(sid = %self.sid, "manual_submit_empty_rejected");
            return;
        }
        if matches!(self.state, ScanSessionState::Scanning) {
            self.controller.stop();
        }
        info!(sid = %self.sid, id = %raw, "manual_submit");
        self.begin_resolve(ProductIdentifier(raw));
    }

    fn begin_resolve(&mut self, id: ProductIdentifier) {
        self.last_error = None;
        let generation = self.resolver.resolve(id);
        debug!(sid = %self.sid, generation = %generation, "lookup_in_flight");
        self.set_state(ScanSessionState::Resolving);
    }

    fn set_state(&mut self, state: ScanSessionState) {
        info!(sid = %self.sid, state = %state.name(), "session_state");
        self.state = state;
        self.snapshot_tx.send_replace(self.snapshot());
    }
}
