//! Camera stream acquisition and frame access
//!
//! The camera is a host capability: acquisition is a single asynchronous
//! request that may be refused (permission or missing hardware), and the
//! granted device must be released on every exit path. `FrameSource` owns
//! the live stream handle for one session and guarantees that release.

use crate::domain::frame::RasterFrame;
use crate::io::decoder::encode_tagged_frame;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Which physical camera to bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Environment,
    User,
}

impl Facing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::Environment => "environment",
            Facing::User => "user",
        }
    }
}

/// Camera acquisition failure. Scanning is disabled for the session but
/// manual entry stays available.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("camera access denied")]
    Denied,
    #[error("no camera available: {0}")]
    Unavailable(String),
}

/// A live camera stream bound for exclusive read access
pub trait CameraStream: Send {
    /// Latest buffered frame, or `None` until the stream has buffered one
    fn current_frame(&self) -> Option<RasterFrame>;

    /// Release the underlying device track(s). Must be idempotent.
    fn stop(&mut self);
}

/// Host camera capability
#[async_trait]
pub trait Camera: Send + Sync {
    async fn request_stream(
        &self,
        facing: Facing,
    ) -> Result<Box<dyn CameraStream>, PermissionError>;
}

/// Owns the camera stream handle for one scan session.
///
/// At most one stream is held at a time; `release` is safe to call in any
/// state and `Drop` releases too, so the device cannot outlive the session.
pub struct FrameSource {
    camera: Arc<dyn Camera>,
    facing: Facing,
    stream: Option<Box<dyn CameraStream>>,
}

impl FrameSource {
    pub fn new(camera: Arc<dyn Camera>, facing: Facing) -> Self {
        Self { camera, facing, stream: None }
    }

    /// Request the camera stream. A repeated call while a stream is held
    /// is a no-op: the session never binds two streams concurrently.
    pub async fn acquire(&mut self) -> Result<(), PermissionError> {
        if self.stream.is_some() {
            debug!("frame_source_already_acquired");
            return Ok(());
        }

        match self.camera.request_stream(self.facing).await {
            Ok(stream) => {
                info!(facing = %self.facing.as_str(), "camera_stream_acquired");
                self.stream = Some(stream);
                Ok(())
            }
            Err(e) => {
                warn!(facing = %self.facing.as_str(), error = %e, "camera_acquire_failed");
                Err(e)
            }
        }
    }

    pub fn is_acquired(&self) -> bool {
        self.stream.is_some()
    }

    /// Latest frame, `None` while no stream is held or nothing is buffered
    pub fn current_frame(&self) -> Option<RasterFrame> {
        self.stream.as_ref().and_then(|s| s.current_frame())
    }

    /// Free the underlying device. Callable any number of times, in any
    /// state.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("camera_stream_released");
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Frame plan for the in-process scripted camera: `warmup_ticks` calls
/// with no frame buffered, then `blank_ticks` symbol-free frames, then
/// frames carrying `payload` (blank forever when `payload` is `None`).
#[derive(Debug, Clone)]
pub struct CameraScript {
    pub warmup_ticks: u32,
    pub blank_ticks: u32,
    pub payload: Option<String>,
}

impl Default for CameraScript {
    fn default() -> Self {
        Self { warmup_ticks: 3, blank_ticks: 60, payload: None }
    }
}

/// In-process camera used by the demo binary and tests. Hardware binding
/// is a host concern; this capability plays back a `CameraScript` instead.
pub struct ScriptedCamera {
    script: CameraScript,
    deny: bool,
    stopped: Arc<AtomicBool>,
}

impl ScriptedCamera {
    pub fn new(script: CameraScript) -> Self {
        Self { script, deny: false, stopped: Arc::new(AtomicBool::new(false)) }
    }

    /// A camera whose acquisition is always refused
    pub fn denied() -> Self {
        Self { script: CameraScript::default(), deny: true, stopped: Arc::new(AtomicBool::new(false)) }
    }

    /// Latched to `true` once the granted stream has been stopped
    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }
}

#[async_trait]
impl Camera for ScriptedCamera {
    async fn request_stream(
        &self,
        facing: Facing,
    ) -> Result<Box<dyn CameraStream>, PermissionError> {
        if self.deny {
            return Err(PermissionError::Denied);
        }
        debug!(facing = %facing.as_str(), "scripted_camera_stream_granted");
        Ok(Box::new(ScriptedStream {
            script: self.script.clone(),
            served: Mutex::new(0),
            stopped: self.stopped.clone(),
        }))
    }
}

struct ScriptedStream {
    script: CameraScript,
    served: Mutex<u32>,
    stopped: Arc<AtomicBool>,
}

impl CameraStream for ScriptedStream {
    fn current_frame(&self) -> Option<RasterFrame> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }

        let mut served = self.served.lock();
        let n = *served;
        *served = n.saturating_add(1);

        if n < self.script.warmup_ticks {
            return None;
        }
        if n < self.script.warmup_ticks + self.script.blank_ticks {
            return Some(RasterFrame::blank(64, 48));
        }
        match &self.script.payload {
            Some(payload) => Some(encode_tagged_frame(payload)),
            None => Some(RasterFrame::blank(64, 48)),
        }
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
