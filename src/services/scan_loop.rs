//! Per-frame decode loop control
//!
//! The controller owns the armed/disarmed state of the scan loop. The
//! session's frame interval is the scheduling primitive: while armed, each
//! interval tick hands the controller the latest frame (if any). A
//! successful decode disarms the controller before the payload is
//! returned, so one armed cycle emits at most one payload even when
//! successive frames keep showing the same symbol.

use crate::domain::frame::RasterFrame;
use crate::io::decoder::SymbolDecoder;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ScanLoopController {
    decoder: Arc<dyn SymbolDecoder>,
    armed: bool,
    /// Decode attempts in the current armed cycle
    ticks: u64,
}

impl ScanLoopController {
    pub fn new(decoder: Arc<dyn SymbolDecoder>) -> Self {
        Self { decoder, armed: false, ticks: 0 }
    }

    /// Arm the loop. Starting while already armed is a no-op: only one
    /// tick chain may be outstanding at a time.
    pub fn start(&mut self) {
        if self.armed {
            debug!("scan_loop_already_armed");
            return;
        }
        self.armed = true;
        self.ticks = 0;
        debug!("scan_loop_armed");
    }

    /// Disarm the loop; pending ticks become no-ops. Idempotent.
    pub fn stop(&mut self) {
        if self.armed {
            self.armed = false;
            debug!(ticks = %self.ticks, "scan_loop_stopped");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Attempt one decode. `None` when disarmed, when no frame is
    /// buffered yet, or when the frame holds no usable symbol - the loop
    /// simply waits for the next tick. A decoded payload disarms the
    /// controller before it is returned.
    pub fn tick(&mut self, frame: Option<&RasterFrame>) -> Option<String> {
        if !self.armed {
            return None;
        }
        let frame = frame?;

        self.ticks += 1;
        let payload = self.decoder.decode(frame)?;
        if payload.is_empty() {
            // Malformed decoder output counts as no symbol for this frame
            return None;
        }

        self.armed = false;
        info!(ticks = %self.ticks, "scan_loop_decoded");
        Some(payload)
    }
}
