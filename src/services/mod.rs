//! Services - scan pipeline state machines
//!
//! This module contains the core coordination logic:
//! - `scan_loop` - per-frame decode loop with at-most-once emission
//! - `resolver` - journey lookups with last-call-wins supersession
//! - `session` - top-level scan/track session state machine

pub mod resolver;
pub mod scan_loop;
pub mod session;

// Re-export commonly used types
pub use resolver::JourneyResolver;
pub use scan_loop::ScanLoopController;
pub use session::{
    CameraPermission, ScanSession, ScanSessionState, SessionCommand, SessionEvent,
    SessionSnapshot,
};
