//! IO modules - external capability seams
//!
//! This module contains all interfaces to host-provided capabilities:
//! - `camera` - camera stream acquisition and the owning frame source
//! - `decoder` - symbol decoding over raster frames
//! - `repository` - asynchronous journey lookup stores

pub mod camera;
pub mod decoder;
pub mod repository;

// Re-export commonly used types
pub use camera::{Camera, CameraScript, CameraStream, Facing, FrameSource, PermissionError, ScriptedCamera};
pub use decoder::{SymbolDecoder, TaggedFrameDecoder};
pub use repository::{HttpJourneyStore, JourneyStore, StaticJourneyStore, StoreError};
