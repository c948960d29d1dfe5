//! Symbol decoding over raster frames
//!
//! Real symbol decoding is a supplied capability; the pipeline relies only
//! on `decode(frame) -> Option<payload>` being synchronous, fast, and
//! never fatal. The tagged-frame codec here is the stand-in used by the
//! scripted camera so the full pipeline runs without hardware.
//!
//! Tagged frame layout (row 0):
//! - bytes 0-1: marker 0x51 0x52
//! - byte 2: payload length
//! - bytes 3..3+len: UTF-8 payload

use crate::domain::frame::RasterFrame;
use tracing::warn;

const MARKER: [u8; 2] = [0x51, 0x52];
const HEADER_LEN: usize = 3;

/// Symbol decode capability: `None` means no symbol in this frame, which
/// is the expected steady-state outcome of most frames.
pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, frame: &RasterFrame) -> Option<String>;
}

/// Build a frame carrying `payload` in the tagged row-0 layout.
/// Payloads longer than 255 bytes are truncated at the length byte.
pub fn encode_tagged_frame(payload: &str) -> RasterFrame {
    let bytes = payload.as_bytes();
    let len = bytes.len().min(u8::MAX as usize);
    let width = (HEADER_LEN + len).max(64) as u32;

    let mut frame = RasterFrame::blank(width, 48);
    frame.data[0] = MARKER[0];
    frame.data[1] = MARKER[1];
    frame.data[2] = len as u8;
    frame.data[HEADER_LEN..HEADER_LEN + len].copy_from_slice(&bytes[..len]);
    frame
}

/// Decoder for the tagged-frame layout.
///
/// Frames without the marker are the no-symbol steady state and stay
/// silent; frames that carry the marker but fail validation are logged
/// and treated as no-symbol for that frame, never fatal to the loop.
pub struct TaggedFrameDecoder;

impl SymbolDecoder for TaggedFrameDecoder {
    fn decode(&self, frame: &RasterFrame) -> Option<String> {
        let row = frame.row(0)?;
        if row.len() < HEADER_LEN || row[..2] != MARKER {
            return None;
        }

        let len = row[2] as usize;
        let Some(bytes) = row.get(HEADER_LEN..HEADER_LEN + len) else {
            warn!(len = len, row_len = row.len(), "tagged_frame_truncated");
            return None;
        };

        let Ok(text) = std::str::from_utf8(bytes) else {
            warn!(len = len, "tagged_frame_invalid_utf8");
            return None;
        };

        if text.is_empty() {
            return None;
        }
        Some(text.to_string())
    }
}
