//! Structured-image (DNG) delegation.
//!
//! Encoding is left to an external writer. The sink only decides when to
//! call it and what to hand over.

use crate::capture::{ControlList, FrameBuffer, StreamConfiguration};
use std::path::Path;
use thiserror::Error;

/// Filename suffix that selects the DNG path.
pub const DNG_EXTENSION: &str = ".dng";

/// Errors reported by a [`DngWriter`].
#[derive(Debug, Error)]
pub enum DngError {
    #[error("encoder returned status {0}")]
    Status(i32),
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// External encoder for tagged raw photos.
///
/// Called once per (stream, buffer) pair whose filename ends in
/// [`DNG_EXTENSION`], with the pixel data of the buffer's first plane.
pub trait DngWriter {
    /// Encodes `data` into `filename`.
    fn write(
        &self,
        filename: &Path,
        camera_id: &str,
        config: &StreamConfiguration,
        metadata: &ControlList,
        buffer: &FrameBuffer,
        data: &[u8],
    ) -> Result<(), DngError>;
}
