//! Frame Sink Library
//!
//! Persists camera capture buffers to files. Every completed capture
//! request is split into its (stream, buffer) pairs and each pair is written
//! to a file named after a configurable pattern, either as a raw dump of its
//! planes or, for `.dng` names, through an external DNG writer.
//!
//! # Architecture
//!
//! ```text
//! buffer allocated → FileSink::map_buffer (mapped once, kept)
//! request complete → FileSink::process_request
//!                       ↓ per (stream, buffer)
//!                    filename ← pattern + stream name + sequence
//!                       ↓
//!                    raw plane dump  |  DngWriter
//! ```
//!
//! # Filenames
//!
//! The first `#` in the pattern becomes `<stream name>-<sequence>` with the
//! sequence zero-padded to six digits, and every frame gets its own file. A
//! pattern without `#` names one file that all frames are appended to. An
//! empty pattern, or one ending in `/`, gets `frame-#.bin` appended.
//!
//! # Example
//!
//! ```no_run
//! use frame_sink::{
//!     capture::{Camera, CaptureConfig, MockCamera},
//!     sink::{default_stream_names, FileSink, FrameSink},
//! };
//!
//! let config = CaptureConfig::default();
//! let mut camera = MockCamera::new();
//! camera.open(&config).unwrap();
//!
//! let streams = camera.configurations();
//! let names = default_stream_names(&config.camera_id(), streams.iter().map(|(id, _)| *id));
//! let mut sink = FileSink::new(config.camera_id(), names, "frames/#.bin");
//! sink.configure(&streams).unwrap();
//!
//! for (stream, _) in &streams {
//!     for buffer in camera.buffers(*stream) {
//!         sink.map_buffer(buffer).unwrap();
//!     }
//! }
//!
//! for _ in 0..10 {
//!     let request = camera.capture().unwrap();
//!     sink.process_request(&request);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod metrics;
pub mod sink;

// Re-export commonly used types at crate root
pub use capture::{Camera, CaptureConfig, FileConfig, FrameBuffer, MockCamera, Request, StreamId};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use sink::{FileSink, FilenamePattern, FrameSink, SinkConfig, SinkError, SinkStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
