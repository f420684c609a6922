//! Prometheus metrics for the file sink.
//!
//! # Metrics Exposed
//!
//! - `frame_sink_requests_total` - Completed requests processed
//! - `frame_sink_mapped_buffers` - Buffers currently mapped
//! - `frame_sink_frames_written_total` - Buffers fully written by the raw path
//! - `frame_sink_bytes_written_total` - Bytes written by the raw path
//! - `frame_sink_open_errors_total` - Output files that could not be opened
//! - `frame_sink_write_errors_total` - Buffers cut short by a write error
//! - `frame_sink_oversized_payloads_total` - Planes with `bytesused` past the plane size
//! - `frame_sink_unmapped_buffers_total` - Buffers written before being mapped
//! - `frame_sink_dng_frames_total` - Buffers handed to the DNG writer
//! - `frame_sink_dng_errors_total` - DNG writer failures
//!
//! # Example
//!
//! ```no_run
//! use frame_sink::metrics::{MetricsRegistry, MetricsSnapshot};
//! use frame_sink::sink::FileSink;
//! use std::collections::HashMap;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let sink = FileSink::new("cam0", HashMap::new(), "frames/");
//!
//! registry.update(&MetricsSnapshot::from_sink(&sink));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
