//! Capture-side types: streams, buffers, requests and a mock pipeline.
//!
//! These model what the capture pipeline hands to a sink. Buffer
//! allocation for real devices and request queuing live outside this
//! crate; [`MockCamera`] stands in for them.

mod buffer;
mod camera;
mod config;
mod request;
mod stream;

pub use buffer::{BufferId, FrameBuffer, FrameMetadata, Plane, PlaneMetadata};
pub use camera::{Camera, CameraError, MockCamera};
pub use config::{CaptureConfig, ConfigError, FileConfig, OutputConfig};
pub use request::{controls, ControlList, ControlValue, Request};
pub use stream::{PixelFormat, StreamConfiguration, StreamId};
