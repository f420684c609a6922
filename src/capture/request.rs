//! Completed capture requests and their metadata.

use super::{FrameBuffer, StreamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Control names reported by the capture pipeline.
pub mod controls {
    /// Start of exposure, nanoseconds since session start.
    pub const SENSOR_TIMESTAMP: &str = "SensorTimestamp";
    /// Exposure time in microseconds.
    pub const EXPOSURE_TIME: &str = "ExposureTime";
    /// Analogue sensor gain.
    pub const ANALOGUE_GAIN: &str = "AnalogueGain";
    /// Frame duration in microseconds.
    pub const FRAME_DURATION: &str = "FrameDuration";
}

/// Value of a single metadata control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    /// Boolean control.
    Bool(bool),
    /// Integer control.
    Int(i64),
    /// Floating point control.
    Float(f64),
    /// Free-form text control.
    String(String),
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

/// Metadata record attached to a completed request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlList {
    controls: BTreeMap<String, ControlValue>,
}

impl ControlList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: ControlValue) {
        self.controls.insert(name.into(), value);
    }

    /// Value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&ControlValue> {
        self.controls.get(name)
    }

    /// Number of controls.
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// Whether the list has no controls.
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Controls ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ControlValue)> {
        self.controls.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A completed capture request.
///
/// Holds at most one buffer per stream; iteration is ordered by stream.
#[derive(Debug, Clone, Default)]
pub struct Request {
    cookie: u64,
    buffers: BTreeMap<StreamId, FrameBuffer>,
    metadata: ControlList,
}

impl Request {
    /// Creates an empty request tagged with `cookie`.
    pub fn new(cookie: u64) -> Self {
        Self {
            cookie,
            ..Default::default()
        }
    }

    /// Caller-defined request identifier.
    #[inline]
    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    /// Attaches the buffer filled for `stream`, replacing any previous one.
    pub fn add_buffer(&mut self, stream: StreamId, buffer: FrameBuffer) {
        self.buffers.insert(stream, buffer);
    }

    /// Buffers of the request, ordered by stream.
    pub fn buffers(&self) -> impl Iterator<Item = (StreamId, &FrameBuffer)> {
        self.buffers.iter().map(|(stream, buffer)| (*stream, buffer))
    }

    /// Buffer filled for `stream`, if any.
    pub fn buffer(&self, stream: StreamId) -> Option<&FrameBuffer> {
        self.buffers.get(&stream)
    }

    /// Request-level metadata.
    #[inline]
    pub fn metadata(&self) -> &ControlList {
        &self.metadata
    }

    /// Mutable request-level metadata.
    #[inline]
    pub fn metadata_mut(&mut self) -> &mut ControlList {
        &mut self.metadata
    }
}
