//! Camera abstraction for frame capture.
//!
//! The sink only needs something that hands out buffers before capture
//! starts and completed requests afterwards. [`MockCamera`] does that with
//! buffers backed by anonymous temp files, which behave like dmabufs for
//! mapping purposes.

use super::buffer::{BufferId, FrameBuffer, FrameMetadata, Plane, PlaneMetadata};
use super::request::{controls, ControlValue, Request};
use super::stream::{StreamConfiguration, StreamId};
use super::CaptureConfig;
use std::os::unix::fs::FileExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to allocate buffers: {0}")]
    AllocationFailed(#[source] std::io::Error),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(#[source] std::io::Error),
    #[error("camera not initialized")]
    NotInitialized,
}

/// Trait for camera implementations.
pub trait Camera {
    /// Opens the camera, negotiates stream configurations and allocates
    /// buffers for every stream.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Negotiated configuration of every stream, ordered by stream.
    fn configurations(&self) -> Vec<(StreamId, StreamConfiguration)>;

    /// Buffers allocated for `stream`. Empty if the stream is unknown.
    fn buffers(&self, stream: StreamId) -> &[FrameBuffer];

    /// Captures one frame on every stream and returns the completed request.
    fn capture(&mut self) -> Result<Request, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

struct MockStream {
    id: StreamId,
    config: StreamConfiguration,
    buffers: Vec<FrameBuffer>,
    next: usize,
    sequence: u32,
}

/// Mock camera that fills buffers with a synthetic pattern.
#[derive(Default)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    streams: Vec<MockStream>,
    next_buffer_id: u64,
    requests: u64,
}

impl MockCamera {
    /// Creates a closed mock camera.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, config: &StreamConfiguration) -> Result<Vec<FrameBuffer>, CameraError> {
        let sizes = config.pixel_format.plane_sizes(config.width, config.height);
        let mut buffers = Vec::with_capacity(config.buffer_count as usize);

        for _ in 0..config.buffer_count {
            // All planes of a buffer share one backing file, like a
            // contiguous dmabuf.
            let file = tempfile::tempfile().map_err(CameraError::AllocationFailed)?;
            file.set_len(config.frame_size as u64)
                .map_err(CameraError::AllocationFailed)?;
            let fd = Arc::new(file);

            let mut offset = 0u64;
            let planes = sizes
                .iter()
                .map(|&length| {
                    let plane = Plane {
                        fd: Arc::clone(&fd),
                        offset,
                        length,
                    };
                    offset += length as u64;
                    plane
                })
                .collect();

            buffers.push(FrameBuffer::new(BufferId(self.next_buffer_id), planes));
            self.next_buffer_id += 1;
        }

        Ok(buffers)
    }
}

/// Writes a deterministic pattern into every plane of `buffer`.
///
/// Not meaningful image content, only something to check files against.
fn fill_pattern(buffer: &FrameBuffer, sequence: u32) -> std::io::Result<()> {
    for plane in buffer.planes() {
        let data: Vec<u8> = (0..plane.length)
            .map(|i| ((i as u64 ^ u64::from(sequence)) % 256) as u8)
            .collect();
        plane.fd.write_all_at(&data, plane.offset)?;
    }
    Ok(())
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        self.streams.clear();
        self.requests = 0;

        for index in 0..config.streams {
            let stream_config = StreamConfiguration::new(
                config.pixel_format,
                config.width,
                config.height,
                config.buffer_count,
            );
            let buffers = self.allocate(&stream_config)?;
            tracing::debug!(
                stream = index,
                config = %stream_config,
                "Allocated stream buffers"
            );
            self.streams.push(MockStream {
                id: StreamId(index),
                config: stream_config,
                buffers,
                next: 0,
                sequence: 0,
            });
        }

        self.config = Some(config.clone());
        tracing::info!("MockCamera opened with config: {:?}", config);
        Ok(())
    }

    fn configurations(&self) -> Vec<(StreamId, StreamConfiguration)> {
        self.streams
            .iter()
            .map(|s| (s.id, s.config.clone()))
            .collect()
    }

    fn buffers(&self, stream: StreamId) -> &[FrameBuffer] {
        self.streams
            .iter()
            .find(|s| s.id == stream)
            .map(|s| s.buffers.as_slice())
            .unwrap_or(&[])
    }

    fn capture(&mut self) -> Result<Request, CameraError> {
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;

        let frame_interval = Duration::from_micros(1_000_000 / u64::from(config.fps));
        let mut request = Request::new(self.requests);
        let mut timestamp = Duration::ZERO;

        for stream in &mut self.streams {
            let sequence = stream.sequence;
            timestamp = frame_interval * sequence;

            let buffer = &mut stream.buffers[stream.next];
            fill_pattern(buffer, sequence).map_err(CameraError::CaptureFailed)?;

            let planes = buffer
                .planes()
                .iter()
                .map(|p| PlaneMetadata {
                    bytesused: p.length as u32,
                })
                .collect();
            buffer.set_metadata(FrameMetadata::new(sequence, timestamp, planes));
            request.add_buffer(stream.id, buffer.clone());

            stream.next = (stream.next + 1) % stream.buffers.len();
            stream.sequence += 1;
        }

        let metadata = request.metadata_mut();
        metadata.set(
            controls::SENSOR_TIMESTAMP,
            ControlValue::Int(timestamp.as_nanos() as i64),
        );
        metadata.set(
            controls::EXPOSURE_TIME,
            ControlValue::Int(i64::from(config.exposure_us)),
        );
        metadata.set(
            controls::ANALOGUE_GAIN,
            ControlValue::Float(f64::from(config.gain)),
        );
        metadata.set(
            controls::FRAME_DURATION,
            ControlValue::Int(frame_interval.as_micros() as i64),
        );

        self.requests += 1;
        Ok(request)
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        self.config = None;
        self.streams.clear();
        tracing::info!("MockCamera closed");
    }
}
