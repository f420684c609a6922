//! Writing captured frames to files.
//!
//! [`FileSink`] maps every buffer once when it arrives and, for each
//! completed request, writes every (stream, buffer) pair to a file named
//! after a [`FilenamePattern`]. Failures affect only the pair they occur
//! on: they are logged and counted, never returned to the capture loop.
//!
//! With the `dng` feature, filenames ending in `.dng` are handed to the
//! installed [`DngWriter`] and never dumped raw. Without a writer such
//! frames fail and are counted in [`SinkStats::dng_errors`].

#[cfg(feature = "dng")]
mod dng;
mod filename;
mod mapping;
mod raw;

#[cfg(feature = "dng")]
pub use dng::{DngError, DngWriter, DNG_EXTENSION};
pub use filename::{FilenamePattern, OpenMode, ResolvedFilename, DEFAULT_TEMPLATE, SUBSTITUTION_MARKER};
pub use mapping::{MapError, MappedView, MappingRegistry};
pub use raw::{clamped_length, RawPlaneWriter, RawWriteError, WriteReport, FILE_MODE};

use crate::capture::{BufferId, ControlList, FrameBuffer, Request, StreamConfiguration, StreamId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by sink setup.
///
/// Per-frame write failures are not errors at this level; they are logged
/// and counted in [`SinkStats`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The buffer's planes could not be mapped.
    #[error("failed to map buffer {id}: {source}")]
    Map {
        /// Buffer that failed.
        id: BufferId,
        /// Underlying mapping failure.
        #[source]
        source: MapError,
    },
    /// The buffer already has a mapping.
    #[error("buffer {0} is already mapped")]
    AlreadyMapped(BufferId),
    /// The stream was never passed to `configure`.
    #[error("{0} has not been configured")]
    NotConfigured(StreamId),
    /// The buffer has no plane to hand to the encoder.
    #[error("buffer {0} has no first plane to encode")]
    NoPixelData(BufferId),
    /// A `.dng` name was derived but no writer is installed.
    #[cfg(feature = "dng")]
    #[error("no DNG writer installed")]
    NoDngWriter,
    /// The DNG writer failed.
    #[cfg(feature = "dng")]
    #[error("failed to write DNG file: {0}")]
    Dng(#[from] DngError),
}

/// Sink configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Filename pattern; `#` is replaced by `<stream>-<sequence>`.
    pub pattern: String,
}

/// Counters kept by the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Requests handed to `process_request`.
    pub requests: u64,
    /// Buffers fully written by the raw path.
    pub frames_written: u64,
    /// Bytes of fully written buffers.
    pub bytes_written: u64,
    /// Files that could not be opened.
    pub open_errors: u64,
    /// Buffers cut short by a failed or short plane write.
    pub write_errors: u64,
    /// Planes whose `bytesused` exceeded the mapped capacity.
    pub oversized_payloads: u64,
    /// Buffers that reached the writer without a mapping.
    pub unmapped_buffers: u64,
    /// Buffers written through the DNG writer.
    pub dng_frames: u64,
    /// Buffers the DNG writer failed on.
    pub dng_errors: u64,
}

/// Consumer of capture buffers and completed requests.
pub trait FrameSink {
    /// Records the negotiated configuration of every stream.
    fn configure(&mut self, streams: &[(StreamId, StreamConfiguration)]) -> Result<(), SinkError>;

    /// Prepares a buffer before it is used in any request.
    fn map_buffer(&mut self, buffer: &FrameBuffer) -> Result<(), SinkError>;

    /// Consumes a completed request. Returns `true` once the request can be
    /// recycled.
    fn process_request(&mut self, request: &Request) -> bool;
}

/// Names streams `<camera>-stream<index>`.
pub fn default_stream_names(
    camera_id: &str,
    streams: impl IntoIterator<Item = StreamId>,
) -> HashMap<StreamId, String> {
    streams
        .into_iter()
        .map(|id| (id, format!("{camera_id}-stream{}", id.0)))
        .collect()
}

enum Output {
    Raw(OpenMode),
    #[cfg(feature = "dng")]
    Dng,
}

/// Writes every buffer of every completed request to disk.
pub struct FileSink {
    camera_id: String,
    stream_names: HashMap<StreamId, String>,
    pattern: FilenamePattern,
    configs: HashMap<StreamId, StreamConfiguration>,
    mappings: MappingRegistry,
    raw: RawPlaneWriter,
    #[cfg(feature = "dng")]
    dng: Option<Box<dyn DngWriter>>,
    stats: SinkStats,
}

impl FileSink {
    /// Creates a sink writing to `pattern`, naming streams from `stream_names`.
    pub fn new(
        camera_id: impl Into<String>,
        stream_names: HashMap<StreamId, String>,
        pattern: impl Into<String>,
    ) -> Self {
        let pattern = FilenamePattern::new(pattern);
        tracing::debug!(
            pattern = pattern.template(),
            append = pattern.is_append(),
            "File sink created"
        );
        Self {
            camera_id: camera_id.into(),
            stream_names,
            pattern,
            configs: HashMap::new(),
            mappings: MappingRegistry::new(),
            raw: RawPlaneWriter::new(),
            #[cfg(feature = "dng")]
            dng: None,
            stats: SinkStats::default(),
        }
    }

    /// Creates a sink from the `[sink]` configuration section.
    pub fn from_config(
        camera_id: impl Into<String>,
        stream_names: HashMap<StreamId, String>,
        config: &SinkConfig,
    ) -> Self {
        Self::new(camera_id, stream_names, config.pattern.clone())
    }

    /// Installs the encoder used for `.dng` filenames.
    #[cfg(feature = "dng")]
    pub fn with_dng_writer(mut self, writer: Box<dyn DngWriter>) -> Self {
        self.dng = Some(writer);
        self
    }

    /// The effective filename pattern.
    #[inline]
    pub fn pattern(&self) -> &FilenamePattern {
        &self.pattern
    }

    /// Counters accumulated so far.
    #[inline]
    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    /// Number of buffers mapped so far.
    pub fn mapped_buffers(&self) -> usize {
        self.mappings.len()
    }

    /// The name used for `stream` in filenames.
    ///
    /// Streams missing from the name table fall back to their id.
    pub fn stream_name(&self, stream: StreamId) -> String {
        self.stream_names
            .get(&stream)
            .cloned()
            .unwrap_or_else(|| stream.to_string())
    }

    /// Derives the output filename for a buffer of `stream`.
    pub fn filename_for(&self, stream: StreamId, buffer: &FrameBuffer) -> ResolvedFilename {
        self.pattern
            .resolve(&self.stream_name(stream), buffer.metadata().sequence)
    }

    fn select_output(&self, filename: &ResolvedFilename) -> Output {
        #[cfg(feature = "dng")]
        if filename.has_suffix(DNG_EXTENSION) {
            return Output::Dng;
        }
        Output::Raw(filename.open_mode())
    }

    fn write_buffer(&mut self, stream: StreamId, buffer: &FrameBuffer, metadata: &ControlList) {
        let filename = self.filename_for(stream, buffer);

        let Some(view) = self.mappings.lookup(buffer.id()) else {
            tracing::error!(
                buffer = buffer.id().0,
                path = %filename.path().display(),
                "Buffer was never mapped, skipping"
            );
            self.stats.unmapped_buffers += 1;
            return;
        };

        match self.select_output(&filename) {
            Output::Raw(mode) => {
                let result = self.raw.write(filename.path(), mode, buffer, view);
                match result {
                    Ok(report) => {
                        self.stats.frames_written += 1;
                        self.stats.bytes_written += report.bytes_written as u64;
                        self.stats.oversized_payloads += report.clamped_planes as u64;
                        tracing::trace!(
                            path = %filename.path().display(),
                            bytes = report.bytes_written,
                            "Wrote frame"
                        );
                    }
                    Err(e @ RawWriteError::Open { .. }) => {
                        self.stats.open_errors += 1;
                        tracing::error!("{}", e);
                    }
                    Err(e) => {
                        self.stats.write_errors += 1;
                        tracing::error!(path = %filename.path().display(), "{}", e);
                    }
                }
            }
            #[cfg(feature = "dng")]
            Output::Dng => match self.write_dng(stream, &filename, buffer, metadata, view) {
                Ok(()) => {
                    self.stats.dng_frames += 1;
                    tracing::trace!(path = %filename.path().display(), "Wrote DNG");
                }
                Err(e) => {
                    self.stats.dng_errors += 1;
                    tracing::error!(path = %filename.path().display(), "{}", e);
                }
            },
        }

        #[cfg(not(feature = "dng"))]
        let _ = metadata;
    }

    #[cfg(feature = "dng")]
    fn write_dng(
        &self,
        stream: StreamId,
        filename: &ResolvedFilename,
        buffer: &FrameBuffer,
        metadata: &ControlList,
        view: &MappedView,
    ) -> Result<(), SinkError> {
        let writer = self.dng.as_deref().ok_or(SinkError::NoDngWriter)?;
        let config = self
            .configs
            .get(&stream)
            .ok_or(SinkError::NotConfigured(stream))?;
        let data = view.plane(0).ok_or(SinkError::NoPixelData(buffer.id()))?;

        writer.write(
            filename.path(),
            &self.camera_id,
            config,
            metadata,
            buffer,
            data,
        )?;
        Ok(())
    }
}

impl FrameSink for FileSink {
    fn configure(&mut self, streams: &[(StreamId, StreamConfiguration)]) -> Result<(), SinkError> {
        self.configs = streams.iter().cloned().collect();
        for (stream, config) in streams {
            tracing::info!(
                stream = %self.stream_name(*stream),
                config = %config,
                "Configured stream"
            );
        }
        Ok(())
    }

    fn map_buffer(&mut self, buffer: &FrameBuffer) -> Result<(), SinkError> {
        match self.mappings.map(buffer) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SinkError::AlreadyMapped(buffer.id())),
            Err(source) => Err(SinkError::Map {
                id: buffer.id(),
                source,
            }),
        }
    }

    fn process_request(&mut self, request: &Request) -> bool {
        self.stats.requests += 1;
        tracing::trace!(request = request.cookie(), "Processing request");
        for (stream, buffer) in request.buffers() {
            self.write_buffer(stream, buffer, request.metadata());
        }
        true
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("camera_id", &self.camera_id)
            .field("pattern", &self.pattern.template())
            .field("streams", &self.stream_names.len())
            .field("mapped_buffers", &self.mappings.len())
            .field("stats", &self.stats)
            .finish()
    }
}
