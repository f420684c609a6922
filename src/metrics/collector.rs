//! Metrics collection and registry.

use crate::sink::{FileSink, SinkStats};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of sink state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Counters kept by the sink.
    pub stats: SinkStats,
    /// Buffers currently mapped.
    pub mapped_buffers: usize,
}

impl MetricsSnapshot {
    /// Captures the current state of a sink.
    pub fn from_sink(sink: &FileSink) -> Self {
        Self {
            stats: *sink.stats(),
            mapped_buffers: sink.mapped_buffers(),
        }
    }
}

/// Raises `counter` to `target`. Counters never go backwards.
fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

/// Prometheus metrics registry for the file sink.
pub struct MetricsRegistry {
    registry: Registry,

    requests_total: IntCounter,
    mapped_buffers: IntGauge,

    // Raw path
    frames_written_total: IntCounter,
    bytes_written_total: IntCounter,
    open_errors_total: IntCounter,
    write_errors_total: IntCounter,
    oversized_payloads_total: IntCounter,
    unmapped_buffers_total: IntCounter,

    // DNG path
    dng_frames_total: IntCounter,
    dng_errors_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all sink metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let requests_total = IntCounter::new(
            "frame_sink_requests_total",
            "Completed requests processed by the sink",
        )?;
        let mapped_buffers = IntGauge::new(
            "frame_sink_mapped_buffers",
            "Buffers currently mapped by the sink",
        )?;

        let frames_written_total = IntCounter::new(
            "frame_sink_frames_written_total",
            "Buffers fully written by the raw path",
        )?;
        let bytes_written_total = IntCounter::new(
            "frame_sink_bytes_written_total",
            "Bytes written by the raw path",
        )?;
        let open_errors_total = IntCounter::new(
            "frame_sink_open_errors_total",
            "Output files that could not be opened",
        )?;
        let write_errors_total = IntCounter::new(
            "frame_sink_write_errors_total",
            "Buffers cut short by a failed or short write",
        )?;
        let oversized_payloads_total = IntCounter::new(
            "frame_sink_oversized_payloads_total",
            "Planes whose bytesused exceeded the plane size",
        )?;
        let unmapped_buffers_total = IntCounter::new(
            "frame_sink_unmapped_buffers_total",
            "Buffers that reached the writer without a mapping",
        )?;

        let dng_frames_total = IntCounter::new(
            "frame_sink_dng_frames_total",
            "Buffers written through the DNG writer",
        )?;
        let dng_errors_total = IntCounter::new(
            "frame_sink_dng_errors_total",
            "Buffers the DNG writer failed on",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(mapped_buffers.clone()))?;
        registry.register(Box::new(frames_written_total.clone()))?;
        registry.register(Box::new(bytes_written_total.clone()))?;
        registry.register(Box::new(open_errors_total.clone()))?;
        registry.register(Box::new(write_errors_total.clone()))?;
        registry.register(Box::new(oversized_payloads_total.clone()))?;
        registry.register(Box::new(unmapped_buffers_total.clone()))?;
        registry.register(Box::new(dng_frames_total.clone()))?;
        registry.register(Box::new(dng_errors_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            mapped_buffers,
            frames_written_total,
            bytes_written_total,
            open_errors_total,
            write_errors_total,
            oversized_payloads_total,
            unmapped_buffers_total,
            dng_frames_total,
            dng_errors_total,
        })
    }

    /// Updates all metrics from a snapshot of sink state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        let stats = &snapshot.stats;

        advance(&self.requests_total, stats.requests);
        self.mapped_buffers.set(snapshot.mapped_buffers as i64);

        advance(&self.frames_written_total, stats.frames_written);
        advance(&self.bytes_written_total, stats.bytes_written);
        advance(&self.open_errors_total, stats.open_errors);
        advance(&self.write_errors_total, stats.write_errors);
        advance(&self.oversized_payloads_total, stats.oversized_payloads);
        advance(&self.unmapped_buffers_total, stats.unmapped_buffers);

        advance(&self.dng_frames_total, stats.dng_frames);
        advance(&self.dng_errors_total, stats.dng_errors);
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            stats: SinkStats {
                requests: 10,
                frames_written: 9,
                bytes_written: 4096,
                open_errors: 1,
                oversized_payloads: 2,
                ..Default::default()
            },
            mapped_buffers: 4,
        };

        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("frame_sink_requests_total 10"));
        assert!(output.contains("frame_sink_frames_written_total 9"));
        assert!(output.contains("frame_sink_bytes_written_total 4096"));
        assert!(output.contains("frame_sink_mapped_buffers 4"));
        assert!(output.contains("frame_sink_oversized_payloads_total 2"));
    }

    #[test]
    fn test_counters_do_not_go_backwards() {
        let registry = MetricsRegistry::new().unwrap();

        let mut snapshot = MetricsSnapshot::default();
        snapshot.stats.requests = 5;
        registry.update(&snapshot);
        snapshot.stats.requests = 3;
        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("frame_sink_requests_total 5"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("frame_sink_requests_total"));
        assert!(output.contains("frame_sink_write_errors_total"));
        assert!(output.contains("frame_sink_dng_errors_total"));
    }
}
