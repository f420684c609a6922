//! Frame buffers: plane descriptors plus per-capture metadata.

use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

/// Stable identity of a buffer, assigned when the buffer is allocated.
///
/// Buffers are recycled between captures; the identity stays the same so
/// per-buffer state (such as a memory mapping) can be keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u64);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One contiguous region of a buffer.
///
/// Several planes may live in the same file at different offsets.
#[derive(Debug, Clone)]
pub struct Plane {
    /// Backing memory, typically a dmabuf or memfd.
    pub fd: Arc<File>,
    /// Byte offset of the plane inside `fd`.
    pub offset: u64,
    /// Capacity of the plane in bytes.
    pub length: usize,
}

/// Per-plane metadata filled in on capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaneMetadata {
    /// Number of bytes the producer reports as valid.
    pub bytesused: u32,
}

/// Metadata describing the latest capture into a buffer.
#[derive(Debug, Clone, Default)]
pub struct FrameMetadata {
    /// Per-stream monotonic frame counter.
    pub sequence: u32,
    /// Capture time relative to the start of the session.
    pub timestamp: Duration,
    planes: Vec<PlaneMetadata>,
}

impl FrameMetadata {
    /// Creates metadata for a capture with the given per-plane payloads.
    pub fn new(sequence: u32, timestamp: Duration, planes: Vec<PlaneMetadata>) -> Self {
        Self {
            sequence,
            timestamp,
            planes,
        }
    }

    /// Per-plane metadata, one entry per buffer plane.
    #[inline]
    pub fn planes(&self) -> &[PlaneMetadata] {
        &self.planes
    }
}

/// Backing memory of one captured frame.
#[derive(Clone)]
pub struct FrameBuffer {
    id: BufferId,
    planes: Vec<Plane>,
    metadata: FrameMetadata,
}

impl FrameBuffer {
    /// Creates a buffer with zeroed metadata for every plane.
    pub fn new(id: BufferId, planes: Vec<Plane>) -> Self {
        let metadata = FrameMetadata {
            planes: vec![PlaneMetadata::default(); planes.len()],
            ..Default::default()
        };
        Self {
            id,
            planes,
            metadata,
        }
    }

    /// Identity of the buffer.
    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Plane descriptors in plane order.
    #[inline]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Metadata of the latest capture.
    #[inline]
    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    /// Replaces the capture metadata.
    ///
    /// Missing plane entries are padded with zero `bytesused` and extra
    /// entries are dropped, so the metadata always has one entry per plane.
    pub fn set_metadata(&mut self, mut metadata: FrameMetadata) {
        metadata.planes.resize(self.planes.len(), PlaneMetadata::default());
        self.metadata = metadata;
    }

    /// Sum of all plane capacities.
    pub fn capacity(&self) -> usize {
        self.planes.iter().map(|p| p.length).sum()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("id", &self.id)
            .field("planes", &self.planes.len())
            .field("capacity", &self.capacity())
            .field("sequence", &self.metadata.sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(length: usize) -> Plane {
        Plane {
            fd: Arc::new(tempfile::tempfile().unwrap()),
            offset: 0,
            length,
        }
    }

    #[test]
    fn test_new_buffer_has_metadata_per_plane() {
        let buffer = FrameBuffer::new(BufferId(1), vec![plane(16), plane(8)]);

        assert_eq!(buffer.metadata().planes().len(), 2);
        assert_eq!(buffer.capacity(), 24);
    }

    #[test]
    fn test_set_metadata_pads_planes() {
        let mut buffer = FrameBuffer::new(BufferId(1), vec![plane(16), plane(8)]);
        buffer.set_metadata(FrameMetadata::new(
            5,
            Duration::ZERO,
            vec![PlaneMetadata { bytesused: 16 }],
        ));

        assert_eq!(buffer.metadata().sequence, 5);
        assert_eq!(
            buffer.metadata().planes(),
            &[PlaneMetadata { bytesused: 16 }, PlaneMetadata::default()]
        );
    }
}
