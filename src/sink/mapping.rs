//! Read-only memory views over frame buffers.
//!
//! Each buffer is mapped once, when it is first handed to the sink, and the
//! view is kept for the lifetime of the registry. Planes that share a file
//! descriptor are served from one mapping.

use crate::capture::{BufferId, FrameBuffer};
use memmap2::{Mmap, MmapOptions};
use std::collections::HashMap;
use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};
use thiserror::Error;

/// Errors that can occur while mapping a buffer.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("buffer has no planes")]
    NoPlanes,
    #[error("plane {plane} is empty")]
    EmptyPlane { plane: usize },
    #[error("plane {plane} ends at byte {end} but its backing file is {size} bytes")]
    OutOfRange { plane: usize, end: u64, size: u64 },
    #[error("failed to map plane {plane}: {source}")]
    Mmap {
        plane: usize,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy)]
struct PlaneSpan {
    mapping: usize,
    offset: usize,
    len: usize,
}

/// Zero-copy read-only view of a buffer's planes.
pub struct MappedView {
    maps: Vec<Mmap>,
    planes: Vec<PlaneSpan>,
}

impl MappedView {
    /// Maps every plane of `buffer`.
    pub fn from_frame_buffer(buffer: &FrameBuffer) -> Result<Self, MapError> {
        if buffer.planes().is_empty() {
            return Err(MapError::NoPlanes);
        }

        // Extent of each distinct fd: (raw fd, index of first plane, end).
        let mut extents: Vec<(RawFd, usize, u64)> = Vec::new();
        for (index, plane) in buffer.planes().iter().enumerate() {
            if plane.length == 0 {
                return Err(MapError::EmptyPlane { plane: index });
            }
            let end = plane.offset + plane.length as u64;
            let raw = plane.fd.as_raw_fd();
            match extents.iter_mut().find(|(fd, _, _)| *fd == raw) {
                Some((_, _, max_end)) => *max_end = (*max_end).max(end),
                None => extents.push((raw, index, end)),
            }
        }

        let mut maps = Vec::with_capacity(extents.len());
        for &(_, first_plane, end) in &extents {
            let file = &buffer.planes()[first_plane].fd;
            maps.push(map_file(file, first_plane, end)?);
        }

        let planes = buffer
            .planes()
            .iter()
            .map(|plane| {
                let raw = plane.fd.as_raw_fd();
                let mapping = extents
                    .iter()
                    .position(|(fd, _, _)| *fd == raw)
                    .unwrap_or_default();
                PlaneSpan {
                    mapping,
                    offset: plane.offset as usize,
                    len: plane.length,
                }
            })
            .collect();

        Ok(Self { maps, planes })
    }

    /// Number of planes in the view.
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// Bytes of plane `index`, bounded by the plane's capacity.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let span = self.planes.get(index)?;
        self.maps[span.mapping].get(span.offset..span.offset + span.len)
    }
}

impl std::fmt::Debug for MappedView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedView")
            .field("mappings", &self.maps.len())
            .field("planes", &self.planes.len())
            .finish()
    }
}

/// Maps `file` read-only from offset 0 up to `end`.
#[allow(unsafe_code)]
fn map_file(file: &File, plane: usize, end: u64) -> Result<Mmap, MapError> {
    let size = file
        .metadata()
        .map_err(|source| MapError::Mmap { plane, source })?
        .len();
    if end > size {
        return Err(MapError::OutOfRange { plane, end, size });
    }

    // SAFETY: the mapping is read-only and the range was checked against the
    // file size above. The capture pipeline owns the buffer memory and only
    // writes to it while the buffer is queued, never while a request holding
    // it is being processed.
    unsafe { MmapOptions::new().len(end as usize).map(file) }
        .map_err(|source| MapError::Mmap { plane, source })
}

/// Owns the views of every buffer seen by the sink.
///
/// Written by [`MappingRegistry::map`] when buffers arrive, read by the
/// writer when requests complete.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    views: HashMap<BufferId, MappedView>,
}

impl MappingRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `buffer` and stores the view under its identity.
    ///
    /// Returns `Ok(false)` without touching the existing view if the buffer
    /// is already mapped.
    pub fn map(&mut self, buffer: &FrameBuffer) -> Result<bool, MapError> {
        if self.views.contains_key(&buffer.id()) {
            return Ok(false);
        }

        let view = MappedView::from_frame_buffer(buffer)?;
        tracing::trace!(
            buffer = buffer.id().0,
            planes = view.num_planes(),
            "Mapped buffer"
        );
        self.views.insert(buffer.id(), view);
        Ok(true)
    }

    /// The view stored for `id`, if the buffer has been mapped.
    pub fn lookup(&self, id: BufferId) -> Option<&MappedView> {
        self.views.get(&id)
    }

    /// Number of mapped buffers.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Whether no buffer has been mapped yet.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Plane;
    use std::io::Write;
    use std::sync::Arc;

    fn backed_buffer(id: u64, contents: &[u8], planes: &[(u64, usize)]) -> FrameBuffer {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(contents).unwrap();
        let fd = Arc::new(file);
        let planes = planes
            .iter()
            .map(|&(offset, length)| Plane {
                fd: Arc::clone(&fd),
                offset,
                length,
            })
            .collect();
        FrameBuffer::new(BufferId(id), planes)
    }

    #[test]
    fn test_planes_sharing_fd_use_one_mapping() {
        let buffer = backed_buffer(1, b"aaaabbcc", &[(0, 4), (4, 2), (6, 2)]);
        let view = MappedView::from_frame_buffer(&buffer).unwrap();

        assert_eq!(view.maps.len(), 1);
        assert_eq!(view.num_planes(), 3);
        assert_eq!(view.plane(0), Some(&b"aaaa"[..]));
        assert_eq!(view.plane(1), Some(&b"bb"[..]));
        assert_eq!(view.plane(2), Some(&b"cc"[..]));
        assert_eq!(view.plane(3), None);
    }

    #[test]
    fn test_planes_with_separate_files() {
        let mut a = tempfile::tempfile().unwrap();
        a.write_all(b"luma").unwrap();
        let mut b = tempfile::tempfile().unwrap();
        b.write_all(b"xxchroma").unwrap();

        let buffer = FrameBuffer::new(
            BufferId(2),
            vec![
                Plane { fd: Arc::new(a), offset: 0, length: 4 },
                Plane { fd: Arc::new(b), offset: 2, length: 6 },
            ],
        );
        let view = MappedView::from_frame_buffer(&buffer).unwrap();

        assert_eq!(view.maps.len(), 2);
        assert_eq!(view.plane(0), Some(&b"luma"[..]));
        assert_eq!(view.plane(1), Some(&b"chroma"[..]));
    }

    #[test]
    fn test_plane_past_end_of_file_rejected() {
        let buffer = backed_buffer(3, b"short", &[(0, 16)]);
        assert!(matches!(
            MappedView::from_frame_buffer(&buffer),
            Err(MapError::OutOfRange { plane: 0, end: 16, size: 5 })
        ));
    }

    #[test]
    fn test_buffer_without_planes_rejected() {
        let buffer = FrameBuffer::new(BufferId(4), Vec::new());
        assert!(matches!(
            MappedView::from_frame_buffer(&buffer),
            Err(MapError::NoPlanes)
        ));
    }

    #[test]
    fn test_registry_maps_once() {
        let mut registry = MappingRegistry::new();
        let buffer = backed_buffer(5, b"0123", &[(0, 4)]);

        assert!(registry.lookup(buffer.id()).is_none());
        assert!(registry.map(&buffer).unwrap());
        assert!(!registry.map(&buffer).unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup(buffer.id()).and_then(|v| v.plane(0)),
            Some(&b"0123"[..])
        );
    }
}
