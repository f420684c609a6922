//! Raw plane dump.
//!
//! The output is the used bytes of every plane, concatenated in plane order
//! with no header or delimiter. Readers need the stream geometry to make
//! sense of it.

use super::filename::OpenMode;
use super::mapping::MappedView;
use crate::capture::FrameBuffer;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Permission bits of created files (rw for user, group and other).
pub const FILE_MODE: u32 = 0o666;

/// Errors that can occur while dumping planes.
#[derive(Debug, Error)]
pub enum RawWriteError {
    #[error("failed to open file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("plane {plane} is missing from the mapped view")]
    MissingPlane { plane: usize },
    #[error("write error on plane {plane}: {source}")]
    Write {
        plane: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("write error on plane {plane}: only {written} bytes written instead of {expected}")]
    ShortWrite {
        plane: usize,
        written: usize,
        expected: usize,
    },
}

/// Outcome of a successful plane dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Bytes written across all planes.
    pub bytes_written: usize,
    /// Planes whose `bytesused` exceeded the mapped capacity.
    pub clamped_planes: usize,
}

/// Length to write for a plane: `bytesused`, clamped to the mapped span.
#[inline]
pub fn clamped_length(bytesused: u32, capacity: usize) -> usize {
    (bytesused as usize).min(capacity)
}

/// Writes buffer planes straight from their mapped view.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPlaneWriter;

impl RawPlaneWriter {
    /// Creates a writer.
    pub fn new() -> Self {
        Self
    }

    /// Opens `path` with the given mode.
    pub fn open(&self, path: &Path, mode: OpenMode) -> Result<File, RawWriteError> {
        let mut options = OpenOptions::new();
        options.create(true).mode(FILE_MODE);
        match mode {
            OpenMode::Append => options.append(true),
            OpenMode::Truncate => options.write(true).truncate(true),
        };
        options.open(path).map_err(|source| RawWriteError::Open {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Dumps every plane of `buffer` to `path`.
    ///
    /// The file is closed when this returns, whichever plane failed.
    pub fn write(
        &self,
        path: &Path,
        mode: OpenMode,
        buffer: &FrameBuffer,
        view: &MappedView,
    ) -> Result<WriteReport, RawWriteError> {
        let mut file = self.open(path, mode)?;
        self.write_planes(&mut file, buffer, view)
    }

    /// Writes every plane of `buffer` to `out`, stopping at the first
    /// failed or short write.
    pub fn write_planes<W: Write>(
        &self,
        out: &mut W,
        buffer: &FrameBuffer,
        view: &MappedView,
    ) -> Result<WriteReport, RawWriteError> {
        let mut report = WriteReport::default();

        for (plane, meta) in buffer.metadata().planes().iter().enumerate() {
            let data = view
                .plane(plane)
                .ok_or(RawWriteError::MissingPlane { plane })?;
            let length = clamped_length(meta.bytesused, data.len());

            if meta.bytesused as usize > data.len() {
                tracing::warn!(
                    plane,
                    bytesused = meta.bytesused,
                    plane_size = data.len(),
                    "payload size {} larger than plane size {}",
                    meta.bytesused,
                    data.len()
                );
                report.clamped_planes += 1;
            }

            // One write per plane; a short write is reported, not retried.
            let written = out
                .write(&data[..length])
                .map_err(|source| RawWriteError::Write { plane, source })?;
            if written != length {
                return Err(RawWriteError::ShortWrite {
                    plane,
                    written,
                    expected: length,
                });
            }
            report.bytes_written += written;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{BufferId, FrameMetadata, Plane, PlaneMetadata};
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;

    fn mapped_buffer(planes: &[&[u8]], bytesused: &[u32]) -> (FrameBuffer, MappedView) {
        let file = tempfile::tempfile().unwrap();
        let mut offset = 0u64;
        let mut descs = Vec::new();
        for data in planes {
            io::Write::write_all(&mut &file, data).unwrap();
            descs.push(offset);
            offset += data.len() as u64;
        }
        let fd = Arc::new(file);
        let planes = planes
            .iter()
            .zip(descs)
            .map(|(data, offset)| Plane {
                fd: Arc::clone(&fd),
                offset,
                length: data.len(),
            })
            .collect();

        let mut buffer = FrameBuffer::new(BufferId(0), planes);
        buffer.set_metadata(FrameMetadata::new(
            0,
            Duration::ZERO,
            bytesused
                .iter()
                .map(|&bytesused| PlaneMetadata { bytesused })
                .collect(),
        ));
        let view = MappedView::from_frame_buffer(&buffer).unwrap();
        (buffer, view)
    }

    /// Accepts at most `limit` bytes per call.
    struct ShortWriter {
        limit: usize,
        data: Vec<u8>,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_planes_are_concatenated() {
        let (buffer, view) = mapped_buffer(&[b"YYYY", b"UV"], &[4, 2]);
        let mut out = Vec::new();

        let report = RawPlaneWriter::new()
            .write_planes(&mut out, &buffer, &view)
            .unwrap();

        assert_eq!(out, b"YYYYUV");
        assert_eq!(report.bytes_written, 6);
        assert_eq!(report.clamped_planes, 0);
    }

    #[test]
    fn test_partial_bytesused_writes_prefix() {
        let (buffer, view) = mapped_buffer(&[b"abcdef"], &[3]);
        let mut out = Vec::new();

        RawPlaneWriter::new()
            .write_planes(&mut out, &buffer, &view)
            .unwrap();

        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_oversized_payload_is_clamped() {
        let (buffer, view) = mapped_buffer(&[b"abcd", b"ef"], &[100, 2]);
        let mut out = Vec::new();

        let report = RawPlaneWriter::new()
            .write_planes(&mut out, &buffer, &view)
            .unwrap();

        assert_eq!(out, b"abcdef");
        assert_eq!(report.clamped_planes, 1);
    }

    #[test]
    fn test_short_write_aborts_remaining_planes() {
        let (buffer, view) = mapped_buffer(&[b"abcd", b"ef"], &[4, 2]);
        let mut out = ShortWriter {
            limit: 3,
            data: Vec::new(),
        };

        let result = RawPlaneWriter::new().write_planes(&mut out, &buffer, &view);

        assert!(matches!(
            result,
            Err(RawWriteError::ShortWrite {
                plane: 0,
                written: 3,
                expected: 4
            })
        ));
        assert_eq!(out.data, b"abc");
    }

    #[test]
    fn test_write_error_is_reported() {
        let (buffer, view) = mapped_buffer(&[b"abcd"], &[4]);
        let result = RawPlaneWriter::new().write_planes(&mut FailingWriter, &buffer, &view);

        assert!(matches!(result, Err(RawWriteError::Write { plane: 0, .. })));
    }

    #[test]
    fn test_open_failure_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");

        let result = RawPlaneWriter::new().open(&path, OpenMode::Truncate);

        assert!(matches!(result, Err(RawWriteError::Open { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_created_file_mode_honours_umask() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        // Directories are created with 0o777 minus the umask.
        let umask_dir = dir.path().join("umask");
        std::fs::create_dir(&umask_dir).unwrap();
        let dir_mode = std::fs::metadata(&umask_dir).unwrap().permissions().mode() & 0o777;

        for (name, mode) in [("fixed.bin", OpenMode::Append), ("frame.bin", OpenMode::Truncate)] {
            let path = dir.path().join(name);
            drop(RawPlaneWriter::new().open(&path, mode).unwrap());

            let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(file_mode, FILE_MODE & dir_mode, "{name}");
        }
    }

    #[test]
    fn test_clamped_length() {
        assert_eq!(clamped_length(10, 4), 4);
        assert_eq!(clamped_length(2, 4), 2);
        assert_eq!(clamped_length(0, 4), 0);
    }
}
