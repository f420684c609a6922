//! Stream identity and negotiated stream configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one logical output channel of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream{}", self.0)
    }
}

/// Pixel layouts understood by the mock pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit greyscale, one plane.
    Mono8,
    /// Packed 4:2:2 YUV, one plane, 2 bytes per pixel.
    Yuyv,
    /// 4:2:0 YUV, luma plane followed by an interleaved chroma plane.
    Nv12,
    /// Packed 10-bit raw: three pixels per little-endian 32-bit word,
    /// bits 31-30 unused.
    Xy10,
}

impl PixelFormat {
    /// Four character code of the format.
    pub fn fourcc(&self) -> &'static str {
        match self {
            Self::Mono8 => "GREY",
            Self::Yuyv => "YUYV",
            Self::Nv12 => "NV12",
            Self::Xy10 => "XY10",
        }
    }

    /// Bytes per row of the first plane.
    pub fn stride(&self, width: u32) -> usize {
        let width = width as usize;
        match self {
            Self::Mono8 | Self::Nv12 => width,
            Self::Yuyv => width * 2,
            Self::Xy10 => width.div_ceil(3) * 4,
        }
    }

    /// Size in bytes of each plane, in plane order.
    pub fn plane_sizes(&self, width: u32, height: u32) -> Vec<usize> {
        let luma = self.stride(width) * height as usize;
        match self {
            Self::Nv12 => vec![luma, luma / 2],
            _ => vec![luma],
        }
    }

    /// Total frame size across all planes.
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        self.plane_sizes(width, height).iter().sum()
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fourcc())
    }
}

/// Configuration negotiated for a stream before capture starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfiguration {
    /// Pixel format of every buffer.
    pub pixel_format: PixelFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row of the first plane.
    pub stride: usize,
    /// Sum of all plane sizes.
    pub frame_size: usize,
    /// Number of buffers allocated for the stream.
    pub buffer_count: u32,
}

impl StreamConfiguration {
    /// Derives stride and frame size from the format and dimensions.
    pub fn new(pixel_format: PixelFormat, width: u32, height: u32, buffer_count: u32) -> Self {
        Self {
            pixel_format,
            width,
            height,
            stride: pixel_format.stride(width),
            frame_size: pixel_format.frame_size(width, height),
            buffer_count,
        }
    }
}

impl fmt::Display for StreamConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}-{} (stride {}, {} buffers)",
            self.width, self.height, self.pixel_format, self.stride, self.buffer_count
        )
    }
}
