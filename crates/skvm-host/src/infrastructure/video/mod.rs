//! Video capture infrastructure: the target's display coming back over UVC.
//!
//! An MS2130-class HDMI capture device presents the target's output as a
//! standard UVC camera.  The [`FrameSource`] trait wraps device open/format
//! negotiation and blocking frame pulls; [`pipeline::VideoPipeline`] turns
//! that into an async stream of [`VideoEvent`]s with latest-wins delivery.
//!
//! # Testability
//!
//! [`nokhwa_source::NokhwaSource`] talks to real hardware; tests script
//! [`mock::MockFrameSource`] instead.

use std::time::{Duration, Instant};

pub mod mock;
pub mod nokhwa_source;
pub mod pipeline;

/// Pixel format of a captured frame or negotiated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Motion-JPEG compressed (what MS2130 devices advertise at high modes).
    Mjpeg,
    /// Packed YUV 4:2:2.
    Yuyv,
    /// Planar YUV 4:2:0.
    Nv12,
    /// 8-bit grayscale.
    Gray,
    /// Packed 24-bit RGB (the decoded delivery format).
    Rgb24,
}

/// Stream geometry and format negotiated at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub frame_rate: u32,
}

/// One decoded frame of the target's display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Capture instant, for latency diagnostics.
    pub timestamp: Instant,
    /// Raw pixel data in `format` layout.
    pub data: Vec<u8>,
}

/// Error type for video capture operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The device could not be opened or has disappeared.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The stream died after opening successfully.
    #[error("capture stream failed: {0}")]
    StreamFailed(String),

    /// The device advertises no format we can decode.
    #[error("no usable capture format: {0}")]
    FormatUnsupported(String),
}

/// Event published by the capture pipeline.
///
/// Frame delivery is depth-1 latest-wins: a slow consumer only ever observes
/// the newest frame, never a backlog.  Geometry announcements are not lossy;
/// each [`pipeline::VideoEvents`] subscription delivers them before the
/// frames they describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoEvent {
    /// A new frame of the target's display.
    Frame(VideoFrame),
    /// The incoming geometry/format changed (target mode switch).  Always
    /// delivered before the first frame of the new geometry.
    FormatChanged {
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    /// No frame arrived within the poll bound; the target may be off or the
    /// cable unplugged.
    NoSignal,
    /// The stream failed; the pipeline has stopped.
    Failed(CaptureError),
}

/// Trait abstracting a blocking frame producer.
///
/// `open` negotiates the best advertised mode; `next_frame` pulls one frame
/// with a bounded wait, returning `Ok(None)` when nothing arrived in time.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<VideoFormat, CaptureError>;
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<VideoFrame>, CaptureError>;
    fn close(&mut self);
}
