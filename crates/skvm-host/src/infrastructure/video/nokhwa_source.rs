//! UVC frame source built on the `nokhwa` crate.
//!
//! Opens the capture device by index, asks the backend for the highest
//! advertised resolution, and decodes every pulled frame to RGB24 so the
//! rest of the host never deals with MJPEG or YUV.

use std::time::{Duration, Instant};

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{debug, info};

use super::{CaptureError, FrameSource, PixelFormat, VideoFormat, VideoFrame};

fn pixel_format_of(fmt: FrameFormat) -> PixelFormat {
    match fmt {
        FrameFormat::MJPEG => PixelFormat::Mjpeg,
        FrameFormat::YUYV => PixelFormat::Yuyv,
        FrameFormat::NV12 => PixelFormat::Nv12,
        FrameFormat::GRAY => PixelFormat::Gray,
        _ => PixelFormat::Rgb24,
    }
}

/// A [`FrameSource`] reading from a UVC device (MS2130 capture stick).
pub struct NokhwaSource {
    index: u32,
    camera: Option<Camera>,
}

impl NokhwaSource {
    /// Creates a source for the capture device at `index`.  The device is
    /// not touched until [`FrameSource::open`].
    pub fn new(index: u32) -> Self {
        Self {
            index,
            camera: None,
        }
    }
}

impl FrameSource for NokhwaSource {
    fn open(&mut self) -> Result<VideoFormat, CaptureError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let mut camera = Camera::new(CameraIndex::Index(self.index), requested)
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let fmt = camera.camera_format();
        let negotiated = VideoFormat {
            width: fmt.resolution().width(),
            height: fmt.resolution().height(),
            format: pixel_format_of(fmt.format()),
            frame_rate: fmt.frame_rate(),
        };
        info!(
            "capture device {} open: {}x{} {:?} @ {} fps",
            self.index, negotiated.width, negotiated.height, negotiated.format,
            negotiated.frame_rate
        );

        self.camera = Some(camera);
        Ok(negotiated)
    }

    fn next_frame(&mut self, _timeout: Duration) -> Result<Option<VideoFrame>, CaptureError> {
        // The nokhwa pull blocks until the device produces a frame or errors;
        // the device's own frame interval bounds the wait.  A dead link
        // therefore surfaces as an error here, not as a silent stall.
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| CaptureError::StreamFailed("device not open".into()))?;

        let buffer = camera
            .frame()
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::FormatUnsupported(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        Ok(Some(VideoFrame {
            width,
            height,
            format: PixelFormat::Rgb24,
            timestamp: Instant::now(),
            data: decoded.into_raw(),
        }))
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                debug!("capture stream stop failed: {e}");
            }
        }
    }
}

impl Drop for NokhwaSource {
    fn drop(&mut self) {
        self.close();
    }
}
