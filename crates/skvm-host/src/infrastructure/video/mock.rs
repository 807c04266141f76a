//! Scripted frame source for testing the capture pipeline.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{CaptureError, FrameSource, PixelFormat, VideoFormat, VideoFrame};

/// One scripted step: what `next_frame` returns on its n-th call.
pub type ScriptStep = Result<Option<VideoFrame>, CaptureError>;

/// A [`FrameSource`] that replays a script instead of touching hardware.
///
/// When the script runs out, further pulls report `Ok(None)` (no signal).
pub struct MockFrameSource {
    open_result: Result<VideoFormat, CaptureError>,
    script: Arc<Mutex<VecDeque<ScriptStep>>>,
    closed: Arc<Mutex<bool>>,
    frame_interval: Duration,
}

impl MockFrameSource {
    pub fn new(format: VideoFormat) -> Self {
        Self {
            open_result: Ok(format),
            script: Arc::new(Mutex::new(VecDeque::new())),
            closed: Arc::new(Mutex::new(false)),
            frame_interval: Duration::ZERO,
        }
    }

    /// A source whose `open` fails, for connect-failure tests.
    pub fn failing_open(error: CaptureError) -> Self {
        Self {
            open_result: Err(error),
            script: Arc::new(Mutex::new(VecDeque::new())),
            closed: Arc::new(Mutex::new(false)),
            frame_interval: Duration::ZERO,
        }
    }

    /// Makes each pull block for `interval` first, like a real camera's
    /// frame interval.  The default is no pacing.
    pub fn set_frame_interval(&mut self, interval: Duration) {
        self.frame_interval = interval;
    }

    /// Appends a step to the script.
    pub fn push_step(&self, step: ScriptStep) {
        self.script.lock().expect("lock poisoned").push_back(step);
    }

    /// Convenience: appends a frame of the given geometry.
    pub fn push_frame(&self, width: u32, height: u32) {
        self.push_step(Ok(Some(test_frame(width, height))));
    }

    /// Handle for asserting teardown after the source moved into a pipeline.
    pub fn closed_flag(&self) -> Arc<Mutex<bool>> {
        Arc::clone(&self.closed)
    }
}

/// A minimal RGB24 frame for tests.
pub fn test_frame(width: u32, height: u32) -> VideoFrame {
    VideoFrame {
        width,
        height,
        format: PixelFormat::Rgb24,
        timestamp: Instant::now(),
        data: vec![0u8; (width * height * 3) as usize],
    }
}

/// The format most tests open with.
pub fn test_format() -> VideoFormat {
    VideoFormat {
        width: 1920,
        height: 1080,
        format: PixelFormat::Mjpeg,
        frame_rate: 30,
    }
}

impl FrameSource for MockFrameSource {
    fn open(&mut self) -> Result<VideoFormat, CaptureError> {
        self.open_result.clone()
    }

    fn next_frame(&mut self, _timeout: Duration) -> Result<Option<VideoFrame>, CaptureError> {
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }
        match self.script.lock().expect("lock poisoned").pop_front() {
            Some(step) => step,
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        *self.closed.lock().expect("lock poisoned") = true;
    }
}
