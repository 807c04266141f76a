//! The capture pipeline: pulls frames on a worker thread and publishes
//! [`VideoEvent`]s with latest-wins delivery.
//!
//! A `tokio::sync::watch` channel holds exactly the newest event; a consumer
//! that falls behind skips straight to the current frame instead of working
//! through a backlog.  Frame pulls are blocking, so they live on a dedicated
//! thread rather than a tokio task.
//!
//! Frames may be skipped, geometry announcements may not: consumers read
//! through a [`VideoEvents`] subscription that tracks the geometry it has
//! announced and re-derives the `FormatChanged` marker from the frame itself
//! whenever the worker's marker was overwritten by a newer event before the
//! subscriber polled.  A frame of a new geometry is therefore always preceded
//! by its announcement, per subscription.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{CaptureError, FrameSource, PixelFormat, VideoEvent, VideoFormat, VideoFrame};

/// Tracks the incoming frame geometry and detects mode switches.
#[derive(Debug)]
pub struct GeometryTracker {
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl GeometryTracker {
    pub fn new(format: VideoFormat) -> Self {
        Self {
            width: format.width,
            height: format.height,
            format: format.format,
        }
    }

    /// The event announcing the current geometry.
    pub fn announcement(&self) -> VideoEvent {
        VideoEvent::FormatChanged {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }

    /// Observes one frame; returns the `FormatChanged` announcement when the
    /// frame's geometry differs from the last one seen.
    pub fn observe(&mut self, frame: &VideoFrame) -> Option<VideoEvent> {
        if self.note(frame.width, frame.height, frame.format) {
            Some(self.announcement())
        } else {
            None
        }
    }

    /// Records a geometry; returns whether it differs from the last one.
    pub fn note(&mut self, width: u32, height: u32, format: PixelFormat) -> bool {
        if width == self.width && height == self.height && format == self.format {
            return false;
        }
        self.width = width;
        self.height = height;
        self.format = format;
        true
    }
}

/// One subscriber's view of the pipeline's event stream.
///
/// Frame delivery stays latest-wins, but the subscription keeps its own
/// [`GeometryTracker`]: when a frame arrives whose geometry this subscriber
/// has not been told about (the worker's marker was overwritten on the
/// channel), the marker is re-derived and delivered first, with the frame
/// held back one call.  Markers the subscriber already knows are skipped.
pub struct VideoEvents {
    rx: watch::Receiver<Option<VideoEvent>>,
    announced: GeometryTracker,
    pending: Option<VideoEvent>,
}

impl VideoEvents {
    fn new(rx: watch::Receiver<Option<VideoEvent>>, negotiated: VideoFormat) -> Self {
        let announced = GeometryTracker::new(negotiated);
        // Every subscription opens with the geometry it is about to receive.
        let pending = Some(announced.announcement());
        Self {
            rx,
            announced,
            pending,
        }
    }

    /// The next event for this subscriber, or `None` once the pipeline has
    /// stopped and its final event was consumed.
    pub async fn next(&mut self) -> Option<VideoEvent> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }
        loop {
            self.rx.changed().await.ok()?;
            let Some(event) = self.rx.borrow_and_update().clone() else {
                continue;
            };
            match event {
                VideoEvent::Frame(frame) => {
                    if let Some(marker) = self.announced.observe(&frame) {
                        self.pending = Some(VideoEvent::Frame(frame));
                        return Some(marker);
                    }
                    return Some(VideoEvent::Frame(frame));
                }
                VideoEvent::FormatChanged {
                    width,
                    height,
                    format,
                } => {
                    if self.announced.note(width, height, format) {
                        return Some(event);
                    }
                    // Already announced to this subscriber.
                }
                other => return Some(other),
            }
        }
    }
}

/// Running capture pipeline.  Dropping it (or calling [`shutdown`]) stops
/// the worker and closes the device.
///
/// [`shutdown`]: VideoPipeline::shutdown
pub struct VideoPipeline {
    negotiated: VideoFormat,
    events: watch::Receiver<Option<VideoEvent>>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl VideoPipeline {
    /// Opens the source and starts the pull loop.
    ///
    /// `poll_timeout` bounds each frame wait; when it elapses without a
    /// frame the pipeline publishes [`VideoEvent::NoSignal`] and keeps
    /// polling.  A source error publishes [`VideoEvent::Failed`] and ends
    /// the loop.
    pub fn start(
        mut source: Box<dyn FrameSource>,
        poll_timeout: Duration,
    ) -> Result<Self, CaptureError> {
        let negotiated = source.open()?;
        let (tx, events) = watch::channel(None);
        let stop = Arc::new(AtomicBool::new(false));

        let worker_stop = Arc::clone(&stop);
        let worker = std::thread::Builder::new()
            .name("skvm-video-pull".into())
            .spawn(move || {
                let mut tracker = GeometryTracker::new(negotiated);
                let _ = tx.send(Some(tracker.announcement()));

                while !worker_stop.load(Ordering::Relaxed) {
                    let pull_started = Instant::now();
                    match source.next_frame(poll_timeout) {
                        Ok(Some(frame)) => {
                            if let Some(change) = tracker.observe(&frame) {
                                info!(
                                    "capture format changed to {}x{} {:?}",
                                    frame.width, frame.height, frame.format
                                );
                                if tx.send(Some(change)).is_err() {
                                    break;
                                }
                            }
                            if tx.send(Some(VideoEvent::Frame(frame))).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!("no frame within {poll_timeout:?}");
                            if tx.send(Some(VideoEvent::NoSignal)).is_err() {
                                break;
                            }
                            // Sources that report "no signal" faster than the
                            // poll bound must not turn this loop into a spin.
                            let elapsed = pull_started.elapsed();
                            if elapsed < poll_timeout {
                                std::thread::sleep(poll_timeout - elapsed);
                            }
                        }
                        Err(e) => {
                            warn!("capture stream failed: {e}");
                            let _ = tx.send(Some(VideoEvent::Failed(e)));
                            break;
                        }
                    }
                }
                source.close();
                debug!("video pull thread exiting");
            })
            .map_err(|e| CaptureError::StreamFailed(format!("pull thread: {e}")))?;

        Ok(Self {
            negotiated,
            events,
            stop,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// The format negotiated when the device was opened.
    pub fn negotiated_format(&self) -> VideoFormat {
        self.negotiated
    }

    /// A fresh subscription to the event stream.  Frames are latest-wins;
    /// geometry announcements always precede the frames they describe.
    pub fn subscribe(&self) -> VideoEvents {
        VideoEvents::new(self.events.clone(), self.negotiated)
    }

    /// Stops the worker and closes the device.  Idempotent; returns once
    /// the worker has exited.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
        let handle = self.worker.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("video pull thread panicked during shutdown");
            }
        }
    }
}

impl Drop for VideoPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::video::mock::{test_format, test_frame, MockFrameSource};

    const POLL: Duration = Duration::from_millis(5);

    // ── GeometryTracker ──────────────────────────────────────────────────────

    #[test]
    fn test_tracker_silent_while_geometry_is_stable() {
        let mut tracker = GeometryTracker::new(test_format());
        assert!(tracker.observe(&test_frame(1920, 1080)).is_none());
        assert!(tracker.observe(&test_frame(1920, 1080)).is_none());
    }

    #[test]
    fn test_tracker_announces_resolution_change_once() {
        // Arrange
        let mut tracker = GeometryTracker::new(test_format());

        // Act
        let change = tracker.observe(&test_frame(1280, 720));

        // Assert
        assert_eq!(
            change,
            Some(VideoEvent::FormatChanged {
                width: 1280,
                height: 720,
                format: PixelFormat::Rgb24,
            })
        );
        assert!(tracker.observe(&test_frame(1280, 720)).is_none());
    }

    // ── Pipeline ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_pipeline_announces_negotiated_format_first() {
        // Arrange
        let source = MockFrameSource::new(test_format());

        // Act
        let pipeline = VideoPipeline::start(Box::new(source), POLL).expect("open failed");
        let mut events = pipeline.subscribe();
        let first = events.next().await;

        // Assert
        assert!(matches!(
            first,
            Some(VideoEvent::FormatChanged { width: 1920, height: 1080, .. })
        ));
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_pipeline_open_failure_is_reported() {
        let source =
            MockFrameSource::failing_open(CaptureError::DeviceUnavailable("unplugged".into()));
        let result = VideoPipeline::start(Box::new(source), POLL);
        assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_pipeline_publishes_failure_and_closes_device() {
        // Arrange
        let source = MockFrameSource::new(test_format());
        source.push_step(Err(CaptureError::StreamFailed("cable pulled".into())));
        let closed = source.closed_flag();

        // Act
        let pipeline = VideoPipeline::start(Box::new(source), POLL).expect("open failed");
        let mut events = pipeline.subscribe();
        let failure = loop {
            match events.next().await.expect("pipeline dropped") {
                VideoEvent::Failed(e) => break e,
                _ => continue,
            }
        };

        // Assert
        assert_eq!(failure, CaptureError::StreamFailed("cable pulled".into()));
        pipeline.shutdown();
        assert!(*closed.lock().unwrap(), "source must be closed on failure");
    }

    #[tokio::test]
    async fn test_pipeline_delivery_is_latest_wins() {
        // Arrange - three frames queued before anyone reads.
        let source = MockFrameSource::new(test_format());
        for _ in 0..3 {
            source.push_frame(1920, 1080);
        }
        source.push_step(Err(CaptureError::StreamFailed("end".into())));

        // Act - wait for the terminal event, then inspect the borrow.
        let pipeline = VideoPipeline::start(Box::new(source), POLL).expect("open failed");
        let mut rx = pipeline.events.clone();
        loop {
            rx.changed().await.expect("pipeline dropped");
            if matches!(*rx.borrow_and_update(), Some(VideoEvent::Failed(_))) {
                break;
            }
        }

        // Assert - the channel holds only the newest event; the three frames
        // never queued up behind each other.
        assert!(matches!(*rx.borrow(), Some(VideoEvent::Failed(_))));
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_pipeline_reports_no_signal() {
        // Arrange - empty script means every pull times out.
        let source = MockFrameSource::new(test_format());

        // Act
        let pipeline = VideoPipeline::start(Box::new(source), POLL).expect("open failed");
        let mut events = pipeline.subscribe();
        let mut saw_no_signal = false;
        for _ in 0..4 {
            if matches!(events.next().await, Some(VideoEvent::NoSignal)) {
                saw_no_signal = true;
                break;
            }
        }

        // Assert
        assert!(saw_no_signal);
        pipeline.shutdown();
    }

    // ── Subscriptions ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_subscription_rederives_marker_lost_to_a_newer_frame() {
        // Arrange - a channel where the geometry switch marker was already
        // overwritten by the frame that followed it.
        let (tx, rx) = watch::channel(None);
        let mut events = VideoEvents::new(rx, test_format());
        assert!(matches!(
            events.next().await,
            Some(VideoEvent::FormatChanged { width: 1920, .. })
        ));

        // Act
        tx.send(Some(VideoEvent::Frame(test_frame(1280, 720)))).unwrap();
        let first = events.next().await;
        let second = events.next().await;

        // Assert - the announcement still arrives before the frame.
        assert_eq!(
            first,
            Some(VideoEvent::FormatChanged {
                width: 1280,
                height: 720,
                format: PixelFormat::Rgb24,
            })
        );
        assert!(matches!(second, Some(VideoEvent::Frame(f)) if f.width == 1280));
    }

    #[tokio::test]
    async fn test_subscription_does_not_repeat_a_delivered_marker() {
        // Arrange
        let (tx, rx) = watch::channel(None);
        let mut events = VideoEvents::new(rx, test_format());
        let _ = events.next().await;

        // Act - the worker's marker survives, then its frame arrives.
        tx.send(Some(VideoEvent::FormatChanged {
            width: 1280,
            height: 720,
            format: PixelFormat::Rgb24,
        }))
        .unwrap();
        let marker = events.next().await;
        tx.send(Some(VideoEvent::Frame(test_frame(1280, 720)))).unwrap();
        let frame = events.next().await;

        // Assert - one marker, then the frame, no synthesized duplicate.
        assert!(matches!(marker, Some(VideoEvent::FormatChanged { width: 1280, .. })));
        assert!(matches!(frame, Some(VideoEvent::Frame(_))));
    }

    #[tokio::test]
    async fn test_subscriber_sees_marker_before_first_frame_of_new_geometry() {
        // Arrange - a paced source whose target switches display mode
        // mid-stream.
        let mut source = MockFrameSource::new(test_format());
        source.set_frame_interval(Duration::from_millis(25));
        source.push_frame(1920, 1080);
        for _ in 0..4 {
            source.push_frame(1280, 720);
        }
        source.push_step(Err(CaptureError::StreamFailed("end".into())));

        // Act / Assert - every frame this subscriber receives must carry the
        // geometry most recently announced to it.
        let pipeline = VideoPipeline::start(Box::new(source), Duration::from_millis(100))
            .expect("open failed");
        let mut events = pipeline.subscribe();
        let mut announced = None;
        loop {
            match events.next().await.expect("pipeline dropped") {
                VideoEvent::FormatChanged { width, height, .. } => {
                    announced = Some((width, height));
                }
                VideoEvent::Frame(frame) => {
                    assert_eq!(
                        Some((frame.width, frame.height)),
                        announced,
                        "frame delivered before its geometry was announced"
                    );
                    if frame.width == 1280 {
                        break;
                    }
                }
                VideoEvent::NoSignal => {}
                VideoEvent::Failed(_) => {
                    panic!("stream ended before a switched-geometry frame arrived")
                }
            }
        }
        pipeline.shutdown();
    }
}
