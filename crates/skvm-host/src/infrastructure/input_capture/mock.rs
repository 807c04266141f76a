//! Mock input source for unit testing.
//!
//! Allows tests to inject synthetic [`RawInputEvent`]s without a shell or
//! OS hooks.

use std::sync::Mutex;

use tokio::sync::mpsc;

use super::{InputError, InputSource, RawInputEvent};

/// A mock implementation of [`InputSource`] that allows tests to inject events.
pub struct MockInputSource {
    sender: Mutex<Option<mpsc::Sender<RawInputEvent>>>,
    receiver: Mutex<Option<mpsc::Receiver<RawInputEvent>>>,
}

impl MockInputSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(256);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
        }
    }

    /// Injects a synthetic event, as if captured from hardware.
    ///
    /// Panics if the source has been stopped.
    pub async fn inject_event(&self, event: RawInputEvent) {
        let tx = self
            .sender
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("MockInputSource was stopped");
        tx.send(event).await.expect("receiver dropped");
    }

    /// Injects a key press immediately followed by its release.
    pub async fn inject_tap(&self, code: u32, time_ms: u32) {
        self.inject_event(RawInputEvent::KeyDown { code, time_ms }).await;
        self.inject_event(RawInputEvent::KeyUp { code, time_ms: time_ms + 1 }).await;
    }
}

impl Default for MockInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for MockInputSource {
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, InputError> {
        self.receiver
            .lock()
            .map_err(|_| InputError::Stopped)?
            .take()
            .ok_or(InputError::AlreadyStarted)
    }

    fn stop(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_capture::MouseButton;

    #[tokio::test]
    async fn test_mock_input_source_starts_and_receives_events() {
        // Arrange
        let source = MockInputSource::new();
        let mut rx = source.start().expect("start should succeed");

        // Act
        source
            .inject_event(RawInputEvent::KeyDown { code: 0x41, time_ms: 0 })
            .await;

        // Assert
        let event = rx.recv().await.expect("should receive event");
        assert!(matches!(event, RawInputEvent::KeyDown { code: 0x41, .. }));
    }

    #[tokio::test]
    async fn test_mock_input_source_stop_closes_channel() {
        // Arrange
        let source = MockInputSource::new();
        let mut rx = source.start().expect("start should succeed");

        // Act
        source.stop();

        // Assert - channel should be disconnected
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_mock_input_source_preserves_event_order() {
        // Arrange
        let source = MockInputSource::new();
        let mut rx = source.start().unwrap();

        // Act
        source
            .inject_event(RawInputEvent::MouseMove { x: 10, y: 20, time_ms: 1 })
            .await;
        source
            .inject_event(RawInputEvent::MouseButtonDown {
                button: MouseButton::Left,
                time_ms: 2,
            })
            .await;
        source
            .inject_event(RawInputEvent::MouseButtonUp {
                button: MouseButton::Left,
                time_ms: 3,
            })
            .await;

        // Assert
        assert!(matches!(rx.recv().await.unwrap(), RawInputEvent::MouseMove { x: 10, .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            RawInputEvent::MouseButtonDown { button: MouseButton::Left, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            RawInputEvent::MouseButtonUp { button: MouseButton::Left, .. }
        ));
    }
}
