//! Input source fed by an external shell.
//!
//! The core never installs OS hooks itself; whatever hosts it (window shell,
//! CLI harness) captures events and pushes them through an [`InputInjector`].
//! The bounded channel preserves capture order; a stalled forwarder exerts
//! backpressure on the shell rather than dropping events.

use std::sync::Mutex;

use tokio::sync::mpsc;

use super::{InputError, InputSource, RawInputEvent};

/// Default event channel capacity.
const EVENT_QUEUE_DEPTH: usize = 256;

/// Sending half handed to the shell that captures input.
#[derive(Clone)]
pub struct InputInjector {
    tx: mpsc::Sender<RawInputEvent>,
}

impl InputInjector {
    /// Delivers one captured event, waiting if the forwarder is behind.
    ///
    /// Returns `Err` once the source has been stopped.
    pub async fn push(&self, event: RawInputEvent) -> Result<(), InputError> {
        self.tx.send(event).await.map_err(|_| InputError::Stopped)
    }

    /// Non-blocking variant for shells that cannot await (hook callbacks).
    /// A full queue is reported as an error instead of blocking the hook.
    pub fn try_push(&self, event: RawInputEvent) -> Result<(), InputError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => InputError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => InputError::Stopped,
        })
    }
}

/// An [`InputSource`] whose events come from an [`InputInjector`].
pub struct ChannelInputSource {
    injector: InputInjector,
    receiver: Mutex<Option<mpsc::Receiver<RawInputEvent>>>,
}

impl ChannelInputSource {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_QUEUE_DEPTH)
    }

    pub fn with_capacity(depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth.max(1));
        Self {
            injector: InputInjector { tx },
            receiver: Mutex::new(Some(rx)),
        }
    }

    /// The injector the shell uses to hand events in.
    pub fn injector(&self) -> InputInjector {
        self.injector.clone()
    }
}

impl Default for ChannelInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for ChannelInputSource {
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, InputError> {
        self.receiver
            .lock()
            .map_err(|_| InputError::Stopped)?
            .take()
            .ok_or(InputError::AlreadyStarted)
    }

    fn stop(&self) {
        // The channel closes when every injector clone is dropped; the
        // source itself only forgets its handle.
        if let Ok(mut guard) = self.receiver.lock() {
            guard.take();
        }
    }
}
