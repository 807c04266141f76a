//! Mock serial transport for unit and integration testing.
//!
//! Records every frame the forwarder sends, in order, and lets tests inject
//! inbound chunks as if the chip had answered.  Can also simulate a full
//! queue or a dead port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{SerialTransport, TransportError};

/// How the mock answers the next `send` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendBehavior {
    /// Accept and record the frame.
    Accept,
    /// Fail as if the bounded queue stayed full.
    Timeout,
    /// Fail as if the writer thread had died.
    Closed,
}

/// A mock [`SerialTransport`] recording sent frames.
pub struct MockTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    behavior: Arc<Mutex<SendBehavior>>,
    inbound_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    shutdown_count: Arc<Mutex<u32>>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            behavior: Arc::new(Mutex::new(SendBehavior::Accept)),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: Mutex::new(Some(rx)),
            shutdown_count: Arc::new(Mutex::new(0)),
        }
    }

    /// All frames sent so far, in send order.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    /// Changes how subsequent `send` calls behave.
    pub fn set_behavior(&self, behavior: SendBehavior) {
        *self.behavior.lock().expect("lock poisoned") = behavior;
    }

    /// Injects an inbound chunk, as if read off the wire.
    pub async fn inject_chunk(&self, chunk: Vec<u8>) {
        let tx = self
            .inbound_tx
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("transport was shut down");
        tx.send(chunk).await.expect("subscriber dropped");
    }

    /// Number of times `shutdown` was called.
    pub fn shutdown_count(&self) -> u32 {
        *self.shutdown_count.lock().expect("lock poisoned")
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SerialTransport for MockTransport {
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        match *self.behavior.lock().expect("lock poisoned") {
            SendBehavior::Accept => {
                self.sent.lock().expect("lock poisoned").push(frame);
                Ok(())
            }
            SendBehavior::Timeout => Err(TransportError::WriteTimeout(Duration::from_millis(0))),
            SendBehavior::Closed => Err(TransportError::Closed),
        }
    }

    fn subscribe(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        self.inbound_rx
            .lock()
            .expect("lock poisoned")
            .take()
            .ok_or(TransportError::AlreadySubscribed)
    }

    fn shutdown(&self) {
        *self.shutdown_count.lock().expect("lock poisoned") += 1;
        self.inbound_tx.lock().expect("lock poisoned").take();
    }
}
