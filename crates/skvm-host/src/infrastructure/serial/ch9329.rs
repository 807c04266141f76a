//! Production serial transport built on the `serialport` crate.
//!
//! Two dedicated threads bridge the blocking port handle to the async world:
//!
//! ```text
//! forwarder ──send()──▶ bounded tokio queue ──▶ writer thread ──▶ UART
//! UART ──▶ reader thread ──▶ tokio channel ──subscribe()──▶ decode task
//! ```
//!
//! The writer drains the outbound queue in order and exits when the queue
//! closes or a write fails.  The reader polls with a short timeout so it can
//! observe the shutdown flag, and forwards every non-empty chunk.  Once the
//! writer dies, `send` returns [`TransportError::Closed`]; the session
//! controller treats that as a transport failure.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{SerialTransport, TransportError};

/// Read timeout for the blocking port handle.  Bounds how long the reader
/// thread takes to notice the shutdown flag.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Reader scratch buffer size.  CH9329 responses are at most 70 bytes.
const READ_CHUNK: usize = 256;

/// Capacity of the inbound chunk channel.  Responses are small and rare;
/// if the decode task stalls this long the session is already broken.
const INBOUND_DEPTH: usize = 64;

/// Serial transport for a CH9329 behind a CH340 bridge.
pub struct Ch9329Port {
    outbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    inbound: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    send_timeout: Duration,
    stop: Arc<AtomicBool>,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Ch9329Port {
    /// Opens `path` at `baud` and starts both I/O threads.
    ///
    /// `queue_depth` bounds the outbound frame queue; `send_timeout` is how
    /// long [`SerialTransport::send`] waits on a full queue before failing
    /// with [`TransportError::WriteTimeout`].
    pub fn open(
        path: &str,
        baud: u32,
        queue_depth: usize,
        send_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut write_half = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::PortUnavailable(format!("{path}: {e}")))?;
        let mut read_half = write_half
            .try_clone()
            .map_err(|e| TransportError::PortUnavailable(format!("{path}: clone: {e}")))?;

        info!("serial port open: {path} @ {baud} baud");

        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(queue_depth.max(1));
        let (in_tx, in_rx) = mpsc::channel::<Vec<u8>>(INBOUND_DEPTH);
        let stop = Arc::new(AtomicBool::new(false));

        let writer = std::thread::Builder::new()
            .name("skvm-serial-writer".into())
            .spawn(move || {
                while let Some(frame) = out_rx.blocking_recv() {
                    if let Err(e) = write_half
                        .write_all(&frame)
                        .and_then(|_| write_half.flush())
                    {
                        error!("serial write failed: {e}");
                        break;
                    }
                }
                // Closing the receiver makes every queued and future send fail.
                out_rx.close();
                debug!("serial writer thread exiting");
            })
            .map_err(|e| TransportError::PortUnavailable(format!("writer thread: {e}")))?;

        let reader_stop = Arc::clone(&stop);
        let reader = std::thread::Builder::new()
            .name("skvm-serial-reader".into())
            .spawn(move || {
                let mut buf = [0u8; READ_CHUNK];
                while !reader_stop.load(Ordering::Relaxed) {
                    match read_half.read(&mut buf) {
                        Ok(0) => {}
                        Ok(n) => {
                            if in_tx.blocking_send(buf[..n].to_vec()).is_err() {
                                // Subscriber gone; nothing left to deliver to.
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                        Err(e) => {
                            error!("serial read failed: {e}");
                            break;
                        }
                    }
                }
                debug!("serial reader thread exiting");
            })
            .map_err(|e| TransportError::PortUnavailable(format!("reader thread: {e}")))?;

        Ok(Self {
            outbound: Mutex::new(Some(out_tx)),
            inbound: Mutex::new(Some(in_rx)),
            send_timeout,
            stop,
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(reader)),
        })
    }

    fn join_threads(&self) {
        for slot in [&self.writer, &self.reader] {
            let handle = slot.lock().ok().and_then(|mut h| h.take());
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    warn!("serial I/O thread panicked during shutdown");
                }
            }
        }
    }
}

#[async_trait]
impl SerialTransport for Ch9329Port {
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        let sender = {
            let guard = self.outbound.lock().map_err(|_| TransportError::Closed)?;
            guard.as_ref().cloned().ok_or(TransportError::Closed)?
        };
        match sender.send_timeout(frame, self.send_timeout).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                Err(TransportError::WriteTimeout(self.send_timeout))
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    fn subscribe(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        self.inbound
            .lock()
            .map_err(|_| TransportError::Closed)?
            .take()
            .ok_or(TransportError::AlreadySubscribed)
    }

    fn shutdown(&self) {
        // Dropping the sender closes the outbound queue, which stops the
        // writer; the flag stops the reader within one read timeout.
        if let Ok(mut guard) = self.outbound.lock() {
            guard.take();
        }
        self.stop.store(true, Ordering::Relaxed);
        self.join_threads();
    }
}

impl Drop for Ch9329Port {
    fn drop(&mut self) {
        self.shutdown();
    }
}
