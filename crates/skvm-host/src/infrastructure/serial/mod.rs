//! Serial transport to the CH9329 module.
//!
//! The chip sits behind a CH340 USB-serial bridge on the controller; this
//! module owns the port handle and moves raw bytes in both directions.
//! Frame encoding/decoding and acknowledgment matching live in `skvm-core`;
//! this layer never inspects payloads.
//!
//! # Threading
//!
//! The `serialport` API is blocking, so the production implementation runs a
//! writer thread (draining a bounded outbound queue) and a reader thread
//! (pushing raw chunks into a tokio channel).  Both exit within one read
//! timeout of `shutdown()`.
//!
//! # Testability
//!
//! The `SerialTransport` trait lets the forwarder and session controller run
//! against [`mock::MockTransport`] without hardware.

use std::time::Duration;

use async_trait::async_trait;
use serialport::{SerialPortInfo, SerialPortType};
use tokio::sync::mpsc;

pub mod ch9329;
pub mod mock;

/// USB vendor id of the CH340 bridge the CH9329 ships behind.
pub const CH340_VID: u16 = 0x1A86;
/// USB product id of the CH340 bridge.
pub const CH340_PID: u16 = 0x7523;

/// Default CH9329 baud rate (factory configuration).
pub const DEFAULT_BAUD: u32 = 9600;

/// Error type for serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The port could not be opened or cloned.
    #[error("serial port unavailable: {0}")]
    PortUnavailable(String),

    /// The outbound queue stayed full for the whole send timeout.
    #[error("write queue full after {0:?}")]
    WriteTimeout(Duration),

    /// The transport has shut down (or its writer thread died on an I/O
    /// error); no further frames can be sent.
    #[error("transport is closed")]
    Closed,

    /// The inbound stream was already taken by another subscriber.
    #[error("inbound stream already subscribed")]
    AlreadySubscribed,
}

/// Trait abstracting the byte pipe to the CH9329.
///
/// The production implementation is [`ch9329::Ch9329Port`]; tests use
/// [`mock::MockTransport`].
#[async_trait]
pub trait SerialTransport: Send + Sync {
    /// Queues one encoded frame for transmission.
    ///
    /// Blocks (asynchronously) while the bounded outbound queue is full,
    /// up to the transport's configured send timeout.  Frames are written
    /// to the wire strictly in `send` order.
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Takes the inbound raw chunk stream.
    ///
    /// Chunks are raw reads off the wire, with no frame alignment; feed
    /// them to a `FrameDecoder`.  The stream can be taken exactly once;
    /// it closes when the transport shuts down or the reader thread dies.
    fn subscribe(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;

    /// Stops both I/O threads and closes the port.  Idempotent.
    fn shutdown(&self);
}

/// Picks the CH9329's port out of an enumeration result.
///
/// Matching is by the CH340 bridge's USB VID/PID; ports of any other type
/// (native UARTs, other USB serial adapters) are skipped.
pub fn select_ch9329_port(ports: &[SerialPortInfo]) -> Option<&str> {
    ports.iter().find_map(|p| match &p.port_type {
        SerialPortType::UsbPort(usb) if usb.vid == CH340_VID && usb.pid == CH340_PID => {
            Some(p.port_name.as_str())
        }
        _ => None,
    })
}

/// Scans the system's serial ports for the CH9329's CH340 bridge.
///
/// Returns the first matching port name, or `None` when no bridge is
/// attached (or enumeration itself fails, which is logged).
pub fn find_ch9329_port() -> Option<String> {
    match serialport::available_ports() {
        Ok(ports) => select_ch9329_port(&ports).map(str::to_owned),
        Err(e) => {
            tracing::warn!("serial port enumeration failed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb_port(name: &str, vid: u16, pid: u16) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid,
                serial_number: None,
                manufacturer: None,
                product: None,
            }),
        }
    }

    fn native_port(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::Unknown,
        }
    }

    #[test]
    fn test_select_picks_the_ch340_bridge() {
        // Arrange
        let ports = vec![
            native_port("/dev/ttyS0"),
            usb_port("/dev/ttyUSB0", 0x0403, 0x6001), // FTDI, not ours
            usb_port("/dev/ttyUSB1", CH340_VID, CH340_PID),
        ];

        // Act / Assert
        assert_eq!(select_ch9329_port(&ports), Some("/dev/ttyUSB1"));
    }

    #[test]
    fn test_select_returns_none_without_a_bridge() {
        let ports = vec![
            native_port("/dev/ttyS0"),
            usb_port("/dev/ttyUSB0", 0x0403, 0x6001),
        ];
        assert_eq!(select_ch9329_port(&ports), None);
    }

    #[test]
    fn test_select_ignores_pid_match_on_wrong_vid() {
        let ports = vec![usb_port("/dev/ttyUSB0", 0x1B86, CH340_PID)];
        assert_eq!(select_ch9329_port(&ports), None);
    }
}
