//! Port abstraction for the serial link to the phone.
//!
//! The phone is reached through a Bluetooth serial port profile (SPP)
//! channel. On the host this shows up as a serial device (an RFCOMM tty on
//! Linux, a "Standard Serial over Bluetooth link" COM port on Windows, a
//! `/dev/cu.*` device on macOS), so the link is driven through the same
//! `Port` trait regardless of platform.
//!
//! ## Architecture
//!
//! ```text
//! +------------------+
//! |  Transfer Engine |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |     Session      |  framing, handshake, read-until-quiet
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+     +------------------+
//! |   Port Trait     | <-- |    Connector     |  address/channel -> Port
//! +--------+---------+     +------------------+
//!          |
//!          v
//! +--------+---------+
//! | Native SerialPort|
//! |   (serialport)   |
//! +------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{Read, Write};
use std::time::Duration;

use crate::{address::BtTarget, error::Result};

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/rfcomm0", "COM5").
    pub port_name: String,
    /// Baud rate. Ignored by most Bluetooth serial drivers but required to
    /// open the device.
    pub baud_rate: u32,
    /// Per-read timeout. Short, because the session polls for quiescence.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            timeout: Duration::from_millis(200),
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// Whether the OS reports the port as a Bluetooth link.
    pub bluetooth: bool,
    /// Product string (if available).
    pub product: Option<String>,
}

/// Unified port trait for the serial link.
pub trait Port: Read + Write + Send {
    /// Set the read/write timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Get the current timeout.
    fn timeout(&self) -> Duration;

    /// Number of received bytes that can be read without blocking.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Clear input/output buffers.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

/// Opens the host-side port that reaches a given Bluetooth target.
pub trait Connector {
    /// Port type produced by this connector.
    type Port: Port;

    /// Open a port to `target`.
    fn connect(&self, target: &BtTarget) -> Result<Self::Port>;
}

/// Trait for listing available serial ports.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;

    /// Ports the OS reports as Bluetooth links.
    fn bluetooth_ports() -> Result<Vec<PortInfo>> {
        Ok(Self::list_ports()?
            .into_iter()
            .filter(|p| p.bluetooth)
            .collect())
    }
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator, SerialConnector};
