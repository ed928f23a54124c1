//! # s40link
//!
//! A library for accessing the file system of Nokia Series 40 phones.
//!
//! The phone is reached through a Bluetooth serial port profile channel
//! and spoken to with a small framed binary protocol. This crate provides:
//!
//! - Framing and the command catalog of that protocol
//! - A device session with the init handshake and reply reassembly
//! - Directory listing, recursive traversal and file system dumps
//! - Block transfers to and from the phone
//! - Device identity (firmware, model, IMEI) and reboot
//!
//! ## Features
//!
//! - `native` (default): serial port support via the `serialport` crate
//! - `serde`: serialization support for entries and identity
//!
//! ## Example
//!
//! ```rust,no_run
//! use s40link::{Phone, SerialConfig, SerialConnector, Session};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // The OS binds the phone's RFCOMM channel to a serial device
//!     let connector = SerialConnector::new(SerialConfig::new("/dev/rfcomm0", 115200));
//!     let session = Session::open("0019B7A1C2D3", 15, &connector)?;
//!     let phone = Phone::new(session);
//!
//!     for entry in phone.list("/c/")? {
//!         if let Some(info) = entry.info() {
//!             println!("{:>8} {} {}", info.size, info.timestamp, info.name);
//!         }
//!     }
//!
//!     let data = phone.get_bytes("/c/Ringtones/ring.mid")?;
//!     println!("fetched {} bytes", data.len());
//!     phone.close()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod error;
pub mod phone;
pub mod port;
pub mod protocol;
pub mod session;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator, SerialConnector};
pub use {
    address::{BtAddress, BtTarget},
    error::{Error, Result},
    phone::{
        DirectoryEntry, EntryInfo, EntryKind, EntryTimestamp, Phone, PhoneIdentity, block_count,
        decode_listing, wanted_len,
    },
    port::{Connector, Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{BLOCK_SIZE, Command, CommandFrame, FileHandle, Frame},
    session::{PhoneInfo, QuiescenceReader, ResponseReader, Session, SessionConfig},
};
