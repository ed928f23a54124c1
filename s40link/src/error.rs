//! Error types for s40link.

use std::io;
use thiserror::Error;

/// Result type for s40link operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for s40link operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid address/channel, or the transport could not be opened.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// I/O error (write failure, read failure, premature end of stream).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The phone did not answer in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Unexpected reply from the phone (bad init acknowledgement, malformed frame).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A directory entry or listing buffer is truncated or inconsistent.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Path cannot be expressed on the wire.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// No file or directory at the given path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The path names a directory where a file was expected.
    #[error("Is a directory: {0}")]
    IsDirectory(String),

    /// The path names a file where a directory was expected.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Block transfer failed (length mismatch, local read/write failure).
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// The session was closed.
    #[error("Session is closed")]
    SessionClosed,

    /// An earlier I/O or protocol failure left the session unusable.
    #[error("Session is unusable after an earlier failure")]
    SessionUnusable,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this failure leaves the session unusable.
    ///
    /// The protocol has no correlation identifiers, so once a read or write
    /// fails the stream position is unknown and later replies cannot be
    /// attributed to requests.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Io(_) | Self::Timeout(_) | Self::Protocol(_) | Self::SessionUnusable => true,
            #[cfg(feature = "native")]
            Self::Serial(_) => true,
            _ => false,
        }
    }
}
