//! Command catalog for the S40 file system protocol.
//!
//! Every command starts from an immutable template. Building a command
//! copies the template, patches its placeholder spans and appends any
//! trailing data, so templates are never shared mutably between requests.
//!
//! ## Placeholder spans
//!
//! ```text
//! ListDirectory  [5]      path length (1 byte)
//! ReadBlock      [8..10]  file handle
//!                [11..13] block index
//!                [20..22] wanted length
//! OpenWrite      [6..8]   path length
//! WriteBlock     [8..10]  file handle
//!                [12..14] block length
//! CloseFile      [8..10]  file handle
//! DeleteFile     [5]      path length (1 byte)
//! ```
//!
//! Path lengths count narrow-encoded bytes, terminator included.

use {
    crate::{
        error::{Error, Result},
        protocol::{
            codec,
            frame::Frame,
        },
    },
    std::fmt,
};

/// Size of a file data block.
pub const BLOCK_SIZE: usize = 256;

/// Longest narrow-encoded path (terminator included) the catalog accepts.
///
/// Two of the path commands carry the length in a single byte.
pub const MAX_ENCODED_PATH_LEN: usize = 255;

/// Exact reply to the init command.
pub const INIT_ACK: [u8; 7] = [0x19, 0x10, 0x00, 0xD0, 0x00, 0x01, 0x05];

/// Offsets into raw replies, counted from the sync byte of the reply frame.
pub mod reply {
    /// File handle returned by `OpenRead` / `OpenWrite` (2 bytes).
    pub const HANDLE_OFFSET: usize = 14;
    /// Length byte of a `ReadBlock` reply.
    pub const BLOCK_LEN_OFFSET: usize = 15;
    /// First data byte of a `ReadBlock` reply.
    pub const BLOCK_DATA_OFFSET: usize = 16;
    /// First IMEI character of an `Imei` reply.
    pub const IMEI_OFFSET: usize = 16;
    /// Number of IMEI characters.
    pub const IMEI_LEN: usize = 15;
    /// Bytes preceding the text lines of a `PhoneInfo` reply.
    pub const PHONE_INFO_SKIP: usize = 18;
}

/// Message type bytes.
pub mod msg_type {
    /// Link initialization.
    pub const INIT: u8 = 0xD0;
    /// Identity queries (firmware info, IMEI).
    pub const IDENTITY: u8 = 0x1B;
    /// Phone power control.
    pub const POWER: u8 = 0x15;
    /// File system operations.
    pub const FILE_SYSTEM: u8 = 0x6D;
}

const INIT: &[u8] = &[0x04];
const PHONE_INFO: &[u8] = &[0x00, 0x01, 0x00, 0x07, 0x01, 0x00];
const IMEI: &[u8] = &[0x00, 0x01, 0x00, 0x00, 0x41];
const RESET: &[u8] = &[0x00, 0x01, 0x00, 0x05, 0x80, 0x00];
const LIST_DIRECTORY: &[u8] = &[0x00, 0x01, 0x00, 0x68, 0x00, 0x00, 0x00];
const FILE_INFO: &[u8] = &[0x00, 0x01, 0x00, 0x68, 0x00, 0x68, 0x00];
const OPEN_READ: &[u8] = &[0x00, 0x01, 0x00, 0x72, 0x00, 0x00, 0x00, 0x68, 0x00];
const READ_BLOCK: &[u8] = &[
    0x00, 0x01, 0x00, 0x5E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00,
];
const OPEN_WRITE: &[u8] = &[0x00, 0x01, 0x00, 0x72, 0x11, 0x00, 0x00, 0x00];
const WRITE_BLOCK: &[u8] = &[
    0x00, 0x01, 0x00, 0x58, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
const CLOSE_FILE: &[u8] = &[0x00, 0x01, 0x00, 0x74, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
const DELETE_FILE: &[u8] = &[0x00, 0x01, 0x00, 0x62, 0x00, 0x00];

const LIST_PATH_LEN_OFFSET: usize = 5;
const READ_HANDLE_OFFSET: usize = 8;
const READ_INDEX_OFFSET: usize = 11;
const READ_WANTED_OFFSET: usize = 20;
const OPEN_WRITE_PATH_LEN_OFFSET: usize = 6;
const WRITE_HANDLE_OFFSET: usize = 8;
const WRITE_LEN_OFFSET: usize = 12;
const CLOSE_HANDLE_OFFSET: usize = 8;
const DELETE_PATH_LEN_OFFSET: usize = 5;

/// Phone-assigned handle of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u16);

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Commands understood by the phone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Initialize the link.
    Init,
    /// Query firmware version, date and model.
    PhoneInfo,
    /// Query the IMEI.
    Imei,
    /// Reboot the phone.
    Reset,
    /// List a directory.
    ListDirectory,
    /// Query a single directory entry.
    FileInfo,
    /// Open a file for reading.
    OpenRead,
    /// Read one block of an open file.
    ReadBlock,
    /// Create/open a file for writing.
    OpenWrite,
    /// Write one block to an open file.
    WriteBlock,
    /// Close an open file.
    CloseFile,
    /// Delete a file.
    DeleteFile,
}

impl Command {
    /// Message type byte the command is sent with.
    pub fn msg_type(self) -> u8 {
        match self {
            Self::Init => msg_type::INIT,
            Self::PhoneInfo | Self::Imei => msg_type::IDENTITY,
            Self::Reset => msg_type::POWER,
            _ => msg_type::FILE_SYSTEM,
        }
    }

    /// The immutable payload template.
    pub fn template(self) -> &'static [u8] {
        match self {
            Self::Init => INIT,
            Self::PhoneInfo => PHONE_INFO,
            Self::Imei => IMEI,
            Self::Reset => RESET,
            Self::ListDirectory => LIST_DIRECTORY,
            Self::FileInfo => FILE_INFO,
            Self::OpenRead => OPEN_READ,
            Self::ReadBlock => READ_BLOCK,
            Self::OpenWrite => OPEN_WRITE,
            Self::WriteBlock => WRITE_BLOCK,
            Self::CloseFile => CLOSE_FILE,
            Self::DeleteFile => DELETE_FILE,
        }
    }
}

/// A concrete command ready to be framed.
#[derive(Debug, Clone)]
pub struct CommandFrame {
    cmd: Command,
    data: Vec<u8>,
}

impl CommandFrame {
    /// Start a command from a fresh copy of its template.
    pub fn new(cmd: Command) -> Self {
        Self {
            cmd,
            data: cmd.template().to_vec(),
        }
    }

    /// Link initialization.
    pub fn init() -> Self {
        Self::new(Command::Init)
    }

    /// Firmware information query.
    pub fn phone_info() -> Self {
        Self::new(Command::PhoneInfo)
    }

    /// IMEI query.
    pub fn imei() -> Self {
        Self::new(Command::Imei)
    }

    /// Reboot request.
    pub fn reset() -> Self {
        Self::new(Command::Reset)
    }

    /// List the directory `dir`, which must end with `/`.
    ///
    /// The phone expects a wildcard pattern, so `*` is appended.
    #[allow(clippy::cast_possible_truncation)]
    pub fn list_directory(dir: &str) -> Result<Self> {
        let path = encode_path(&format!("{dir}*"))?;
        let mut frame = Self::new(Command::ListDirectory);
        // Safe cast: encode_path caps the length at 255
        frame.data[LIST_PATH_LEN_OFFSET] = path.len() as u8;
        frame.data.extend_from_slice(&path);
        Ok(frame)
    }

    /// Query the entry at `path`.
    pub fn file_info(path: &str) -> Result<Self> {
        let mut frame = Self::new(Command::FileInfo);
        frame.data.extend_from_slice(&encode_path(path)?);
        Ok(frame)
    }

    /// Open `path` for reading.
    pub fn open_read(path: &str) -> Result<Self> {
        let mut frame = Self::new(Command::OpenRead);
        frame.data.extend_from_slice(&encode_path(path)?);
        Ok(frame)
    }

    /// Read block `index` of an open file, asking for `wanted` bytes.
    #[allow(clippy::unwrap_used)] // Offsets lie inside the fixed template
    pub fn read_block(handle: FileHandle, index: u16, wanted: u16) -> Self {
        let mut frame = Self::new(Command::ReadBlock);
        codec::put_u16_be(&mut frame.data, READ_HANDLE_OFFSET, handle.0).unwrap();
        codec::put_u16_be(&mut frame.data, READ_INDEX_OFFSET, index).unwrap();
        codec::put_u16_be(&mut frame.data, READ_WANTED_OFFSET, wanted).unwrap();
        frame
    }

    /// Create/open `path` for writing.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::unwrap_used)] // Offset lies inside the fixed template
    pub fn open_write(path: &str) -> Result<Self> {
        let path = encode_path(path)?;
        let mut frame = Self::new(Command::OpenWrite);
        codec::put_u16_be(&mut frame.data, OPEN_WRITE_PATH_LEN_OFFSET, path.len() as u16)
            .unwrap();
        frame.data.extend_from_slice(&path);
        Ok(frame)
    }

    /// Write one block (at most [`BLOCK_SIZE`] bytes) to an open file.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::unwrap_used)] // Offsets lie inside the fixed template
    pub fn write_block(handle: FileHandle, block: &[u8]) -> Self {
        debug_assert!(block.len() <= BLOCK_SIZE);
        let mut frame = Self::new(Command::WriteBlock);
        codec::put_u16_be(&mut frame.data, WRITE_HANDLE_OFFSET, handle.0).unwrap();
        codec::put_u16_be(&mut frame.data, WRITE_LEN_OFFSET, block.len() as u16).unwrap();
        frame.data.extend_from_slice(block);
        frame
    }

    /// Close an open file.
    #[allow(clippy::unwrap_used)] // Offset lies inside the fixed template
    pub fn close_file(handle: FileHandle) -> Self {
        let mut frame = Self::new(Command::CloseFile);
        codec::put_u16_be(&mut frame.data, CLOSE_HANDLE_OFFSET, handle.0).unwrap();
        frame
    }

    /// Delete the file at `path`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn delete_file(path: &str) -> Result<Self> {
        let path = encode_path(path)?;
        let mut frame = Self::new(Command::DeleteFile);
        frame.data[DELETE_PATH_LEN_OFFSET] = path.len() as u8;
        frame.data.extend_from_slice(&path);
        Ok(frame)
    }

    /// Get the command type.
    pub fn command(&self) -> Command {
        self.cmd
    }

    /// Message type byte.
    pub fn msg_type(&self) -> u8 {
        self.cmd.msg_type()
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Wrap the payload in a request frame.
    pub fn into_frame(self) -> Frame {
        Frame::request(self.cmd.msg_type(), self.data)
    }

    /// Build the complete frame data.
    pub fn build(&self) -> Vec<u8> {
        Frame::request(self.cmd.msg_type(), self.data.clone()).build()
    }
}

/// Narrow-encode a path and check that its length fits the length fields.
fn encode_path(path: &str) -> Result<Vec<u8>> {
    let encoded = codec::narrow_encode(path)?;
    if encoded.len() > MAX_ENCODED_PATH_LEN {
        return Err(Error::InvalidPath(format!(
            "{path}: encoded path is {} bytes, at most {MAX_ENCODED_PATH_LEN} allowed",
            encoded.len()
        )));
    }
    Ok(encoded)
}
