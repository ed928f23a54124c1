//! High-level file system operations on a connected phone.
//!
//! [`Phone`] wraps a [`Session`] and turns catalog commands into file
//! operations: identity, listing, fetching, storing and deleting files.
//! Every operation is a sequence of independent exchanges; the session lock
//! is taken per exchange, not per operation.

pub mod entry;
mod transfer;
mod tree;

use {
    crate::{
        error::{Error, Result},
        port::Port,
        protocol::{CommandFrame, FileHandle, codec, command::reply},
        session::{PhoneInfo, Session},
    },
    log::{debug, info},
};

pub use {
    entry::{DirectoryEntry, EntryInfo, EntryKind, EntryTimestamp, decode_listing},
    transfer::{block_count, wanted_len},
};

/// Device identity: handshake details plus IMEI.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PhoneIdentity {
    /// Firmware version, date and model.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub info: PhoneInfo,
    /// International Mobile Equipment Identity.
    pub imei: String,
}

/// A phone reachable through an open session.
pub struct Phone<P: Port> {
    session: Session<P>,
}

impl<P: Port> Phone<P> {
    /// Wrap an open session.
    pub fn new(session: Session<P>) -> Self {
        Self { session }
    }

    /// The underlying session.
    pub fn session(&self) -> &Session<P> {
        &self.session
    }

    /// Give back the session.
    pub fn into_session(self) -> Session<P> {
        self.session
    }

    /// Close the session.
    pub fn close(&self) -> Result<()> {
        self.session.close()
    }

    /// Firmware details and IMEI.
    pub fn identify(&self) -> Result<PhoneIdentity> {
        let reply_bytes = self.session.exchange(&CommandFrame::imei())?;
        let imei = reply_bytes
            .get(reply::IMEI_OFFSET..)
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| {
                Error::Protocol(format!("IMEI reply too short ({} bytes)", reply_bytes.len()))
            })?;
        let imei = String::from_utf8_lossy(&imei[..imei.len().min(reply::IMEI_LEN)])
            .trim_end_matches(['\0', ' '])
            .to_string();

        Ok(PhoneIdentity {
            info: self.session.info().clone(),
            imei,
        })
    }

    /// Reboot the phone. The session is closed afterwards.
    pub fn reboot(&self) -> Result<()> {
        info!("Rebooting phone");
        self.session.exchange(&CommandFrame::reset())?;
        self.session.close()
    }

    /// Query the entry at `path`.
    pub fn entry_info(&self, path: &str) -> Result<DirectoryEntry> {
        let reply_bytes = self.session.exchange(&CommandFrame::file_info(path)?)?;
        DirectoryEntry::decode(&reply_bytes)
    }

    /// List the directory `dir`.
    ///
    /// Returns every record the phone sent, including the unusable marker
    /// an empty directory is reported with.
    pub fn list(&self, dir: &str) -> Result<Vec<DirectoryEntry>> {
        let dir = dir_path(dir);
        if dir != "/" {
            let bare = &dir[..dir.len() - 1];
            match self.entry_info(bare)? {
                DirectoryEntry::Directory(_) => {},
                DirectoryEntry::File(_) => return Err(Error::NotADirectory(bare.to_string())),
                DirectoryEntry::Unusable { .. } => return Err(Error::NotFound(bare.to_string())),
            }
        }

        debug!("Listing {dir}");
        let reply_bytes = self
            .session
            .exchange(&CommandFrame::list_directory(&dir)?)?;
        decode_listing(&reply_bytes)
    }

    /// Delete the file at `path`.
    pub fn delete(&self, path: &str) -> Result<()> {
        match self.entry_info(path)? {
            DirectoryEntry::File(_) => {},
            DirectoryEntry::Directory(_) => return Err(Error::IsDirectory(path.to_string())),
            DirectoryEntry::Unusable { .. } => return Err(Error::NotFound(path.to_string())),
        }
        info!("Deleting {path}");
        self.session.exchange(&CommandFrame::delete_file(path)?)?;
        Ok(())
    }

    /// The file at `path`, which must exist.
    fn file_info(&self, path: &str) -> Result<EntryInfo> {
        if path.ends_with('/') {
            return Err(Error::IsDirectory(path.to_string()));
        }
        match self.entry_info(path)? {
            DirectoryEntry::File(info) => Ok(info),
            DirectoryEntry::Directory(_) => Err(Error::IsDirectory(path.to_string())),
            DirectoryEntry::Unusable { .. } => Err(Error::NotFound(path.to_string())),
        }
    }

    fn open(&self, command: &CommandFrame, path: &str) -> Result<FileHandle> {
        let reply_bytes = self.session.exchange(command)?;
        let handle = codec::u16_be(&reply_bytes, reply::HANDLE_OFFSET)
            .map_err(|_| Error::Transfer(format!("phone refused to open {path}")))?;
        let handle = FileHandle(handle);
        debug!("Opened {path} as {handle}");
        Ok(handle)
    }

    fn close_file(&self, handle: FileHandle) -> Result<()> {
        self.session.exchange(&CommandFrame::close_file(handle))?;
        debug!("Closed {handle}");
        Ok(())
    }

    /// Close `handle` after a transfer.
    ///
    /// A failed transfer keeps its own error; the close is attempted anyway.
    fn finish<T>(&self, handle: FileHandle, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.close_file(handle)?;
                Ok(value)
            },
            Err(e) => {
                if let Err(close_err) = self.close_file(handle) {
                    debug!("Closing {handle} after failure also failed: {close_err}");
                }
                Err(e)
            },
        }
    }
}

/// `dir` with exactly one trailing `/`.
fn dir_path(dir: &str) -> String {
    let trimmed = dir.trim_end_matches('/');
    format!("{trimmed}/")
}

/// Join a directory and an entry name.
fn child_path(dir: &str, name: &str) -> String {
    format!("{}{name}", dir_path(dir))
}
