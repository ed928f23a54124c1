//! Block transfers between the host and the phone.
//!
//! Files move in [`BLOCK_SIZE`] blocks. Reads ask for a full block except
//! for the last one, which asks for the remainder; the phone echoes the low
//! byte of the delivered length in every block reply.

use {
    super::{EntryInfo, Phone},
    crate::{
        error::{Error, Result},
        port::Port,
        protocol::{BLOCK_SIZE, CommandFrame, FileHandle, codec, command::reply},
    },
    log::{debug, info, warn},
    std::{
        io::{self, BufWriter, Read, Write},
        path::Path,
    },
    tempfile::NamedTempFile,
};

/// Largest number of blocks a block index can address.
const MAX_BLOCKS: usize = u16::MAX as usize + 1;

/// Number of blocks a file of `size` bytes occupies.
pub fn block_count(size: u32) -> usize {
    (size as usize).div_ceil(BLOCK_SIZE)
}

/// Bytes to request for block `index` of a file of `size` bytes.
///
/// All blocks but the last are full. The last one holds the remainder, or a
/// full block when the size is an exact multiple of the block size.
pub fn wanted_len(size: u32, index: usize) -> usize {
    let blocks = block_count(size);
    if index + 1 < blocks {
        return BLOCK_SIZE;
    }
    match size as usize % BLOCK_SIZE {
        0 => BLOCK_SIZE,
        rest => rest,
    }
}

/// Fill `buf` from `source`, stopping early only at end of input.
fn read_block(source: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<P: Port> Phone<P> {
    /// Fetch the file at `path` into `sink`.
    ///
    /// `progress` is called with (bytes done, total bytes) after every
    /// block. Returns the file's entry information.
    pub fn get(
        &self,
        path: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<EntryInfo> {
        let info = self.file_info(path)?;
        self.fetch(path, info, sink, progress)
    }

    fn fetch(
        &self,
        path: &str,
        info: EntryInfo,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<EntryInfo> {
        let blocks = block_count(info.size);
        if blocks > MAX_BLOCKS {
            return Err(Error::Transfer(format!(
                "{path}: file too large ({} bytes)",
                info.size
            )));
        }

        info!("Fetching {path} ({} bytes, {blocks} blocks)", info.size);
        let handle = self.open(&CommandFrame::open_read(path)?, path)?;
        let result = self.read_blocks(handle, &info, sink, progress);
        self.finish(handle, result)?;
        Ok(info)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_blocks(
        &self,
        handle: FileHandle,
        info: &EntryInfo,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<()> {
        let total = u64::from(info.size);
        let mut done = 0u64;

        for index in 0..block_count(info.size) {
            let wanted = wanted_len(info.size, index);
            // Both fit: index < MAX_BLOCKS and wanted <= BLOCK_SIZE
            let command = CommandFrame::read_block(handle, index as u16, wanted as u16);
            let reply_bytes = self.session.exchange(&command)?;

            let echoed = codec::read_u8(&reply_bytes, reply::BLOCK_LEN_OFFSET)
                .map_err(|_| Error::Transfer(format!("block {index}: reply too short")))?;
            if echoed != wanted as u8 {
                return Err(Error::Transfer(format!(
                    "block {index}: phone reports length byte 0x{echoed:02X}, wanted {wanted}"
                )));
            }
            let data = codec::slice(&reply_bytes, reply::BLOCK_DATA_OFFSET, wanted).map_err(|_| {
                Error::Transfer(format!(
                    "block {index}: wanted {wanted} bytes, reply holds {}",
                    reply_bytes.len().saturating_sub(reply::BLOCK_DATA_OFFSET)
                ))
            })?;

            sink.write_all(data)
                .map_err(|e| Error::Transfer(format!("local write failed: {e}")))?;
            done += wanted as u64;
            progress(done, total);
        }

        sink.flush()
            .map_err(|e| Error::Transfer(format!("local write failed: {e}")))
    }

    /// Fetch the file at `path` into memory.
    pub fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.get(path, &mut data, &mut |_, _| {})?;
        Ok(data)
    }

    /// Fetch the file at `path` into the local file `target` and give it
    /// the phone's modification time.
    ///
    /// Data lands in a temporary file next to `target`, which replaces
    /// `target` only once the whole file has arrived. A failed fetch leaves
    /// an existing `target` untouched.
    pub fn get_to_file(
        &self,
        path: &str,
        target: &Path,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<EntryInfo> {
        let info = self.file_info(path)?;

        let parent = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(parent).map_err(|e| {
            Error::Transfer(format!("cannot create a file in {}: {e}", parent.display()))
        })?;

        let mut writer = BufWriter::new(staged.as_file_mut());
        let info = self.fetch(path, info, &mut writer, progress)?;
        writer.into_inner().map_err(|e| {
            Error::Transfer(format!("cannot write {}: {}", target.display(), e.error()))
        })?;

        if let Some(mtime) = info.timestamp.system_time() {
            if let Err(e) = staged.as_file().set_modified(mtime) {
                warn!("Could not set modification time of {}: {e}", target.display());
            }
        }
        staged.persist(target).map_err(|e| {
            Error::Transfer(format!("cannot replace {}: {}", target.display(), e.error))
        })?;
        debug!("Wrote {}", target.display());
        Ok(info)
    }

    /// Store `source` as the file `path`, creating or replacing it.
    ///
    /// `progress` is called with the number of bytes sent after every block.
    /// Returns the number of bytes written.
    pub fn put(
        &self,
        path: &str,
        source: &mut dyn Read,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64> {
        if path.ends_with('/') {
            return Err(Error::IsDirectory(path.to_string()));
        }

        info!("Storing {path}");
        let handle = self.open(&CommandFrame::open_write(path)?, path)?;
        let result = self.write_blocks(handle, source, progress);
        let written = self.finish(handle, result)?;
        debug!("Stored {written} bytes to {path}");
        Ok(written)
    }

    fn write_blocks(
        &self,
        handle: FileHandle,
        source: &mut dyn Read,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64> {
        let mut buf = [0u8; BLOCK_SIZE];
        let mut written = 0u64;

        loop {
            let n = read_block(source, &mut buf)
                .map_err(|e| Error::Transfer(format!("local read failed: {e}")))?;
            if n == 0 {
                break;
            }
            self.session
                .exchange(&CommandFrame::write_block(handle, &buf[..n]))?;
            written += n as u64;
            progress(written);
        }

        Ok(written)
    }

    /// Store `data` as the file `path`.
    pub fn put_bytes(&self, path: &str, data: &[u8]) -> Result<u64> {
        let mut source = data;
        self.put(path, &mut source, &mut |_| {})
    }
}
