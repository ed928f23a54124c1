//! Response reading.
//!
//! Replies carry no terminator the host could wait for, and a listing is
//! several frames sent back to back. A reply is therefore considered
//! complete once the link has gone quiet.

use {
    crate::{
        error::{Error, Result},
        port::Port,
    },
    log::trace,
    std::{
        io::{self, Read},
        thread,
        time::{Duration, Instant},
    },
};

/// Default quiet period ending a reply.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Default bound on the wait for the first reply byte.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on the size of one reply.
pub const DEFAULT_MAX_RESPONSE_LEN: usize = 1024 * 1024;

const CHUNK_SIZE: usize = 64;

/// Strategy that collects one complete reply from the port.
pub trait ResponseReader: Send {
    /// Read one reply.
    fn read_response(&mut self, port: &mut dyn Port) -> Result<Vec<u8>>;
}

/// Reads until the port reports no pending bytes twice, a quiet period
/// apart.
#[derive(Debug, Clone)]
pub struct QuiescenceReader {
    quiet_period: Duration,
    response_timeout: Duration,
    max_len: usize,
}

impl Default for QuiescenceReader {
    fn default() -> Self {
        Self::new(
            DEFAULT_QUIET_PERIOD,
            DEFAULT_RESPONSE_TIMEOUT,
            DEFAULT_MAX_RESPONSE_LEN,
        )
    }
}

impl QuiescenceReader {
    /// Create a reader with explicit limits.
    pub fn new(quiet_period: Duration, response_timeout: Duration, max_len: usize) -> Self {
        Self {
            quiet_period,
            response_timeout,
            max_len,
        }
    }

    /// Whether the link stays silent for a full quiet period.
    fn is_quiet(&self, port: &mut dyn Port) -> Result<bool> {
        if port.bytes_to_read()? > 0 {
            return Ok(false);
        }
        thread::sleep(self.quiet_period);
        Ok(port.bytes_to_read()? == 0)
    }
}

impl ResponseReader for QuiescenceReader {
    fn read_response(&mut self, port: &mut dyn Port) -> Result<Vec<u8>> {
        let started = Instant::now();
        let mut buf = Vec::new();
        let mut chunk = [0u8; CHUNK_SIZE];

        loop {
            match port.read(&mut chunk) {
                Ok(0) => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("link closed after {} reply bytes", buf.len()),
                    )));
                },
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.len() > self.max_len {
                        return Err(Error::Protocol(format!(
                            "reply exceeds {} bytes",
                            self.max_len
                        )));
                    }
                    if self.is_quiet(port)? {
                        break;
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    if buf.is_empty() {
                        if started.elapsed() >= self.response_timeout {
                            return Err(Error::Timeout(format!(
                                "no reply within {:?}",
                                self.response_timeout
                            )));
                        }
                    } else if self.is_quiet(port)? {
                        break;
                    }
                },
                Err(e) => return Err(e.into()),
            }
        }

        trace!("Reply complete: {} bytes in {:?}", buf.len(), started.elapsed());
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;

    fn fast_reader() -> QuiescenceReader {
        QuiescenceReader::new(Duration::from_millis(2), Duration::from_millis(50), 1024)
    }

    #[test]
    fn test_reads_reply_split_across_chunks() {
        let reply: Vec<u8> = (0..200u8).collect();
        let mut port = MockPort::new().with_reply(vec![reply[..70].to_vec(), reply[70..].to_vec()]);
        port.release_next();

        let got = fast_reader().read_response(&mut port).unwrap();
        assert_eq!(got, reply);
    }

    #[test]
    fn test_eof_is_io_error() {
        let mut port = MockPort::new().with_eof_after(vec![0x19, 0x10]);
        port.release_next();

        let err = fast_reader().read_response(&mut port).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_silent_link_times_out() {
        let mut port = MockPort::new();
        let err = fast_reader().read_response(&mut port).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_oversized_reply_is_protocol_error() {
        let mut port = MockPort::new().with_reply(vec![vec![0xAA; 2048]]);
        port.release_next();

        let err = fast_reader().read_response(&mut port).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_next_reply_is_left_in_place() {
        let mut port = MockPort::new()
            .with_reply(vec![vec![1, 2, 3]])
            .with_reply(vec![vec![4, 5]]);
        port.release_next();
        assert_eq!(fast_reader().read_response(&mut port).unwrap(), vec![1, 2, 3]);
        port.release_next();
        assert_eq!(fast_reader().read_response(&mut port).unwrap(), vec![4, 5]);
    }
}
