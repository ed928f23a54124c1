//! Serial link framing.
//!
//! ## Frame Format
//!
//! ```text
//! +------+-----------+------+--------+---------------+
//! | Sync | Direction | Type | Length |    Payload    |
//! +------+-----------+------+--------+---------------+
//! |  1   |     2     |  1   | 2 (BE) |   variable    |
//! +------+-----------+------+--------+---------------+
//! | 0x19 | 00 10 (>) | type |  len   |   payload     |
//! |      | 10 00 (<) |      |        |               |
//! +------+-----------+------+--------+---------------+
//! ```
//!
//! Requests travel host -> phone with direction `00 10`, replies come back
//! with `10 00`. There is no checksum and no sequence number.

use {
    crate::{
        error::{Error, Result},
        protocol::codec,
    },
    byteorder::{BigEndian, WriteBytesExt},
};

/// Sync byte that starts every frame.
pub const SYNC: u8 = 0x19;

/// Size of the fixed header (sync + direction + type + length).
pub const HEADER_LEN: usize = 6;

/// Offset of the big-endian payload length inside a frame.
pub const LENGTH_OFFSET: usize = 4;

/// Direction marker of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to phone (`00 10`).
    Request,
    /// Phone to host (`10 00`).
    Response,
}

impl Direction {
    /// The two marker bytes following the sync byte.
    pub fn marker(self) -> [u8; 2] {
        match self {
            Self::Request => [0x00, 0x10],
            Self::Response => [0x10, 0x00],
        }
    }

    fn from_marker(marker: [u8; 2]) -> Option<Self> {
        match marker {
            [0x00, 0x10] => Some(Self::Request),
            [0x10, 0x00] => Some(Self::Response),
            _ => None,
        }
    }
}

/// A single header-delimited message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Direction marker.
    pub direction: Direction,
    /// Message type byte.
    pub msg_type: u8,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a host-to-phone frame.
    pub fn request(msg_type: u8, payload: Vec<u8>) -> Self {
        Self {
            direction: Direction::Request,
            msg_type,
            payload,
        }
    }

    /// Create a phone-to-host frame.
    pub fn response(msg_type: u8, payload: Vec<u8>) -> Self {
        Self {
            direction: Direction::Response,
            msg_type,
            payload,
        }
    }

    /// Build the complete frame data.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn build(&self) -> Vec<u8> {
        // Payloads are bounded by the path length checks in the command
        // catalog and the 256-byte block size, far below 64KB.
        debug_assert!(self.payload.len() <= usize::from(u16::MAX));

        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(SYNC);
        buf.extend_from_slice(&self.direction.marker());
        buf.push(self.msg_type);
        buf.write_u16::<BigEndian>(self.payload.len() as u16)
            .unwrap();
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Total encoded size of this frame.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Parse one frame from the start of `data`.
    ///
    /// Returns the frame and the number of bytes it occupied; anything after
    /// that belongs to the next frame.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < HEADER_LEN {
            return Err(Error::Decode(format!(
                "frame header needs {HEADER_LEN} bytes, got {}",
                data.len()
            )));
        }
        if data[0] != SYNC {
            return Err(Error::Decode(format!(
                "bad sync byte 0x{:02X}",
                data[0]
            )));
        }
        let direction = Direction::from_marker([data[1], data[2]]).ok_or_else(|| {
            Error::Decode(format!(
                "bad direction marker {:02X} {:02X}",
                data[1], data[2]
            ))
        })?;
        let msg_type = data[3];
        let len = usize::from(codec::u16_be(data, LENGTH_OFFSET)?);
        let payload = codec::slice(data, HEADER_LEN, len)
            .map_err(|_| {
                Error::Decode(format!(
                    "frame declares {len} payload bytes, only {} present",
                    data.len() - HEADER_LEN
                ))
            })?
            .to_vec();

        Ok((
            Self {
                direction,
                msg_type,
                payload,
            },
            HEADER_LEN + len,
        ))
    }
}

/// Split a buffer holding several concatenated frames.
///
/// Fails if the buffer ends inside a frame.
pub fn split_frames(mut data: &[u8]) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    while !data.is_empty() {
        let (frame, used) = Frame::parse(data)?;
        frames.push(frame);
        data = &data[used..];
    }
    Ok(frames)
}
