//! Integer and string conversions used on the wire.
//!
//! Integers are big-endian unless a function says otherwise. Strings use the
//! phone's narrow encoding: every character takes two bytes, the first one
//! is always zero and the second one carries the (Latin-1) character. An
//! encoded string ends with a `00 00` terminator, which is why decoders are
//! handed `count * 2 - 2` bytes for a `count` that includes the terminator.

use {
    crate::error::{Error, Result},
    byteorder::{BigEndian, ByteOrder, LittleEndian},
    std::fmt::Write as _,
};

/// Bytes per narrow-encoded character.
pub const NARROW_CHAR_WIDTH: usize = 2;

/// Borrow `len` bytes at `offset`, failing when the range is out of bounds.
pub fn slice(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| {
            Error::Decode(format!(
                "range {offset}..{} out of bounds for {} bytes",
                offset.saturating_add(len),
                bytes.len()
            ))
        })
}

/// Read a single byte.
pub fn read_u8(bytes: &[u8], offset: usize) -> Result<u8> {
    Ok(slice(bytes, offset, 1)?[0])
}

/// Read a big-endian `u16`.
pub fn u16_be(bytes: &[u8], offset: usize) -> Result<u16> {
    Ok(BigEndian::read_u16(slice(bytes, offset, 2)?))
}

/// Read a little-endian `u16`.
pub fn u16_le(bytes: &[u8], offset: usize) -> Result<u16> {
    Ok(LittleEndian::read_u16(slice(bytes, offset, 2)?))
}

/// Read a big-endian `u32`.
pub fn u32_be(bytes: &[u8], offset: usize) -> Result<u32> {
    Ok(BigEndian::read_u32(slice(bytes, offset, 4)?))
}

/// Read a big-endian `i32`.
pub fn i32_be(bytes: &[u8], offset: usize) -> Result<i32> {
    Ok(BigEndian::read_i32(slice(bytes, offset, 4)?))
}

/// Write a big-endian `u16` into an existing buffer.
pub fn put_u16_be(bytes: &mut [u8], offset: usize, value: u16) -> Result<()> {
    let end = offset + 2;
    let len = bytes.len();
    let target = bytes
        .get_mut(offset..end)
        .ok_or_else(|| Error::Decode(format!("range {offset}..{end} out of bounds for {len} bytes")))?;
    BigEndian::write_u16(target, value);
    Ok(())
}

/// Decode `len` bytes of narrow-encoded text starting at `offset`.
///
/// An odd trailing byte is ignored.
pub fn narrow_decode(bytes: &[u8], offset: usize, len: usize) -> Result<String> {
    let raw = slice(bytes, offset, len)?;
    Ok(raw
        .chunks_exact(NARROW_CHAR_WIDTH)
        .map(|unit| char::from(unit[1]))
        .collect())
}

/// Encode a string in the narrow encoding, including the `00 00` terminator.
///
/// Characters outside Latin-1 cannot be represented and are rejected.
pub fn narrow_encode(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity((text.len() + 1) * NARROW_CHAR_WIDTH);
    for c in text.chars() {
        let byte = u8::try_from(u32::from(c)).map_err(|_| {
            Error::InvalidPath(format!("character {c:?} cannot be sent to the phone"))
        })?;
        out.extend_from_slice(&[0x00, byte]);
    }
    out.extend_from_slice(&[0x00, 0x00]);
    Ok(out)
}

/// Render bytes as a classic 16-column hex dump for trace logging.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4);
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:04X}:", row * 16);
        for b in chunk {
            let _ = write!(out, " {b:02X}");
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push_str("  ");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}
