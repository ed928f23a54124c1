//! Bluetooth target addressing.

use {
    crate::error::{Error, Result},
    std::{fmt, str::FromStr},
};

/// A Bluetooth hardware address, written as 12 hexadecimal digits
/// (e.g. `001122334455`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BtAddress([u8; 6]);

impl BtAddress {
    /// Parse an address of exactly 12 hexadecimal digits, no separators.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Connect(format!(
                "invalid bluetooth hardware address '{s}' (expected 12 hex digits)"
            )));
        }
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|e| Error::Connect(format!("invalid bluetooth hardware address: {e}")))?;
        }
        Ok(Self(bytes))
    }

    /// Raw address bytes, most significant first.
    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for BtAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// An RFCOMM endpoint on the phone: address plus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BtTarget {
    /// Hardware address of the phone.
    pub address: BtAddress,
    /// RFCOMM channel.
    pub channel: u8,
}

impl BtTarget {
    /// Validate an address string and a channel number.
    ///
    /// Negative channels (the "not configured" value of many front ends)
    /// and channels that do not fit RFCOMM's byte are rejected.
    pub fn new(address: &str, channel: i32) -> Result<Self> {
        let address = BtAddress::parse(address)?;
        let channel = u8::try_from(channel)
            .map_err(|_| Error::Connect(format!("no or wrong channel specified ({channel})")))?;
        Ok(Self { address, channel })
    }
}

impl fmt::Display for BtTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} channel {}", self.address, self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_address() {
        let addr = BtAddress::parse("001122AaBbCc").unwrap();
        assert_eq!(addr.bytes(), [0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC]);
        assert_eq!(addr.to_string(), "00:11:22:AA:BB:CC");
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        for bad in ["", "00112233445", "0011223344556", "00:11:22:33:44:55", "00112233445G"] {
            assert!(
                matches!(BtAddress::parse(bad), Err(Error::Connect(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_target_channel_validation() {
        assert!(BtTarget::new("001122334455", 15).is_ok());
        assert!(BtTarget::new("001122334455", 0).is_ok());
        assert!(matches!(
            BtTarget::new("001122334455", -1),
            Err(Error::Connect(_))
        ));
        assert!(matches!(
            BtTarget::new("001122334455", 256),
            Err(Error::Connect(_))
        ));
    }

    #[test]
    fn test_from_str() {
        let addr: BtAddress = "AABBCCDDEEFF".parse().unwrap();
        assert_eq!(addr.bytes()[5], 0xFF);
    }
}
