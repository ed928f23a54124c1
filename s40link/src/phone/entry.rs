//! Directory entry records.
//!
//! Entry information arrives as a fixed-layout record. A file-info reply
//! holds one record, a directory listing holds several back to back. Each
//! record is itself a reply frame, so its length lives in the frame header:
//!
//! ```text
//! offset  size  field
//!      4     2  record length after the 6-byte header (BE)
//!     14     1  type flags (0x80 file, 0x40 directory)
//!     16     4  size (BE)
//!     20     2  year (BE)
//!     22     1  month (stored value, not normalized)
//!     23     1  day
//!     24     1  hour
//!     25     1  minute
//!     26     1  second
//!     36     2  name length in characters, terminator included (BE)
//!     38     *  name, narrow-encoded, (count * 2 - 2) bytes
//! ```

use {
    crate::{
        error::{Error, Result},
        protocol::{codec, frame},
    },
    chrono::{Months, NaiveDate, TimeDelta},
    std::{
        fmt,
        time::{Duration, SystemTime, UNIX_EPOCH},
    },
};

/// Offset of the type flags.
pub const TYPE_OFFSET: usize = 14;
/// Type flag marking a file.
pub const FILE_FLAG: u8 = 0x80;
/// Type flag marking a directory.
pub const DIRECTORY_FLAG: u8 = 0x40;

const SIZE_OFFSET: usize = 16;
const YEAR_OFFSET: usize = 20;
const MONTH_OFFSET: usize = 22;
const DAY_OFFSET: usize = 23;
const HOUR_OFFSET: usize = 24;
const MINUTE_OFFSET: usize = 25;
const SECOND_OFFSET: usize = 26;
const NAME_COUNT_OFFSET: usize = 36;
const NAME_OFFSET: usize = 38;

/// What a decoded record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// Neither (or both) flags set: an empty-directory marker or a missing path.
    Unusable,
}

/// Raw modification time fields of an entry.
///
/// The fields are kept exactly as stored on the phone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EntryTimestamp {
    /// Year.
    pub year: u16,
    /// Month as stored; composed as a 0-based month index.
    pub month: u8,
    /// Day of month.
    pub day: u8,
    /// Hour.
    pub hour: u8,
    /// Minute.
    pub minute: u8,
    /// Second.
    pub second: u8,
}

impl EntryTimestamp {
    /// Seconds since the Unix epoch (UTC).
    ///
    /// The fields are composed leniently: the month field is added to
    /// January of `year` as a count of months and the day to the first of
    /// that month, so out-of-range values roll over. Returns `None` only if
    /// the result leaves chrono's representable range.
    pub fn unix_timestamp(&self) -> Option<i64> {
        let date = NaiveDate::from_ymd_opt(i32::from(self.year), 1, 1)?
            .checked_add_months(Months::new(u32::from(self.month)))?
            .checked_add_signed(TimeDelta::days(i64::from(self.day) - 1))?;
        let seconds = i64::from(self.hour) * 3600
            + i64::from(self.minute) * 60
            + i64::from(self.second);
        let instant = date
            .and_hms_opt(0, 0, 0)?
            .checked_add_signed(TimeDelta::seconds(seconds))?;
        Some(instant.and_utc().timestamp())
    }

    /// The timestamp as a `SystemTime`, for file metadata.
    pub fn system_time(&self) -> Option<SystemTime> {
        let secs = self.unix_timestamp()?;
        if secs >= 0 {
            UNIX_EPOCH.checked_add(Duration::from_secs(secs.unsigned_abs()))
        } else {
            UNIX_EPOCH.checked_sub(Duration::from_secs(secs.unsigned_abs()))
        }
    }

    /// Date as `YYYY-MM-DD`, fields as stored.
    pub fn date_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// Time as `HH:MM:SS`.
    pub fn time_string(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl fmt::Display for EntryTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date_string(), self.time_string())
    }
}

/// Name, size and time of a usable entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EntryInfo {
    /// Entry name (last path component).
    pub name: String,
    /// Size in bytes (0 for directories on most firmware).
    pub size: u32,
    /// Modification time.
    pub timestamp: EntryTimestamp,
}

/// One decoded directory entry record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum DirectoryEntry {
    /// A file.
    File(EntryInfo),
    /// A directory.
    Directory(EntryInfo),
    /// Not an actionable entry; the raw type flags are kept.
    Unusable {
        /// Type flags as received.
        flags: u8,
    },
}

impl DirectoryEntry {
    /// Decode one record.
    ///
    /// Records with neither (or both) type flags set decode to
    /// [`DirectoryEntry::Unusable`] without touching the remaining fields.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let flags = codec::read_u8(bytes, TYPE_OFFSET)
            .map_err(|_| Error::Decode(format!("entry record too short ({} bytes)", bytes.len())))?;

        let is_file = flags & FILE_FLAG != 0;
        let is_dir = flags & DIRECTORY_FLAG != 0;
        if is_file == is_dir {
            return Ok(Self::Unusable { flags });
        }

        let info = EntryInfo::decode(bytes)?;
        Ok(if is_file {
            Self::File(info)
        } else {
            Self::Directory(info)
        })
    }

    /// The entry kind.
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::File(_) => EntryKind::File,
            Self::Directory(_) => EntryKind::Directory,
            Self::Unusable { .. } => EntryKind::Unusable,
        }
    }

    /// Name, size and time, for usable entries.
    pub fn info(&self) -> Option<&EntryInfo> {
        match self {
            Self::File(info) | Self::Directory(info) => Some(info),
            Self::Unusable { .. } => None,
        }
    }

    /// Entry name, for usable entries.
    pub fn name(&self) -> Option<&str> {
        self.info().map(|i| i.name.as_str())
    }

    /// Whether this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Whether this is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Whether this entry describes an actual file or directory.
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Unusable { .. })
    }
}

impl EntryInfo {
    fn decode(bytes: &[u8]) -> Result<Self> {
        let truncated = |e: Error| Error::Decode(format!("truncated entry record: {e}"));

        let size = codec::u32_be(bytes, SIZE_OFFSET).map_err(truncated)?;
        let timestamp = EntryTimestamp {
            year: codec::u16_be(bytes, YEAR_OFFSET).map_err(truncated)?,
            month: codec::read_u8(bytes, MONTH_OFFSET).map_err(truncated)?,
            day: codec::read_u8(bytes, DAY_OFFSET).map_err(truncated)?,
            hour: codec::read_u8(bytes, HOUR_OFFSET).map_err(truncated)?,
            minute: codec::read_u8(bytes, MINUTE_OFFSET).map_err(truncated)?,
            second: codec::read_u8(bytes, SECOND_OFFSET).map_err(truncated)?,
        };
        let count = usize::from(codec::u16_be(bytes, NAME_COUNT_OFFSET).map_err(truncated)?);
        let name_len = (count * codec::NARROW_CHAR_WIDTH).saturating_sub(codec::NARROW_CHAR_WIDTH);
        let name = codec::narrow_decode(bytes, NAME_OFFSET, name_len).map_err(truncated)?;

        Ok(Self {
            name,
            size,
            timestamp,
        })
    }
}

/// Decode a listing reply: records back to back, each `6 + length` bytes
/// with `length` read 4 bytes into the record.
pub fn decode_listing(buf: &[u8]) -> Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let length = codec::u16_be(buf, offset + frame::LENGTH_OFFSET).map_err(|_| {
            Error::Decode(format!(
                "listing ends with {} stray bytes at offset {offset}",
                buf.len() - offset
            ))
        })?;
        let record_len = frame::HEADER_LEN + usize::from(length);
        let record = codec::slice(buf, offset, record_len).map_err(|_| {
            Error::Decode(format!(
                "listing record at offset {offset} declares {record_len} bytes, {} present",
                buf.len() - offset
            ))
        })?;
        entries.push(DirectoryEntry::decode(record)?);
        offset += record_len;
    }

    Ok(entries)
}
