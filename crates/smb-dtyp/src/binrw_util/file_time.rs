//! [`FileTime`] - Windows FILETIME with conversions to the `time` crate.

use std::fmt::{Debug, Display};

use time::{OffsetDateTime, PrimitiveDateTime};

/// 100-nanosecond intervals between 1601-01-01 and the Unix epoch.
const UNIX_EPOCH_OFFSET: i128 = 116_444_736_000_000_000;

/// A 64-bit count of 100-nanosecond intervals since January 1, 1601 UTC.
///
/// [MS-DTYP 2.3.3](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-dtyp/2c57429b-fdd4-488f-b5fc-9e4cf020fcdf>)
#[binrw::binrw]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct FileTime {
    ticks: u64,
}

impl FileTime {
    /// The zero FILETIME, meaning "not set" in most structures.
    pub const ZERO: FileTime = FileTime { ticks: 0 };

    pub fn from_100ns(ticks: u64) -> Self {
        Self { ticks }
    }

    pub fn to_100ns(self) -> u64 {
        self.ticks
    }

    /// The current time.
    pub fn now() -> Self {
        OffsetDateTime::now_utc().into()
    }

    /// Converts to a UTC datetime. Values outside the representable range
    /// collapse to the Unix epoch.
    pub fn to_datetime(self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp_nanos((self.ticks as i128 - UNIX_EPOCH_OFFSET) * 100)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Converts from seconds + nanoseconds since the Unix epoch.
    pub fn from_unix(secs: i64, nanos: u32) -> Self {
        let total_nanos = secs as i128 * 1_000_000_000 + nanos as i128;
        Self {
            ticks: (total_nanos / 100 + UNIX_EPOCH_OFFSET).max(0) as u64,
        }
    }
}

impl From<OffsetDateTime> for FileTime {
    fn from(value: OffsetDateTime) -> Self {
        Self {
            ticks: (value.unix_timestamp_nanos() / 100 + UNIX_EPOCH_OFFSET).max(0) as u64,
        }
    }
}

impl From<PrimitiveDateTime> for FileTime {
    fn from(value: PrimitiveDateTime) -> Self {
        value.assume_utc().into()
    }
}

impl From<FileTime> for OffsetDateTime {
    fn from(value: FileTime) -> Self {
        value.to_datetime()
    }
}

impl Display for FileTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_datetime())
    }
}

impl Debug for FileTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileTime({} = {})", self.ticks, self.to_datetime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smb_tests::*;
    use time::macros::datetime;

    test_binrw! {
        FileTime => file_time: FileTime::from(datetime!(2024-12-11 12:32:31.7084985))
            => "397591bfc84bdb01"
    }

    #[test]
    fn test_unix_epoch_round_trip() {
        let ft = FileTime::from_unix(0, 0);
        assert_eq!(ft.to_100ns() as i128, UNIX_EPOCH_OFFSET);
        assert_eq!(OffsetDateTime::UNIX_EPOCH, ft.to_datetime());
    }

    #[test]
    fn test_datetime_round_trip() {
        let dt = datetime!(2025-06-19 10:22:45.5282237).assume_utc();
        assert_eq!(dt, FileTime::from(dt).to_datetime());
    }
}
