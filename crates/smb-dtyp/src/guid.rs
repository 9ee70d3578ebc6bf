//! GUID implementation.
//!
//! [MS-DTYP 2.3.4](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-dtyp/4926e530-816e-41c2-b251-ec5c7aca018a>)

use binrw::prelude::*;
use std::fmt::Display;
use std::str::FromStr;

/// A 16-byte GUID, encoded on the wire with little-endian mixed fields
/// as defined by MS-DTYP 2.3.4.2.
#[binrw::binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl Guid {
    pub const GUID_SIZE: usize = 16;

    /// The all-zero GUID.
    pub const ZERO: Guid = Guid {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };
}

impl Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

/// Error parsing a GUID from its string form.
#[derive(Debug, thiserror::Error)]
#[error("invalid GUID string: {0}")]
pub struct GuidParseError(String);

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 5
            || parts[0].len() != 8
            || parts[1].len() != 4
            || parts[2].len() != 4
            || parts[3].len() != 4
            || parts[4].len() != 12
        {
            return Err(GuidParseError(s.to_string()));
        }

        let bad = |_| GuidParseError(s.to_string());
        let data1 = u32::from_str_radix(parts[0], 16).map_err(bad)?;
        let data2 = u16::from_str_radix(parts[1], 16).map_err(bad)?;
        let data3 = u16::from_str_radix(parts[2], 16).map_err(bad)?;

        let mut data4 = [0u8; 8];
        let tail: String = format!("{}{}", parts[3], parts[4]);
        for (i, chunk) in data4.iter_mut().enumerate() {
            *chunk = u8::from_str_radix(&tail[i * 2..i * 2 + 2], 16)
                .map_err(|_| GuidParseError(s.to_string()))?;
        }

        Ok(Guid {
            data1,
            data2,
            data3,
            data4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smb_tests::*;

    test_binrw! {
        Guid => guid: "70c8619e-165d-315e-d492-a01b0cbb3af2".parse::<Guid>().unwrap()
            => "9e61c8705d165e31d492a01b0cbb3af2"
    }

    #[test]
    fn test_guid_display_round_trip() {
        let text = "000005d1-000c-0000-1900-00000c000000";
        let guid: Guid = text.parse().unwrap();
        assert_eq!(text, guid.to_string());
    }

    #[test]
    fn test_guid_parse_rejects_garbage() {
        assert!("not-a-guid".parse::<Guid>().is_err());
        assert!("00000000-0000-0000-0000-00000000000".parse::<Guid>().is_err());
    }
}
