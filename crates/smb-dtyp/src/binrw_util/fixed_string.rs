//! [`FixedWideString`] - zero-padded, fixed-capacity UTF-16LE strings.

use std::fmt::Display;
use std::io::{Read, Seek, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian};

/// A UTF-16LE string stored in a fixed `N`-code-unit field, zero-padded.
/// Used for 8.3 short names, which occupy 12 units (24 bytes) on the wire
/// regardless of their actual length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWideString<const N: usize> {
    units: [u16; N],
}

impl<const N: usize> FixedWideString<N> {
    /// Length of the contained string in bytes, excluding padding.
    pub fn size(&self) -> u8 {
        (self.units.iter().take_while(|&&u| u != 0).count() * 2) as u8
    }

    pub fn is_empty(&self) -> bool {
        self.units[0] == 0
    }
}

impl<const N: usize> Default for FixedWideString<N> {
    fn default() -> Self {
        Self { units: [0; N] }
    }
}

impl<const N: usize> BinRead for FixedWideString<N> {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let mut units = [0u16; N];
        let mut unit = [0u8; 2];
        for slot in units.iter_mut() {
            reader.read_exact(&mut unit)?;
            *slot = u16::from_le_bytes(unit);
        }
        Ok(Self { units })
    }
}

impl<const N: usize> BinWrite for FixedWideString<N> {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        for unit in self.units {
            writer.write_all(&unit.to_le_bytes())?;
        }
        Ok(())
    }
}

impl<const N: usize> From<&str> for FixedWideString<N> {
    /// Truncates to the field capacity.
    fn from(value: &str) -> Self {
        let mut units = [0u16; N];
        for (slot, unit) in units.iter_mut().zip(value.encode_utf16()) {
            *slot = unit;
        }
        Self { units }
    }
}

impl<const N: usize> Display for FixedWideString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used: Vec<u16> = self.units.iter().copied().take_while(|&u| u != 0).collect();
        String::from_utf16_lossy(&used).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smb_tests::*;

    type ShortName = FixedWideString<12>;

    test_binrw! {
        ShortName => short_name: ShortName::from("REPORT~1.DOC")
            => "5200450050004f00520054007e0031002e0044004f004300"
    }

    test_binrw! {
        ShortName => short_name_padded: ShortName::from("A.TXT")
            => "41002e005400580054000000000000000000000000000000"
    }

    #[test]
    fn test_size_excludes_padding() {
        assert_eq!(10, ShortName::from("A.TXT").size());
        assert_eq!(0, ShortName::default().size());
    }
}
