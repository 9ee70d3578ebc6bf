//! [`SizedWideString`] - UTF-16LE strings with an external byte count.

use std::fmt::Display;
use std::io::{Read, Seek, Write};
use std::ops::Deref;

use binrw::{BinRead, BinResult, BinWrite, Endian};

/// A UTF-16LE string whose length in bytes is carried by a separate wire
/// field. Reading takes the byte count as an argument; writing emits the raw
/// code units with no terminator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct SizedWideString(pub String);

impl SizedWideString {
    /// Size of the encoded string, in bytes.
    pub fn size(&self) -> u64 {
        self.0.encode_utf16().count() as u64 * 2
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl BinRead for SizedWideString {
    /// Byte count of the encoded string.
    type Args<'a> = (u64,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        (size,): Self::Args<'_>,
    ) -> BinResult<Self> {
        if size % 2 != 0 {
            return Err(binrw::Error::AssertFail {
                pos: reader.stream_position()?,
                message: format!("odd UTF-16 byte count {size}"),
            });
        }
        let mut units = Vec::with_capacity((size / 2) as usize);
        let mut unit = [0u8; 2];
        for _ in 0..size / 2 {
            reader.read_exact(&mut unit)?;
            units.push(u16::from_le_bytes(unit));
        }
        Ok(Self(String::from_utf16_lossy(&units)))
    }
}

impl BinWrite for SizedWideString {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        for unit in self.0.encode_utf16() {
            writer.write_all(&unit.to_le_bytes())?;
        }
        Ok(())
    }
}

impl From<&str> for SizedWideString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SizedWideString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<SizedWideString> for String {
    fn from(value: SizedWideString) -> Self {
        value.0
    }
}

impl Deref for SizedWideString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<&str> for SizedWideString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Display for SizedWideString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::{BinRead, BinWrite};
    use std::io::Cursor;

    #[test]
    fn test_write_utf16le() {
        let mut cursor = Cursor::new(Vec::new());
        SizedWideString::from("a.txt").write_le(&mut cursor).unwrap();
        assert_eq!(
            smb_tests::decode_hex("61002e00740078007400"),
            cursor.into_inner()
        );
    }

    #[test]
    fn test_read_with_size_arg() {
        let data = smb_tests::decode_hex("61002e00740078007400ffff");
        let mut cursor = Cursor::new(&data);
        let parsed = SizedWideString::read_le_args(&mut cursor, (10,)).unwrap();
        assert_eq!(parsed, "a.txt");
        // Trailing bytes beyond the advertised size stay unread.
        assert_eq!(10, cursor.position());
    }

    #[test]
    fn test_read_rejects_odd_size() {
        let data = [0u8; 4];
        let mut cursor = Cursor::new(&data[..]);
        assert!(SizedWideString::read_le_args(&mut cursor, (3,)).is_err());
    }
}
