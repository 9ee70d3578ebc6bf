//! [`MultiWSz`] - a REG_MULTI_SZ-style list of null-terminated wide strings.

use std::io::{Read, Seek, Write};
use std::ops::{Deref, DerefMut};

use binrw::{Endian, NullWideString, prelude::*};

/// A sequence of null-terminated UTF-16LE strings, terminated by an empty
/// string (i.e. a second consecutive null), as in the Registry
/// `REG_MULTI_SZ` type and the snapshot enumeration FSCTL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiWSz(Vec<NullWideString>);

impl BinRead for MultiWSz {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let mut strings = Vec::new();
        loop {
            let string = NullWideString::read_options(reader, endian, ())?;
            if string.is_empty() {
                return Ok(MultiWSz(strings));
            }
            strings.push(string);
        }
    }
}

impl BinWrite for MultiWSz {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        for string in &self.0 {
            string.write_options(writer, endian, ())?;
        }
        // List terminator.
        NullWideString::default().write_options(writer, endian, ())
    }
}

impl Deref for MultiWSz {
    type Target = Vec<NullWideString>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for MultiWSz {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'a> FromIterator<&'a str> for MultiWSz {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        MultiWSz(iter.into_iter().map(NullWideString::from).collect())
    }
}
