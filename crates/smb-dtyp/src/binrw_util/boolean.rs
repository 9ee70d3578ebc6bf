//! [`Boolean`] - single-byte boolean wire fields.

use binrw::{Endian, prelude::*};
use std::io::{Read, Seek, Write};

/// A boolean encoded as one byte. Any non-zero value decodes as `true`
/// (MS-FSCC 2.1.8); `true` always encodes as `0x01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Boolean(bool);

impl BinRead for Boolean {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        Ok(Boolean(u8::read_options(reader, Endian::Little, ())? != 0))
    }
}

impl BinWrite for Boolean {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        u8::from(self.0).write_options(writer, Endian::Little, ())
    }
}

impl From<bool> for Boolean {
    fn from(value: bool) -> Self {
        Boolean(value)
    }
}

impl From<Boolean> for bool {
    fn from(value: Boolean) -> Self {
        value.0
    }
}
