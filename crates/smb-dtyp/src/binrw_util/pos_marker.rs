//! [`PosMarker`] - deferred offset/size fields for binrw structs.

use std::cell::Cell;
use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian};

/// A numeric wire field whose final value is only known once data later in
/// the stream has been written - offsets and byte counts, mostly.
///
/// Writing a `PosMarker` emits its current `value` (usually a placeholder
/// zero, via `#[bw(calc = PosMarker::default())]`) and remembers the field's
/// own position. The `write_*` associated functions are then attached to the
/// data field with `#[bw(write_with = ...)]`; they write the data, and patch
/// the remembered position with the data's absolute offset and/or length.
///
/// Offsets are absolute within the stream. SMB2 offsets are relative to the
/// start of the message header, so full messages are encoded into a stream
/// whose position 0 is the header start, and the two notions coincide.
#[derive(Debug, Clone)]
pub struct PosMarker<T> {
    pub value: T,
    pos: Cell<u64>,
}

impl<T> PosMarker<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            pos: Cell::new(0),
        }
    }
}

impl<T: Default> Default for PosMarker<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: PartialEq> PartialEq for PosMarker<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for PosMarker<T> {}

impl<T> BinRead for PosMarker<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let value = T::read_options(reader, endian, ())?;
        Ok(Self {
            value,
            pos: Cell::new(pos),
        })
    }
}

impl<T> BinWrite for PosMarker<T>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.pos.set(writer.stream_position()?);
        self.value.write_options(writer, endian, ())
    }
}

impl<T> PosMarker<T>
where
    T: TryFrom<u64> + for<'a> BinWrite<Args<'a> = ()>,
{
    /// Overwrites the marker's placeholder with `value`, restoring the
    /// stream position afterwards.
    fn patch<W: Write + Seek>(&self, value: u64, writer: &mut W, endian: Endian) -> BinResult<()> {
        let return_to = writer.stream_position()?;
        let narrowed = T::try_from(value).map_err(|_| binrw::Error::AssertFail {
            pos: self.pos.get(),
            message: format!("PosMarker value {value} does not fit the field type"),
        })?;
        writer.seek(SeekFrom::Start(self.pos.get()))?;
        narrowed.write_options(writer, endian, ())?;
        writer.seek(SeekFrom::Start(return_to))?;
        Ok(())
    }

    /// `write_with` helper: writes `value`, then patches the marker with the
    /// absolute offset at which `value` begins.
    pub fn write_aoff<U, W>(
        value: &U,
        writer: &mut W,
        endian: Endian,
        args: (&PosMarker<T>,),
    ) -> BinResult<()>
    where
        U: BinWrite,
        for<'a> <U as BinWrite>::Args<'a>: Default,
        W: Write + Seek,
    {
        let start = writer.stream_position()?;
        value.write_options(writer, endian, Default::default())?;
        args.0.patch(start, writer, endian)
    }

    /// `write_with` helper: writes `value`, then patches the marker with the
    /// number of bytes written.
    pub fn write_size<U, W>(
        value: &U,
        writer: &mut W,
        endian: Endian,
        args: (&PosMarker<T>,),
    ) -> BinResult<()>
    where
        U: BinWrite,
        for<'a> <U as BinWrite>::Args<'a>: Default,
        W: Write + Seek,
    {
        let start = writer.stream_position()?;
        value.write_options(writer, endian, Default::default())?;
        let end = writer.stream_position()?;
        args.0.patch(end - start, writer, endian)
    }

    /// `write_with` helper: writes `value`, patching the first marker with
    /// the absolute offset of the data and the second with its length.
    pub fn write_aoff_size<U, S, W>(
        value: &U,
        writer: &mut W,
        endian: Endian,
        args: (&PosMarker<T>, &PosMarker<S>),
    ) -> BinResult<()>
    where
        U: BinWrite,
        for<'a> <U as BinWrite>::Args<'a>: Default,
        S: TryFrom<u64> + for<'a> BinWrite<Args<'a> = ()>,
        W: Write + Seek,
    {
        let start = writer.stream_position()?;
        value.write_options(writer, endian, Default::default())?;
        let end = writer.stream_position()?;
        args.0.patch(start, writer, endian)?;
        args.1.patch(end - start, writer, endian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[binrw::binwrite]
    struct OffsetAndBlob {
        #[bw(calc = PosMarker::default())]
        offset: PosMarker<u16>,
        #[bw(try_calc = blob.len().try_into())]
        _length: u16,
        #[bw(write_with = PosMarker::write_aoff, args(&offset))]
        blob: Vec<u8>,
    }

    #[test]
    fn test_write_aoff_patches_offset() {
        let mut cursor = Cursor::new(Vec::new());
        OffsetAndBlob {
            blob: vec![0xaa, 0xbb],
        }
        .write_le(&mut cursor)
        .unwrap();
        // offset (4) little-endian, length 2, then the blob itself.
        assert_eq!(vec![0x04, 0x00, 0x02, 0x00, 0xaa, 0xbb], cursor.into_inner());
    }

    #[binrw::binwrite]
    struct SizedBlob {
        #[bw(calc = PosMarker::default())]
        size: PosMarker<u32>,
        #[bw(write_with = PosMarker::write_size, args(&size))]
        blob: Vec<u8>,
    }

    #[test]
    fn test_write_size_patches_length() {
        let mut cursor = Cursor::new(Vec::new());
        SizedBlob {
            blob: vec![1, 2, 3],
        }
        .write_le(&mut cursor)
        .unwrap();
        assert_eq!(vec![0x03, 0x00, 0x00, 0x00, 1, 2, 3], cursor.into_inner());
    }
}
