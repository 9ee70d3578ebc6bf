//! [`ChainedItemList`] - sequences of entries linked by a `NextEntryOffset`
//! field.
//!
//! Many FSCC structures (directory enumerations, EA lists, change
//! notifications) encode a list as records that each begin with a 32-bit
//! offset to the next record; the final record carries offset zero.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use binrw::{Endian, prelude::*};

/// Size of the `NextEntryOffset` field preceding each entry's payload.
pub const CHAINED_ITEM_PREFIX_SIZE: usize = size_of::<u32>();

const DEFAULT_OFFSET_PAD: u32 = 4;

/// A list of `T` records chained by `NextEntryOffset` fields.
///
/// Every record except the last is padded so the following record starts on
/// an `OFFSET_PAD`-byte boundary; the last record is written unpadded with a
/// zero next-offset. An empty byte range decodes as an empty list.
#[derive(Debug, PartialEq, Eq)]
pub struct ChainedItemList<T, const OFFSET_PAD: u32 = DEFAULT_OFFSET_PAD> {
    values: Vec<T>,
}

impl<T, const OFFSET_PAD: u32> ChainedItemList<T, OFFSET_PAD> {
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

fn align_up(value: usize, pad: u32) -> usize {
    let pad = pad as usize;
    value.div_ceil(pad) * pad
}

impl<T, const OFFSET_PAD: u32> BinWrite for ChainedItemList<T, OFFSET_PAD>
where
    T: BinWrite,
    for<'b> <T as BinWrite>::Args<'b>: Default,
{
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        for (i, item) in self.values.iter().enumerate() {
            // Entries are self-contained, so each payload can be staged in
            // its own buffer and the record length derived from it.
            let mut staged = Cursor::new(Vec::new());
            item.write_options(&mut staged, endian, Default::default())?;
            let payload = staged.into_inner();

            let record_len = CHAINED_ITEM_PREFIX_SIZE + payload.len();
            let last = i + 1 == self.values.len();
            let next_offset = if last { 0 } else { align_up(record_len, OFFSET_PAD) };

            (next_offset as u32).write_options(writer, endian, ())?;
            writer.write_all(&payload)?;
            if !last {
                let padding = next_offset - record_len;
                writer.write_all(&vec![0u8; padding])?;
            }
        }
        Ok(())
    }
}

impl<T, const OFFSET_PAD: u32> BinRead for ChainedItemList<T, OFFSET_PAD>
where
    T: BinRead,
    for<'b> <T as BinRead>::Args<'b>: Default,
{
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;
        if start == end {
            return Ok(Self { values: Vec::new() });
        }

        let mut values = Vec::new();
        loop {
            let record_start = reader.stream_position()?;
            let next_offset = u32::read_options(reader, endian, ())?;
            values.push(T::read_options(reader, endian, Default::default())?);
            if next_offset == 0 {
                return Ok(Self { values });
            }
            reader.seek(SeekFrom::Start(record_start + next_offset as u64))?;
        }
    }
}

impl<T, const OFFSET_PAD: u32> From<ChainedItemList<T, OFFSET_PAD>> for Vec<T> {
    fn from(value: ChainedItemList<T, OFFSET_PAD>) -> Self {
        value.values
    }
}

impl<T, const OFFSET_PAD: u32> From<Vec<T>> for ChainedItemList<T, OFFSET_PAD> {
    fn from(values: Vec<T>) -> Self {
        Self { values }
    }
}

impl<T, const OFFSET_PAD: u32> FromIterator<T> for ChainedItemList<T, OFFSET_PAD> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<T, const OFFSET_PAD: u32> std::ops::Deref for ChainedItemList<T, OFFSET_PAD> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl<T, const OFFSET_PAD: u32> Default for ChainedItemList<T, OFFSET_PAD> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}
