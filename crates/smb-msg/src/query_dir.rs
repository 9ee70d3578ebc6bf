//! Directory enumeration messages.

use std::io::SeekFrom;

use binrw::io::TakeSeekExt;
use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;
use smb_fscc::QueryDirectoryInfoClass;

use super::FileId;

/// SMB2 QUERY_DIRECTORY request.
///
/// Reference: MS-SMB2 2.2.33
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct QueryDirectoryRequest {
    #[bw(calc = 33)]
    #[br(temp)]
    #[br(assert(_structure_size == 33))]
    _structure_size: u16,
    /// Format of the returned entries.
    pub file_information_class: QueryDirectoryInfoClass,
    pub flags: QueryDirectoryFlags,
    /// Resume index; only meaningful with `index_specified`.
    pub file_index: u32,
    /// The directory open to enumerate.
    pub file_id: FileId,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    file_name_offset: PosMarker<u16>,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    file_name_length: u16,
    /// Maximum bytes of entries in the response.
    pub output_buffer_length: u32,
    /// Search pattern; DOS wildcards per MS-CIFS 2.2.1.1.3.
    #[br(seek_before = SeekFrom::Start(file_name_offset.value as u64))]
    #[br(args(file_name_length as u64))]
    #[bw(write_with = PosMarker::write_aoff, args(&file_name_offset))]
    pub file_name: SizedWideString,
}

/// QUERY_DIRECTORY processing flags.
///
/// Reference: MS-SMB2 2.2.33
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct QueryDirectoryFlags {
    /// Restart the enumeration from the beginning.
    pub restart_scans: bool,
    /// Return only the first matching entry.
    pub return_single_entry: bool,
    /// Resume from the byte index in `file_index`.
    pub index_specified: bool,
    /// Restart and change the search pattern.
    pub reopen: bool,
    #[skip]
    __: B4,
}

/// SMB2 QUERY_DIRECTORY response. The buffer holds a chain of
/// FILE_*_INFORMATION records in the class requested.
///
/// Reference: MS-SMB2 2.2.34
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct QueryDirectoryResponse {
    #[bw(calc = 9)]
    #[br(temp)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    output_buffer_offset: PosMarker<u16>,
    #[bw(try_calc = output_buffer.len().try_into())]
    #[br(temp)]
    output_buffer_length: u32,
    /// Encoded directory entries.
    #[br(seek_before = SeekFrom::Start(output_buffer_offset.value as u64))]
    #[br(map_stream = |s| s.take_seek(output_buffer_length as u64), parse_with = binrw::helpers::until_eof)]
    #[bw(write_with = PosMarker::write_aoff, args(&output_buffer_offset))]
    pub output_buffer: Vec<u8>,
}

impl QueryDirectoryResponse {
    /// Parses the output buffer as a chain of `T` records.
    pub fn read_output<T>(&self) -> BinResult<Vec<T>>
    where
        T: BinRead + BinWrite,
        for<'a> <T as BinRead>::Args<'a>: Default,
        for<'b> <T as BinWrite>::Args<'b>: Default,
    {
        let mut cursor = std::io::Cursor::new(&self.output_buffer);
        Ok(smb_fscc::ChainedItemList::<
            T,
            { QueryDirectoryInfoClass::CHAINED_ALIGNMENT },
        >::read_le(&mut cursor)?
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smb_fscc::{FileAttributes, FileIdBothDirectoryInformation, FileName83};
    use smb_tests::*;
    use time::macros::datetime;

    // Listing of a small directory, captured from a Windows server.
    const ID_BOTH_LISTING: &str = "\
        7000000000000000397591bfc84bdb01e7b848cdc85ddb01e71bedd46a58db01e71bedd46a58db010000000000000000\
        000000000000000010000000020000000000000000000000000000000000000000000000000000000000000000000000\
        7b800000000002002e0000000000000070000000000000003c083896ae4bdb01106a874b495ddb01620ccdc1c84bdb01\
        620ccdc1c84bdb0100000000000000000000000000000000100000000400000000000000000000000000000000000000\
        000000000000000000000000000000002ae70100000004002e002e000000000078000000000000005b6c44ce6a58db01\
        5b6c44ce6a58db015b6c44ce6a58db015fd9d5ce6a58db0100000000000000000000000000000000200000000a000000\
        0000000000000000000000000000000000000000000000000000000000000000f0a4000000000a0061002e0074007800\
        74000000000000007800000000000000d8ceeccf6a58db017e0c17d96a58db017e0c17d96a58db017e0c17d96a58db01\
        06000000000000000800000000000000200000000a000000000000000000000000000000000000000000000000000000\
        0000000000000000b9f800000000040062002e007400780074000000000000007800000000000000578e2fd06a58db01\
        e2a8c1dd6a58db01e2a8c1dd6a58db01e2a8c1dd6a58db01e601000000000000e801000000000000200000000a000000\
        0000000000000000000000000000000000000000000000000000000000000000bbf800000000040063002e0074007800\
        74000000000000000000000000000000326647d06a58db01030c3953495ddb01030c3953495ddb01030c3953495ddb01\
        263e0000000000000040000000000000200000000a000000000000000000000000000000000000000000000000000000\
        0000000000000000bcf800000000040064002e00740078007400";

    fn entry(
        created: time::PrimitiveDateTime,
        accessed: time::PrimitiveDateTime,
        written: time::PrimitiveDateTime,
        changed: time::PrimitiveDateTime,
        size: u64,
        alloc: u64,
        attributes: FileAttributes,
        file_id: u64,
        name: &str,
    ) -> FileIdBothDirectoryInformation {
        FileIdBothDirectoryInformation {
            file_index: 0,
            creation_time: created.into(),
            last_access_time: accessed.into(),
            last_write_time: written.into(),
            change_time: changed.into(),
            end_of_file: size,
            allocation_size: alloc,
            file_attributes: attributes,
            ea_size: 0,
            short_name: FileName83::default(),
            file_id,
            file_name: name.into(),
        }
    }

    #[test]
    fn test_read_output_id_both_directory() {
        let response = QueryDirectoryResponse {
            output_buffer: decode_hex(ID_BOTH_LISTING),
        };
        let parsed = response
            .read_output::<FileIdBothDirectoryInformation>()
            .unwrap();

        let dir = FileAttributes::new().with_directory(true);
        let file = FileAttributes::new().with_archive(true);
        assert_eq!(
            vec![
                entry(
                    datetime!(2024-12-11 12:32:31.7084985),
                    datetime!(2025-01-03 10:18:15.6499175),
                    datetime!(2024-12-27 14:22:59.9648231),
                    datetime!(2024-12-27 14:22:59.9648231),
                    0,
                    0,
                    dir,
                    562949953454203,
                    ".",
                ),
                entry(
                    datetime!(2024-12-11 9:25:15.4208828),
                    datetime!(2025-01-02 19:05:31.8723088),
                    datetime!(2024-12-11 12:32:35.4544738),
                    datetime!(2024-12-11 12:32:35.4544738),
                    0,
                    0,
                    dir,
                    1125899906967338,
                    "..",
                ),
                entry(
                    datetime!(2024-12-27 14:22:48.7929947),
                    datetime!(2024-12-27 14:22:48.7929947),
                    datetime!(2024-12-27 14:22:48.7929947),
                    datetime!(2024-12-27 14:22:49.7460575),
                    0,
                    0,
                    file,
                    2814749767148784,
                    "a.txt",
                ),
                entry(
                    datetime!(2024-12-27 14:22:51.5742424),
                    datetime!(2024-12-27 14:23:06.9505662),
                    datetime!(2024-12-27 14:23:06.9505662),
                    datetime!(2024-12-27 14:23:06.9505662),
                    6,
                    8,
                    file,
                    1125899906906297,
                    "b.txt",
                ),
                entry(
                    datetime!(2024-12-27 14:22:52.0116823),
                    datetime!(2024-12-27 14:23:14.7795682),
                    datetime!(2024-12-27 14:23:14.7795682),
                    datetime!(2024-12-27 14:23:14.7795682),
                    486,
                    488,
                    file,
                    1125899906906299,
                    "c.txt",
                ),
                entry(
                    datetime!(2024-12-27 14:22:52.167941),
                    datetime!(2025-01-02 19:05:44.7804931),
                    datetime!(2025-01-02 19:05:44.7804931),
                    datetime!(2025-01-02 19:05:44.7804931),
                    15910,
                    16384,
                    file,
                    1125899906906300,
                    "d.txt",
                ),
            ],
            parsed
        );
    }
}
