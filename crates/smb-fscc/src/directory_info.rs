//! File information classes for directory enumeration.
//!
//! Each structure below is one record of a QUERY_DIRECTORY response and is
//! meant to be wrapped in [`ChainedItemList<T, 8>`][crate::ChainedItemList]
//! (directory records chain on 8-byte boundaries).
//!
//! [MS-FSCC 2.4](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/4718fc40-e539-4014-8e33-b675af74e3e1>)

use binrw::prelude::*;

use smb_dtyp::binrw_util::prelude::*;

use super::FileAttributes;

/// Fixed-capacity field for 8.3 short names: 8 + 1 + 3 code units.
pub type FileName83 = FixedWideString<12>;

/// Basic directory entry: timestamps, sizes and attributes.
///
/// [MS-FSCC 2.4.10](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/b38bf518-9057-4c88-9ddd-5e2d3976a64b>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileDirectoryInformation {
    /// Byte offset of the file within the parent directory; undefined for
    /// most file systems and set to zero here.
    pub file_index: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub file_attributes: FileAttributes,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    _file_name_length: u32,
    #[br(args(_file_name_length as u64))]
    pub file_name: SizedWideString,
}

/// [`FileDirectoryInformation`] plus the extended attribute size.
///
/// For reparse points the `ea_size` field carries the reparse tag instead
/// (MS-FSCC 2.4.17 note).
///
/// [MS-FSCC 2.4.17](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/46021e52-29b1-475c-b6d3-fe5497d23277>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileFullDirectoryInformation {
    pub file_index: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub file_attributes: FileAttributes,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    _file_name_length: u32,
    /// EA size, or the reparse tag when the entry is a reparse point.
    pub ea_size: u32,
    #[br(args(_file_name_length as u64))]
    pub file_name: SizedWideString,
}

/// [`FileFullDirectoryInformation`] plus the 64-bit file ID.
///
/// [MS-FSCC 2.4.24](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/ab8e7558-899c-4be1-a7c5-3a9ae8ab76a0>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileIdFullDirectoryInformation {
    pub file_index: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub file_attributes: FileAttributes,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    _file_name_length: u32,
    /// EA size, or the reparse tag when the entry is a reparse point.
    pub ea_size: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    pub file_id: u64,
    #[br(args(_file_name_length as u64))]
    pub file_name: SizedWideString,
}

/// [`FileFullDirectoryInformation`] plus the 8.3 short name.
///
/// [MS-FSCC 2.4.8](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/270df317-9ba5-4ccb-ba00-8d22be139bc5>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileBothDirectoryInformation {
    pub file_index: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub file_attributes: FileAttributes,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    _file_name_length: u32,
    /// EA size, or the reparse tag when the entry is a reparse point.
    pub ea_size: u32,
    #[bw(calc = short_name.size())]
    #[br(temp)]
    _short_name_length: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    pub short_name: FileName83,
    #[br(args(_file_name_length as u64))]
    pub file_name: SizedWideString,
}

/// [`FileBothDirectoryInformation`] plus the 64-bit file ID.
///
/// [MS-FSCC 2.4.22](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/1e144bff-c056-45aa-bd29-c13d214ee2ba>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileIdBothDirectoryInformation {
    pub file_index: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub file_attributes: FileAttributes,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    _file_name_length: u32,
    /// EA size, or the reparse tag when the entry is a reparse point.
    pub ea_size: u32,
    #[bw(calc = short_name.size())]
    #[br(temp)]
    _short_name_length: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    pub short_name: FileName83,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u16,
    pub file_id: u64,
    #[br(args(_file_name_length as u64))]
    pub file_name: SizedWideString,
}

/// Names-only directory entry.
///
/// [MS-FSCC 2.4.33](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/a289f7a8-83d2-4927-8c88-b2d328dde5a5>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileNamesInformation {
    pub file_index: u32,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    _file_name_length: u32,
    #[br(args(_file_name_length as u64))]
    pub file_name: SizedWideString,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChainedItemList, QueryDirectoryInfoClass};
    use smb_tests::*;

    type NamesList =
        ChainedItemList<FileNamesInformation, { QueryDirectoryInfoClass::CHAINED_ALIGNMENT }>;

    fn name_entry(name: &str) -> FileNamesInformation {
        FileNamesInformation {
            file_index: 0,
            file_name: name.into(),
        }
    }

    // Directory listing dump captured from a Windows share.
    test_binrw! {
        NamesList => names_list: NamesList::from(vec![
            name_entry("."),
            name_entry(".."),
            name_entry("BingMaps.dll"),
            name_entry("edgehtml.dll"),
            name_entry("mshtml.dll"),
        ]) => "1000000000000000020000002e0000001000000000000000040000002e002e00280000000000000018000000420069006e0067004d006100700073002e0064006c006c00000000002800000000000000180000006500640067006500680074006d006c002e0064006c006c00000000000000000000000000140000006d007300680074006d006c002e0064006c006c00"
    }
}
