//! File information classes accepted by SET_INFO.
//!
//! [MS-FSCC 2.4](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/4718fc40-e539-4014-8e33-b675af74e3e1>)

use binrw::prelude::*;

use smb_dtyp::binrw_util::prelude::*;

/// Rename a file, in the SMB2 variant of the structure.
///
/// [MS-FSCC 2.4.38.2](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/52aa0b70-8094-4971-862d-79793f41e6a8>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileRenameInformation2 {
    /// Replace the target if it already exists.
    pub replace_if_exists: Boolean,
    #[bw(calc = [0; 7])]
    #[br(temp)]
    _reserved: [u8; 7],
    /// Must be zero over SMB2; the new name is share-relative.
    #[bw(calc = 0)]
    #[br(assert(root_directory == 0))]
    #[br(temp)]
    root_directory: u64,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    _file_name_length: u32,
    /// Share-relative target path.
    #[br(args(_file_name_length as u64))]
    pub file_name: SizedWideString,
}

/// Mark or clear the delete-on-close disposition.
///
/// [MS-FSCC 2.4.11](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/12c3dd1c-14f6-4229-9d29-75fb2cb392f6>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileDispositionInformation {
    pub delete_pending: Boolean,
}

/// Truncate or extend a file.
///
/// [MS-FSCC 2.4.13](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/75241cca-3167-472f-8058-a52d77c6bb17>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileEndOfFileInformation {
    pub end_of_file: u64,
}

/// Change the allocation size of a file.
///
/// [MS-FSCC 2.4.4](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/0201c69b-50db-412d-bab3-dd97aeede13b>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileAllocationInformation {
    pub allocation_size: u64,
}
