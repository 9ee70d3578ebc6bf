//! File information structures shared between query and set operations.
//!
//! [MS-FSCC 2.4](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/4718fc40-e539-4014-8e33-b675af74e3e1>)

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;

use crate::FileAttributes;

/// Query or set timestamps and attributes.
///
/// [MS-FSCC 2.4.7](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/16023025-8a78-492f-8b96-c873b042ac50>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileBasicInformation {
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub file_attributes: FileAttributes,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
}

impl FileBasicInformation {
    /// Timestamp sentinel: stop implicit updates for this handle.
    pub const TIME_FREEZE: u64 = u64::MAX;
    /// Timestamp sentinel: resume implicit updates for this handle.
    pub const TIME_THAW: u64 = u64::MAX - 1;
}

/// Query allocation, size and link information.
///
/// [MS-FSCC 2.4.41](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/5afa7f66-619c-48f3-955f-68c4ece704ae>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileStandardInformation {
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub number_of_links: u32,
    pub delete_pending: Boolean,
    pub directory: Boolean,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

/// Query the file system's 64-bit identifier for the file.
///
/// [MS-FSCC 2.4.27](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/7d796611-2fa5-41ac-8178-b6fea3a017b3>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileInternalInformation {
    pub index_number: u64,
}

/// Query the size of the extended attributes of a file.
///
/// [MS-FSCC 2.4.15](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/db6cf109-ab15-408e-baa4-0cec96ab288b>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileEaInformation {
    pub ea_size: u32,
}

/// Query the granted access of an open.
///
/// [MS-FSCC 2.4.1](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/01cf43d2-deb3-40d3-a39b-9e68693d7c90>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileAccessInformation {
    pub access_flags: crate::FileAccessMask,
}

/// Query or set the file pointer position. Carried for protocol
/// completeness; the server side of SMB2 keeps no pointer state.
///
/// [MS-FSCC 2.4.40](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/e3ce4a39-327e-495c-99b6-6b61606b6f16>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct FilePositionInformation {
    pub current_byte_offset: u64,
}

/// Query or set file mode flags.
///
/// [MS-FSCC 2.4.31](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/52df7798-8330-474b-ac31-9afe8075640c>)
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct FileModeInformation {
    #[skip]
    __: bool,
    pub write_through: bool,
    pub sequential_access: bool,
    pub no_intermediate_buffering: bool,

    pub synchronous_io_alert: bool,
    pub synchronous_io_non_alert: bool,
    #[skip]
    __: B6,

    pub delete_on_close: bool,
    #[skip]
    __: B19,
}

/// Query the buffer alignment required by the device.
///
/// [MS-FSCC 2.4.3](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/9b0b9971-85aa-4651-8438-f1c4298bcb0d>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
#[brw(repr(u32))]
pub enum FileAlignmentInformation {
    #[default]
    Byte = 0,
    Word = 1,
    Long = 3,
    Quad = 7,
}

/// Query the full path of a file, without the share root.
///
/// [MS-FSCC 2.4.32](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/cb30e415-54c5-4483-a346-822ea90e1e89>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileNameInformation {
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    _file_name_length: u32,
    #[br(args(_file_name_length as u64))]
    pub file_name: SizedWideString,
}

impl From<&str> for FileNameInformation {
    fn from(value: &str) -> Self {
        Self {
            file_name: value.into(),
        }
    }
}

/// Query network-open information in one round trip.
///
/// [MS-FSCC 2.4.34](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/26d261db-58c2-4e26-b5cc-cb9764a0c4f9>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileNetworkOpenInformation {
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub file_attributes: FileAttributes,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
}

/// Query the reparse tag together with the attributes.
///
/// [MS-FSCC 2.4.6](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/d295752f-ce89-4b98-8553-266d37c84f0e>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileAttributeTagInformation {
    pub file_attributes: FileAttributes,
    pub reparse_tag: crate::ReparseTag,
}

/// Query the volume serial and 128-bit file identifier. The serial must
/// match the one surfaced by the NTFS volume data FSCTL.
///
/// [MS-FSCC 2.4.26](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/88b17854-326d-4d01-a557-5e27a2ba7ab9>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileIdInformation {
    pub volume_serial_number: u64,
    pub file_id: u128,
}

/// Aggregate of the common per-file information classes.
///
/// [MS-FSCC 2.4.2](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/95f3056a-ebc1-4f5d-b938-3f68a44677a6>)
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileAllInformation {
    pub basic: FileBasicInformation,
    pub standard: FileStandardInformation,
    pub internal: FileInternalInformation,
    pub ea: FileEaInformation,
    pub access: FileAccessInformation,
    pub position: FilePositionInformation,
    pub mode: FileModeInformation,
    pub alignment: FileAlignmentInformation,
    pub name: FileNameInformation,
}
