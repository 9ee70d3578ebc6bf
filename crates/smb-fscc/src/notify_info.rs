//! FILE_NOTIFY_INFORMATION - change notification records.
//!
//! [MS-FSCC 2.7.1](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/634043d7-7b39-47e9-9e26-bda64685e4c9>)

use binrw::prelude::*;

use smb_dtyp::binrw_util::prelude::*;

/// The change that triggered a notification record.
///
/// [MS-FSCC 2.7.1](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/634043d7-7b39-47e9-9e26-bda64685e4c9>)
#[binrw::binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[brw(repr(u32))]
pub enum NotifyAction {
    Added = 1,
    Removed = 2,
    Modified = 3,
    RenamedOldName = 4,
    RenamedNewName = 5,
    AddedStream = 6,
    RemovedStream = 7,
    ModifiedStream = 8,
}

/// One change notification record. Chained on 4-byte boundaries inside a
/// CHANGE_NOTIFY response buffer.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FileNotifyInformation {
    pub action: NotifyAction,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    _file_name_length: u32,
    /// Watch-directory-relative name of the changed file.
    #[br(args(_file_name_length as u64))]
    pub file_name: SizedWideString,
}
