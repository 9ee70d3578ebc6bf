//! File access mask.
//!
//! [MS-SMB2 2.2.13.1.1](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-smb2/77b36d0f-6016-458a-a7a0-0f4a72ae1534>)

use binrw::prelude::*;
use modular_bitfield::prelude::*;

/// Access rights for a file, pipe or printer open.
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct FileAccessMask {
    /// Read data from the file.
    pub file_read_data: bool,
    /// Write data into the file.
    pub file_write_data: bool,
    /// Append data to the file.
    pub file_append_data: bool,
    /// Read the extended attributes.
    pub file_read_ea: bool,

    /// Write the extended attributes.
    pub file_write_ea: bool,
    /// Execute the file.
    pub file_execute: bool,
    /// Delete entries within a directory.
    pub file_delete_child: bool,
    /// Read the file attributes.
    pub file_read_attributes: bool,

    /// Write the file attributes.
    pub file_write_attributes: bool,
    #[skip]
    __: B7,

    /// Delete the file.
    pub delete: bool,
    /// Read the security descriptor.
    pub read_control: bool,
    /// Change the DACL.
    pub write_dac: bool,
    /// Change the owner.
    pub write_owner: bool,

    /// Use the handle for synchronization. Ignored by SMB2 servers.
    pub synchronize: bool,
    #[skip]
    __: B3,

    /// Read or change the SACL.
    pub access_system_security: bool,
    /// Request maximal access, subject to the security descriptor.
    pub maximum_allowed: bool,
    #[skip]
    __: B2,

    /// Generic rights, mapped by the server to file-specific rights.
    pub generic_all: bool,
    pub generic_execute: bool,
    pub generic_write: bool,
    pub generic_read: bool,
}

impl FileAccessMask {
    /// Whether any write-class right is requested.
    pub fn wants_write(&self) -> bool {
        self.file_write_data()
            || self.file_append_data()
            || self.file_write_ea()
            || self.file_write_attributes()
            || self.generic_write()
            || self.generic_all()
    }

    /// Whether the DELETE right is requested.
    pub fn wants_delete(&self) -> bool {
        self.delete() || self.generic_all()
    }
}
