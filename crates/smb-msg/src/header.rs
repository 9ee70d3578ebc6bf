//! Message header, command codes and NT status values.

use std::io::Cursor;

use binrw::prelude::*;
use modular_bitfield::prelude::*;

/// SMB2/SMB3 protocol command codes.
///
/// Reference: MS-SMB2 2.2.1.2
#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u16))]
pub enum Command {
    Negotiate = 0,
    SessionSetup = 1,
    Logoff = 2,
    TreeConnect = 3,
    TreeDisconnect = 4,
    Create = 5,
    Close = 6,
    Flush = 7,
    Read = 8,
    Write = 9,
    Lock = 0xA,
    Ioctl = 0xB,
    Cancel = 0xC,
    Echo = 0xD,
    QueryDirectory = 0xE,
    ChangeNotify = 0xF,
    QueryInfo = 0x10,
    SetInfo = 0x11,
    OplockBreak = 0x12,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Negotiate => "Negotiate",
            Command::SessionSetup => "Session Setup",
            Command::Logoff => "Logoff",
            Command::TreeConnect => "Tree Connect",
            Command::TreeDisconnect => "Tree Disconnect",
            Command::Create => "Create",
            Command::Close => "Close",
            Command::Flush => "Flush",
            Command::Read => "Read",
            Command::Write => "Write",
            Command::Lock => "Lock",
            Command::Ioctl => "Ioctl",
            Command::Cancel => "Cancel",
            Command::Echo => "Echo",
            Command::QueryDirectory => "Query Directory",
            Command::ChangeNotify => "Change Notify",
            Command::QueryInfo => "Query Info",
            Command::SetInfo => "Set Info",
            Command::OplockBreak => "Oplock Break",
        };
        write!(f, "{} ({:#x})", name, *self as u16)
    }
}

macro_rules! make_status {
    (
        $($name:ident = $value:literal: $description:literal, )+
    ) => {

/// NT status codes used in SMB2 responses.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
#[brw(repr(u32))]
pub enum Status {
    $(
        #[doc = concat!($description, " (", stringify!($value), ")")]
        $name = $value,
    )+
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let description = match self {
            $(
                Status::$name => $description,
            )+
        };
        write!(f, "{} ({:#010x})", description, *self as u32)
    }
}

impl TryFrom<u32> for Status {
    type Error = crate::SmbMsgError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Status::read_le(&mut Cursor::new(value.to_le_bytes()))
            .map_err(|_| Self::Error::MissingErrorCodeDefinition(value))
    }
}
    };
}

make_status! {
    Success = 0x00000000: "Success",
    Pending = 0x00000103: "Pending",
    NotifyEnumDir = 0x0000010C: "Notify Enum Dir",
    BufferOverflow = 0x80000005: "Buffer Overflow",
    NoMoreFiles = 0x80000006: "No More Files",
    NotImplemented = 0xC0000002: "Not Implemented",
    InvalidInfoClass = 0xC0000003: "Invalid Info Class",
    InfoLengthMismatch = 0xC0000004: "Info Length Mismatch",
    InvalidParameter = 0xC000000D: "Invalid Parameter",
    InvalidDeviceRequest = 0xC0000010: "Invalid Device Request",
    EndOfFile = 0xC0000011: "End of File",
    MoreProcessingRequired = 0xC0000016: "More Processing Required",
    AccessDenied = 0xC0000022: "Access Denied",
    BufferTooSmall = 0xC0000023: "Buffer Too Small",
    ObjectNameInvalid = 0xC0000033: "Object Name Invalid",
    ObjectNameNotFound = 0xC0000034: "Object Name Not Found",
    ObjectNameCollision = 0xC0000035: "Object Name Collision",
    ObjectPathNotFound = 0xC000003A: "Object Path Not Found",
    SharingViolation = 0xC0000043: "Sharing Violation",
    LockNotGranted = 0xC0000054: "Lock Not Granted",
    DeletePending = 0xC0000056: "Delete Pending",
    LogonFailure = 0xC000006D: "Logon Failure",
    RangeNotLocked = 0xC000007E: "Range Not Locked",
    DiskFull = 0xC000007F: "Disk Full",
    InsufficientResources = 0xC000009A: "Insufficient Resources",
    FileIsADirectory = 0xC00000BA: "File is a Directory",
    NotSupported = 0xC00000BB: "Not Supported",
    NetworkNameDeleted = 0xC00000C9: "Network Name Deleted",
    BadNetworkName = 0xC00000CC: "Bad Network Name",
    InternalError = 0xC00000E5: "Internal Error",
    DirectoryNotEmpty = 0xC0000101: "Directory Not Empty",
    NotADirectory = 0xC0000103: "Not a Directory",
    Cancelled = 0xC0000120: "Cancelled",
    FileClosed = 0xC0000128: "File Closed",
    UserSessionDeleted = 0xC0000203: "User Session Deleted",
    NotAReparsePoint = 0xC0000275: "Not a Reparse Point",
}

/// SMB2 packet header, common to every request and response.
///
/// Reference: MS-SMB2 2.2.1.1, 2.2.1.2
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
#[brw(magic(b"\xfeSMB"), little)]
pub struct Header {
    #[bw(calc = Header::STRUCT_SIZE as u16)]
    #[br(temp)]
    #[br(assert(_structure_size == Header::STRUCT_SIZE as u16))]
    _structure_size: u16,
    /// Number of credits charged for this request.
    pub credit_charge: u16,
    /// NT status code; use [`Header::status`] for the typed value.
    pub status: u32,
    /// Command code identifying the message type.
    pub command: Command,
    /// Number of credits requested or granted.
    pub credit_request: u16,
    pub flags: HeaderFlags,
    /// Offset to the next message in a compounded chain, 0 otherwise.
    pub next_command: u32,
    pub message_id: u64,

    // Sync form: Reserved + TreeId. `flags.async_command` must be clear.
    #[brw(if(!flags.async_command()))]
    #[bw(calc = 0)]
    _reserved: u32,
    #[br(if(!flags.async_command()))]
    #[bw(assert(tree_id.is_some() != flags.async_command()))]
    pub tree_id: Option<u32>,

    // Async form: AsyncId. `flags.async_command` must be set.
    #[brw(if(flags.async_command()))]
    #[bw(assert(tree_id.is_none() == flags.async_command()))]
    pub async_id: Option<u64>,

    pub session_id: u64,
    /// Message signature; zero on unsigned messages.
    pub signature: u128,
}

impl Header {
    pub const STRUCT_SIZE: usize = 64;

    /// The typed status value, if the code is a known one.
    pub fn status(&self) -> crate::Result<Status> {
        self.status.try_into()
    }

    /// Converts the header to its async form, setting `async_id` and
    /// clearing `tree_id`.
    pub fn to_async(&mut self, async_id: u64) {
        self.flags.set_async_command(true);
        self.tree_id = None;
        self.async_id = Some(async_id);
    }
}

/// SMB2 header processing flags.
///
/// Reference: MS-SMB2 2.2.1.2
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct HeaderFlags {
    /// The message is a server response.
    pub server_to_redir: bool,
    /// The message is part of an asynchronous operation.
    pub async_command: bool,
    /// The request is a related operation in a compounded chain.
    pub related_operations: bool,
    /// The message is signed.
    pub signed: bool,
    /// Priority mask (SMB 3.1.1).
    pub priority_mask: B3,
    #[skip]
    __: B21,
    /// The request is a DFS operation.
    pub dfs_operation: bool,
    /// The request is a replay of a previous operation.
    pub replay_operation: bool,
    #[skip]
    __: B2,
}

#[cfg(test)]
mod tests {
    use smb_tests::*;

    use super::*;

    test_binrw! {
        Header => header_async: Header {
            credit_charge: 0,
            status: Status::Pending as u32,
            command: Command::ChangeNotify,
            credit_request: 1,
            flags: HeaderFlags::new()
                .with_async_command(true)
                .with_server_to_redir(true)
                .with_priority_mask(1),
            next_command: 0,
            message_id: 8,
            tree_id: None,
            async_id: Some(8),
            session_id: 0x00000000085327d7,
            signature: u128::from_le_bytes(u128::to_be_bytes(
                0x63f825deae02952fa3d8c8aaf46e7c99
            )),
        } => "fe534d4240000000030100000f000100130000000000000008000000000000000800000000000000d72753080000000063f825deae02952fa3d8c8aaf46e7c99"
    }

    #[test]
    fn test_status_try_from() {
        assert_eq!(Ok(Status::NoMoreFiles), Status::try_from(0x80000006).map_err(|_| ()));
        assert!(Status::try_from(0xDEADBEEF).is_err());
    }
}
