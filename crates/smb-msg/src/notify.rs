//! Change notification messages.

use std::io::SeekFrom;

use binrw::io::TakeSeekExt;
use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;
use smb_fscc::{ChainedItemList, FileNotifyInformation};

use super::FileId;

/// SMB2 CHANGE_NOTIFY request: watch a directory for changes.
///
/// Reference: MS-SMB2 2.2.35
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct ChangeNotifyRequest {
    #[bw(calc = 32)]
    #[br(temp)]
    #[br(assert(_structure_size == 32))]
    _structure_size: u16,
    pub flags: NotifyFlags,
    /// Maximum bytes of notification records in the response.
    pub output_buffer_length: u32,
    /// The directory open to watch.
    pub file_id: FileId,
    /// Which changes trigger a notification.
    pub completion_filter: NotifyFilter,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
}

/// CHANGE_NOTIFY processing flags.
///
/// Reference: MS-SMB2 2.2.35
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct NotifyFlags {
    /// Watch the whole subtree beneath the directory.
    pub watch_tree: bool,
    #[skip]
    __: B15,
}

/// Completion filter: the change classes being watched.
///
/// Reference: MS-SMB2 2.2.35
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct NotifyFilter {
    pub file_name: bool,
    pub dir_name: bool,
    pub attributes: bool,
    pub size: bool,

    pub last_write: bool,
    pub last_access: bool,
    pub creation: bool,
    pub ea: bool,

    pub security: bool,
    pub stream_name: bool,
    pub stream_size: bool,
    pub stream_write: bool,

    #[skip]
    __: B20,
}

impl NotifyFilter {
    pub fn all() -> Self {
        Self::new()
            .with_file_name(true)
            .with_dir_name(true)
            .with_attributes(true)
            .with_size(true)
            .with_last_write(true)
            .with_last_access(true)
            .with_creation(true)
            .with_ea(true)
            .with_security(true)
            .with_stream_name(true)
            .with_stream_size(true)
            .with_stream_write(true)
    }
}

/// SMB2 CHANGE_NOTIFY response, carrying FILE_NOTIFY_INFORMATION records.
///
/// Reference: MS-SMB2 2.2.36
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct ChangeNotifyResponse {
    #[bw(calc = 9)]
    #[br(temp)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _output_buffer_offset: PosMarker<u16>,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _output_buffer_length: PosMarker<u32>,
    /// The changes observed; chained on 4-byte boundaries.
    #[br(seek_before = SeekFrom::Start(_output_buffer_offset.value.into()))]
    #[br(map_stream = |s| s.take_seek(_output_buffer_length.value.into()))]
    #[bw(if(!buffer.is_empty()))]
    #[bw(write_with = PosMarker::write_aoff_size, args(&_output_buffer_offset, &_output_buffer_length))]
    pub buffer: ChainedItemList<FileNotifyInformation, 4>,
}
