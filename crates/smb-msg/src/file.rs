//! File data messages: flush, read, write.

use binrw::io::SeekFrom;
use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;

use super::FileId;
use super::header::Header;

/// SMB2 FLUSH request: push cached data to persistent storage.
///
/// Reference: MS-SMB2 2.2.17
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct FlushRequest {
    #[bw(calc = 24)]
    #[br(temp)]
    #[br(assert(_structure_size == 24))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved1: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    pub file_id: FileId,
}

/// SMB2 FLUSH response.
///
/// Reference: MS-SMB2 2.2.18
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct FlushResponse {
    #[bw(calc = 4)]
    #[br(temp)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

/// SMB2 READ request.
///
/// Reference: MS-SMB2 2.2.19
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct ReadRequest {
    #[bw(calc = 49)]
    #[br(temp)]
    #[br(assert(_structure_size == 49))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _padding: u8,
    pub flags: ReadFlags,
    /// Number of bytes to read.
    pub length: u32,
    /// File offset to read from.
    pub offset: u64,
    pub file_id: FileId,
    /// Fewer available bytes than this fail the read.
    pub minimum_count: u32,
    // No RDMA channels on this server.
    #[bw(calc = CommunicationChannel::None)]
    #[br(temp)]
    #[br(assert(channel == CommunicationChannel::None))]
    channel: CommunicationChannel,
    #[bw(calc = 0)]
    #[br(temp)]
    _remaining_bytes: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _read_channel_info_offset: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _read_channel_info_length: u16,
    // The structure size counts one blob byte that is never used.
    #[bw(calc = 0)]
    #[br(temp)]
    _blob_placeholder: u8,
}

/// Flags for read operations.
///
/// Reference: MS-SMB2 2.2.19
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct ReadFlags {
    pub read_unbuffered: bool,
    pub read_compressed: bool,
    #[skip]
    __: B6,
}

/// RDMA channel selector. Always `None` here; SMB Direct is out of scope.
///
/// Reference: MS-SMB2 2.2.19
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u32))]
pub enum CommunicationChannel {
    None = 0,
    RdmaV1 = 1,
    RdmaV1Invalidate = 2,
}

/// SMB2 READ response.
///
/// Reference: MS-SMB2 2.2.20
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct ReadResponse {
    #[bw(calc = 17)]
    #[br(temp)]
    #[br(assert(_structure_size == 17))]
    _structure_size: u16,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _data_offset: PosMarker<u8>,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[bw(try_calc = buffer.len().try_into())]
    #[br(temp)]
    _data_length: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _data_remaining: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    /// Data read from the file. May be empty on a zero-length read.
    #[br(seek_before = SeekFrom::Start(_data_offset.value as u64))]
    #[br(count = _data_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&_data_offset))]
    pub buffer: Vec<u8>,
}

impl ReadResponse {
    pub const STRUCT_SIZE: usize = 17;

    /// Offset of the data buffer inside a full message.
    pub const DATA_OFFSET: usize = Header::STRUCT_SIZE + Self::STRUCT_SIZE - 1;
}

/// SMB2 WRITE request.
///
/// Reference: MS-SMB2 2.2.21
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct WriteRequest {
    #[bw(calc = 49)]
    #[br(temp)]
    #[br(assert(_structure_size == 49))]
    _structure_size: u16,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _data_offset: PosMarker<u16>,
    #[bw(try_calc = buffer.len().try_into())]
    #[br(temp)]
    _length: u32,
    /// File offset to write to.
    pub offset: u64,
    pub file_id: FileId,
    #[bw(calc = CommunicationChannel::None)]
    #[br(temp)]
    #[br(assert(channel == CommunicationChannel::None))]
    channel: CommunicationChannel,
    #[bw(calc = 0)]
    #[br(temp)]
    _remaining_bytes: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _write_channel_info_offset: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _write_channel_info_length: u16,
    pub flags: WriteFlags,
    /// Data to write.
    #[br(seek_before = SeekFrom::Start(_data_offset.value as u64))]
    #[br(count = _length)]
    #[bw(write_with = PosMarker::write_aoff, args(&_data_offset))]
    pub buffer: Vec<u8>,
}

/// SMB2 WRITE response.
///
/// Reference: MS-SMB2 2.2.22
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct WriteResponse {
    #[bw(calc = 17)]
    #[br(temp)]
    #[br(assert(_structure_size == 17))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    /// Number of bytes written.
    pub count: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _remaining: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _write_channel_info_offset: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _write_channel_info_length: u16,
}

/// Flags for write operations.
///
/// Reference: MS-SMB2 2.2.21
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct WriteFlags {
    pub write_unbuffered: bool,
    pub write_through: bool,
    #[skip]
    __: B30,
}
