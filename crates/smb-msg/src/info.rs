//! Query and set information messages.

use std::io::SeekFrom;

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;
use smb_fscc::{QueryFileInfoClass, QueryFileSystemInfoClass, SetFileInfoClass};

use super::FileId;

/// The family of information being queried or set.
///
/// Reference: MS-SMB2 2.2.37
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u8))]
pub enum InfoType {
    File = 0x01,
    FileSystem = 0x02,
    Security = 0x03,
    Quota = 0x04,
}

/// The information class byte, typed by the info family.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[br(import(info_type: InfoType))]
pub enum QueryInfoClass {
    #[br(pre_assert(matches!(info_type, InfoType::File)))]
    File(QueryFileInfoClass),

    #[br(pre_assert(matches!(info_type, InfoType::FileSystem)))]
    FileSystem(QueryFileSystemInfoClass),

    /// Security and quota queries carry no class byte semantics.
    Raw(u8),
}

/// The information class byte for SET_INFO requests.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[br(import(info_type: InfoType))]
pub enum SetInfoClass {
    #[br(pre_assert(matches!(info_type, InfoType::File)))]
    File(SetFileInfoClass),

    Raw(u8),
}

/// EA enumeration control flags.
///
/// Reference: MS-SMB2 2.2.37
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct QueryInfoFlags {
    pub restart_scan: bool,
    pub return_single_entry: bool,
    pub index_specified: bool,
    #[skip]
    __: B29,
}

/// SMB2 QUERY_INFO request.
///
/// Reference: MS-SMB2 2.2.37
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct QueryInfoRequest {
    #[bw(calc = 41)]
    #[br(temp)]
    #[br(assert(_structure_size == 41))]
    _structure_size: u16,
    pub info_type: InfoType,
    #[br(args(info_type))]
    pub info_class: QueryInfoClass,
    /// Maximum bytes the response buffer may hold.
    pub output_buffer_length: u32,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _input_buffer_offset: PosMarker<u16>,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    #[bw(try_calc = data.len().try_into())]
    #[br(temp)]
    input_buffer_length: u32,
    /// Extra query selectors (security flags, EA index).
    pub additional_information: u32,
    pub flags: QueryInfoFlags,
    pub file_id: FileId,
    /// Input payload for quota and EA queries; empty otherwise.
    #[br(if(input_buffer_length > 0))]
    #[br(seek_before = SeekFrom::Start(_input_buffer_offset.value as u64))]
    #[br(count = input_buffer_length)]
    #[bw(if(!data.is_empty()))]
    #[bw(write_with = PosMarker::write_aoff, args(&_input_buffer_offset))]
    pub data: Vec<u8>,
}

/// SMB2 QUERY_INFO response, carrying the class-specific payload.
///
/// Reference: MS-SMB2 2.2.38
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct QueryInfoResponse {
    #[bw(calc = 9)]
    #[br(temp)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _output_buffer_offset: PosMarker<u16>,
    #[bw(try_calc = buffer.len().try_into())]
    #[br(temp)]
    output_buffer_length: u32,
    #[br(seek_before = SeekFrom::Start(_output_buffer_offset.value as u64))]
    #[br(count = output_buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&_output_buffer_offset))]
    pub buffer: Vec<u8>,
}

/// SMB2 SET_INFO request.
///
/// Reference: MS-SMB2 2.2.39
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct SetInfoRequest {
    #[bw(calc = 33)]
    #[br(temp)]
    #[br(assert(_structure_size == 33))]
    _structure_size: u16,
    pub info_type: InfoType,
    #[br(args(info_type))]
    pub info_class: SetInfoClass,
    #[bw(try_calc = buffer.len().try_into())]
    #[br(temp)]
    buffer_length: u32,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _buffer_offset: PosMarker<u16>,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    /// Extra selectors for security sets.
    pub additional_information: u32,
    pub file_id: FileId,
    /// The class-specific payload to apply.
    #[br(seek_before = SeekFrom::Start(_buffer_offset.value as u64))]
    #[br(count = buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&_buffer_offset))]
    pub buffer: Vec<u8>,
}

/// SMB2 SET_INFO response.
///
/// Reference: MS-SMB2 2.2.40
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct SetInfoResponse {
    #[bw(calc = 2)]
    #[br(temp)]
    #[br(assert(_structure_size == 2))]
    _structure_size: u16,
}
