//! IOCTL request and response envelopes.

use std::io::SeekFrom;
use std::ops::Deref;

use binrw::io::TakeSeekExt;
use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;

use super::fsctl::*;
use crate::FileId;

/// A raw FSCTL input or output buffer.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct IoctlBuffer {
    #[br(parse_with = binrw::helpers::until_eof)]
    pub data: Vec<u8>,
}

impl Deref for IoctlBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl From<Vec<u8>> for IoctlBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// SMB2 IOCTL request envelope.
///
/// Reference: MS-SMB2 2.2.31
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct IoctlRequest {
    #[bw(calc = 57)]
    #[br(temp)]
    #[br(assert(_structure_size == 57))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    /// The control code to execute.
    pub ctl_code: u32,
    /// Target open; all-ones for codes that address the connection.
    pub file_id: FileId,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _input_offset: PosMarker<u32>,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _input_count: PosMarker<u32>,
    /// Maximum bytes of input echoed back in the response.
    pub max_input_response: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _output_offset: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _output_count: u32,
    /// Maximum bytes of output in the response.
    pub max_output_response: u32,
    pub flags: IoctlRequestFlags,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    /// Input payload, decoded per control code.
    #[br(seek_before = SeekFrom::Start(_input_offset.value as u64))]
    #[br(map_stream = |s| s.take_seek(_input_count.value as u64), args(ctl_code, flags))]
    #[bw(write_with = PosMarker::write_aoff_size, args(&_input_offset, &_input_count))]
    pub buffer: IoctlReqData,
}

/// IOCTL processing flags.
///
/// Reference: MS-SMB2 2.2.31
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct IoctlRequestFlags {
    /// Set for FSCTL requests; clear for pass-through IOCTLs.
    pub is_fsctl: bool,
    #[skip]
    __: B31,
}

/// IOCTL request payload, decoded by control code. Codes this server does
/// not interpret fall through to the raw variant.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[br(import(ctl_code: u32, flags: IoctlRequestFlags))]
pub enum IoctlReqData {
    #[br(pre_assert(ctl_code == FsctlCodes::ValidateNegotiateInfo as u32 && flags.is_fsctl()))]
    FsctlValidateNegotiateInfo(ValidateNegotiateInfoRequest),

    #[br(pre_assert(ctl_code == FsctlCodes::PipeTransceive as u32 && flags.is_fsctl()))]
    FsctlPipeTransceive(IoctlBuffer),

    #[br(pre_assert(ctl_code == FsctlCodes::GetReparsePoint as u32 && flags.is_fsctl()))]
    FsctlGetReparsePoint(()),

    #[br(pre_assert(ctl_code == FsctlCodes::GetNtfsVolumeData as u32 && flags.is_fsctl()))]
    FsctlGetNtfsVolumeData(()),

    #[br(pre_assert(ctl_code == FsctlCodes::ReadFileUsnData as u32 && flags.is_fsctl()))]
    FsctlReadFileUsnData(ReadFileUsnDataRequest),

    #[br(pre_assert(ctl_code == FsctlCodes::SrvEnumerateSnapshots as u32 && flags.is_fsctl()))]
    FsctlSrvEnumerateSnapshots(()),

    /// Unrecognized control code; bytes are carried opaquely.
    Ioctl(IoctlBuffer),
}

/// SMB2 IOCTL response envelope.
///
/// Reference: MS-SMB2 2.2.32
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct IoctlResponse {
    #[bw(calc = 49)]
    #[br(temp)]
    #[br(assert(_structure_size == 49))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    /// The control code that was executed.
    pub ctl_code: u32,
    pub file_id: FileId,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _input_offset: PosMarker<u32>,
    // Input is never echoed back by this server.
    #[bw(calc = 0)]
    #[br(temp)]
    _input_count: u32,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    output_offset: PosMarker<u32>,
    #[bw(try_calc = out_buffer.len().try_into())]
    #[br(temp)]
    output_count: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _flags: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    /// Output payload of the control operation.
    #[br(seek_before = SeekFrom::Start(output_offset.value as u64))]
    #[br(count = output_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&output_offset))]
    pub out_buffer: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use smb_tests::*;

    test_binrw_write! {
        IoctlResponse => ioctl_response: IoctlResponse {
            ctl_code: FsctlCodes::PipeTransceive as u32,
            file_id: FileId { persistent: 0x0528, volatile: 0x85 },
            out_buffer: vec![0xde, 0xad],
        } => "3100000017c011002805000000000000850000000000000000000000000000003000000002000000 00000000 00000000 dead"
    }
}
