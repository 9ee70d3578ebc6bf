//! FSCTL codes and payload structures.

use binrw::prelude::*;

use smb_dtyp::binrw_util::prelude::*;
use smb_dtyp::guid::Guid;

use crate::negotiate::{Dialect, NegotiateDialect, NegotiateSecurityMode};

/// Control codes dispatched by this server. Anything else earns
/// `NOT_SUPPORTED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FsctlCodes {
    GetReparsePoint = 0x000900A8,
    GetNtfsVolumeData = 0x00090064,
    ReadFileUsnData = 0x000900EB,
    PipeTransceive = 0x0011C017,
    ValidateNegotiateInfo = 0x00140204,
    SrvEnumerateSnapshots = 0x00144064,
}

/// Request payload of FSCTL_VALIDATE_NEGOTIATE_INFO: the client replays its
/// NEGOTIATE parameters so the server can detect tampering.
///
/// Reference: MS-SMB2 2.2.31.4
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct ValidateNegotiateInfoRequest {
    /// Capabilities from the client's NEGOTIATE.
    pub capabilities: u32,
    /// The client GUID from NEGOTIATE.
    pub guid: Guid,
    /// The security mode from NEGOTIATE.
    pub security_mode: NegotiateSecurityMode,
    #[bw(try_calc = dialects.len().try_into())]
    #[br(temp)]
    dialect_count: u16,
    /// The dialect list from NEGOTIATE.
    #[br(count = dialect_count)]
    pub dialects: Vec<Dialect>,
}

/// Response payload of FSCTL_VALIDATE_NEGOTIATE_INFO: the server's side of
/// the negotiation, for the client to compare.
///
/// Reference: MS-SMB2 2.2.32.6
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct ValidateNegotiateInfoResponse {
    pub capabilities: u32,
    pub guid: Guid,
    pub security_mode: NegotiateSecurityMode,
    /// The dialect in force on this connection.
    pub dialect: NegotiateDialect,
}

/// Input of FSCTL_READ_FILE_USN_DATA: the USN record versions the caller
/// accepts. An empty input means version 2 only.
///
/// Reference: MS-FSCC 2.3.70
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct ReadFileUsnDataRequest {
    #[br(parse_with = binrw::helpers::until_eof)]
    raw: Vec<u8>,
}

impl ReadFileUsnDataRequest {
    /// The `(min, max)` major versions requested.
    pub fn version_range(&self) -> (u16, u16) {
        if self.raw.len() >= 4 {
            (
                u16::from_le_bytes([self.raw[0], self.raw[1]]),
                u16::from_le_bytes([self.raw[2], self.raw[3]]),
            )
        } else {
            (2, 2)
        }
    }
}

impl From<(u16, u16)> for ReadFileUsnDataRequest {
    fn from((min, max): (u16, u16)) -> Self {
        let mut raw = Vec::with_capacity(4);
        raw.extend_from_slice(&min.to_le_bytes());
        raw.extend_from_slice(&max.to_le_bytes());
        Self { raw }
    }
}

/// SYMBOLIC_LINK_REPARSE_DATA_BUFFER, returned by FSCTL_GET_REPARSE_POINT
/// for symlinks. Substitute and print names share one path payload.
///
/// Reference: MS-FSCC 2.1.2.4
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(magic(0xA000000Cu32))]
pub struct SymbolicLinkReparseDataBuffer {
    #[bw(try_calc = (target.size() + 12).try_into())]
    #[br(temp)]
    _reparse_data_length: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _substitute_name_offset: u16,
    #[bw(try_calc = target.size().try_into())]
    #[br(temp)]
    substitute_name_length: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _print_name_offset: u16,
    #[bw(try_calc = target.size().try_into())]
    #[br(temp)]
    _print_name_length: u16,
    /// 1 = the target is relative to the link's directory.
    pub flags: u32,
    /// Link target path.
    #[br(args(substitute_name_length as u64))]
    pub target: SizedWideString,
}

impl SymbolicLinkReparseDataBuffer {
    /// Flag: the target path is relative.
    pub const SYMLINK_FLAG_RELATIVE: u32 = 0x1;
}

/// NTFS_VOLUME_DATA_BUFFER, returned by FSCTL_GET_NTFS_VOLUME_DATA.
/// Wire-exact stub for Windows FSA compliance; the serial number must match
/// every other surface reporting it.
///
/// Reference: MSDN NTFS_VOLUME_DATA_BUFFER
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct NtfsVolumeDataBuffer {
    pub volume_serial_number: u64,
    pub number_sectors: u64,
    pub total_clusters: u64,
    pub free_clusters: u64,
    pub total_reserved: u64,
    pub bytes_per_sector: u32,
    pub bytes_per_cluster: u32,
    pub bytes_per_file_record_segment: u32,
    pub clusters_per_file_record_segment: u32,
    pub mft_valid_data_length: u64,
    pub mft_start_lcn: u64,
    pub mft2_start_lcn: u64,
    pub mft_zone_start: u64,
    pub mft_zone_end: u64,
}

/// USN_RECORD_V2, returned by FSCTL_READ_FILE_USN_DATA.
///
/// Reference: MS-FSCC 2.3.71.1
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct UsnRecordV2 {
    /// Total record length, 8-byte aligned.
    #[bw(try_calc = ((Self::FIXED_SIZE as u64 + file_name.size()).div_ceil(8) * 8).try_into())]
    #[br(temp)]
    _record_length: u32,
    #[bw(calc = 2)]
    #[br(temp)]
    #[br(assert(_major_version == 2))]
    _major_version: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _minor_version: u16,
    pub file_reference_number: u64,
    pub parent_file_reference_number: u64,
    pub usn: u64,
    pub time_stamp: FileTime,
    pub reason: u32,
    pub source_info: u32,
    pub security_id: u32,
    pub file_attributes: u32,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    file_name_length: u16,
    #[bw(calc = Self::FIXED_SIZE as u16)]
    #[br(temp)]
    _file_name_offset: u16,
    #[br(args(file_name_length as u64))]
    #[brw(align_after = 8)]
    pub file_name: SizedWideString,
}

impl UsnRecordV2 {
    pub const FIXED_SIZE: usize = 60;
}

/// USN_RECORD_V3, with 128-bit file reference numbers matching
/// FILE_ID_INFORMATION.
///
/// Reference: MS-FSCC 2.3.71.2
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct UsnRecordV3 {
    #[bw(try_calc = ((Self::FIXED_SIZE as u64 + file_name.size()).div_ceil(8) * 8).try_into())]
    #[br(temp)]
    _record_length: u32,
    #[bw(calc = 3)]
    #[br(temp)]
    #[br(assert(_major_version == 3))]
    _major_version: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _minor_version: u16,
    pub file_reference_number: u128,
    pub parent_file_reference_number: u128,
    pub usn: u64,
    pub time_stamp: FileTime,
    pub reason: u32,
    pub source_info: u32,
    pub security_id: u32,
    pub file_attributes: u32,
    #[bw(try_calc = file_name.size().try_into())]
    #[br(temp)]
    file_name_length: u16,
    #[bw(calc = Self::FIXED_SIZE as u16)]
    #[br(temp)]
    _file_name_offset: u16,
    #[br(args(file_name_length as u64))]
    #[brw(align_after = 8)]
    pub file_name: SizedWideString,
}

impl UsnRecordV3 {
    pub const FIXED_SIZE: usize = 76;
}

/// Response of FSCTL_SRV_ENUMERATE_SNAPSHOTS. This server exposes no
/// snapshots, but the shape is wire-exact.
///
/// Reference: MS-SMB2 2.2.32.2
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct SrvSnapshotArray {
    /// Snapshots existing for the file's volume.
    pub number_of_snap_shots: u32,
    /// Snapshots whose timestamps fit in this response.
    pub number_of_snap_shots_returned: u32,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    snap_shot_array_size: PosMarker<u32>,
    /// `@GMT-...` tokens, double-null terminated.
    #[br(map_stream = |s| binrw::io::TakeSeekExt::take_seek(s, snap_shot_array_size.value as u64))]
    #[bw(write_with = PosMarker::write_size, args(&snap_shot_array_size))]
    pub snap_shots: MultiWSz,
}
