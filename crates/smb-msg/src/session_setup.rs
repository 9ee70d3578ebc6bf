//! Session setup and logoff messages.

use binrw::io::SeekFrom;
use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;

use super::negotiate::GlobalCapabilities;

/// SMB2 SESSION_SETUP request, carrying one leg of the authentication
/// exchange in its security buffer.
///
/// Reference: MS-SMB2 2.2.5
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct SessionSetupRequest {
    #[bw(calc = 25)]
    #[br(temp)]
    #[br(assert(_structure_size == 25))]
    _structure_size: u16,
    pub flags: SessionSetupFlags,
    /// Client signing requirements for this session.
    pub security_mode: SessionSecurityMode,
    pub capabilities: GlobalCapabilities,
    #[bw(calc = 0)]
    #[br(temp)]
    _channel: u32,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _security_buffer_offset: PosMarker<u16>,
    #[bw(try_calc = buffer.len().try_into())]
    #[br(temp)]
    security_buffer_length: u16,
    /// Previous session to invalidate on reconnect; zero otherwise.
    pub previous_session_id: u64,
    /// Authentication token (SPNEGO-wrapped or raw NTLM).
    #[br(seek_before = SeekFrom::Start(_security_buffer_offset.value as u64))]
    #[br(count = security_buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&_security_buffer_offset))]
    pub buffer: Vec<u8>,
}

/// SESSION_SETUP request flags.
///
/// Reference: MS-SMB2 2.2.5
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct SessionSetupFlags {
    /// The request binds an existing session to a new connection.
    pub binding: bool,
    #[skip]
    __: B7,
}

/// Per-session signing mode byte.
///
/// Reference: MS-SMB2 2.2.5
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct SessionSecurityMode {
    pub signing_enabled: bool,
    pub signing_required: bool,
    #[skip]
    __: B6,
}

/// SMB2 SESSION_SETUP response.
///
/// Reference: MS-SMB2 2.2.6
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct SessionSetupResponse {
    #[bw(calc = 9)]
    #[br(temp)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    pub session_flags: SessionFlags,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _security_buffer_offset: PosMarker<u16>,
    #[bw(try_calc = buffer.len().try_into())]
    #[br(temp)]
    security_buffer_length: u16,
    /// Authentication token for the next leg; empty once complete.
    #[br(seek_before = SeekFrom::Start(_security_buffer_offset.value as u64))]
    #[br(count = security_buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&_security_buffer_offset))]
    pub buffer: Vec<u8>,
}

/// Flags describing the established session.
///
/// Reference: MS-SMB2 2.2.6
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct SessionFlags {
    /// The session is a guest session.
    pub guest: bool,
    /// The session is an anonymous (null) session.
    pub null: bool,
    /// The server requires encryption on this session (SMB 3.x).
    pub encrypt_data: bool,
    #[skip]
    __: B13,
}

/// SMB2 LOGOFF request.
///
/// Reference: MS-SMB2 2.2.7
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct LogoffRequest {
    #[bw(calc = 4)]
    #[br(temp)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

/// SMB2 LOGOFF response.
///
/// Reference: MS-SMB2 2.2.8
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct LogoffResponse {
    #[bw(calc = 4)]
    #[br(temp)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}
