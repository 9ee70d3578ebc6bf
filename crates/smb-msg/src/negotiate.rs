//! Negotiate request and response.

use binrw::io::{SeekFrom, TakeSeekExt};
use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;
use smb_dtyp::guid::Guid;

/// SMB2 NEGOTIATE request: the dialects the client understands.
///
/// Reference: MS-SMB2 2.2.3
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct NegotiateRequest {
    #[bw(calc = 36)]
    #[br(temp)]
    #[br(assert(_structure_size == 36))]
    _structure_size: u16,
    #[bw(try_calc = dialects.len().try_into())]
    #[br(temp)]
    dialect_count: u16,
    /// Client signing requirements.
    pub security_mode: NegotiateSecurityMode,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    /// Client capabilities.
    pub capabilities: GlobalCapabilities,
    /// Identifies the client across connections.
    pub client_guid: Guid,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    negotiate_context_offset: PosMarker<u32>,
    #[bw(try_calc = negotiate_context_list.as_ref().map(|v| v.len()).unwrap_or(0).try_into())]
    #[br(temp)]
    negotiate_context_count: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u16,
    /// Dialect revisions offered, in client preference order.
    #[br(count = dialect_count)]
    pub dialects: Vec<Dialect>,
    /// Negotiate contexts; present only when 3.1.1 is offered.
    #[brw(if(dialects.contains(&Dialect::Smb0311)), align_before = 8)]
    #[br(count = negotiate_context_count, seek_before = SeekFrom::Start(negotiate_context_offset.value as u64))]
    #[bw(write_with = PosMarker::write_aoff, args(&negotiate_context_offset))]
    pub negotiate_context_list: Option<Vec<NegotiateContext>>,
}

/// Signing negotiation flags.
///
/// Reference: MS-SMB2 2.2.3
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct NegotiateSecurityMode {
    /// Signing is enabled.
    pub signing_enabled: bool,
    /// Signing is required.
    pub signing_required: bool,
    #[skip]
    __: B14,
}

/// Global SMB2/SMB3 capability flags.
///
/// Reference: MS-SMB2 2.2.3
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct GlobalCapabilities {
    /// DFS support.
    pub dfs: bool,
    /// File leasing support.
    pub leasing: bool,
    /// Multi-credit (large MTU) support.
    pub large_mtu: bool,
    /// Multi-channel support.
    pub multi_channel: bool,

    /// Persistent handle support.
    pub persistent_handles: bool,
    /// Directory leasing support.
    pub directory_leasing: bool,
    /// Encryption support.
    pub encryption: bool,
    /// Server notifications support.
    pub notifications: bool,

    #[skip]
    __: B24,
}

/// SMB2 NEGOTIATE response: the server's selected dialect and limits.
///
/// Reference: MS-SMB2 2.2.4
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct NegotiateResponse {
    #[bw(calc = 65)]
    #[br(temp)]
    #[br(assert(_structure_size == 65))]
    _structure_size: u16,
    /// Server signing requirements.
    pub security_mode: NegotiateSecurityMode,
    /// The dialect selected for this connection.
    pub dialect_revision: NegotiateDialect,
    #[bw(try_calc = negotiate_context_list.as_ref().map(|v| v.len()).unwrap_or(0).try_into())]
    #[br(temp)]
    negotiate_context_count: u16,
    /// Identifies the server across connections.
    pub server_guid: Guid,
    /// Server capabilities.
    pub capabilities: GlobalCapabilities,
    /// Maximum transaction (info/ioctl) size accepted.
    pub max_transact_size: u32,
    /// Maximum read size accepted.
    pub max_read_size: u32,
    /// Maximum write size accepted.
    pub max_write_size: u32,
    /// Current server time.
    pub system_time: FileTime,
    /// Server start time.
    pub server_start_time: FileTime,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _security_buffer_offset: PosMarker<u16>,
    #[bw(try_calc = buffer.len().try_into())]
    #[br(temp)]
    security_buffer_length: u16,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    negotiate_context_offset: PosMarker<u32>,
    /// GSSAPI token for the first SESSION_SETUP leg; may be empty.
    #[br(count = security_buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&_security_buffer_offset))]
    pub buffer: Vec<u8>,

    /// Negotiate contexts; present only on a 3.1.1 selection.
    #[brw(if(matches!(dialect_revision, NegotiateDialect::Smb0311)), align_before = 8)]
    #[br(count = negotiate_context_count, seek_before = SeekFrom::Start(negotiate_context_offset.value as u64))]
    #[bw(write_with = PosMarker::write_aoff, args(&negotiate_context_offset))]
    pub negotiate_context_list: Option<Vec<NegotiateContext>>,
}

/// SMB2/SMB3 protocol dialect revisions.
///
/// Reference: MS-SMB2 2.2.3
#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
#[brw(repr(u16))]
pub enum Dialect {
    Smb0202 = 0x0202,
    Smb021 = 0x0210,
    Smb030 = 0x0300,
    Smb0302 = 0x0302,
    Smb0311 = 0x0311,
}

impl Dialect {
    pub const MAX: Dialect = Dialect::Smb0311;
    pub const MIN: Dialect = Dialect::Smb0202;

    /// Whether this is an SMB3 dialect.
    #[inline]
    pub fn is_smb3(&self) -> bool {
        self >= &Dialect::Smb030
    }
}

/// Dialect values valid in a NEGOTIATE response: every [`Dialect`] plus the
/// SMB 2.x wildcard.
///
/// Reference: MS-SMB2 2.2.4
#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u16))]
pub enum NegotiateDialect {
    Smb0202 = Dialect::Smb0202 as isize,
    Smb021 = Dialect::Smb021 as isize,
    Smb030 = Dialect::Smb030 as isize,
    Smb0302 = Dialect::Smb0302 as isize,
    Smb0311 = Dialect::Smb0311 as isize,
    Smb02Wildcard = 0x02FF,
}

impl From<Dialect> for NegotiateDialect {
    fn from(value: Dialect) -> Self {
        match value {
            Dialect::Smb0202 => NegotiateDialect::Smb0202,
            Dialect::Smb021 => NegotiateDialect::Smb021,
            Dialect::Smb030 => NegotiateDialect::Smb030,
            Dialect::Smb0302 => NegotiateDialect::Smb0302,
            Dialect::Smb0311 => NegotiateDialect::Smb0311,
        }
    }
}

impl TryFrom<NegotiateDialect> for Dialect {
    type Error = crate::SmbMsgError;

    fn try_from(value: NegotiateDialect) -> Result<Self, Self::Error> {
        match value {
            NegotiateDialect::Smb0202 => Ok(Dialect::Smb0202),
            NegotiateDialect::Smb021 => Ok(Dialect::Smb021),
            NegotiateDialect::Smb030 => Ok(Dialect::Smb030),
            NegotiateDialect::Smb0302 => Ok(Dialect::Smb0302),
            NegotiateDialect::Smb0311 => Ok(Dialect::Smb0311),
            _ => Err(Self::Error::InvalidDialect(value)),
        }
    }
}

/// One negotiate context. This server never selects 3.1.1, so context
/// payloads are carried opaquely rather than interpreted.
///
/// Reference: MS-SMB2 2.2.3.1
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct NegotiateContext {
    #[brw(align_before = 8)]
    pub context_type: u16,
    #[bw(try_calc = data.len().try_into())]
    #[br(temp)]
    data_length: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    #[br(count = data_length)]
    pub data: Vec<u8>,
}
