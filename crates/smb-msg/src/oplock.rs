//! Oplock and lease break messages.

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use super::FileId;
use super::create::OplockLevel;

/// Oplock break notification/acknowledgment/response. The same structure
/// serves all three directions.
///
/// Reference: MS-SMB2 2.2.23.1, 2.2.24.1, 2.2.25.1
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct OplockBreakMsg {
    #[bw(calc = 24)]
    #[br(temp)]
    #[br(assert(_structure_size == 24))]
    _structure_size: u16,
    /// The level being broken to (notification), accepted (ack), or
    /// granted (response).
    pub oplock_level: OplockLevel,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    /// The open whose oplock is breaking.
    pub file_id: FileId,
}

pub use OplockBreakMsg as OplockBreakAck;
pub use OplockBreakMsg as OplockBreakNotify;
pub use OplockBreakMsg as OplockBreakResponse;

/// Lease state flags, in wire order (read, handle, write).
///
/// Note that the handle and write bits are swapped relative to the
/// R/W/H convention used by lease management internals.
///
/// Reference: MS-SMB2 2.2.23.2
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct LeaseState {
    /// Read caching granted/requested.
    pub read_caching: bool,
    /// Handle caching granted/requested.
    pub handle_caching: bool,
    /// Write caching granted/requested.
    pub write_caching: bool,
    #[skip]
    __: B29,
}

/// Lease break notification, server to client.
///
/// Reference: MS-SMB2 2.2.23.2
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct LeaseBreakNotify {
    #[bw(calc = 44)]
    #[br(temp)]
    #[br(assert(_structure_size == 44))]
    _structure_size: u16,
    /// Lease epoch after the break (SMB 3.x; reserved on 2.1).
    pub new_epoch: u16,
    /// Non-zero when a break acknowledgment is required.
    pub flags: u32,
    /// The client-chosen key identifying the lease.
    pub lease_key: u128,
    /// State held before the break.
    pub current_lease_state: LeaseState,
    /// State the lease is breaking to.
    pub new_lease_state: LeaseState,
    #[bw(calc = 0)]
    #[br(temp)]
    _break_reason: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _access_mask_hint: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _share_mask_hint: u32,
}

impl LeaseBreakNotify {
    /// Flags value requiring the client to acknowledge the break.
    pub const ACK_REQUIRED: u32 = 0x01;
}

/// Lease break acknowledgment (client to server) and response (server to
/// client); both directions share the shape.
///
/// Reference: MS-SMB2 2.2.24.2, 2.2.25.2
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct LeaseBreakAckResponse {
    #[bw(calc = 36)]
    #[br(temp)]
    #[br(assert(_structure_size == 36))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _flags: u32,
    /// The client-chosen key identifying the lease.
    pub lease_key: u128,
    /// Acknowledged (ack) or resulting (response) lease state.
    pub lease_state: LeaseState,
    #[bw(calc = 0)]
    #[br(temp)]
    _lease_duration: u64,
}

pub use LeaseBreakAckResponse as LeaseBreakAck;
pub use LeaseBreakAckResponse as LeaseBreakResponse;
