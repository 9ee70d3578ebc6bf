//! Byte-range lock request and response.

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use super::FileId;

/// SMB2 LOCK request: lock or unlock byte ranges of one file. Several
/// ranges can be carried in a single request.
///
/// Reference: MS-SMB2 2.2.26
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct LockRequest {
    #[bw(calc = 48)]
    #[br(temp)]
    #[br(assert(_structure_size == 48))]
    _structure_size: u16,
    /// Number of elements in `locks`; at least one.
    #[bw(try_calc = locks.len().try_into())]
    #[br(temp)]
    lock_count: u16,
    /// Lock sequence bookkeeping for resilient handles; unused in 2.0.2.
    pub lock_sequence: LockSequence,
    /// The file whose ranges are affected.
    pub file_id: FileId,
    /// Ranges to lock or unlock, applied in order.
    #[br(count = lock_count)]
    pub locks: Vec<LockElement>,
}

/// Lock sequence number and index.
///
/// Reference: MS-SMB2 2.2.26
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct LockSequence {
    pub number: B4,
    pub index: B28,
}

/// SMB2_LOCK_ELEMENT: one byte range and how to process it.
///
/// Reference: MS-SMB2 2.2.26.1
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LockElement {
    /// Starting byte offset of the range.
    pub offset: u64,
    /// Length of the range in bytes.
    pub length: u64,
    pub flags: LockFlag,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
}

/// How a lock element is processed. Exactly one of `shared`, `exclusive`
/// or `unlock` must be set; `fail_immediately` may accompany the first two.
///
/// Reference: MS-SMB2 2.2.26.1
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct LockFlag {
    /// Lock the range shared: other opens may read or lock shared.
    pub shared: bool,
    /// Lock the range exclusive: no other open may read, write or lock it.
    pub exclusive: bool,
    /// Unlock a previously locked identical range.
    pub unlock: bool,
    #[skip]
    __: bool,
    /// Fail at once on conflict instead of waiting for the range.
    pub fail_immediately: bool,
    #[skip]
    __: B27,
}

/// SMB2 LOCK response.
///
/// Reference: MS-SMB2 2.2.27
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct LockResponse {
    #[bw(calc = 4)]
    #[br(temp)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}
