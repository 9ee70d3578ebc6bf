//! Tree connect and disconnect messages.

use binrw::io::SeekFrom;
use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;

/// SMB2 TREE_CONNECT request.
///
/// The remoted-identity extension (MS-SMB2 2.2.9.1) is not accepted by this
/// server; a request with `extension_present` set fails to decode.
///
/// Reference: MS-SMB2 2.2.9
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct TreeConnectRequest {
    #[bw(calc = 9)]
    #[br(temp)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    #[br(assert(!flags.extension_present()))]
    pub flags: TreeConnectRequestFlags,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _path_offset: PosMarker<u16>,
    #[bw(try_calc = buffer.size().try_into())]
    #[br(temp)]
    path_length: u16,
    /// Full share path, `\\server\share` form.
    #[br(seek_before = SeekFrom::Start(_path_offset.value as u64))]
    #[br(args(path_length as u64))]
    #[bw(write_with = PosMarker::write_aoff, args(&_path_offset))]
    pub buffer: SizedWideString,
}

impl TreeConnectRequest {
    pub fn new(path: &str) -> Self {
        Self {
            flags: TreeConnectRequestFlags::new(),
            buffer: path.into(),
        }
    }

    /// The share component of the path, without server prefix.
    pub fn share_name(&self) -> &str {
        self.buffer.trim_end_matches('\\').rsplit('\\').next().unwrap_or("")
    }
}

/// TREE_CONNECT request flags (SMB 3.1.1).
///
/// Reference: MS-SMB2 2.2.9
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct TreeConnectRequestFlags {
    pub cluster_reconnect: bool,
    pub redirect_to_owner: bool,
    pub extension_present: bool,
    #[skip]
    __: B13,
}

/// SMB2 TREE_CONNECT response.
///
/// Reference: MS-SMB2 2.2.10
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct TreeConnectResponse {
    #[bw(calc = 16)]
    #[br(temp)]
    #[br(assert(_structure_size == 16))]
    _structure_size: u16,
    pub share_type: ShareType,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    pub share_flags: ShareFlags,
    pub capabilities: TreeCapabilities,
    /// Maximal access the session has on the share root.
    pub maximal_access: u32,
}

/// Caching policy advertised for a share.
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[bits = 4]
pub enum ShareCacheMode {
    Manual,
    Auto,
    Vdo,
    NoCache,
}

/// Share flags.
///
/// Reference: MS-SMB2 2.2.10
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct ShareFlags {
    pub dfs: bool,
    pub dfs_root: bool,
    #[skip]
    __: B2,
    pub caching_mode: ShareCacheMode,

    pub restrict_exclusive_opens: bool,
    pub force_shared_delete: bool,
    pub allow_namespace_caching: bool,
    pub access_based_directory_enum: bool,
    pub force_levelii_oplock: bool,
    pub enable_hash_v1: bool,
    pub enable_hash_v2: bool,
    pub encrypt_data: bool,

    #[skip]
    __: B2,
    pub identity_remoting: bool,
    #[skip]
    __: B1,
    pub compress_data: bool,
    pub isolated_transport: bool,
    #[skip]
    __: B10,
}

/// Tree connect capability flags.
///
/// Reference: MS-SMB2 2.2.10
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct TreeCapabilities {
    #[skip]
    __: B3,
    pub dfs: bool,
    pub continuous_availability: bool,
    pub scaleout: bool,
    pub cluster: bool,
    pub asymmetric: bool,

    pub redirect_to_owner: bool,
    #[skip]
    __: B23,
}

/// The kind of resource a share exposes.
///
/// Reference: MS-SMB2 2.2.10
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u8))]
pub enum ShareType {
    Disk = 0x1,
    Pipe = 0x2,
    Print = 0x3,
}

/// SMB2 TREE_DISCONNECT request.
///
/// Reference: MS-SMB2 2.2.11
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct TreeDisconnectRequest {
    #[bw(calc = 4)]
    #[br(temp)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

/// SMB2 TREE_DISCONNECT response.
///
/// Reference: MS-SMB2 2.2.12
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct TreeDisconnectResponse {
    #[bw(calc = 4)]
    #[br(temp)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}
