//! Create and close messages, including create contexts.

use std::fmt::{Debug, Display};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use binrw::io::TakeSeekExt;
use binrw::{Endian, prelude::*};
use modular_bitfield::prelude::*;

use smb_dtyp::binrw_util::prelude::*;
use smb_fscc::{CHAINED_ITEM_PREFIX_SIZE, ChainedItemList, FileAccessMask, FileAttributes};

use super::oplock::LeaseState;

/// SMB2_FILEID: identifies an open on the wire.
///
/// Reference: MS-SMB2 2.2.14.1
#[binrw::binrw]
#[derive(PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct FileId {
    pub persistent: u64,
    pub volatile: u64,
}

impl FileId {
    pub const EMPTY: FileId = FileId {
        persistent: 0,
        volatile: 0,
    };
    /// All-ones file ID, required by some FSCTLs and async operations.
    pub const FULL: FileId = FileId {
        persistent: u64::MAX,
        volatile: u64::MAX,
    };
}

impl From<[u8; 16]> for FileId {
    fn from(data: [u8; 16]) -> Self {
        let mut cursor = Cursor::new(data);
        Self::read_le(&mut cursor).unwrap()
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{:x}|{:x}}}", self.persistent, self.volatile)
    }
}

impl Debug for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileId({})", self)
    }
}

/// Oplock levels carried in CREATE and OPLOCK_BREAK messages.
///
/// Reference: MS-SMB2 2.2.13
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[brw(repr(u8))]
pub enum OplockLevel {
    #[default]
    None = 0x00,
    II = 0x01,
    Exclusive = 0x08,
    Batch = 0x09,
    /// A lease is requested through a create context instead.
    Lease = 0xFF,
}

/// SMB2 CREATE request.
///
/// Reference: MS-SMB2 2.2.13
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct CreateRequest {
    #[bw(calc = 57)]
    #[br(temp)]
    #[br(assert(_structure_size == 57))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _security_flags: u8,
    /// The oplock level requested for this open.
    pub requested_oplock_level: OplockLevel,
    pub impersonation_level: ImpersonationLevel,
    #[bw(calc = 0)]
    #[br(temp)]
    _smb_create_flags: u64,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u64,
    /// Access required for the file or pipe.
    pub desired_access: FileAccessMask,
    /// Attributes applied when creating a file.
    pub file_attributes: FileAttributes,
    pub share_access: ShareAccessFlags,
    pub create_disposition: CreateDisposition,
    pub create_options: CreateOptions,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _name_offset: PosMarker<u16>,
    #[bw(try_calc = name.size().try_into())]
    #[br(temp)]
    name_length: u16,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _create_contexts_offset: PosMarker<u32>,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _create_contexts_length: PosMarker<u32>,

    /// Share-relative path to create or open.
    #[brw(align_before = 8)]
    #[br(seek_before = SeekFrom::Start(_name_offset.value as u64))]
    #[br(args(name_length as u64))]
    #[bw(write_with = PosMarker::write_aoff, args(&_name_offset))]
    pub name: SizedWideString,

    /// Create contexts attached to the request.
    #[brw(align_before = 8)]
    #[bw(if(!contexts.is_empty()))]
    #[br(if(_create_contexts_length.value > 0))]
    #[br(seek_before = SeekFrom::Start(_create_contexts_offset.value as u64))]
    #[br(map_stream = |s| s.take_seek(_create_contexts_length.value.into()))]
    #[bw(write_with = PosMarker::write_aoff_size, args(&_create_contexts_offset, &_create_contexts_length))]
    pub contexts: ChainedItemList<CreateContextRequest, 8>,
}

impl CreateRequest {
    /// The first lease context in the request, if any.
    pub fn lease_context(&self) -> Option<&LeaseContext> {
        self.contexts.iter().find_map(|ctx| match &ctx.data {
            CreateContextRequestData::Lease(lease) => Some(lease),
            _ => None,
        })
    }
}

/// Impersonation level requested by the creating application.
///
/// Reference: MS-SMB2 2.2.13
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
#[brw(repr(u32))]
pub enum ImpersonationLevel {
    Anonymous = 0x0,
    Identification = 0x1,
    #[default]
    Impersonation = 0x2,
    Delegate = 0x3,
}

/// Action the server takes when the target exists or is missing.
///
/// Reference: MS-SMB2 2.2.13
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
#[brw(repr(u32))]
pub enum CreateDisposition {
    /// Supersede an existing file, create otherwise.
    Supersede = 0x0,
    /// Open an existing file, fail otherwise.
    #[default]
    Open = 0x1,
    /// Create a new file, fail if it exists.
    Create = 0x2,
    /// Open an existing file, create otherwise.
    OpenIf = 0x3,
    /// Overwrite an existing file, fail otherwise.
    Overwrite = 0x4,
    /// Overwrite an existing file, create otherwise.
    OverwriteIf = 0x5,
}

/// Options applied when creating or opening the file.
///
/// Reference: MS-SMB2 2.2.13
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct CreateOptions {
    /// The open must be a directory.
    pub directory_file: bool,
    pub write_through: bool,
    pub sequential_only: bool,
    pub no_intermediate_buffering: bool,

    pub synchronous_io_alert: bool,
    pub synchronous_io_nonalert: bool,
    /// The open must not be a directory.
    pub non_directory_file: bool,
    #[skip]
    __: bool,

    pub complete_if_oplocked: bool,
    pub no_ea_knowledge: bool,
    pub open_remote_instance: bool,
    pub random_access: bool,

    /// Delete the file when the last handle closes. Requires DELETE access.
    pub delete_on_close: bool,
    pub open_by_file_id: bool,
    pub open_for_backup_intent: bool,
    pub no_compression: bool,

    pub open_requiring_oplock: bool,
    pub disallow_exclusive: bool,
    #[skip]
    __: B2,

    pub reserve_opfilter: bool,
    /// Open the reparse point itself rather than its target.
    pub open_reparse_point: bool,
    pub open_no_recall: bool,
    pub open_for_free_space_query: bool,

    #[skip]
    __: B8,
}

/// Sharing mode for the open.
///
/// Reference: MS-SMB2 2.2.13
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct ShareAccessFlags {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    #[skip]
    __: B29,
}

/// SMB2 CREATE response.
///
/// Reference: MS-SMB2 2.2.14
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct CreateResponse {
    #[bw(calc = 89)]
    #[br(temp)]
    #[br(assert(_structure_size == 89))]
    _structure_size: u16,
    /// The oplock level granted.
    pub oplock_level: OplockLevel,
    pub flags: CreateResponseFlags,
    /// How the open was established.
    pub create_action: CreateAction,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub allocation_size: u64,
    pub endof_file: u64,
    pub file_attributes: FileAttributes,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    /// The established open.
    pub file_id: FileId,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _create_contexts_offset: PosMarker<u32>,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _create_contexts_length: PosMarker<u32>,

    /// Create contexts attached to the response.
    #[brw(align_before = 8)]
    #[bw(if(!create_contexts.is_empty()))]
    #[br(if(_create_contexts_length.value > 0))]
    #[br(seek_before = SeekFrom::Start(_create_contexts_offset.value as u64))]
    #[br(map_stream = |s| s.take_seek(_create_contexts_length.value.into()))]
    #[bw(write_with = PosMarker::write_aoff_size, args(&_create_contexts_offset, &_create_contexts_length))]
    pub create_contexts: ChainedItemList<CreateContextResponse, 8>,
}

/// CREATE response flags.
///
/// Reference: MS-SMB2 2.2.14
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct CreateResponseFlags {
    /// The final path component is a reparse point.
    pub reparsepoint: bool,
    #[skip]
    __: B7,
}

/// The action taken in establishing the open.
///
/// Reference: MS-SMB2 2.2.14
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[brw(repr(u32))]
pub enum CreateAction {
    Superseded = 0x0,
    #[default]
    Opened = 0x1,
    Created = 0x2,
    Overwritten = 0x3,
}

/// Name of the lease create context.
pub const CREATE_CONTEXT_LEASE: &[u8] = b"RqLs";

/// A lease request or response carried in an `RqLs` create context, in the
/// v1 (32-byte) or v2 (52-byte) form.
///
/// Reference: MS-SMB2 2.2.13.2.8, 2.2.13.2.10
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LeaseContext {
    V1(LeaseContextV1),
    V2(LeaseContextV2),
}

impl LeaseContext {
    pub fn lease_key(&self) -> u128 {
        match self {
            LeaseContext::V1(v1) => v1.lease_key,
            LeaseContext::V2(v2) => v2.lease_key,
        }
    }

    pub fn lease_state(&self) -> LeaseState {
        match self {
            LeaseContext::V1(v1) => v1.lease_state,
            LeaseContext::V2(v2) => v2.lease_state,
        }
    }

    const V1_SIZE: usize = 32;
    const V2_SIZE: usize = 52;
}

impl BinRead for LeaseContext {
    type Args<'a> = (usize,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        (data_length,): Self::Args<'_>,
    ) -> BinResult<Self> {
        match data_length {
            Self::V1_SIZE => Ok(Self::V1(LeaseContextV1::read_options(reader, endian, ())?)),
            Self::V2_SIZE => Ok(Self::V2(LeaseContextV2::read_options(reader, endian, ())?)),
            other => Err(binrw::Error::AssertFail {
                pos: reader.stream_position()?,
                message: format!("invalid lease context length {other}"),
            }),
        }
    }
}

impl BinWrite for LeaseContext {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        match self {
            LeaseContext::V1(v1) => v1.write_options(writer, endian, ()),
            LeaseContext::V2(v2) => v2.write_options(writer, endian, ()),
        }
    }
}

/// Lease context payload, version 1 (SMB 2.1+).
///
/// Reference: MS-SMB2 2.2.13.2.8
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LeaseContextV1 {
    /// Client-chosen key identifying the lease owner.
    pub lease_key: u128,
    /// Requested or granted lease state.
    pub lease_state: LeaseState,
    #[bw(calc = 0)]
    #[br(temp)]
    _lease_flags: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _lease_duration: u64,
}

/// Lease context payload, version 2 (SMB 3.x).
///
/// Reference: MS-SMB2 2.2.13.2.10
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LeaseContextV2 {
    pub lease_key: u128,
    pub lease_state: LeaseState,
    pub lease_flags: LeaseFlags,
    #[bw(calc = 0)]
    #[br(temp)]
    _lease_duration: u64,
    /// Lease key of the parent directory, when the flag is set.
    pub parent_lease_key: u128,
    /// Tracks lease state changes across breaks.
    pub epoch: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

/// Lease context flags (v2).
///
/// Reference: MS-SMB2 2.2.13.2.10
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct LeaseFlags {
    #[skip]
    __: B2,
    /// `parent_lease_key` is set.
    pub parent_lease_key_set: bool,
    #[skip]
    __: B29,
}

/// Payload of a create context in a request.
#[derive(Debug, PartialEq, Eq)]
pub enum CreateContextRequestData {
    /// A lease request (`RqLs`).
    Lease(LeaseContext),
    /// Any context this server does not interpret, kept as raw bytes.
    Raw(Vec<u8>),
}

/// One create context from a CREATE request, to be carried inside a
/// [`ChainedItemList<CreateContextRequest, 8>`].
///
/// Reference: MS-SMB2 2.2.13.2
#[derive(Debug, PartialEq, Eq)]
pub struct CreateContextRequest {
    pub name: Vec<u8>,
    pub data: CreateContextRequestData,
}

impl BinRead for CreateContextRequest {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        // The chained-list wrapper has consumed the next-entry prefix;
        // context offsets are relative to the start of that prefix.
        let item_start = reader.stream_position()? - CHAINED_ITEM_PREFIX_SIZE as u64;
        let name_offset = u16::read_options(reader, endian, ())?;
        let name_length = u16::read_options(reader, endian, ())?;
        let _reserved = u16::read_options(reader, endian, ())?;
        let data_offset = u16::read_options(reader, endian, ())?;
        let data_length = u32::read_options(reader, endian, ())?;

        reader.seek(SeekFrom::Start(item_start + name_offset as u64))?;
        let mut name = vec![0u8; name_length as usize];
        reader.read_exact(&mut name)?;

        let data = if data_length == 0 {
            CreateContextRequestData::Raw(Vec::new())
        } else {
            reader.seek(SeekFrom::Start(item_start + data_offset as u64))?;
            if name == CREATE_CONTEXT_LEASE {
                CreateContextRequestData::Lease(LeaseContext::read_options(
                    reader,
                    endian,
                    (data_length as usize,),
                )?)
            } else {
                let mut raw = vec![0u8; data_length as usize];
                reader.read_exact(&mut raw)?;
                CreateContextRequestData::Raw(raw)
            }
        };

        Ok(Self { name, data })
    }
}

// Context header (after the chain prefix): name offset/length, reserved,
// data offset/length. Offsets count from the chain prefix.
const CONTEXT_HEADER_SIZE: usize = 12;
const CONTEXT_NAME_OFFSET: usize = CHAINED_ITEM_PREFIX_SIZE + CONTEXT_HEADER_SIZE; // 16

fn write_context_body<W: Write + Seek>(
    writer: &mut W,
    endian: Endian,
    name: &[u8],
    data: &[u8],
) -> BinResult<()> {
    let name_end = CONTEXT_NAME_OFFSET + name.len();
    let data_offset = if data.is_empty() {
        0
    } else {
        name_end.div_ceil(8) * 8
    };

    (CONTEXT_NAME_OFFSET as u16).write_options(writer, endian, ())?;
    (name.len() as u16).write_options(writer, endian, ())?;
    0u16.write_options(writer, endian, ())?;
    (data_offset as u16).write_options(writer, endian, ())?;
    (data.len() as u32).write_options(writer, endian, ())?;
    writer.write_all(name)?;
    if !data.is_empty() {
        writer.write_all(&vec![0u8; data_offset - name_end])?;
        writer.write_all(data)?;
    }
    Ok(())
}

impl BinWrite for CreateContextRequest {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let mut data = Cursor::new(Vec::new());
        match &self.data {
            CreateContextRequestData::Lease(lease) => lease.write_options(&mut data, endian, ())?,
            CreateContextRequestData::Raw(raw) => data.write_all(raw)?,
        }
        write_context_body(writer, endian, &self.name, &data.into_inner())
    }
}

/// One create context in a CREATE response.
///
/// Reference: MS-SMB2 2.2.14.2
#[derive(Debug, PartialEq, Eq)]
pub struct CreateContextResponse {
    pub name: Vec<u8>,
    pub data: CreateContextResponseData,
}

/// Payload of a create context in a response.
#[derive(Debug, PartialEq, Eq)]
pub enum CreateContextResponseData {
    /// The granted lease (`RqLs`).
    Lease(LeaseContext),
}

impl From<LeaseContext> for CreateContextResponse {
    fn from(lease: LeaseContext) -> Self {
        Self {
            name: CREATE_CONTEXT_LEASE.to_vec(),
            data: CreateContextResponseData::Lease(lease),
        }
    }
}

impl BinRead for CreateContextResponse {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let item_start = reader.stream_position()? - CHAINED_ITEM_PREFIX_SIZE as u64;
        let name_offset = u16::read_options(reader, endian, ())?;
        let name_length = u16::read_options(reader, endian, ())?;
        let _reserved = u16::read_options(reader, endian, ())?;
        let data_offset = u16::read_options(reader, endian, ())?;
        let data_length = u32::read_options(reader, endian, ())?;

        reader.seek(SeekFrom::Start(item_start + name_offset as u64))?;
        let mut name = vec![0u8; name_length as usize];
        reader.read_exact(&mut name)?;
        if name != CREATE_CONTEXT_LEASE {
            return Err(binrw::Error::AssertFail {
                pos: item_start,
                message: "unsupported response create context".to_string(),
            });
        }

        reader.seek(SeekFrom::Start(item_start + data_offset as u64))?;
        let lease = LeaseContext::read_options(reader, endian, (data_length as usize,))?;
        Ok(Self {
            name,
            data: CreateContextResponseData::Lease(lease),
        })
    }
}

impl BinWrite for CreateContextResponse {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let mut data = Cursor::new(Vec::new());
        match &self.data {
            CreateContextResponseData::Lease(lease) => {
                lease.write_options(&mut data, endian, ())?
            }
        }
        write_context_body(writer, endian, &self.name, &data.into_inner())
    }
}

/// SMB2 CLOSE request.
///
/// Reference: MS-SMB2 2.2.15
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct CloseRequest {
    #[bw(calc = 24)]
    #[br(temp)]
    #[br(assert(_structure_size == 24))]
    _structure_size: u16,
    pub flags: CloseFlags,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    pub file_id: FileId,
}

/// CLOSE request/response flags.
///
/// Reference: MS-SMB2 2.2.15
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct CloseFlags {
    /// Return (request) or carry (response) post-close attributes.
    pub postquery_attrib: bool,
    #[skip]
    __: B15,
}

/// SMB2 CLOSE response.
///
/// Reference: MS-SMB2 2.2.16
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct CloseResponse {
    #[bw(calc = 60)]
    #[br(temp)]
    #[br(assert(_structure_size == 60))]
    _structure_size: u16,
    pub flags: CloseFlags,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub allocation_size: u64,
    pub endof_file: u64,
    pub file_attributes: FileAttributes,
}
