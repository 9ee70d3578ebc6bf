//! Collaborator contracts: the external services the server core drives.
//!
//! Everything stateful that is not session/handle bookkeeping lives behind
//! these traits - file metadata and payload, the unified lock store, the
//! named-pipe engine, authentication, and break notification delivery.

use std::net::SocketAddr;
use std::time::SystemTime;

use async_trait::async_trait;

/// Opaque handle into the metadata backend for an open node.
pub type MetadataHandle = u64;

/// Identifier of a file's payload stream in the payload store.
pub type PayloadId = u64;

/// Opaque directory paging cursor handed back by the metadata backend.
pub type DirCursor = u64;

/// Errors surfaced by backend services. The dispatcher maps each variant to
/// an NT status; see `ServerError`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("byte range is locked")]
    Locked,
    #[error("no matching lock")]
    LockNotFound,
    #[error("target is a directory")]
    IsDirectory,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("{0}")]
    Other(String),
}

/// The kind of a node as reported by the metadata backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
}

impl FileKind {
    /// Unix special kinds that never appear in SMB2 directory listings.
    pub fn is_special(&self) -> bool {
        matches!(
            self,
            FileKind::Fifo | FileKind::Socket | FileKind::CharDevice | FileKind::BlockDevice
        )
    }
}

/// Attributes of a node, as far as the wire protocol needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// Backend-assigned numeric node ID.
    pub id: u64,
    pub kind: FileKind,
    pub size: u64,
    pub allocation_size: u64,
    pub creation_time: smb_dtyp::FileTime,
    pub last_access_time: smb_dtyp::FileTime,
    pub last_write_time: smb_dtyp::FileTime,
    pub change_time: smb_dtyp::FileTime,
    pub readonly: bool,
    /// Hard link count; 1 for most files.
    pub links: u32,
}

/// One entry of a directory page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub info: FileInfo,
}

/// Authenticated identity attached to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub username: String,
    pub domain: String,
    pub uid: u32,
    pub gid: u32,
    pub display_name: String,
}

/// Credentials a metadata operation runs under.
///
/// `Root` exists for the delete-on-close fallback: when the owning session
/// is already gone, the disposition set at CREATE time (which validated
/// DELETE access) must still be honoured rather than leaking the file.
#[derive(Debug, Clone)]
pub enum Credentials {
    Identity(AuthIdentity),
    Guest,
    Root,
}

/// Identity of a byte-range lock owner in the unified lock store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOwner {
    /// Protocol tag, e.g. `"smb2"` or `"nlm"`.
    pub protocol: &'static str,
    /// Client identifier (network address).
    pub client: String,
    /// Share the owner is connected to.
    pub share: String,
    /// Owning SMB2 session, when the protocol is SMB2.
    pub session_id: u64,
}

/// How a CREATE resolves an existing or missing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenDisposition {
    Supersede,
    Open,
    Create,
    OpenIf,
    Overwrite,
    OverwriteIf,
}

/// Parameters of a metadata open.
#[derive(Debug, Clone)]
pub struct OpenParams {
    /// Share-relative path, `\`-separated as it came off the wire.
    pub path: String,
    pub disposition: OpenDisposition,
    /// The open must be (true) or must not be (false) a directory;
    /// `None` accepts either.
    pub directory: Option<bool>,
    /// DELETE access is requested; required for delete-on-close.
    pub delete_access: bool,
    /// Write-class access is requested.
    pub write_access: bool,
}

/// Result of a metadata open.
#[derive(Debug, Clone)]
pub struct OpenedNode {
    pub handle: MetadataHandle,
    pub payload: PayloadId,
    pub info: FileInfo,
    /// The open created the node.
    pub created: bool,
    /// Handle of the parent directory, for delete-on-close.
    pub parent: MetadataHandle,
    /// Name of the node within its parent.
    pub name: String,
}

/// Timestamp updates applied by SET_INFO; `None` fields are untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetBasicInfo {
    pub creation_time: Option<smb_dtyp::FileTime>,
    pub last_access_time: Option<smb_dtyp::FileTime>,
    pub last_write_time: Option<smb_dtyp::FileTime>,
    pub change_time: Option<smb_dtyp::FileTime>,
    pub readonly: Option<bool>,
}

/// Filesystem statistics for the QUERY_INFO filesystem classes.
#[derive(Debug, Clone, Copy)]
pub struct FsStatistics {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub block_size: u32,
}

/// A pending two-phase write reservation.
#[derive(Debug, Clone)]
pub struct WriteReservation {
    pub handle: MetadataHandle,
    pub token: u64,
}

/// The file attribute and namespace backend.
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Opens or creates a node per `params`.
    async fn open(
        &self,
        cred: &Credentials,
        share: &str,
        params: &OpenParams,
    ) -> Result<OpenedNode, ServiceError>;

    /// Closes a metadata handle. Idempotent.
    async fn close(&self, handle: MetadataHandle) -> Result<(), ServiceError>;

    async fn get_file(&self, handle: MetadataHandle) -> Result<FileInfo, ServiceError>;

    /// Reads one page of directory entries, up to `max_bytes` worth.
    async fn read_directory(
        &self,
        handle: MetadataHandle,
        cursor: Option<DirCursor>,
        max_bytes: u32,
    ) -> Result<(Vec<DirEntry>, Option<DirCursor>), ServiceError>;

    /// First phase of a write: reserve space up to `new_size`.
    async fn prepare_write(
        &self,
        handle: MetadataHandle,
        new_size: u64,
    ) -> Result<WriteReservation, ServiceError>;

    /// Second phase: publish the new size and timestamps.
    async fn commit_write(&self, reservation: WriteReservation) -> Result<(), ServiceError>;

    async fn read_at(
        &self,
        payload: PayloadId,
        offset: u64,
        length: u32,
    ) -> Result<Vec<u8>, ServiceError>;

    async fn lock_file(
        &self,
        handle: MetadataHandle,
        owner: &LockOwner,
        offset: u64,
        length: u64,
        exclusive: bool,
    ) -> Result<(), ServiceError>;

    async fn unlock_file(
        &self,
        handle: MetadataHandle,
        owner: &LockOwner,
        offset: u64,
        length: u64,
    ) -> Result<(), ServiceError>;

    /// Releases every byte-range lock `owner` holds on `handle`.
    async fn unlock_all_for_session(
        &self,
        handle: MetadataHandle,
        owner: &LockOwner,
    ) -> Result<(), ServiceError>;

    /// Verifies a data operation does not cross a conflicting lock.
    async fn check_lock_for_io(
        &self,
        handle: MetadataHandle,
        owner: &LockOwner,
        offset: u64,
        length: u64,
        is_write: bool,
    ) -> Result<(), ServiceError>;

    /// Reads a symlink target; `InvalidArgument` if not a symlink.
    async fn read_symlink(&self, handle: MetadataHandle) -> Result<String, ServiceError>;

    async fn remove_file(
        &self,
        cred: &Credentials,
        parent: MetadataHandle,
        name: &str,
    ) -> Result<(), ServiceError>;

    async fn remove_directory(
        &self,
        cred: &Credentials,
        parent: MetadataHandle,
        name: &str,
    ) -> Result<(), ServiceError>;

    async fn set_basic_info(
        &self,
        handle: MetadataHandle,
        info: &SetBasicInfo,
    ) -> Result<(), ServiceError>;

    /// Renames the node to a new share-relative path.
    async fn rename(
        &self,
        handle: MetadataHandle,
        new_path: &str,
        replace: bool,
    ) -> Result<(), ServiceError>;

    async fn get_filesystem_statistics(&self, share: &str) -> Result<FsStatistics, ServiceError>;
}

/// The file payload (content) backend.
#[async_trait]
pub trait PayloadService: Send + Sync {
    async fn write_at(
        &self,
        payload: PayloadId,
        data: &[u8],
        offset: u64,
    ) -> Result<u32, ServiceError>;

    /// Flushes cached payload to stable storage. Blocking.
    async fn flush(&self, payload: PayloadId) -> Result<(), ServiceError>;
}

/// A record in the unified lock store: byte-range locks and leases share
/// one table, discriminated by the body variant.
#[derive(Debug, Clone)]
pub struct LockRecord {
    /// Store-unique identifier. Leases use their lease key.
    pub id: u128,
    /// The backend's stable node ID: the same file is the same `file`
    /// here no matter how many opens exist against it.
    pub file: u64,
    pub body: LockBody,
}

/// The two lock flavors held in the store.
#[derive(Debug, Clone)]
pub enum LockBody {
    ByteRange(ByteRangeLock),
    Lease(LeaseLock),
}

impl LockRecord {
    pub fn is_lease(&self) -> bool {
        matches!(self.body, LockBody::Lease(_))
    }

    pub fn as_lease(&self) -> Option<&LeaseLock> {
        match &self.body {
            LockBody::Lease(lease) => Some(lease),
            LockBody::ByteRange(_) => None,
        }
    }
}

/// A byte-range lock. `length == 0`, or `(offset, length) == (0, u64::MAX)`,
/// means "to end of file".
#[derive(Debug, Clone)]
pub struct ByteRangeLock {
    pub owner: LockOwner,
    pub offset: u64,
    pub length: u64,
    pub exclusive: bool,
    pub acquired_at: SystemTime,
}

/// A lease record. State is the R/W/H word from [`crate::lease`].
#[derive(Debug, Clone)]
pub struct LeaseLock {
    pub key: u128,
    pub state: u8,
    pub epoch: u32,
    pub breaking: bool,
    /// Target state while `breaking`.
    pub break_to: u8,
    pub break_started: Option<SystemTime>,
}

/// Filter for [`LockStore::list_locks`].
#[derive(Debug, Clone)]
pub struct LockQuery {
    pub file: Option<MetadataHandle>,
    /// `Some(true)` for leases only, `Some(false)` for byte-range only.
    pub is_lease: Option<bool>,
}

/// The external unified lock store.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Inserts or replaces a record by its ID.
    async fn put_lock(&self, record: LockRecord) -> Result<(), ServiceError>;

    /// Deletes a record. Missing records are not an error.
    async fn delete_lock(&self, id: u128) -> Result<(), ServiceError>;

    async fn list_locks(&self, query: &LockQuery) -> Result<Vec<LockRecord>, ServiceError>;
}

/// The named-pipe engine. All data operations on IPC$ opens route here.
#[async_trait]
pub trait PipeManager: Send + Sync {
    async fn open(&self, name: &str, session_id: u64) -> Result<(), ServiceError>;

    async fn close(&self, name: &str, session_id: u64) -> Result<(), ServiceError>;

    async fn process_write(
        &self,
        name: &str,
        session_id: u64,
        data: &[u8],
    ) -> Result<u32, ServiceError>;

    async fn process_read(
        &self,
        name: &str,
        session_id: u64,
        max_bytes: u32,
    ) -> Result<Vec<u8>, ServiceError>;

    /// Writes `input` and reads the pipe's response in one step.
    async fn transact(
        &self,
        name: &str,
        session_id: u64,
        input: &[u8],
        max_output: u32,
    ) -> Result<Vec<u8>, ServiceError>;
}

/// Delivers lease break notifications to the owning session's connection.
#[async_trait]
pub trait LeaseBreakNotifier: Send + Sync {
    async fn send_break(
        &self,
        session_id: u64,
        key: u128,
        current_state: u8,
        new_state: u8,
        epoch: u32,
    ) -> Result<(), ServiceError>;
}

/// Telemetry hook for cross-protocol lock conflicts. Invoked exactly once
/// per denied lease grant.
pub trait CrossProtocolMetrics: Send + Sync {
    fn record_conflict(&self, initiator: &str, kind: &str, resolution: &str);
}

/// Reclaims leases from a pre-restart grace store, bypassing the normal
/// grant path on success.
#[async_trait]
pub trait LeaseReclaimer: Send + Sync {
    async fn reclaim(
        &self,
        key: u128,
        file: MetadataHandle,
        state: u8,
    ) -> Result<bool, ServiceError>;
}

/// Result of one authentication leg.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Authentication continues: store a pending record and return the blob
    /// with MORE_PROCESSING_REQUIRED.
    Continue {
        /// The 8-byte server challenge issued to the client.
        challenge: [u8; 8],
        /// The exchange is SPNEGO-wrapped rather than raw NTLM.
        spnego: bool,
        blob: Vec<u8>,
    },
    /// Authentication finished; the session can be established.
    Complete {
        identity: Option<AuthIdentity>,
        guest: bool,
        blob: Vec<u8>,
    },
}

/// Authentication mechanism wrapper (NTLMv2, Kerberos via SPNEGO). The core
/// only tracks pending-auth records and the finalized identity; all
/// cryptography happens behind this trait.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Handles the first leg of an exchange (e.g. NTLM NEGOTIATE).
    async fn begin(
        &self,
        blob: &[u8],
        client: &SocketAddr,
    ) -> Result<AuthOutcome, ServiceError>;

    /// Handles a continuation leg (e.g. NTLM AUTHENTICATE) against the
    /// pending record's challenge.
    async fn complete(
        &self,
        challenge: &[u8; 8],
        spnego: bool,
        blob: &[u8],
        client: &SocketAddr,
    ) -> Result<AuthOutcome, ServiceError>;
}

/// The full set of collaborators a handler is constructed over.
#[derive(Clone)]
pub struct Services {
    pub metadata: std::sync::Arc<dyn MetadataService>,
    pub payload: std::sync::Arc<dyn PayloadService>,
    pub locks: std::sync::Arc<dyn LockStore>,
    pub pipes: std::sync::Arc<dyn PipeManager>,
    pub auth: std::sync::Arc<dyn Authenticator>,
    pub break_notifier: std::sync::Arc<dyn LeaseBreakNotifier>,
    pub metrics: std::sync::Arc<dyn CrossProtocolMetrics>,
    pub lease_reclaimer: Option<std::sync::Arc<dyn LeaseReclaimer>>,
}
