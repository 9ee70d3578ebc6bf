//! Per-connection handler state: the registries of sessions, trees, open
//! files, pending authentications and pending notifications.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use dashmap::DashMap;
use rand::RngCore;
use tokio_util::sync::CancellationToken;

use smb_dtyp::Guid;
use smb_fscc::FileNotifyInformation;
use smb_msg::{Dialect, FileId, NotifyFilter, Status};

use crate::config::ServerConfig;
use crate::lease::LeaseManager;
use crate::services::{
    AuthIdentity, Credentials, DirCursor, MetadataHandle, PayloadId, Services,
};

/// An authenticated (or guest) session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: u64,
    pub client_addr: SocketAddr,
    pub guest: bool,
    pub identity: Option<AuthIdentity>,
    pub created_at: SystemTime,
}

impl Session {
    /// Credentials metadata operations run under for this session.
    pub fn credentials(&self) -> Credentials {
        match &self.identity {
            Some(identity) => Credentials::Identity(identity.clone()),
            None => Credentials::Guest,
        }
    }
}

/// An authentication exchange awaiting its final leg.
#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub session_id: u64,
    pub client_addr: SocketAddr,
    pub created_at: SystemTime,
    /// Server challenge issued on the first leg.
    pub challenge: [u8; 8],
    /// The exchange is SPNEGO-wrapped.
    pub spnego: bool,
}

/// A connected share.
#[derive(Debug, Clone)]
pub struct TreeConnection {
    pub id: u32,
    pub session_id: u64,
    pub share: String,
    pub kind: crate::config::ShareKind,
    pub created_at: SystemTime,
    pub permission: crate::config::SharePermission,
}

/// Per-handle directory enumeration cursor: one QUERY_DIRECTORY
/// conversation per open.
#[derive(Debug, Clone, Default)]
pub struct DirEnumState {
    /// Position in the combined (`.`/`..` + filtered) sequence of the
    /// current backend page.
    pub index: usize,
    pub complete: bool,
    /// The pattern last used on this handle.
    pub pattern: String,
    /// Cursor that fetches the page currently being enumerated; `None`
    /// for the first page.
    pub cursor: Option<DirCursor>,
}

impl DirEnumState {
    pub fn reset(&mut self) {
        self.index = 0;
        self.complete = false;
        self.cursor = None;
    }
}

/// Location of an open within its parent, recorded at CREATE time so a
/// pending delete-on-close can be executed at close.
#[derive(Debug, Clone)]
pub struct DeleteTarget {
    pub parent: MetadataHandle,
    pub name: String,
}

/// Per-handle frozen timestamps. A `Some` value pins the timestamp: READ
/// and WRITE no longer advance it until an explicit thaw.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrozenTimes {
    pub mtime: Option<smb_dtyp::FileTime>,
    pub ctime: Option<smb_dtyp::FileTime>,
    pub atime: Option<smb_dtyp::FileTime>,
}

/// One open file, directory or pipe.
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub file_id: FileId,
    pub session_id: u64,
    pub tree_id: u32,
    /// Share-relative path of the open.
    pub path: String,
    pub opened_at: SystemTime,
    /// The granted access mask, as raw wire bits.
    pub desired_access: u32,
    pub is_directory: bool,
    pub is_pipe: bool,
    /// Pipe name, when `is_pipe`.
    pub pipe_name: Option<String>,
    /// Backend handles; absent on pipes.
    pub metadata: Option<MetadataHandle>,
    pub payload: Option<PayloadId>,
    pub enumeration: DirEnumState,
    /// The node will be removed when this handle closes.
    pub delete_pending: bool,
    /// Parent handle and leaf name; absent on pipe opens.
    pub delete_target: Option<DeleteTarget>,
    /// Raw create-options word from the CREATE request.
    pub create_options: u32,
    pub frozen: FrozenTimes,
    /// Lease key held by this open, if a lease was granted.
    pub lease_key: Option<u128>,
    /// Granted lease state (R/W/H word) at grant time.
    pub lease_state: u8,
}

impl OpenFile {
    /// The metadata handle, or the handle-type error for pipe opens.
    pub fn metadata_handle(&self) -> crate::Result<MetadataHandle> {
        self.metadata.ok_or(crate::ServerError::WrongHandleType)
    }
}

/// Callback completing a pending CHANGE_NOTIFY. Invoked with the original
/// message ID, the final status, and the encoded notify records.
pub type AsyncNotifyCallback = Arc<dyn Fn(u64, Status, Vec<u8>) + Send + Sync>;

/// A CHANGE_NOTIFY awaiting a filesystem event.
#[derive(Clone)]
pub struct PendingNotify {
    pub file_id: FileId,
    pub session_id: u64,
    pub message_id: u64,
    /// Share-relative path of the watched directory.
    pub path: String,
    pub share: String,
    pub completion_filter: NotifyFilter,
    pub recursive: bool,
    pub max_output: u32,
    pub callback: AsyncNotifyCallback,
}

/// The connection's negotiated crypto-relevant state, recorded at NEGOTIATE
/// time and replayed by VALIDATE_NEGOTIATE_INFO.
#[derive(Debug, Clone, Copy)]
pub struct NegotiateState {
    pub dialect: Dialect,
    pub client_capabilities: u32,
    pub client_guid: Guid,
    pub client_security_mode: u16,
}

/// Per-request context supplied by the connection driver.
#[derive(Clone)]
pub struct RequestContext {
    pub client_addr: SocketAddr,
    /// Cancelled on client disconnect or SMB2 CANCEL.
    pub cancel: CancellationToken,
    /// Captured by CHANGE_NOTIFY for async completion.
    pub notify_callback: Option<AsyncNotifyCallback>,
}

impl RequestContext {
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            client_addr,
            cancel: CancellationToken::new(),
            notify_callback: None,
        }
    }
}

/// Process-wide session registry. Sessions outlive single connections, so
/// this table is shared by every handler.
pub struct SessionManager {
    sessions: DashMap<u64, Session>,
    // 0 is reserved; IDs start at 1.
    counter: AtomicU64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            counter: AtomicU64::new(1),
        }
    }

    /// Allocates the next session ID.
    pub fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn store(&self, session: Session) {
        self.sessions.insert(session.id, session);
    }

    pub fn get(&self, id: u64) -> Option<Session> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    pub fn delete(&self, id: u64) -> Option<Session> {
        self.sessions.remove(&id).map(|(_, s)| s)
    }

    /// A consistent snapshot of the session IDs present at call time.
    pub fn ids(&self) -> Vec<u64> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-connection handler: registry tables, ID generators, negotiated
/// state, and the collaborator set. The command dispatch methods hang off
/// this type (see the sibling modules).
pub struct Handler {
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) services: Services,
    pub(crate) sessions: Arc<SessionManager>,
    pub(crate) leases: Arc<LeaseManager>,

    pub(crate) trees: DashMap<u32, TreeConnection>,
    pub(crate) files: DashMap<FileId, OpenFile>,
    pub(crate) pending_auths: DashMap<u64, PendingAuth>,
    pub(crate) pending_notifies: DashMap<u64, PendingNotify>,

    tree_counter: AtomicU32,
    file_counter: AtomicU64,
    pub(crate) negotiate_state: RwLock<Option<NegotiateState>>,
}

impl Handler {
    pub fn new(
        config: Arc<ServerConfig>,
        services: Services,
        sessions: Arc<SessionManager>,
        leases: Arc<LeaseManager>,
    ) -> Self {
        Self {
            config,
            services,
            sessions,
            leases,
            trees: DashMap::new(),
            files: DashMap::new(),
            pending_auths: DashMap::new(),
            pending_notifies: DashMap::new(),
            tree_counter: AtomicU32::new(1),
            file_counter: AtomicU64::new(1),
            negotiate_state: RwLock::new(None),
        }
    }

    /// Allocates the next tree ID on this connection.
    pub(crate) fn next_tree_id(&self) -> u32 {
        self.tree_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Issues a fresh file ID: a sequential persistent half (unique per
    /// handler) and a cryptographically random volatile half.
    pub(crate) fn next_file_id(&self) -> FileId {
        FileId {
            persistent: self.file_counter.fetch_add(1, Ordering::SeqCst),
            volatile: rand::thread_rng().next_u64(),
        }
    }

    /// The recorded NEGOTIATE snapshot, if negotiation happened.
    pub(crate) fn negotiated(&self) -> Option<NegotiateState> {
        *self.negotiate_state.read().expect("negotiate state poisoned")
    }

    pub(crate) fn record_negotiate(&self, state: NegotiateState) {
        *self.negotiate_state.write().expect("negotiate state poisoned") = Some(state);
    }

    /// Fetches a session, classifying absence.
    pub(crate) fn session(&self, id: u64) -> crate::Result<Session> {
        self.sessions.get(id).ok_or(crate::ServerError::SessionNotFound)
    }

    /// Fetches a tree owned by `session_id`.
    pub(crate) fn tree(&self, id: u32, session_id: u64) -> crate::Result<TreeConnection> {
        match self.trees.get(&id) {
            Some(tree) if tree.session_id == session_id => Ok(tree.clone()),
            _ => Err(crate::ServerError::TreeNotFound),
        }
    }

    /// Fetches an open file by wire ID.
    pub(crate) fn file(&self, id: &FileId) -> crate::Result<OpenFile> {
        self.files
            .get(id)
            .map(|f| f.clone())
            .ok_or(crate::ServerError::HandleNotFound)
    }

    /// A consistent snapshot of the open file IDs present at call time.
    pub(crate) fn file_ids(&self) -> Vec<FileId> {
        self.files.iter().map(|e| *e.key()).collect()
    }

    /// Delivers a filesystem event to the pending CHANGE_NOTIFY watchers it
    /// matches, completing and removing each. Best-effort by design.
    pub fn notify_change(
        &self,
        share: &str,
        directory_path: &str,
        records: Vec<FileNotifyInformation>,
    ) {
        let any_records = !records.is_empty();
        let encoded = match crate::notify::encode_notify_records(records) {
            Ok(encoded) => encoded,
            Err(error) => {
                log::warn!("failed to encode notify records: {error}");
                return;
            }
        };
        let matching: Vec<u64> = self
            .pending_notifies
            .iter()
            .filter(|entry| {
                entry.share.eq_ignore_ascii_case(share)
                    && path_matches_watch(&entry.path, directory_path, entry.recursive)
            })
            .map(|entry| entry.message_id)
            .collect();
        for message_id in matching {
            if let Some((_, pending)) = self.pending_notifies.remove(&message_id) {
                let body = if encoded.len() > pending.max_output as usize {
                    Vec::new()
                } else {
                    encoded.clone()
                };
                let status = if body.is_empty() && any_records {
                    // Too many changes to report within the client's buffer.
                    Status::NotifyEnumDir
                } else {
                    Status::Success
                };
                (pending.callback)(message_id, status, body);
            }
        }
    }

    /// Drops pending notifications registered on a closing handle.
    pub(crate) fn drop_notifies_for(&self, file_id: &FileId) {
        let stale: Vec<u64> = self
            .pending_notifies
            .iter()
            .filter(|entry| entry.file_id == *file_id)
            .map(|entry| entry.message_id)
            .collect();
        for message_id in stale {
            self.pending_notifies.remove(&message_id);
        }
    }
}

/// Whether a change in `changed_dir` is visible to a watch on `watched`.
fn path_matches_watch(watched: &str, changed_dir: &str, recursive: bool) -> bool {
    if watched.eq_ignore_ascii_case(changed_dir) {
        return true;
    }
    if !recursive {
        return false;
    }
    let watched = watched.trim_end_matches('\\');
    if watched.is_empty() {
        // Watching the share root recursively sees everything.
        return true;
    }
    let prefix = format!("{watched}\\");
    changed_dir
        .to_ascii_lowercase()
        .starts_with(&prefix.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_path_matching() {
        assert!(path_matches_watch("docs", "docs", false));
        assert!(!path_matches_watch("docs", "docs\\sub", false));
        assert!(path_matches_watch("docs", "docs\\sub", true));
        assert!(path_matches_watch("", "anything\\deep", true));
        assert!(!path_matches_watch("docs", "docsish", true));
    }
}
