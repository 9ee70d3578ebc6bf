//! In-memory collaborators for driving the dispatcher in tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;

use smb_dtyp::FileTime;
use smb_srv::config::{ServerConfig, ShareConfig, ShareKind, SharePermission};
use smb_srv::handler::{Handler, RequestContext, SessionManager};
use smb_srv::lease::LeaseManager;
use smb_srv::services::*;

pub fn client_addr() -> SocketAddr {
    "198.51.100.7:52011".parse().unwrap()
}

#[derive(Debug, Clone)]
struct Node {
    id: u64,
    kind: FileKind,
    data: Vec<u8>,
    readonly: bool,
    symlink_target: Option<String>,
}

impl Node {
    fn info(&self) -> FileInfo {
        FileInfo {
            id: self.id,
            kind: self.kind,
            size: self.data.len() as u64,
            allocation_size: (self.data.len() as u64).next_multiple_of(4096),
            creation_time: FileTime::from_unix(1_700_000_000, 0),
            last_access_time: FileTime::from_unix(1_700_000_100, 0),
            last_write_time: FileTime::from_unix(1_700_000_200, 0),
            change_time: FileTime::from_unix(1_700_000_200, 0),
            readonly: self.readonly,
            links: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeldLock {
    pub path: String,
    pub session_id: u64,
    pub offset: u64,
    pub length: u64,
    pub exclusive: bool,
}

fn ranges_overlap(a_off: u64, a_len: u64, b_off: u64, b_len: u64) -> bool {
    // Zero length (or the full-file sentinel) reaches to the end of file.
    let a_end = if a_len == 0 { u64::MAX } else { a_off.saturating_add(a_len) };
    let b_end = if b_len == 0 { u64::MAX } else { b_off.saturating_add(b_len) };
    a_off < b_end && b_off < a_end
}

#[derive(Default)]
struct FsState {
    nodes: HashMap<String, Node>,
    handles: HashMap<u64, String>,
    next_handle: u64,
    next_id: u64,
    locks: Vec<HeldLock>,
    /// Directory entries per page; `None` serves whole listings.
    dir_page_size: Option<usize>,
    /// Every cursor `read_directory` has been called with.
    dir_cursors_seen: Vec<Option<DirCursor>>,
}

/// In-memory metadata + payload backend over a flat path map.
pub struct MemoryFs {
    state: Mutex<FsState>,
}

impl MemoryFs {
    pub fn new() -> Arc<Self> {
        let mut state = FsState {
            next_handle: 1,
            next_id: 100,
            ..Default::default()
        };
        // The share root.
        state.nodes.insert(
            String::new(),
            Node {
                id: 1,
                kind: FileKind::Directory,
                data: Vec::new(),
                readonly: false,
                symlink_target: None,
            },
        );
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.nodes.insert(
            path.to_string(),
            Node {
                id,
                kind: FileKind::File,
                data: content.to_vec(),
                readonly: false,
                symlink_target: None,
            },
        );
    }

    pub fn add_node(&self, path: &str, kind: FileKind) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.nodes.insert(
            path.to_string(),
            Node {
                id,
                kind,
                data: Vec::new(),
                readonly: false,
                symlink_target: None,
            },
        );
    }

    pub fn add_symlink(&self, path: &str, target: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.nodes.insert(
            path.to_string(),
            Node {
                id,
                kind: FileKind::Symlink,
                data: Vec::new(),
                readonly: false,
                symlink_target: Some(target.to_string()),
            },
        );
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(path)
    }

    /// The stable node ID of a path, as used by the unified lock store.
    pub fn node_id(&self, path: &str) -> Option<u64> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(path)
            .map(|node| node.id)
    }

    /// Serves directory listings `entries_per_page` at a time, handing out
    /// index cursors between pages.
    pub fn set_dir_page_size(&self, entries_per_page: usize) {
        self.state.lock().unwrap().dir_page_size = Some(entries_per_page);
    }

    /// The cursor argument of every `read_directory` call so far.
    pub fn dir_cursors_seen(&self) -> Vec<Option<DirCursor>> {
        self.state.lock().unwrap().dir_cursors_seen.clone()
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(path)
            .map(|node| node.data.clone())
    }

    /// Locks currently held by the given session.
    pub fn locks_for_session(&self, session_id: u64) -> Vec<HeldLock> {
        self.state
            .lock()
            .unwrap()
            .locks
            .iter()
            .filter(|lock| lock.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Plants a byte-range lock owned by another protocol/session.
    pub fn plant_lock(&self, path: &str, session_id: u64, exclusive: bool) {
        self.state.lock().unwrap().locks.push(HeldLock {
            path: path.to_string(),
            session_id,
            offset: 0,
            length: 0,
            exclusive,
        });
    }

    pub fn release_planted_lock(&self, session_id: u64) {
        self.state
            .lock()
            .unwrap()
            .locks
            .retain(|lock| lock.session_id != session_id);
    }

    fn path_of(&self, handle: u64) -> Result<String, ServiceError> {
        self.state
            .lock()
            .unwrap()
            .handles
            .get(&handle)
            .cloned()
            .ok_or(ServiceError::NotFound)
    }
}

#[async_trait]
impl MetadataService for MemoryFs {
    async fn open(
        &self,
        _cred: &Credentials,
        _share: &str,
        params: &OpenParams,
    ) -> Result<OpenedNode, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let path = params.path.trim_matches('\\').to_string();

        let mut created = false;
        if !state.nodes.contains_key(&path) {
            match params.disposition {
                OpenDisposition::Open | OpenDisposition::Overwrite => {
                    return Err(ServiceError::NotFound);
                }
                _ => {
                    let id = state.next_id;
                    state.next_id += 1;
                    let kind = if params.directory == Some(true) {
                        FileKind::Directory
                    } else {
                        FileKind::File
                    };
                    state.nodes.insert(
                        path.clone(),
                        Node {
                            id,
                            kind,
                            data: Vec::new(),
                            readonly: false,
                            symlink_target: None,
                        },
                    );
                    created = true;
                }
            }
        } else if params.disposition == OpenDisposition::Create {
            return Err(ServiceError::InvalidArgument);
        }

        let node = state.nodes.get(&path).unwrap().clone();
        if params.directory == Some(false) && node.kind == FileKind::Directory {
            return Err(ServiceError::IsDirectory);
        }
        if params.directory == Some(true) && node.kind != FileKind::Directory {
            return Err(ServiceError::InvalidArgument);
        }

        let handle = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(handle, path.clone());

        let (parent_path, name) = match path.rsplit_once('\\') {
            Some((parent, name)) => (parent.to_string(), name.to_string()),
            None => (String::new(), path.clone()),
        };
        let parent = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(parent, parent_path);

        Ok(OpenedNode {
            handle,
            payload: node.id,
            info: node.info(),
            created,
            parent,
            name,
        })
    }

    async fn close(&self, handle: MetadataHandle) -> Result<(), ServiceError> {
        self.state.lock().unwrap().handles.remove(&handle);
        Ok(())
    }

    async fn get_file(&self, handle: MetadataHandle) -> Result<FileInfo, ServiceError> {
        let path = self.path_of(handle)?;
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(&path)
            .map(Node::info)
            .ok_or(ServiceError::NotFound)
    }

    async fn read_directory(
        &self,
        handle: MetadataHandle,
        cursor: Option<DirCursor>,
        _max_bytes: u32,
    ) -> Result<(Vec<DirEntry>, Option<DirCursor>), ServiceError> {
        let path = self.path_of(handle)?;
        let mut state = self.state.lock().unwrap();
        state.dir_cursors_seen.push(cursor);
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}\\")
        };
        let mut entries: Vec<DirEntry> = state
            .nodes
            .iter()
            .filter(|(candidate, _)| {
                !candidate.is_empty()
                    && candidate.starts_with(&prefix)
                    && !candidate[prefix.len()..].contains('\\')
            })
            .map(|(candidate, node)| DirEntry {
                name: candidate[prefix.len()..].to_string(),
                info: node.info(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let Some(page_size) = state.dir_page_size else {
            return Ok((entries, None));
        };
        let start = cursor.unwrap_or(0) as usize;
        let end = (start + page_size).min(entries.len());
        let next = if end < entries.len() {
            Some(end as DirCursor)
        } else {
            None
        };
        Ok((entries[start.min(entries.len())..end].to_vec(), next))
    }

    async fn prepare_write(
        &self,
        handle: MetadataHandle,
        new_size: u64,
    ) -> Result<WriteReservation, ServiceError> {
        Ok(WriteReservation {
            handle,
            token: new_size,
        })
    }

    async fn commit_write(&self, reservation: WriteReservation) -> Result<(), ServiceError> {
        // Reservations only ever extend; truncation is not modelled here.
        let path = self.path_of(reservation.handle)?;
        let mut state = self.state.lock().unwrap();
        let node = state.nodes.get_mut(&path).ok_or(ServiceError::NotFound)?;
        if (node.data.len() as u64) < reservation.token {
            node.data.resize(reservation.token as usize, 0);
        }
        Ok(())
    }

    async fn read_at(
        &self,
        payload: PayloadId,
        offset: u64,
        length: u32,
    ) -> Result<Vec<u8>, ServiceError> {
        let state = self.state.lock().unwrap();
        let node = state
            .nodes
            .values()
            .find(|node| node.id == payload)
            .ok_or(ServiceError::NotFound)?;
        let start = (offset as usize).min(node.data.len());
        let end = (start + length as usize).min(node.data.len());
        Ok(node.data[start..end].to_vec())
    }

    async fn lock_file(
        &self,
        handle: MetadataHandle,
        owner: &LockOwner,
        offset: u64,
        length: u64,
        exclusive: bool,
    ) -> Result<(), ServiceError> {
        let path = self.path_of(handle)?;
        let mut state = self.state.lock().unwrap();
        let conflict = state.locks.iter().any(|held| {
            held.path == path
                && ranges_overlap(held.offset, held.length, offset, length)
                && (held.exclusive || exclusive)
        });
        if conflict {
            return Err(ServiceError::Locked);
        }
        state.locks.push(HeldLock {
            path,
            session_id: owner.session_id,
            offset,
            length,
            exclusive,
        });
        Ok(())
    }

    async fn unlock_file(
        &self,
        handle: MetadataHandle,
        owner: &LockOwner,
        offset: u64,
        length: u64,
    ) -> Result<(), ServiceError> {
        let path = self.path_of(handle)?;
        let mut state = self.state.lock().unwrap();
        let position = state.locks.iter().position(|held| {
            held.path == path
                && held.session_id == owner.session_id
                && held.offset == offset
                && held.length == length
        });
        match position {
            Some(index) => {
                state.locks.remove(index);
                Ok(())
            }
            None => Err(ServiceError::LockNotFound),
        }
    }

    async fn unlock_all_for_session(
        &self,
        handle: MetadataHandle,
        owner: &LockOwner,
    ) -> Result<(), ServiceError> {
        let path = self.path_of(handle)?;
        self.state
            .lock()
            .unwrap()
            .locks
            .retain(|held| !(held.path == path && held.session_id == owner.session_id));
        Ok(())
    }

    async fn check_lock_for_io(
        &self,
        handle: MetadataHandle,
        owner: &LockOwner,
        offset: u64,
        length: u64,
        is_write: bool,
    ) -> Result<(), ServiceError> {
        let path = self.path_of(handle)?;
        let state = self.state.lock().unwrap();
        let conflict = state.locks.iter().any(|held| {
            held.path == path
                && held.session_id != owner.session_id
                && ranges_overlap(held.offset, held.length, offset, length)
                && (held.exclusive || is_write)
        });
        if conflict {
            Err(ServiceError::Locked)
        } else {
            Ok(())
        }
    }

    async fn read_symlink(&self, handle: MetadataHandle) -> Result<String, ServiceError> {
        let path = self.path_of(handle)?;
        let state = self.state.lock().unwrap();
        let node = state.nodes.get(&path).ok_or(ServiceError::NotFound)?;
        node.symlink_target
            .clone()
            .ok_or(ServiceError::InvalidArgument)
    }

    async fn remove_file(
        &self,
        _cred: &Credentials,
        parent: MetadataHandle,
        name: &str,
    ) -> Result<(), ServiceError> {
        let parent_path = self.path_of(parent)?;
        let path = if parent_path.is_empty() {
            name.to_string()
        } else {
            format!("{parent_path}\\{name}")
        };
        self.state
            .lock()
            .unwrap()
            .nodes
            .remove(&path)
            .map(|_| ())
            .ok_or(ServiceError::NotFound)
    }

    async fn remove_directory(
        &self,
        cred: &Credentials,
        parent: MetadataHandle,
        name: &str,
    ) -> Result<(), ServiceError> {
        self.remove_file(cred, parent, name).await
    }

    async fn set_basic_info(
        &self,
        handle: MetadataHandle,
        info: &SetBasicInfo,
    ) -> Result<(), ServiceError> {
        let path = self.path_of(handle)?;
        let mut state = self.state.lock().unwrap();
        let node = state.nodes.get_mut(&path).ok_or(ServiceError::NotFound)?;
        if let Some(readonly) = info.readonly {
            node.readonly = readonly;
        }
        Ok(())
    }

    async fn rename(
        &self,
        handle: MetadataHandle,
        new_path: &str,
        replace: bool,
    ) -> Result<(), ServiceError> {
        let path = self.path_of(handle)?;
        let mut state = self.state.lock().unwrap();
        let target = new_path.trim_matches('\\').to_string();
        if state.nodes.contains_key(&target) && !replace {
            return Err(ServiceError::InvalidArgument);
        }
        let node = state.nodes.remove(&path).ok_or(ServiceError::NotFound)?;
        state.nodes.insert(target.clone(), node);
        state.handles.insert(handle, target);
        Ok(())
    }

    async fn get_filesystem_statistics(&self, _share: &str) -> Result<FsStatistics, ServiceError> {
        Ok(FsStatistics {
            total_bytes: 64 * 1024 * 1024,
            free_bytes: 32 * 1024 * 1024,
            available_bytes: 32 * 1024 * 1024,
            block_size: 4096,
        })
    }
}

#[async_trait]
impl PayloadService for MemoryFs {
    async fn write_at(
        &self,
        payload: PayloadId,
        data: &[u8],
        offset: u64,
    ) -> Result<u32, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let node = state
            .nodes
            .values_mut()
            .find(|node| node.id == payload)
            .ok_or(ServiceError::NotFound)?;
        let end = offset as usize + data.len();
        if node.data.len() < end {
            node.data.resize(end, 0);
        }
        node.data[offset as usize..end].copy_from_slice(data);
        Ok(data.len() as u32)
    }

    async fn flush(&self, _payload: PayloadId) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// In-memory unified lock store.
#[derive(Default)]
pub struct MemoryLockStore {
    records: Mutex<HashMap<u128, LockRecord>>,
}

impl MemoryLockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a cross-protocol (NLM) byte-range lock on a handle.
    pub fn plant_nlm_lock(&self, file: MetadataHandle, exclusive: bool) {
        let id = 0xD000_0000_0000_0000_u128 + file as u128;
        self.records.lock().unwrap().insert(
            id,
            LockRecord {
                id,
                file,
                body: LockBody::ByteRange(ByteRangeLock {
                    owner: LockOwner {
                        protocol: "nlm",
                        client: "nfs-client".to_string(),
                        share: "data".to_string(),
                        session_id: 0,
                    },
                    offset: 0,
                    length: 0,
                    exclusive,
                    acquired_at: SystemTime::now(),
                }),
            },
        );
    }

    pub fn lease_state_of(&self, key: u128) -> Option<(u8, bool)> {
        self.records.lock().unwrap().get(&key).and_then(|record| {
            record
                .as_lease()
                .map(|lease| (lease.state, lease.breaking))
        })
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn put_lock(&self, record: LockRecord) -> Result<(), ServiceError> {
        self.records.lock().unwrap().insert(record.id, record);
        Ok(())
    }

    async fn delete_lock(&self, id: u128) -> Result<(), ServiceError> {
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn list_locks(&self, query: &LockQuery) -> Result<Vec<LockRecord>, ServiceError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| query.file.is_none_or(|file| record.file == file))
            .filter(|record| query.is_lease.is_none_or(|lease| record.is_lease() == lease))
            .cloned()
            .collect())
    }
}

/// A pipe engine that records writes and answers transactions with a
/// tagged echo.
#[derive(Default)]
pub struct EchoPipes {
    pub written: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl PipeManager for EchoPipes {
    async fn open(&self, _name: &str, _session_id: u64) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn close(&self, _name: &str, _session_id: u64) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn process_write(
        &self,
        _name: &str,
        _session_id: u64,
        data: &[u8],
    ) -> Result<u32, ServiceError> {
        self.written.lock().unwrap().push(data.to_vec());
        Ok(data.len() as u32)
    }

    async fn process_read(
        &self,
        _name: &str,
        _session_id: u64,
        _max_bytes: u32,
    ) -> Result<Vec<u8>, ServiceError> {
        Ok(b"pipe-read".to_vec())
    }

    async fn transact(
        &self,
        _name: &str,
        _session_id: u64,
        input: &[u8],
        max_output: u32,
    ) -> Result<Vec<u8>, ServiceError> {
        let mut output = b"resp:".to_vec();
        output.extend_from_slice(input);
        output.truncate(max_output as usize);
        Ok(output)
    }
}

/// Single-leg authenticator: an empty blob authenticates immediately, the
/// blob `b"NEGOTIATE"` starts a two-leg NTLM-style exchange completed by
/// `b"AUTHENTICATE"`.
pub struct TestAuth;

#[async_trait]
impl Authenticator for TestAuth {
    async fn begin(
        &self,
        blob: &[u8],
        _client: &SocketAddr,
    ) -> Result<AuthOutcome, ServiceError> {
        if blob == b"NEGOTIATE" {
            Ok(AuthOutcome::Continue {
                challenge: *b"\x01\x02\x03\x04\x05\x06\x07\x08",
                spnego: false,
                blob: b"CHALLENGE".to_vec(),
            })
        } else {
            Ok(AuthOutcome::Complete {
                identity: Some(AuthIdentity {
                    username: "alice".to_string(),
                    domain: "WORKGROUP".to_string(),
                    uid: 1000,
                    gid: 1000,
                    display_name: "Alice".to_string(),
                }),
                guest: false,
                blob: Vec::new(),
            })
        }
    }

    async fn complete(
        &self,
        challenge: &[u8; 8],
        _spnego: bool,
        blob: &[u8],
        _client: &SocketAddr,
    ) -> Result<AuthOutcome, ServiceError> {
        if challenge != b"\x01\x02\x03\x04\x05\x06\x07\x08" || blob != b"AUTHENTICATE" {
            return Err(ServiceError::PermissionDenied);
        }
        Ok(AuthOutcome::Complete {
            identity: Some(AuthIdentity {
                username: "alice".to_string(),
                domain: "WORKGROUP".to_string(),
                uid: 1000,
                gid: 1000,
                display_name: "Alice".to_string(),
            }),
            guest: false,
            blob: Vec::new(),
        })
    }
}

/// Break notifier that records deliveries.
#[derive(Default)]
pub struct RecordingNotifier {
    pub breaks: Mutex<Vec<(u64, u128, u8, u8, u32)>>,
}

#[async_trait]
impl LeaseBreakNotifier for RecordingNotifier {
    async fn send_break(
        &self,
        session_id: u64,
        key: u128,
        current_state: u8,
        new_state: u8,
        epoch: u32,
    ) -> Result<(), ServiceError> {
        self.breaks
            .lock()
            .unwrap()
            .push((session_id, key, current_state, new_state, epoch));
        Ok(())
    }
}

/// Conflict metric counter.
#[derive(Default)]
pub struct ConflictCounter {
    pub denied: AtomicUsize,
}

impl CrossProtocolMetrics for ConflictCounter {
    fn record_conflict(&self, _initiator: &str, _kind: &str, _resolution: &str) {
        self.denied.fetch_add(1, Ordering::SeqCst);
    }
}

/// Everything a dispatcher test needs.
pub struct Fixture {
    pub handler: Handler,
    pub fs: Arc<MemoryFs>,
    pub lock_store: Arc<MemoryLockStore>,
    pub pipes: Arc<EchoPipes>,
    pub notifier: Arc<RecordingNotifier>,
    pub metrics: Arc<ConflictCounter>,
    pub ctx: RequestContext,
}

pub fn fixture() -> Fixture {
    fixture_with_config(test_config())
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.server_guid = "00010203-0405-0607-0809-0a0b0c0d0e0f".parse().unwrap();
    config.volume_serial = 0x1122334455667788;
    config.volume_label = "DATA".to_string();
    config.shares.insert(
        "data".to_string(),
        ShareConfig {
            kind: ShareKind::Disk,
            permission: SharePermission::ReadWrite,
        },
    );
    config.shares.insert(
        "readonly".to_string(),
        ShareConfig {
            kind: ShareKind::Disk,
            permission: SharePermission::ReadOnly,
        },
    );
    config
}

pub fn fixture_with_config(config: ServerConfig) -> Fixture {
    let fs = MemoryFs::new();
    let lock_store = MemoryLockStore::new();
    let pipes = Arc::new(EchoPipes::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let metrics = Arc::new(ConflictCounter::default());

    let services = Services {
        metadata: fs.clone(),
        payload: fs.clone(),
        locks: lock_store.clone(),
        pipes: pipes.clone(),
        auth: Arc::new(TestAuth),
        break_notifier: notifier.clone(),
        metrics: metrics.clone(),
        lease_reclaimer: None,
    };
    let leases = Arc::new(LeaseManager::new(
        lock_store.clone(),
        notifier.clone(),
        metrics.clone(),
        None,
    ));
    let handler = Handler::new(
        Arc::new(config),
        services,
        Arc::new(SessionManager::new()),
        leases,
    );

    Fixture {
        handler,
        fs,
        lock_store,
        pipes,
        notifier,
        metrics,
        ctx: RequestContext::new(client_addr()),
    }
}
