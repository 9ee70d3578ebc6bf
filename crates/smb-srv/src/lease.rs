//! Lease management: grants, upgrades, breaks and acknowledgments, with
//! cross-protocol conflict checks against the unified lock store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::Mutex;

use smb_msg::LeaseState;

use crate::services::{
    CrossProtocolMetrics, LeaseBreakNotifier, LeaseLock, LeaseReclaimer, LockBody, LockQuery,
    LockRecord, LockStore, MetadataHandle, ServiceError,
};

/// Read-caching component of a lease state word.
pub const LEASE_READ: u8 = 0x1;
/// Write-caching component.
pub const LEASE_WRITE: u8 = 0x2;
/// Handle-caching component.
pub const LEASE_HANDLE: u8 = 0x4;
/// No caching.
pub const LEASE_NONE: u8 = 0;

/// Converts an internal R/W/H word to the wire lease-state flags.
pub fn to_wire_state(state: u8) -> LeaseState {
    LeaseState::new()
        .with_read_caching(state & LEASE_READ != 0)
        .with_write_caching(state & LEASE_WRITE != 0)
        .with_handle_caching(state & LEASE_HANDLE != 0)
}

/// Converts wire lease-state flags to the internal R/W/H word.
pub fn from_wire_state(state: LeaseState) -> u8 {
    let mut word = LEASE_NONE;
    if state.read_caching() {
        word |= LEASE_READ;
    }
    if state.write_caching() {
        word |= LEASE_WRITE;
    }
    if state.handle_caching() {
        word |= LEASE_HANDLE;
    }
    word
}

const LEASE_READ_HANDLE: u8 = LEASE_READ | LEASE_HANDLE;
const LEASE_READ_WRITE: u8 = LEASE_READ | LEASE_WRITE;
const LEASE_READ_WRITE_HANDLE: u8 = LEASE_READ | LEASE_WRITE | LEASE_HANDLE;

/// Valid lease state combinations for files: none, R, RH, RW, RWH.
fn valid_file_state(state: u8) -> bool {
    matches!(
        state,
        LEASE_NONE | LEASE_READ | LEASE_READ_HANDLE | LEASE_READ_WRITE | LEASE_READ_WRITE_HANDLE
    )
}

/// Whether two leases with the given states conflict: a conflict exists
/// when either side wants write caching and the other holds anything
/// beyond handle caching.
pub fn oplocks_conflict(a: u8, b: u8) -> bool {
    let beyond_handle = |state: u8| state & !LEASE_HANDLE != 0;
    (a & LEASE_WRITE != 0 && beyond_handle(b)) || (b & LEASE_WRITE != 0 && beyond_handle(a))
}

/// Whether a requested lease state conflicts with existing non-lease
/// (cross-protocol) locks on the file. Requested write caching conflicts
/// with any such lock; read caching only with an exclusive one; handle
/// caching alone never conflicts.
pub fn nlm_conflicts(requested: u8, any_exclusive: bool) -> bool {
    requested & LEASE_WRITE != 0 || (requested & LEASE_READ != 0 && any_exclusive)
}

/// Outcome of a lease grant attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseGrant {
    /// The lease was granted or upgraded.
    Granted { state: u8, epoch: u32 },
    /// Another lease conflicts; a break was initiated and nothing is
    /// granted this time around.
    None,
    /// A non-lease (cross-protocol) lock conflicts; the caller fails the
    /// request with `LOCK_NOT_GRANTED`.
    CrossProtocolDenied,
}

/// Serialises lease mutations and tracks which session owns each lease key
/// for break delivery. Lease records themselves live in the external lock
/// store.
pub struct LeaseManager {
    store: Arc<dyn LockStore>,
    notifier: Arc<dyn LeaseBreakNotifier>,
    metrics: Arc<dyn CrossProtocolMetrics>,
    reclaimer: Option<Arc<dyn LeaseReclaimer>>,
    /// Guards store mutations; maps lease key to owning session.
    inner: Mutex<HashMap<u128, u64>>,
}

impl LeaseManager {
    pub fn new(
        store: Arc<dyn LockStore>,
        notifier: Arc<dyn LeaseBreakNotifier>,
        metrics: Arc<dyn CrossProtocolMetrics>,
        reclaimer: Option<Arc<dyn LeaseReclaimer>>,
    ) -> Self {
        Self {
            store,
            notifier,
            metrics,
            reclaimer,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to grant (or upgrade) a lease with key `key` and requested
    /// state `requested` on `file`.
    pub async fn grant(
        &self,
        session_id: u64,
        key: u128,
        requested: u8,
        file: MetadataHandle,
        directory: bool,
    ) -> Result<LeaseGrant, ServiceError> {
        // Directory leases never include write caching.
        let requested = if directory {
            requested & !LEASE_WRITE
        } else {
            requested
        };
        if !valid_file_state(requested) || requested == LEASE_NONE {
            return Ok(LeaseGrant::None);
        }

        // Grace-period reclaim bypasses the normal grant path entirely.
        if let Some(reclaimer) = &self.reclaimer {
            if reclaimer.reclaim(key, file, requested).await? {
                self.inner.lock().await.insert(key, session_id);
                return Ok(LeaseGrant::Granted {
                    state: requested,
                    epoch: 1,
                });
            }
        }

        let mut tracked = self.inner.lock().await;

        // Cross-protocol check: any non-lease lock on the file gates the
        // grant. Write caching needs exclusive access to the file; read
        // caching tolerates shared locks; handle caching is unaffected.
        let others = self
            .store
            .list_locks(&LockQuery {
                file: Some(file),
                is_lease: Some(false),
            })
            .await?;
        if !others.is_empty() {
            let any_exclusive = others.iter().any(|record| match &record.body {
                LockBody::ByteRange(range) => range.exclusive,
                LockBody::Lease(_) => false,
            });
            if nlm_conflicts(requested, any_exclusive) {
                log::info!(
                    "lease {key:#x} denied by cross-protocol lock on handle {file}"
                );
                self.metrics.record_conflict("nlm", "lease", "denied");
                return Ok(LeaseGrant::CrossProtocolDenied);
            }
        }

        let leases = self
            .store
            .list_locks(&LockQuery {
                file: Some(file),
                is_lease: Some(true),
            })
            .await?;

        if let Some(mine) = leases
            .iter()
            .filter_map(|record| record.as_lease())
            .find(|lease| lease.key == key)
        {
            if mine.breaking {
                return Ok(LeaseGrant::Granted {
                    state: mine.state,
                    epoch: mine.epoch,
                });
            }
            if requested & !mine.state == 0 {
                return Ok(LeaseGrant::Granted {
                    state: mine.state,
                    epoch: mine.epoch,
                });
            }
            let upgraded = mine.state | requested;
            self.store
                .put_lock(LockRecord {
                    id: key,
                    file,
                    body: LockBody::Lease(LeaseLock {
                        key,
                        state: upgraded,
                        epoch: mine.epoch + 1,
                        breaking: false,
                        break_to: LEASE_NONE,
                        break_started: None,
                    }),
                })
                .await?;
            tracked.insert(key, session_id);
            return Ok(LeaseGrant::Granted {
                state: upgraded,
                epoch: mine.epoch + 1,
            });
        }

        if let Some(conflicting) = leases
            .iter()
            .filter_map(|record| record.as_lease())
            .find(|lease| lease.key != key && oplocks_conflict(requested, lease.state))
        {
            let break_to = if requested & LEASE_WRITE != 0 || requested & LEASE_READ != 0 {
                LEASE_READ
            } else {
                LEASE_NONE
            };
            if !conflicting.breaking && conflicting.state != break_to {
                self.initiate_break(&tracked, file, conflicting, break_to)
                    .await?;
            }
            return Ok(LeaseGrant::None);
        }

        self.store
            .put_lock(LockRecord {
                id: key,
                file,
                body: LockBody::Lease(LeaseLock {
                    key,
                    state: requested,
                    epoch: 1,
                    breaking: false,
                    break_to: LEASE_NONE,
                    break_started: None,
                }),
            })
            .await?;
        tracked.insert(key, session_id);
        Ok(LeaseGrant::Granted {
            state: requested,
            epoch: 1,
        })
    }

    /// Marks `lease` breaking to `break_to` and dispatches the break
    /// notification. Notification delivery is fire-and-forget.
    async fn initiate_break(
        &self,
        tracked: &HashMap<u128, u64>,
        file: MetadataHandle,
        lease: &LeaseLock,
        break_to: u8,
    ) -> Result<(), ServiceError> {
        let epoch = lease.epoch + 1;
        self.store
            .put_lock(LockRecord {
                id: lease.key,
                file,
                body: LockBody::Lease(LeaseLock {
                    key: lease.key,
                    state: lease.state,
                    epoch,
                    breaking: true,
                    break_to,
                    break_started: Some(SystemTime::now()),
                }),
            })
            .await?;

        let Some(&owner_session) = tracked.get(&lease.key) else {
            log::warn!("no session tracked for breaking lease {:#x}", lease.key);
            return Ok(());
        };
        let notifier = Arc::clone(&self.notifier);
        let (key, current) = (lease.key, lease.state);
        tokio::spawn(async move {
            if let Err(error) = notifier
                .send_break(owner_session, key, current, break_to, epoch)
                .await
            {
                log::warn!("lease break notification for {key:#x} failed: {error}");
            }
        });
        Ok(())
    }

    /// Applies a client's break acknowledgment. The acknowledged state must
    /// not exceed the break target. Returns the resulting state.
    pub async fn acknowledge(&self, key: u128, ack_state: u8) -> Result<u8, ServiceError> {
        let mut tracked = self.inner.lock().await;
        let records = self
            .store
            .list_locks(&LockQuery {
                file: None,
                is_lease: Some(true),
            })
            .await?;
        let Some((record, lease)) = records
            .iter()
            .filter_map(|record| record.as_lease().map(|lease| (record, lease)))
            .find(|(_, lease)| lease.key == key)
        else {
            return Err(ServiceError::LockNotFound);
        };
        if !lease.breaking || ack_state & !lease.break_to != 0 {
            return Err(ServiceError::InvalidArgument);
        }

        if ack_state == LEASE_NONE {
            self.store.delete_lock(key).await?;
            tracked.remove(&key);
        } else {
            self.store
                .put_lock(LockRecord {
                    id: key,
                    file: record.file,
                    body: LockBody::Lease(LeaseLock {
                        key,
                        state: ack_state,
                        epoch: lease.epoch + 1,
                        breaking: false,
                        break_to: LEASE_NONE,
                        break_started: None,
                    }),
                })
                .await?;
        }
        Ok(ack_state)
    }

    /// Releases a lease on handle close. Idempotent.
    pub async fn release(&self, key: u128) -> Result<(), ServiceError> {
        let mut tracked = self.inner.lock().await;
        self.store.delete_lock(key).await?;
        tracked.remove(&key);
        Ok(())
    }
}
