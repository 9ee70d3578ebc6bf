//! Byte-range locking: the LOCK command handler and the blocking-acquire /
//! rollback machinery over the metadata backend's lock primitives.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use smb_msg::{Header, LockElement, LockRequest, LockResponse, ResponseContent};

use crate::handler::{Handler, RequestContext};
use crate::services::{LockOwner, MetadataHandle, MetadataService, ServiceError};
use crate::{Result, ServerError};

/// Interval between retries of a blocking acquire.
const BLOCKING_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Deadline after which a blocking acquire gives up and surfaces the
/// original conflict.
const BLOCKING_DEADLINE: Duration = Duration::from_secs(5);

impl Handler {
    /// Handles a LOCK request: applies each element in order, rolling back
    /// acquired locks if a later element fails. Unlocks that already
    /// happened are NOT undone by the rollback - that asymmetry is wire
    /// behavior, not an oversight.
    pub(crate) async fn lock(
        &self,
        header: &Header,
        request: LockRequest,
        ctx: &RequestContext,
    ) -> Result<ResponseContent> {
        if request.locks.is_empty() {
            return Err(ServerError::Malformed("empty lock list".to_string()));
        }
        let file = self.file(&request.file_id)?;
        if file.is_pipe || file.is_directory {
            return Err(ServerError::WrongHandleType);
        }
        let session = self.session(header.session_id)?;
        let tree = self.tree(header.tree_id.unwrap_or(0), session.id)?;
        let handle = file.metadata_handle()?;
        let owner = LockOwner {
            protocol: "smb2",
            client: session.client_addr.to_string(),
            share: tree.share.clone(),
            session_id: session.id,
        };

        apply_lock_elements(
            self.services.metadata.as_ref(),
            handle,
            &owner,
            &request.locks,
            &ctx.cancel,
        )
        .await?;
        Ok(ResponseContent::Lock(LockResponse::default()))
    }
}

/// Applies the elements of one LOCK request sequentially. On failure,
/// releases the locks acquired so far in reverse order.
///
/// A shared-to-exclusive upgrade of an existing range counts as a plain
/// acquire here; the rollback does not restore the previous shared state.
pub(crate) async fn apply_lock_elements(
    metadata: &dyn MetadataService,
    handle: MetadataHandle,
    owner: &LockOwner,
    elements: &[LockElement],
    cancel: &CancellationToken,
) -> Result<()> {
    let mut acquired: Vec<(u64, u64)> = Vec::new();

    for element in elements {
        let result = apply_one(metadata, handle, owner, element, cancel).await;
        match result {
            Ok(ElementApplied::Locked) => acquired.push((element.offset, element.length)),
            Ok(ElementApplied::Unlocked) => {}
            Err(error) => {
                rollback(metadata, handle, owner, &acquired).await;
                return Err(error);
            }
        }
    }
    Ok(())
}

enum ElementApplied {
    Locked,
    Unlocked,
}

async fn apply_one(
    metadata: &dyn MetadataService,
    handle: MetadataHandle,
    owner: &LockOwner,
    element: &LockElement,
    cancel: &CancellationToken,
) -> Result<ElementApplied> {
    let flags = element.flags;
    let lock_kind = (flags.shared(), flags.exclusive(), flags.unlock());
    match lock_kind {
        (false, false, true) => {
            if flags.fail_immediately() {
                // FAIL_IMMEDIATELY modifies lock acquisition only.
                return Err(ServerError::Malformed(
                    "unlock combined with fail_immediately".to_string(),
                ));
            }
            metadata
                .unlock_file(handle, owner, element.offset, element.length)
                .await?;
            Ok(ElementApplied::Unlocked)
        }
        (true, false, false) | (false, true, false) => {
            acquire(metadata, handle, owner, element, cancel).await?;
            Ok(ElementApplied::Locked)
        }
        _ => Err(ServerError::Malformed(format!(
            "invalid lock flags {lock_kind:?}"
        ))),
    }
}

/// Acquires one range, retrying on conflict every 50 ms (up to 5 s) unless
/// FAIL_IMMEDIATELY is set. Cancellation aborts the wait.
async fn acquire(
    metadata: &dyn MetadataService,
    handle: MetadataHandle,
    owner: &LockOwner,
    element: &LockElement,
    cancel: &CancellationToken,
) -> Result<()> {
    let exclusive = element.flags.exclusive();
    let blocking = !element.flags.fail_immediately();
    let deadline = tokio::time::Instant::now() + BLOCKING_DEADLINE;

    loop {
        match metadata
            .lock_file(handle, owner, element.offset, element.length, exclusive)
            .await
        {
            Ok(()) => return Ok(()),
            Err(ServiceError::Locked) if blocking => {
                if cancel.is_cancelled() {
                    return Err(ServerError::LockConflict);
                }
                if tokio::time::Instant::now() + BLOCKING_RETRY_INTERVAL > deadline {
                    // Surface the original conflict after the deadline.
                    return Err(ServerError::LockConflict);
                }
                tokio::select! {
                    _ = tokio::time::sleep(BLOCKING_RETRY_INTERVAL) => {}
                    _ = cancel.cancelled() => return Err(ServerError::LockConflict),
                }
            }
            Err(error) => return Err(error.into()),
        }
    }
}

/// Releases acquired ranges in reverse insertion order. Failures are
/// logged; rollback keeps going.
async fn rollback(
    metadata: &dyn MetadataService,
    handle: MetadataHandle,
    owner: &LockOwner,
    acquired: &[(u64, u64)],
) {
    for &(offset, length) in acquired.iter().rev() {
        if let Err(error) = metadata.unlock_file(handle, owner, offset, length).await {
            log::warn!(
                "rollback unlock of {offset}+{length} on handle {handle} failed: {error}"
            );
        }
    }
}
