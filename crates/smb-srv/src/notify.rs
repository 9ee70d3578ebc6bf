//! CHANGE_NOTIFY registration and the lease/oplock break acknowledgment
//! handlers.

use std::io::Cursor;

use binrw::BinWrite;

use smb_fscc::{ChainedItemList, FileNotifyInformation};
use smb_msg::{
    ChangeNotifyRequest, Header, LeaseBreakAck, LeaseBreakResponse, OplockBreakAck,
    ResponseContent,
};

use crate::handler::{Handler, PendingNotify, RequestContext};
use crate::lease;
use crate::{Result, ServerError};

/// Encodes notify records as the 4-byte-aligned chain carried in a
/// CHANGE_NOTIFY response buffer.
pub(crate) fn encode_notify_records(records: Vec<FileNotifyInformation>) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    ChainedItemList::<FileNotifyInformation, 4>::from(records)
        .write_le(&mut cursor)
        .map_err(|error| ServerError::Internal(format!("notify encoding: {error}")))?;
    Ok(cursor.into_inner())
}

impl Handler {
    /// Handles CHANGE_NOTIFY: registers the watch and leaves the request
    /// pending. The transport holds the frame until the callback fires.
    pub(crate) fn change_notify(
        &self,
        header: &Header,
        request: ChangeNotifyRequest,
        ctx: &RequestContext,
    ) -> Result<()> {
        let session = self.session(header.session_id)?;
        let file = self.file(&request.file_id)?;
        if !file.is_directory || file.session_id != session.id {
            return Err(ServerError::WrongHandleType);
        }
        let tree = self.tree(file.tree_id, session.id)?;
        let Some(callback) = ctx.notify_callback.clone() else {
            return Err(ServerError::Internal(
                "transport supplied no notify callback".to_string(),
            ));
        };

        self.pending_notifies.insert(
            header.message_id,
            PendingNotify {
                file_id: request.file_id,
                session_id: session.id,
                message_id: header.message_id,
                path: file.path.clone(),
                share: tree.share,
                completion_filter: request.completion_filter,
                recursive: request.flags.watch_tree(),
                max_output: request.output_buffer_length,
                callback,
            },
        );
        Ok(())
    }

    /// Handles a lease break acknowledgment: applies the acknowledged state
    /// and echoes it back.
    pub(crate) async fn lease_break_ack(
        &self,
        header: &Header,
        request: LeaseBreakAck,
    ) -> Result<ResponseContent> {
        self.session(header.session_id)?;
        let ack_state = lease::from_wire_state(request.lease_state);
        let new_state = self
            .leases
            .acknowledge(request.lease_key, ack_state)
            .await?;
        Ok(ResponseContent::LeaseBreak(LeaseBreakResponse {
            lease_key: request.lease_key,
            lease_state: lease::to_wire_state(new_state),
        }))
    }

    /// Old-style oplock break acks are unexpected: this server grants
    /// leases only.
    pub(crate) fn oplock_break_ack(&self, _request: OplockBreakAck) -> Result<ResponseContent> {
        Err(ServerError::WrongHandleType)
    }
}
