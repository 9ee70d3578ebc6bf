//! Data path handlers: READ, WRITE and FLUSH.

use smb_msg::{
    FlushRequest, FlushResponse, Header, ReadRequest, ReadResponse, ResponseContent, WriteRequest,
    WriteResponse,
};

use crate::handler::{Handler, OpenFile};
use crate::services::LockOwner;
use crate::{Result, ServerError};

impl Handler {
    fn lock_owner_for(&self, file: &OpenFile, share: &str, client: &str) -> LockOwner {
        LockOwner {
            protocol: "smb2",
            client: client.to_string(),
            share: share.to_string(),
            session_id: file.session_id,
        }
    }

    pub(crate) async fn read(
        &self,
        header: &Header,
        request: ReadRequest,
    ) -> Result<ResponseContent> {
        let file = self.file(&request.file_id)?;
        let session = self.session(header.session_id)?;

        if file.is_pipe {
            let name = file.pipe_name.as_deref().unwrap_or_default();
            let buffer = self
                .services
                .pipes
                .process_read(name, session.id, request.length)
                .await?;
            return Ok(ResponseContent::Read(ReadResponse { buffer }));
        }
        if file.is_directory {
            return Err(ServerError::IsADirectory);
        }
        if request.length > self.config.max_read_size {
            return Err(ServerError::Malformed(format!(
                "read length {} above the negotiated maximum",
                request.length
            )));
        }

        let tree = self.tree(file.tree_id, session.id)?;
        let handle = file.metadata_handle()?;
        let payload = file.payload.ok_or(ServerError::WrongHandleType)?;
        let owner = self.lock_owner_for(&file, &tree.share, &session.client_addr.to_string());

        self.services
            .metadata
            .check_lock_for_io(handle, &owner, request.offset, request.length as u64, false)
            .await?;
        let buffer = self
            .services
            .metadata
            .read_at(payload, request.offset, request.length)
            .await?;

        if buffer.is_empty() && request.length > 0 {
            return Err(ServerError::EndOfFile);
        }
        if (buffer.len() as u32) < request.minimum_count {
            return Err(ServerError::EndOfFile);
        }
        Ok(ResponseContent::Read(ReadResponse { buffer }))
    }

    pub(crate) async fn write(
        &self,
        header: &Header,
        request: WriteRequest,
    ) -> Result<ResponseContent> {
        let file = self.file(&request.file_id)?;
        let session = self.session(header.session_id)?;

        if file.is_pipe {
            let name = file.pipe_name.as_deref().unwrap_or_default();
            let count = self
                .services
                .pipes
                .process_write(name, session.id, &request.buffer)
                .await?;
            return Ok(ResponseContent::Write(WriteResponse { count }));
        }
        if file.is_directory {
            return Err(ServerError::IsADirectory);
        }
        if request.buffer.len() as u32 > self.config.max_write_size {
            return Err(ServerError::Malformed(format!(
                "write length {} above the negotiated maximum",
                request.buffer.len()
            )));
        }

        let tree = self.tree(file.tree_id, session.id)?;
        if !tree.permission.allows_write() {
            return Err(ServerError::AccessDenied);
        }
        let handle = file.metadata_handle()?;
        let payload = file.payload.ok_or(ServerError::WrongHandleType)?;
        let owner = self.lock_owner_for(&file, &tree.share, &session.client_addr.to_string());

        self.services
            .metadata
            .check_lock_for_io(
                handle,
                &owner,
                request.offset,
                request.buffer.len() as u64,
                true,
            )
            .await?;

        // Two-phase write: reserve up to the new end of file, push the
        // payload, then publish.
        let new_size = request.offset + request.buffer.len() as u64;
        let reservation = self.services.metadata.prepare_write(handle, new_size).await?;
        let count = self
            .services
            .payload
            .write_at(payload, &request.buffer, request.offset)
            .await?;
        self.services.metadata.commit_write(reservation).await?;

        Ok(ResponseContent::Write(WriteResponse { count }))
    }

    pub(crate) async fn flush(
        &self,
        header: &Header,
        request: FlushRequest,
    ) -> Result<ResponseContent> {
        let file = self.file(&request.file_id)?;
        self.session(header.session_id)?;

        // Pipes have nothing to flush.
        if let Some(payload) = file.payload {
            self.services.payload.flush(payload).await?;
        }
        Ok(ResponseContent::Flush(FlushResponse::default()))
    }
}
