//! CREATE and CLOSE handlers.

use std::time::SystemTime;

use smb_dtyp::FileTime;
use smb_fscc::{FileAccessMask, FileAttributes};
use smb_msg::{
    CloseRequest, CloseResponse, CreateAction, CreateDisposition, CreateRequest, CreateResponse,
    Header, LeaseContext, LeaseContextV1, LeaseContextV2, LeaseFlags, OplockLevel,
    ResponseContent,
};

use crate::config::ShareKind;
use crate::dirlist::file_attributes;
use crate::handler::{DeleteTarget, Handler, OpenFile, Session, TreeConnection};
use crate::lease::{self, LeaseGrant};
use crate::services::{OpenDisposition, OpenParams};
use crate::{Result, ServerError};

fn access_bits(mask: FileAccessMask) -> u32 {
    u32::from_le_bytes(FileAccessMask::into_bytes(mask))
}

fn map_disposition(disposition: CreateDisposition) -> OpenDisposition {
    match disposition {
        CreateDisposition::Supersede => OpenDisposition::Supersede,
        CreateDisposition::Open => OpenDisposition::Open,
        CreateDisposition::Create => OpenDisposition::Create,
        CreateDisposition::OpenIf => OpenDisposition::OpenIf,
        CreateDisposition::Overwrite => OpenDisposition::Overwrite,
        CreateDisposition::OverwriteIf => OpenDisposition::OverwriteIf,
    }
}

fn creates_or_writes(disposition: CreateDisposition) -> bool {
    matches!(
        disposition,
        CreateDisposition::Supersede
            | CreateDisposition::Create
            | CreateDisposition::Overwrite
            | CreateDisposition::OverwriteIf
    )
}

impl Handler {
    pub(crate) async fn create(
        &self,
        header: &Header,
        request: CreateRequest,
    ) -> Result<ResponseContent> {
        let session = self.session(header.session_id)?;
        let tree = self.tree(header.tree_id.unwrap_or(0), session.id)?;

        match tree.kind {
            ShareKind::Ipc => self.create_pipe(&session, &tree, request).await,
            ShareKind::Disk => self.create_disk(&session, &tree, request).await,
        }
    }

    async fn create_pipe(
        &self,
        session: &Session,
        tree: &TreeConnection,
        request: CreateRequest,
    ) -> Result<ResponseContent> {
        let pipe_name = request.name.to_string().to_ascii_lowercase();
        self.services.pipes.open(&pipe_name, session.id).await?;

        let file_id = self.next_file_id();
        self.files.insert(
            file_id,
            OpenFile {
                file_id,
                session_id: session.id,
                tree_id: tree.id,
                path: request.name.to_string(),
                opened_at: SystemTime::now(),
                desired_access: access_bits(request.desired_access),
                is_directory: false,
                is_pipe: true,
                pipe_name: Some(pipe_name),
                metadata: None,
                payload: None,
                enumeration: Default::default(),
                delete_pending: false,
                delete_target: None,
                create_options: u32::from_le_bytes(smb_msg::CreateOptions::into_bytes(
                    request.create_options,
                )),
                frozen: Default::default(),
                lease_key: None,
                lease_state: lease::LEASE_NONE,
            },
        );

        Ok(ResponseContent::Create(CreateResponse {
            oplock_level: OplockLevel::None,
            flags: Default::default(),
            create_action: CreateAction::Opened,
            creation_time: FileTime::ZERO,
            last_access_time: FileTime::ZERO,
            last_write_time: FileTime::ZERO,
            change_time: FileTime::ZERO,
            allocation_size: 0,
            endof_file: 0,
            file_attributes: FileAttributes::new().with_normal(true),
            file_id,
            create_contexts: Default::default(),
        }))
    }

    async fn create_disk(
        &self,
        session: &Session,
        tree: &TreeConnection,
        request: CreateRequest,
    ) -> Result<ResponseContent> {
        let options = request.create_options;
        let wants_write = request.desired_access.wants_write()
            || creates_or_writes(request.create_disposition)
            || options.delete_on_close();
        if wants_write && !tree.permission.allows_write() {
            return Err(ServerError::AccessDenied);
        }

        let directory = if options.directory_file() {
            Some(true)
        } else if options.non_directory_file() {
            Some(false)
        } else {
            None
        };

        let params = OpenParams {
            path: request.name.to_string(),
            disposition: map_disposition(request.create_disposition),
            directory,
            delete_access: request.desired_access.wants_delete() || options.delete_on_close(),
            write_access: wants_write,
        };
        let node = self
            .services
            .metadata
            .open(&session.credentials(), &tree.share, &params)
            .await
            .map_err(|error| match error {
                crate::services::ServiceError::NotFound => ServerError::PathNotFound,
                other => ServerError::Backend(other),
            })?;
        let is_directory = matches!(node.info.kind, crate::services::FileKind::Directory);

        // Lease grant, for 2.1+ dialects carrying a lease context.
        let mut granted_level = OplockLevel::None;
        let mut contexts: Vec<smb_msg::CreateContextResponse> = Vec::new();
        let mut lease_key = None;
        let mut lease_state = lease::LEASE_NONE;
        if request.requested_oplock_level == OplockLevel::Lease
            && self
                .negotiated()
                .is_some_and(|state| state.dialect >= smb_msg::Dialect::Smb021)
        {
            if let Some(context) = request.lease_context() {
                match self
                    .grant_lease(session.id, context, node.info.id, is_directory)
                    .await
                {
                    Ok(Some((response_context, state))) => {
                        granted_level = OplockLevel::Lease;
                        lease_key = Some(response_context.lease_key());
                        lease_state = state;
                        contexts.push(response_context.into());
                    }
                    Ok(None) => {}
                    Err(error) => {
                        // A cross-protocol conflict fails the whole create.
                        self.services.metadata.close(node.handle).await.ok();
                        return Err(error);
                    }
                }
            }
        }

        let file_id = self.next_file_id();
        self.files.insert(
            file_id,
            OpenFile {
                file_id,
                session_id: session.id,
                tree_id: tree.id,
                path: request.name.to_string(),
                opened_at: SystemTime::now(),
                desired_access: access_bits(request.desired_access),
                is_directory,
                is_pipe: false,
                pipe_name: None,
                metadata: Some(node.handle),
                payload: Some(node.payload),
                enumeration: Default::default(),
                delete_pending: options.delete_on_close(),
                delete_target: Some(DeleteTarget {
                    parent: node.parent,
                    name: node.name.clone(),
                }),
                create_options: u32::from_le_bytes(smb_msg::CreateOptions::into_bytes(options)),
                frozen: Default::default(),
                lease_key,
                lease_state,
            },
        );

        Ok(ResponseContent::Create(CreateResponse {
            oplock_level: granted_level,
            flags: Default::default(),
            create_action: if node.created {
                CreateAction::Created
            } else if matches!(
                request.create_disposition,
                CreateDisposition::Overwrite | CreateDisposition::OverwriteIf
            ) {
                CreateAction::Overwritten
            } else {
                CreateAction::Opened
            },
            creation_time: node.info.creation_time,
            last_access_time: node.info.last_access_time,
            last_write_time: node.info.last_write_time,
            change_time: node.info.change_time,
            allocation_size: node.info.allocation_size,
            endof_file: node.info.size,
            file_attributes: file_attributes(&node.info),
            file_id,
            create_contexts: contexts.into(),
        }))
    }

    /// Runs the lease grant algorithm and shapes the response context.
    /// `Ok(None)` means no lease was granted (conflict with another lease,
    /// break in flight); an error means the create itself fails.
    async fn grant_lease(
        &self,
        session_id: u64,
        context: &LeaseContext,
        file: u64,
        is_directory: bool,
    ) -> Result<Option<(LeaseContext, u8)>> {
        let key = context.lease_key();
        let requested = lease::from_wire_state(context.lease_state());
        let grant = self
            .leases
            .grant(session_id, key, requested, file, is_directory)
            .await?;
        match grant {
            LeaseGrant::CrossProtocolDenied => Err(ServerError::LockConflict),
            LeaseGrant::None => Ok(None),
            LeaseGrant::Granted { state, epoch } => {
                let response = match context {
                    LeaseContext::V1(_) => LeaseContext::V1(LeaseContextV1 {
                        lease_key: key,
                        lease_state: lease::to_wire_state(state),
                    }),
                    LeaseContext::V2(v2) => LeaseContext::V2(LeaseContextV2 {
                        lease_key: key,
                        lease_state: lease::to_wire_state(state),
                        lease_flags: LeaseFlags::new()
                            .with_parent_lease_key_set(v2.lease_flags.parent_lease_key_set()),
                        parent_lease_key: v2.parent_lease_key,
                        epoch: epoch as u16,
                    }),
                };
                Ok(Some((response, state)))
            }
        }
    }

    pub(crate) async fn close(
        &self,
        header: &Header,
        request: CloseRequest,
    ) -> Result<ResponseContent> {
        let session = self.session(header.session_id)?;
        let Some((_, file)) = self.files.remove(&request.file_id) else {
            return Err(ServerError::HandleNotFound);
        };

        // Attributes must be sampled before the delete-on-close runs.
        let post_attributes = if request.flags.postquery_attrib() && !file.is_pipe {
            match file.metadata {
                Some(handle) => self.services.metadata.get_file(handle).await.ok(),
                None => None,
            }
        } else {
            None
        };

        self.release_file_resources(&file, &session.credentials()).await;
        self.drop_notifies_for(&request.file_id);

        let response = match post_attributes {
            Some(info) => CloseResponse {
                flags: request.flags,
                creation_time: info.creation_time,
                last_access_time: info.last_access_time,
                last_write_time: info.last_write_time,
                change_time: info.change_time,
                allocation_size: info.allocation_size,
                endof_file: info.size,
                file_attributes: file_attributes(&info),
            },
            None => CloseResponse::default(),
        };
        Ok(ResponseContent::Close(response))
    }
}
