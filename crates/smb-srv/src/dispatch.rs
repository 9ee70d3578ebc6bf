//! Command dispatch: request body in, dispatch outcome out.

use std::time::SystemTime;

use smb_dtyp::FileTime;
use smb_msg::{
    Dialect, EchoResponse, Header, LogoffResponse, NegotiateRequest, NegotiateResponse,
    RequestContent, ResponseContent, SessionSetupRequest, SessionSetupResponse, SessionFlags,
    ShareFlags, ShareType, Status, TreeCapabilities, TreeConnectRequest, TreeConnectResponse,
    TreeDisconnectResponse,
};

use crate::config::{ShareKind, SharePermission};
use crate::handler::{Handler, NegotiateState, PendingAuth, RequestContext, Session, TreeConnection};
use crate::services::AuthOutcome;
use crate::{Result, ServerError};

/// A response to be framed by the connection driver.
#[derive(Debug)]
pub struct Response {
    pub status: Status,
    pub content: ResponseContent,
    /// Session ID the response header must carry, when it differs from the
    /// request (session establishment).
    pub session_id: Option<u64>,
}

impl Response {
    pub fn new(status: Status, content: ResponseContent) -> Self {
        Self {
            status,
            content,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: u64) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// What the transport does with a finished request.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Send a response body with the given status.
    Respond(Response),
    /// Send an empty error response with the given status.
    ErrorOnly(Status),
    /// Send nothing (CANCEL).
    NoResponse,
    /// Tear the connection down without replying (failed
    /// VALIDATE_NEGOTIATE_INFO).
    DropConnection,
}

fn ok(content: ResponseContent) -> DispatchOutcome {
    DispatchOutcome::Respond(Response::new(Status::Success, content))
}

impl Handler {
    /// Dispatches one decoded request. Never panics, never leaks an
    /// unclassified error: every failure path resolves to a status.
    pub async fn dispatch(
        &self,
        header: &Header,
        content: RequestContent,
        ctx: &RequestContext,
    ) -> DispatchOutcome {
        let command = header.command;
        let result = self.dispatch_inner(header, content, ctx).await;
        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                log::debug!(
                    "{} (message {}) failed: {}",
                    command,
                    header.message_id,
                    error
                );
                DispatchOutcome::ErrorOnly(error.status())
            }
        }
    }

    async fn dispatch_inner(
        &self,
        header: &Header,
        content: RequestContent,
        ctx: &RequestContext,
    ) -> Result<DispatchOutcome> {
        match content {
            RequestContent::Negotiate(request) => self.negotiate(request, ctx),
            RequestContent::SessionSetup(request) => {
                self.session_setup(header, request, ctx).await
            }
            RequestContent::Logoff(_) => {
                self.session(header.session_id)?;
                self.cleanup_session(header.session_id).await;
                Ok(ok(ResponseContent::Logoff(LogoffResponse::default())))
            }
            RequestContent::TreeConnect(request) => self.tree_connect(header, request),
            RequestContent::TreeDisconnect(_) => self.tree_disconnect(header).await,
            RequestContent::Create(request) => self.create(header, request).await.map(ok),
            RequestContent::Close(request) => self.close(header, request).await.map(ok),
            RequestContent::Flush(request) => self.flush(header, request).await.map(ok),
            RequestContent::Read(request) => self.read(header, request).await.map(ok),
            RequestContent::Write(request) => self.write(header, request).await.map(ok),
            RequestContent::Lock(request) => self.lock(header, request, ctx).await.map(ok),
            RequestContent::Ioctl(request) => self.ioctl(header, request).await,
            // CANCEL never gets a response of its own.
            RequestContent::Cancel(_) => Ok(DispatchOutcome::NoResponse),
            RequestContent::Echo(_) => Ok(ok(ResponseContent::Echo(EchoResponse::default()))),
            RequestContent::QueryDirectory(request) => {
                self.query_directory(header, request).await.map(ok)
            }
            RequestContent::ChangeNotify(request) => {
                self.change_notify(header, request, ctx)?;
                // The real completion arrives through the async callback.
                Ok(DispatchOutcome::ErrorOnly(Status::Pending))
            }
            RequestContent::QueryInfo(request) => self.query_info(header, request).await.map(ok),
            RequestContent::SetInfo(request) => self.set_info(header, request).await.map(ok),
            RequestContent::LeaseBreakAck(request) => {
                self.lease_break_ack(header, request).await.map(ok)
            }
            RequestContent::OplockBreakAck(request) => self.oplock_break_ack(request).map(ok),
        }
    }

    fn negotiate(
        &self,
        request: NegotiateRequest,
        _ctx: &RequestContext,
    ) -> Result<DispatchOutcome> {
        let Some(dialect) = self.select_dialect(&request.dialects) else {
            return Ok(DispatchOutcome::ErrorOnly(Status::NotSupported));
        };

        self.record_negotiate(NegotiateState {
            dialect,
            client_capabilities: u32::from_le_bytes(smb_msg::GlobalCapabilities::into_bytes(
                request.capabilities,
            )),
            client_guid: request.client_guid,
            client_security_mode: u16::from_le_bytes(
                smb_msg::NegotiateSecurityMode::into_bytes(request.security_mode),
            ),
        });

        Ok(ok(ResponseContent::Negotiate(NegotiateResponse {
            security_mode: self.config.security_mode,
            dialect_revision: dialect.into(),
            server_guid: self.config.server_guid,
            capabilities: self.config.capabilities,
            max_transact_size: self.config.max_transact_size,
            max_read_size: self.config.max_read_size,
            max_write_size: self.config.max_write_size,
            system_time: FileTime::now(),
            server_start_time: FileTime::ZERO,
            buffer: Vec::new(),
            negotiate_context_list: None,
        })))
    }

    async fn session_setup(
        &self,
        header: &Header,
        request: SessionSetupRequest,
        ctx: &RequestContext,
    ) -> Result<DispatchOutcome> {
        if self.negotiated().is_none() {
            return Err(ServerError::Malformed(
                "session setup before negotiate".to_string(),
            ));
        }

        if header.session_id == 0 {
            let outcome = self
                .services
                .auth
                .begin(&request.buffer, &ctx.client_addr)
                .await
                .map_err(|_| ServerError::LogonFailure)?;
            let session_id = self.sessions.next_id();
            self.apply_auth_outcome(session_id, outcome, ctx)
        } else {
            let Some(pending) = self
                .pending_auths
                .get(&header.session_id)
                .map(|p| p.clone())
            else {
                return Err(ServerError::SessionNotFound);
            };
            let outcome = self
                .services
                .auth
                .complete(
                    &pending.challenge,
                    pending.spnego,
                    &request.buffer,
                    &ctx.client_addr,
                )
                .await
                .map_err(|_| {
                    // Failed final legs evict the pending record.
                    self.pending_auths.remove(&header.session_id);
                    ServerError::LogonFailure
                })?;
            self.apply_auth_outcome(header.session_id, outcome, ctx)
        }
    }

    fn apply_auth_outcome(
        &self,
        session_id: u64,
        outcome: AuthOutcome,
        ctx: &RequestContext,
    ) -> Result<DispatchOutcome> {
        match outcome {
            AuthOutcome::Continue {
                challenge,
                spnego,
                blob,
            } => {
                self.pending_auths.insert(
                    session_id,
                    PendingAuth {
                        session_id,
                        client_addr: ctx.client_addr,
                        created_at: SystemTime::now(),
                        challenge,
                        spnego,
                    },
                );
                Ok(DispatchOutcome::Respond(
                    Response::new(
                        Status::MoreProcessingRequired,
                        ResponseContent::SessionSetup(SessionSetupResponse {
                            session_flags: SessionFlags::new(),
                            buffer: blob,
                        }),
                    )
                    .with_session(session_id),
                ))
            }
            AuthOutcome::Complete {
                identity,
                guest,
                blob,
            } => {
                self.pending_auths.remove(&session_id);
                self.sessions.store(Session {
                    id: session_id,
                    client_addr: ctx.client_addr,
                    guest,
                    identity,
                    created_at: SystemTime::now(),
                });
                Ok(DispatchOutcome::Respond(
                    Response::new(
                        Status::Success,
                        ResponseContent::SessionSetup(SessionSetupResponse {
                            session_flags: SessionFlags::new().with_guest(guest),
                            buffer: blob,
                        }),
                    )
                    .with_session(session_id),
                ))
            }
        }
    }

    fn tree_connect(
        &self,
        header: &Header,
        request: TreeConnectRequest,
    ) -> Result<DispatchOutcome> {
        let session = self.session(header.session_id)?;
        let share_name = request.share_name().to_string();
        let Some(share) = self.config.share(&share_name) else {
            return Err(ServerError::BadShareName);
        };

        let tree_id = self.next_tree_id();
        self.trees.insert(
            tree_id,
            TreeConnection {
                id: tree_id,
                session_id: session.id,
                share: share_name,
                kind: share.kind,
                created_at: SystemTime::now(),
                permission: share.permission,
            },
        );

        let (share_type, maximal_access) = match share.kind {
            ShareKind::Ipc => (ShareType::Pipe, 0x001f00a9),
            ShareKind::Disk => match share.permission {
                SharePermission::ReadOnly => (ShareType::Disk, 0x001200a9),
                _ => (ShareType::Disk, 0x001f01ff),
            },
        };

        Ok(DispatchOutcome::Respond(
            Response::new(
                Status::Success,
                ResponseContent::TreeConnect(TreeConnectResponse {
                    share_type,
                    share_flags: ShareFlags::new(),
                    capabilities: TreeCapabilities::new(),
                    maximal_access,
                }),
            )
            .with_session(session.id),
        ))
    }

    async fn tree_disconnect(&self, header: &Header) -> Result<DispatchOutcome> {
        let session = self.session(header.session_id)?;
        let tree_id = header.tree_id.unwrap_or(0);
        self.tree(tree_id, session.id)?;

        self.close_all_files_for_tree(tree_id, session.id).await;
        self.trees.remove(&tree_id);
        Ok(ok(ResponseContent::TreeDisconnect(
            TreeDisconnectResponse::default(),
        )))
    }

    /// Supported dialects, for transports that need to advertise them.
    pub fn dialects(&self) -> &[Dialect] {
        &self.config.dialects
    }
}
