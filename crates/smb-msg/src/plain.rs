//! Plain (untransformed) message composition: header + typed content.

use binrw::prelude::*;

use super::header::{Command, Header, HeaderFlags, Status};
use super::*;

macro_rules! content_casts {
    (
        $enum_name:ident {
            $({$variant:ident, $inner:ty},)+
        }
    ) => {
        pastey::paste! {

impl $enum_name {
    /// The name of the contained variant, for diagnostics.
    pub fn content_name(&self) -> &'static str {
        match self {
            $(
                $enum_name::$variant(_) => stringify!($variant),
            )+
        }
    }

    $(
        #[doc = concat!("Casts to [`", stringify!($inner), "`], by value.")]
        pub fn [<to_ $variant:snake>](self) -> crate::Result<$inner> {
            match self {
                $enum_name::$variant(content) => Ok(content),
                _ => Err(crate::SmbMsgError::UnexpectedContent {
                    expected: stringify!($variant),
                    actual: self.content_name(),
                }),
            }
        }

        #[doc = concat!("Casts to [`", stringify!($inner), "`], by reference.")]
        pub fn [<as_ $variant:snake>](&self) -> crate::Result<&$inner> {
            match self {
                $enum_name::$variant(content) => Ok(content),
                _ => Err(crate::SmbMsgError::UnexpectedContent {
                    expected: stringify!($variant),
                    actual: self.content_name(),
                }),
            }
        }
    )+
}
        }
    };
}

/// Body of a plain SMB2 request, decoded according to the header command.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little, import(command: &Command))]
pub enum RequestContent {
    #[br(pre_assert(matches!(command, Command::Negotiate)))]
    Negotiate(NegotiateRequest),
    #[br(pre_assert(matches!(command, Command::SessionSetup)))]
    SessionSetup(SessionSetupRequest),
    #[br(pre_assert(matches!(command, Command::Logoff)))]
    Logoff(LogoffRequest),
    #[br(pre_assert(matches!(command, Command::TreeConnect)))]
    TreeConnect(TreeConnectRequest),
    #[br(pre_assert(matches!(command, Command::TreeDisconnect)))]
    TreeDisconnect(TreeDisconnectRequest),
    #[br(pre_assert(matches!(command, Command::Create)))]
    Create(CreateRequest),
    #[br(pre_assert(matches!(command, Command::Close)))]
    Close(CloseRequest),
    #[br(pre_assert(matches!(command, Command::Flush)))]
    Flush(FlushRequest),
    #[br(pre_assert(matches!(command, Command::Read)))]
    Read(ReadRequest),
    #[br(pre_assert(matches!(command, Command::Write)))]
    Write(WriteRequest),
    #[br(pre_assert(matches!(command, Command::Lock)))]
    Lock(LockRequest),
    #[br(pre_assert(matches!(command, Command::Ioctl)))]
    Ioctl(IoctlRequest),
    #[br(pre_assert(matches!(command, Command::Cancel)))]
    Cancel(CancelRequest),
    #[br(pre_assert(matches!(command, Command::Echo)))]
    Echo(EchoRequest),
    #[br(pre_assert(matches!(command, Command::QueryDirectory)))]
    QueryDirectory(QueryDirectoryRequest),
    #[br(pre_assert(matches!(command, Command::ChangeNotify)))]
    ChangeNotify(ChangeNotifyRequest),
    #[br(pre_assert(matches!(command, Command::QueryInfo)))]
    QueryInfo(QueryInfoRequest),
    #[br(pre_assert(matches!(command, Command::SetInfo)))]
    SetInfo(SetInfoRequest),

    // Both acknowledgment shapes arrive as OplockBreak; the structure size
    // disambiguates.
    #[br(pre_assert(matches!(command, Command::OplockBreak)))]
    OplockBreakAck(OplockBreakAck),
    #[br(pre_assert(matches!(command, Command::OplockBreak)))]
    LeaseBreakAck(LeaseBreakAck),
}

impl RequestContent {
    /// The command this content belongs to.
    pub fn associated_cmd(&self) -> Command {
        use RequestContent::*;
        match self {
            Negotiate(_) => Command::Negotiate,
            SessionSetup(_) => Command::SessionSetup,
            Logoff(_) => Command::Logoff,
            TreeConnect(_) => Command::TreeConnect,
            TreeDisconnect(_) => Command::TreeDisconnect,
            Create(_) => Command::Create,
            Close(_) => Command::Close,
            Flush(_) => Command::Flush,
            Read(_) => Command::Read,
            Write(_) => Command::Write,
            Lock(_) => Command::Lock,
            Ioctl(_) => Command::Ioctl,
            Cancel(_) => Command::Cancel,
            Echo(_) => Command::Echo,
            QueryDirectory(_) => Command::QueryDirectory,
            ChangeNotify(_) => Command::ChangeNotify,
            QueryInfo(_) => Command::QueryInfo,
            SetInfo(_) => Command::SetInfo,
            OplockBreakAck(_) | LeaseBreakAck(_) => Command::OplockBreak,
        }
    }
}

content_casts! {
    RequestContent {
        {Negotiate, NegotiateRequest},
        {SessionSetup, SessionSetupRequest},
        {Logoff, LogoffRequest},
        {TreeConnect, TreeConnectRequest},
        {TreeDisconnect, TreeDisconnectRequest},
        {Create, CreateRequest},
        {Close, CloseRequest},
        {Flush, FlushRequest},
        {Read, ReadRequest},
        {Write, WriteRequest},
        {Lock, LockRequest},
        {Ioctl, IoctlRequest},
        {Cancel, CancelRequest},
        {Echo, EchoRequest},
        {QueryDirectory, QueryDirectoryRequest},
        {ChangeNotify, ChangeNotifyRequest},
        {QueryInfo, QueryInfoRequest},
        {SetInfo, SetInfoRequest},
        {OplockBreakAck, OplockBreakAck},
        {LeaseBreakAck, LeaseBreakAck},
    }
}

/// Body of a plain SMB2 response.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little, import(command: &Command))]
pub enum ResponseContent {
    #[br(pre_assert(matches!(command, Command::Negotiate)))]
    Negotiate(NegotiateResponse),
    #[br(pre_assert(matches!(command, Command::SessionSetup)))]
    SessionSetup(SessionSetupResponse),
    #[br(pre_assert(matches!(command, Command::Logoff)))]
    Logoff(LogoffResponse),
    #[br(pre_assert(matches!(command, Command::TreeConnect)))]
    TreeConnect(TreeConnectResponse),
    #[br(pre_assert(matches!(command, Command::TreeDisconnect)))]
    TreeDisconnect(TreeDisconnectResponse),
    #[br(pre_assert(matches!(command, Command::Create)))]
    Create(CreateResponse),
    #[br(pre_assert(matches!(command, Command::Close)))]
    Close(CloseResponse),
    #[br(pre_assert(matches!(command, Command::Flush)))]
    Flush(FlushResponse),
    #[br(pre_assert(matches!(command, Command::Read)))]
    Read(ReadResponse),
    #[br(pre_assert(matches!(command, Command::Write)))]
    Write(WriteResponse),
    #[br(pre_assert(matches!(command, Command::Lock)))]
    Lock(LockResponse),
    #[br(pre_assert(matches!(command, Command::Ioctl)))]
    Ioctl(IoctlResponse),
    #[br(pre_assert(matches!(command, Command::Echo)))]
    Echo(EchoResponse),
    #[br(pre_assert(matches!(command, Command::QueryDirectory)))]
    QueryDirectory(QueryDirectoryResponse),
    #[br(pre_assert(matches!(command, Command::ChangeNotify)))]
    ChangeNotify(ChangeNotifyResponse),
    #[br(pre_assert(matches!(command, Command::QueryInfo)))]
    QueryInfo(QueryInfoResponse),
    #[br(pre_assert(matches!(command, Command::SetInfo)))]
    SetInfo(SetInfoResponse),

    #[br(pre_assert(matches!(command, Command::OplockBreak)))]
    OplockBreakNotify(OplockBreakNotify),
    #[br(pre_assert(matches!(command, Command::OplockBreak)))]
    LeaseBreakNotify(LeaseBreakNotify),
    #[br(pre_assert(matches!(command, Command::OplockBreak)))]
    LeaseBreak(LeaseBreakResponse),

    /// Error response; valid for any command.
    Error(ErrorResponse),
}

impl ResponseContent {
    /// The command this content belongs to. The error response has no
    /// command of its own; callers echo the request command.
    pub fn associated_cmd(&self) -> Option<Command> {
        use ResponseContent::*;
        Some(match self {
            Negotiate(_) => Command::Negotiate,
            SessionSetup(_) => Command::SessionSetup,
            Logoff(_) => Command::Logoff,
            TreeConnect(_) => Command::TreeConnect,
            TreeDisconnect(_) => Command::TreeDisconnect,
            Create(_) => Command::Create,
            Close(_) => Command::Close,
            Flush(_) => Command::Flush,
            Read(_) => Command::Read,
            Write(_) => Command::Write,
            Lock(_) => Command::Lock,
            Ioctl(_) => Command::Ioctl,
            Echo(_) => Command::Echo,
            QueryDirectory(_) => Command::QueryDirectory,
            ChangeNotify(_) => Command::ChangeNotify,
            QueryInfo(_) => Command::QueryInfo,
            SetInfo(_) => Command::SetInfo,
            OplockBreakNotify(_) | LeaseBreakNotify(_) | LeaseBreak(_) => Command::OplockBreak,
            Error(_) => return None,
        })
    }
}

content_casts! {
    ResponseContent {
        {Negotiate, NegotiateResponse},
        {SessionSetup, SessionSetupResponse},
        {Logoff, LogoffResponse},
        {TreeConnect, TreeConnectResponse},
        {TreeDisconnect, TreeDisconnectResponse},
        {Create, CreateResponse},
        {Close, CloseResponse},
        {Flush, FlushResponse},
        {Read, ReadResponse},
        {Write, WriteResponse},
        {Lock, LockResponse},
        {Ioctl, IoctlResponse},
        {Echo, EchoResponse},
        {QueryDirectory, QueryDirectoryResponse},
        {ChangeNotify, ChangeNotifyResponse},
        {QueryInfo, QueryInfoResponse},
        {SetInfo, SetInfoResponse},
        {OplockBreakNotify, OplockBreakNotify},
        {LeaseBreakNotify, LeaseBreakNotify},
        {LeaseBreak, LeaseBreakResponse},
        {Error, ErrorResponse},
    }
}

macro_rules! impl_from_content {
    ($enum_name:ident: $({$variant:ident, $inner:ty},)+) => {
        $(
            impl From<$inner> for $enum_name {
                fn from(content: $inner) -> Self {
                    $enum_name::$variant(content)
                }
            }
        )+
    };
}

impl_from_content! {
    ResponseContent:
    {Negotiate, NegotiateResponse},
    {SessionSetup, SessionSetupResponse},
    {TreeConnect, TreeConnectResponse},
    {Create, CreateResponse},
    {Close, CloseResponse},
    {Read, ReadResponse},
    {Write, WriteResponse},
    {Lock, LockResponse},
    {Ioctl, IoctlResponse},
    {QueryDirectory, QueryDirectoryResponse},
    {ChangeNotify, ChangeNotifyResponse},
    {QueryInfo, QueryInfoResponse},
    {SetInfo, SetInfoResponse},
    {Error, ErrorResponse},
}

/// A plain SMB2 request: header plus typed body, sharing one stream so
/// header-relative offsets come out right.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct PlainRequest {
    #[brw(assert(!header.flags.server_to_redir()))]
    pub header: Header,
    #[brw(args(&header.command))]
    pub content: RequestContent,
}

impl PlainRequest {
    pub fn new(content: RequestContent) -> Self {
        let command = content.associated_cmd();
        Self {
            header: Header {
                credit_charge: 0,
                status: Status::Success as u32,
                command,
                credit_request: 0,
                flags: HeaderFlags::new(),
                next_command: 0,
                message_id: 0,
                tree_id: Some(0),
                async_id: None,
                session_id: 0,
                signature: 0,
            },
            content,
        }
    }
}

/// A plain SMB2 response.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct PlainResponse {
    #[brw(assert(header.flags.server_to_redir()))]
    pub header: Header,
    #[bw(args(&header.command))]
    #[br(args(&header.command))]
    pub content: ResponseContent,
}

impl PlainResponse {
    /// Builds a response with a header mirroring `request`.
    pub fn for_request(request: &Header, status: Status, content: ResponseContent) -> Self {
        Self {
            header: Header {
                credit_charge: request.credit_charge,
                status: status as u32,
                command: request.command,
                credit_request: request.credit_request.max(1),
                flags: HeaderFlags::new().with_server_to_redir(true),
                next_command: 0,
                message_id: request.message_id,
                tree_id: request.tree_id.or(Some(0)),
                async_id: None,
                session_id: request.session_id,
                signature: 0,
            },
            content,
        }
    }
}
