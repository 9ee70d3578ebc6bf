//! SMB2 message structures.
//!
//! Every command request/response served by the server core, plus the
//! message header, the NTSTATUS taxonomy, and the plain-message composition
//! types. Offsets inside messages are relative to the start of the SMB2
//! header, so full messages are parsed from and written to a stream whose
//! position 0 is the header start - see [`PlainRequest`] and
//! [`PlainResponse`].

#![forbid(unsafe_code)]

mod cancel;
mod create;
mod echo;
mod error;
mod file;
mod header;
mod info;
mod ioctl;
mod lock;
mod negotiate;
mod notify;
mod oplock;
mod plain;
mod query_dir;
mod session_setup;
mod tree_connect;

pub use cancel::*;
pub use create::*;
pub use echo::*;
pub use error::*;
pub use file::*;
pub use header::*;
pub use info::*;
pub use ioctl::*;
pub use lock::*;
pub use negotiate::*;
pub use notify::*;
pub use oplock::*;
pub use plain::*;
pub use query_dir::*;
pub use session_setup::*;
pub use tree_connect::*;

/// Errors raised by message-level helpers (content casts, status lookups).
#[derive(Debug, thiserror::Error)]
pub enum SmbMsgError {
    #[error("unexpected content: expected {expected}, got {actual}")]
    UnexpectedContent {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("undefined NT status code {0:#010x}")]
    MissingErrorCodeDefinition(u32),
    #[error("dialect {0:?} cannot be used here")]
    InvalidDialect(NegotiateDialect),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Message-crate result type.
pub type Result<T> = std::result::Result<T, SmbMsgError>;
