//! SMB2/SMB2.1 server core.
//!
//! This crate is the protocol brain of the server: per-connection
//! registries of sessions, tree connections, open files, pending
//! authentications and pending notifications; byte-range locking with
//! blocking acquire and rollback; SMB2.1 leases with break notification
//! and cross-protocol conflict resolution; directory enumeration state;
//! and wire-accurate command dispatch.
//!
//! Everything outside that scope - transport framing, authentication
//! cryptography, the metadata/payload backend, the named-pipe RPC engine -
//! lives behind the collaborator traits in [`services`].

#![forbid(unsafe_code)]

mod cleanup;
pub mod config;
mod create;
pub mod dirlist;
pub mod dispatch;
pub mod error;
mod fsctl;
pub mod handler;
mod info;
mod io;
pub mod lease;
pub mod locking;
mod notify;
pub mod services;

pub use config::{ServerConfig, ShareConfig, ShareKind, SharePermission};
pub use dispatch::{DispatchOutcome, Response};
pub use error::{Result, ServerError};
pub use handler::{Handler, RequestContext, SessionManager};
pub use lease::LeaseManager;
pub use services::Services;
