//! Server error type and its NT status mapping.

use smb_msg::Status;

use crate::services::ServiceError;

/// Classified failure of a command handler. Every variant maps to exactly
/// one NT status; handlers never leak unclassified errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("file handle not found")]
    HandleNotFound,
    #[error("tree not found")]
    TreeNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("operation not valid for this handle type")]
    WrongHandleType,
    #[error("handle is a directory")]
    IsADirectory,
    #[error("access denied")]
    AccessDenied,
    #[error("byte range conflict")]
    LockConflict,
    #[error("range not locked")]
    RangeNotLocked,
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("no more files")]
    NoMoreFiles,
    #[error("end of file")]
    EndOfFile,
    #[error("unknown control code {0:#010x}")]
    UnsupportedFsctl(u32),
    #[error("not a reparse point")]
    NotAReparsePoint,
    #[error("unknown share")]
    BadShareName,
    #[error("path not found")]
    PathNotFound,
    #[error("name collision")]
    NameCollision,
    #[error("invalid info class")]
    InvalidInfoClass,
    #[error("output buffer too small for the information class")]
    InfoTooSmall,
    #[error("authentication failed")]
    LogonFailure,
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Backend(#[from] ServiceError),
}

impl ServerError {
    /// The NT status returned to the client for this error.
    pub fn status(&self) -> Status {
        match self {
            ServerError::HandleNotFound => Status::FileClosed,
            ServerError::TreeNotFound => Status::NetworkNameDeleted,
            ServerError::SessionNotFound => Status::UserSessionDeleted,
            ServerError::WrongHandleType => Status::InvalidDeviceRequest,
            ServerError::IsADirectory => Status::FileIsADirectory,
            ServerError::AccessDenied => Status::AccessDenied,
            ServerError::LockConflict => Status::LockNotGranted,
            ServerError::RangeNotLocked => Status::RangeNotLocked,
            ServerError::Malformed(_) => Status::InvalidParameter,
            ServerError::NoMoreFiles => Status::NoMoreFiles,
            ServerError::EndOfFile => Status::EndOfFile,
            ServerError::UnsupportedFsctl(_) => Status::NotSupported,
            ServerError::NotAReparsePoint => Status::NotAReparsePoint,
            ServerError::BadShareName => Status::BadNetworkName,
            ServerError::PathNotFound => Status::ObjectNameNotFound,
            ServerError::NameCollision => Status::ObjectNameCollision,
            ServerError::InvalidInfoClass => Status::InvalidInfoClass,
            ServerError::InfoTooSmall => Status::InfoLengthMismatch,
            ServerError::LogonFailure => Status::LogonFailure,
            ServerError::Internal(_) => Status::InternalError,
            ServerError::Backend(backend) => match backend {
                ServiceError::Locked => Status::LockNotGranted,
                ServiceError::LockNotFound => Status::RangeNotLocked,
                ServiceError::NotFound => Status::FileClosed,
                ServiceError::PermissionDenied => Status::AccessDenied,
                ServiceError::IsDirectory => Status::FileIsADirectory,
                ServiceError::InvalidArgument => Status::InvalidParameter,
                ServiceError::Other(_) => Status::InternalError,
            },
        }
    }
}

/// Server-core result type.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_mapping() {
        assert_eq!(
            Status::LockNotGranted,
            ServerError::from(ServiceError::Locked).status()
        );
        assert_eq!(
            Status::RangeNotLocked,
            ServerError::from(ServiceError::LockNotFound).status()
        );
        assert_eq!(
            Status::FileClosed,
            ServerError::from(ServiceError::NotFound).status()
        );
        assert_eq!(
            Status::AccessDenied,
            ServerError::from(ServiceError::PermissionDenied).status()
        );
        assert_eq!(
            Status::FileIsADirectory,
            ServerError::from(ServiceError::IsDirectory).status()
        );
        assert_eq!(
            Status::InternalError,
            ServerError::from(ServiceError::Other("boom".into())).status()
        );
    }
}
