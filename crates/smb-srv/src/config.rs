//! Server configuration.

use std::collections::HashMap;

use smb_dtyp::Guid;
use smb_msg::{Dialect, GlobalCapabilities, NegotiateSecurityMode};

/// One megabyte: the default for every transfer size limit.
const DEFAULT_MAX_SIZE: u32 = 1024 * 1024;

/// Access level a share grants to connected sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharePermission {
    ReadOnly,
    ReadWrite,
    Full,
}

impl SharePermission {
    pub fn allows_write(&self) -> bool {
        !matches!(self, SharePermission::ReadOnly)
    }
}

/// What a share exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    Disk,
    Ipc,
}

/// Static configuration of one share.
#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub kind: ShareKind,
    pub permission: SharePermission,
}

/// Static configuration of the server core. Loading this from files or
/// flags happens outside the core.
#[derive(Clone)]
pub struct ServerConfig {
    /// Identifies this server across connections; echoed in NEGOTIATE and
    /// VALIDATE_NEGOTIATE_INFO.
    pub server_guid: Guid,
    /// Dialects offered, in ascending preference order.
    pub dialects: Vec<Dialect>,
    pub security_mode: NegotiateSecurityMode,
    pub capabilities: GlobalCapabilities,
    /// Transfer limits. All default to 1 MiB.
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    /// Volume serial, consistent across the NTFS volume data FSCTL, USN
    /// records and FILE_ID_INFORMATION.
    pub volume_serial: u64,
    pub volume_label: String,
    /// Name reported by the filesystem-attribute info class.
    pub filesystem_name: String,
    /// Shares by name (case-insensitive lookup, stored lowercase).
    pub shares: HashMap<String, ShareConfig>,
}

impl ServerConfig {
    /// Looks up a share by its case-insensitive name.
    pub fn share(&self, name: &str) -> Option<&ShareConfig> {
        self.shares.get(&name.to_ascii_lowercase())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut shares = HashMap::new();
        shares.insert(
            "ipc$".to_string(),
            ShareConfig {
                kind: ShareKind::Ipc,
                permission: SharePermission::ReadWrite,
            },
        );
        Self {
            server_guid: Guid::ZERO,
            dialects: vec![
                Dialect::Smb0202,
                Dialect::Smb021,
                Dialect::Smb030,
                Dialect::Smb0302,
            ],
            security_mode: NegotiateSecurityMode::new().with_signing_enabled(true),
            capabilities: GlobalCapabilities::new()
                .with_leasing(true)
                .with_large_mtu(true),
            max_transact_size: DEFAULT_MAX_SIZE,
            max_read_size: DEFAULT_MAX_SIZE,
            max_write_size: DEFAULT_MAX_SIZE,
            volume_serial: 0,
            volume_label: String::new(),
            filesystem_name: "NTFS".to_string(),
            shares,
        }
    }
}
