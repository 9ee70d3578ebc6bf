//! File attribute flags.
//!
//! [MS-FSCC 2.6](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/ca28ec38-f155-4768-81d6-4bfeb8586fc9>)

use binrw::prelude::*;
use modular_bitfield::prelude::*;

/// Attributes of a file or directory.
///
/// [MS-FSCC 2.6](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/ca28ec38-f155-4768-81d6-4bfeb8586fc9>)
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct FileAttributes {
    /// The file is read-only; the directory cannot be deleted.
    pub readonly: bool,
    /// Hidden from ordinary directory listings.
    pub hidden: bool,
    /// Used by the operating system.
    pub system: bool,
    #[skip]
    __: bool,

    /// The item is a directory.
    pub directory: bool,
    /// Requires archiving; set on files that changed since the last backup.
    pub archive: bool,
    #[skip]
    __: bool,
    /// No other attributes set. Ignored when combined with anything else.
    pub normal: bool,

    /// Used for temporary storage.
    pub temporary: bool,
    /// Sparse file.
    pub sparse_file: bool,
    /// Has an associated reparse point.
    pub reparse_point: bool,
    /// Compressed file, or compression-by-default directory.
    pub compressed: bool,

    /// Data moved to offline storage.
    pub offline: bool,
    /// Excluded from the content index.
    pub not_content_indexed: bool,
    /// Encrypted file, or encryption-by-default directory.
    pub encrypted: bool,
    /// All data streams have integrity support.
    pub integrity_stream: bool,

    #[skip]
    __: bool,
    /// Excluded from the data integrity scan.
    pub no_scrub_data: bool,
    /// Virtual item; opening it fetches content from a remote store.
    pub recall_on_open: bool,
    /// Should be kept fully present locally.
    pub pinned: bool,

    /// Should not be kept fully present locally.
    pub unpinned: bool,
    #[skip]
    __: bool,
    /// Not fully present locally; reads may fetch from a remote store.
    pub recall_on_data_access: bool,
    #[skip]
    __: B9,
}
