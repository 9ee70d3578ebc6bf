//! Error response message.

use binrw::io::TakeSeekExt;
use binrw::prelude::*;

use smb_dtyp::binrw_util::prelude::*;

/// The SMB2 ERROR response, sent for any request that failed.
///
/// Reference: MS-SMB2 2.2.2
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct ErrorResponse {
    #[bw(calc = 9)]
    #[br(temp)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    /// Number of error contexts (SMB 3.1.1 only; zero otherwise).
    #[bw(try_calc = error_data.len().try_into())]
    #[br(temp)]
    _error_context_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[bw(calc = PosMarker::default())]
    #[br(temp)]
    _byte_count: PosMarker<u32>,
    /// Extended error information; empty for plain errors.
    #[br(count = _error_context_count, map_stream = |s| s.take_seek(_byte_count.value.into()))]
    #[bw(write_with = PosMarker::write_size, args(&_byte_count))]
    pub error_data: Vec<ErrorResponseContext>,
}

/// One SMB2 ERROR context record (SMB 3.1.1).
///
/// Reference: MS-SMB2 2.2.2.1
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct ErrorResponseContext {
    #[brw(align_before = 8)]
    #[bw(try_calc = error_data.len().try_into())]
    #[br(temp)]
    _error_data_length: u32,
    pub error_id: ErrorId,
    #[br(count = _error_data_length)]
    pub error_data: Vec<u8>,
}

/// Identifier of an error context record.
///
/// Reference: MS-SMB2 2.2.2.1
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u32))]
pub enum ErrorId {
    /// All errors in MS-SMB2, unless otherwise specified.
    Default = 0,
    /// The context carries a share redirect message.
    ShareRedirect = 0x72645253,
}

#[cfg(test)]
mod tests {
    use super::*;
    use smb_tests::*;

    test_binrw! {
        struct ErrorResponse {
            error_data: vec![],
        } => "0900000000000000"
    }
}
