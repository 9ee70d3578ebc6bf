//! Cancel request.

use binrw::prelude::*;

/// SMB2 CANCEL request. Cancels a previously sent message; the server never
/// responds to it.
///
/// Reference: MS-SMB2 2.2.30
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct CancelRequest {
    #[bw(calc = 4)]
    #[br(temp)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use smb_tests::*;

    test_binrw! {
        struct CancelRequest {} => "04000000"
    }
}
