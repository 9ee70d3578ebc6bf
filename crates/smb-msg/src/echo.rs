//! Echo request and response messages.

use binrw::prelude::*;

/// SMB2 ECHO request/response. Both directions share the same shape.
///
/// Reference: MS-SMB2 2.2.28, 2.2.29
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Default)]
pub struct EchoMessage {
    #[bw(calc = 4)]
    #[br(temp)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

pub use EchoMessage as EchoRequest;
pub use EchoMessage as EchoResponse;
