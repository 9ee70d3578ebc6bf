//! IOCTL envelope and FSCTL payloads.

mod fsctl;
mod msg;

pub use fsctl::*;
pub use msg::*;
