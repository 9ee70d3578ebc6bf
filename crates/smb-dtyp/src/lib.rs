//! Windows Data Type (MS-DTYP) primitives for SMB.

#![forbid(unsafe_code)]

pub mod binrw_util;
pub mod guid;

pub use binrw_util::prelude::*;
pub use guid::*;
