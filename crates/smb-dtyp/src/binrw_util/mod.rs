//! binrw helper types shared by the wire-format crates.

pub mod boolean;
pub mod file_time;
pub mod fixed_string;
pub mod multi_sz;
pub mod pos_marker;
pub mod sized_string;

pub mod prelude {
    pub use super::boolean::Boolean;
    pub use super::file_time::FileTime;
    pub use super::fixed_string::FixedWideString;
    pub use super::multi_sz::MultiWSz;
    pub use super::pos_marker::PosMarker;
    pub use super::sized_string::SizedWideString;
}
