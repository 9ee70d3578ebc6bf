//! Information class code enums.
//!
//! [MS-FSCC 2.4/2.5](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-fscc/4718fc40-e539-4014-8e33-b675af74e3e1>)

/// Declares a `<Name>Class` enum of one-byte information class codes.
macro_rules! file_info_classes {
    (
        $(#[$meta:meta])*
        $vis:vis $name:ident {
            $($variant:ident = $value:literal,)+
        }
    ) => {
        pastey::paste! {
            $(#[$meta])*
            #[binrw::binrw]
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            #[brw(repr(u8))]
            $vis enum [<$name Class>] {
                $($variant = $value,)+
            }
        }
    };
}

file_info_classes! {
    /// Directory enumeration information classes served by QUERY_DIRECTORY.
    pub QueryDirectoryInfo {
        Directory = 0x01,
        FullDirectory = 0x02,
        BothDirectory = 0x03,
        Names = 0x0c,
        IdBothDirectory = 0x25,
        IdFullDirectory = 0x26,
    }
}

impl QueryDirectoryInfoClass {
    /// Directory information records are chained on 8-byte boundaries.
    pub const CHAINED_ALIGNMENT: u32 = 8;
}

file_info_classes! {
    /// File information classes served by QUERY_INFO.
    pub QueryFileInfo {
        Basic = 4,
        Standard = 5,
        Internal = 6,
        Ea = 7,
        Access = 8,
        Position = 14,
        Mode = 16,
        Alignment = 17,
        All = 18,
        NetworkOpen = 34,
        AttributeTag = 35,
        Id = 59,
    }
}

file_info_classes! {
    /// File information classes accepted by SET_INFO.
    pub SetFileInfo {
        Basic = 4,
        Rename = 10,
        Disposition = 13,
        Allocation = 19,
        EndOfFile = 20,
    }
}

file_info_classes! {
    /// Filesystem information classes served by QUERY_INFO.
    pub QueryFileSystemInfo {
        Volume = 1,
        Size = 3,
        Device = 4,
        Attribute = 5,
        FullSize = 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smb_tests::*;

    test_binrw! {
        QueryDirectoryInfoClass => dir_info_class: QueryDirectoryInfoClass::IdBothDirectory => "25"
    }

    test_binrw! {
        QueryFileInfoClass => file_info_class: QueryFileInfoClass::All => "12"
    }
}
