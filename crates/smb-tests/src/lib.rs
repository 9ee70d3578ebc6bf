//! Test utilities for the workspace.
//!
//! The [`test_binrw!`] macro family generates round-trip tests for binrw
//! types against hex dumps captured from real traffic or the protocol
//! documents.

pub use pastey::paste;

/// Decodes a hex string into bytes. Whitespace and newlines are ignored, so
/// dumps can be wrapped for readability.
///
/// Panics on odd length or non-hex characters; this is test-only code.
pub fn decode_hex(s: &str) -> Vec<u8> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    assert!(
        compact.len() % 2 == 0,
        "hex string has odd length: {}",
        compact.len()
    );
    (0..compact.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&compact[i..i + 2], 16).expect("invalid hex digit"))
        .collect()
}

/// Generates a pair of tests asserting that a value encodes to, and decodes
/// from, the given hex dump.
///
/// Forms:
/// - `test_binrw! { Type => name: expr => "hex" }` - named test pair.
/// - `test_binrw! { Type: expr => "hex" }` - name derived from the type.
/// - `test_binrw! { struct Type { field: value, .. } => "hex" }` - struct
///   literal shorthand.
#[macro_export]
macro_rules! test_binrw {
    ($ty:ty => $name:ident : $value:expr => $hex:literal) => {
        $crate::paste! {
            #[test]
            fn [<test_ $name _write>]() {
                let value = $value;
                let mut cursor = ::std::io::Cursor::new(Vec::new());
                ::binrw::BinWrite::write_le(&value, &mut cursor).expect("encode failed");
                assert_eq!(
                    $crate::decode_hex($hex),
                    cursor.into_inner(),
                    "encoded bytes differ from expected dump"
                );
            }

            #[test]
            fn [<test_ $name _parse>]() {
                let data = $crate::decode_hex($hex);
                let mut cursor = ::std::io::Cursor::new(&data);
                let parsed: $ty = ::binrw::BinRead::read_le(&mut cursor).expect("decode failed");
                assert_eq!($value, parsed);
            }
        }
    };
    ($ty:ident : $value:expr => $hex:literal) => {
        $crate::paste! {
            $crate::test_binrw! { $ty => [<$ty:snake>]: $value => $hex }
        }
    };
    (struct $ty:ident { $($field:ident : $value:expr),* $(,)? } => $hex:literal) => {
        $crate::paste! {
            $crate::test_binrw! { $ty => [<$ty:snake>]: $ty { $($field: $value),* } => $hex }
        }
    };
}

/// Like [`test_binrw!`], but parse-only. Useful when several wire encodings
/// decode to the same value (e.g. non-canonical booleans).
#[macro_export]
macro_rules! test_binrw_read {
    ($ty:ty => $name:ident : $value:expr => $hex:literal) => {
        $crate::paste! {
            #[test]
            fn [<test_ $name _parse>]() {
                let data = $crate::decode_hex($hex);
                let mut cursor = ::std::io::Cursor::new(&data);
                let parsed: $ty = ::binrw::BinRead::read_le(&mut cursor).expect("decode failed");
                assert_eq!($value, parsed);
            }
        }
    };
}

/// Like [`test_binrw!`], but write-only. Useful for response structures whose
/// read path discards calculated fields.
#[macro_export]
macro_rules! test_binrw_write {
    ($ty:ty => $name:ident : $value:expr => $hex:literal) => {
        $crate::paste! {
            #[test]
            fn [<test_ $name _write>]() {
                let value = $value;
                let mut cursor = ::std::io::Cursor::new(Vec::new());
                ::binrw::BinWrite::write_le(&value, &mut cursor).expect("encode failed");
                assert_eq!(
                    $crate::decode_hex($hex),
                    cursor.into_inner(),
                    "encoded bytes differ from expected dump"
                );
            }
        }
    };
}
