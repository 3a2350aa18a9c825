//! String formats a guest can negotiate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoding used for strings written into guest memory.
///
/// The numeric values are part of the guest contract: the guest exports a
/// global holding one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum StringFormat {
    /// No format declared. Never negotiable.
    Unspecified = 0,
    /// UTF-16, little endian.
    Utf16 = 1,
    /// UTF-32, little endian.
    Utf32 = 2,
    /// UTF-8.
    Utf8 = 3,
}

impl StringFormat {
    /// Map a raw global value onto a negotiable format.
    ///
    /// Returns `None` for `Unspecified` and anything out of range.
    #[must_use]
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Utf16),
            2 => Some(Self::Utf32),
            3 => Some(Self::Utf8),
            _ => None,
        }
    }

    /// Raw value as stored in the guest global.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Encode `s` into bytes.
    ///
    /// `Unspecified` has no encoding and returns `None`.
    #[must_use]
    pub fn encode(self, s: &str) -> Option<Vec<u8>> {
        match self {
            Self::Utf8 => Some(s.as_bytes().to_vec()),
            Self::Utf16 => Some(s.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Self::Utf32 => Some(s.chars().flat_map(|c| u32::from(c).to_le_bytes()).collect()),
            Self::Unspecified => None,
        }
    }

    /// Decode bytes produced by `encode` (or by the guest).
    ///
    /// Invalid sequences are replaced with U+FFFD.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => Some(String::from_utf8_lossy(bytes).into_owned()),
            Self::Utf16 => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                Some(String::from_utf16_lossy(&units))
            }
            Self::Utf32 => Some(
                bytes
                    .chunks_exact(4)
                    .map(|c| {
                        char::from_u32(u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                            .unwrap_or(char::REPLACEMENT_CHARACTER)
                    })
                    .collect(),
            ),
            Self::Unspecified => None,
        }
    }
}

impl fmt::Display for StringFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "unspecified",
            Self::Utf16 => "utf-16",
            Self::Utf32 => "utf-32",
            Self::Utf8 => "utf-8",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_are_stable() {
        assert_eq!(StringFormat::from_raw(0), None);
        assert_eq!(StringFormat::from_raw(1), Some(StringFormat::Utf16));
        assert_eq!(StringFormat::from_raw(2), Some(StringFormat::Utf32));
        assert_eq!(StringFormat::from_raw(3), Some(StringFormat::Utf8));
        assert_eq!(StringFormat::from_raw(4), None);
        assert_eq!(StringFormat::from_raw(-7), None);
        assert_eq!(StringFormat::Utf8.as_raw(), 3);
    }

    #[test]
    fn encodings() {
        assert_eq!(StringFormat::Utf8.encode("hé"), Some(vec![b'h', 0xC3, 0xA9]));
        assert_eq!(
            StringFormat::Utf16.encode("hi"),
            Some(vec![b'h', 0, b'i', 0])
        );
        assert_eq!(
            StringFormat::Utf32.encode("a"),
            Some(vec![b'a', 0, 0, 0])
        );
        assert_eq!(StringFormat::Unspecified.encode("a"), None);
    }

    #[test]
    fn decode_reverses_encode() {
        for format in [StringFormat::Utf8, StringFormat::Utf16, StringFormat::Utf32] {
            let bytes = format.encode("grüße 🌊").unwrap();
            assert_eq!(format.decode(&bytes).as_deref(), Some("grüße 🌊"));
        }
    }
}
