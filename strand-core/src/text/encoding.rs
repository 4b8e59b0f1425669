//! Supported external encodings and error policies.

use std::fmt;
use std::str::FromStr;

use crate::error::StrandError;

// ── TextEncoding ─────────────────────────────────────────────────

/// External byte encodings a [`Transcoder`](super::Transcoder) can convert
/// to and from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    /// 7-bit US-ASCII.
    UsAscii,
    /// UTF-8.
    #[default]
    Utf8,
    /// UTF-16, little-endian byte order.
    Utf16Le,
    /// UTF-16, big-endian byte order.
    Utf16Be,
}

impl TextEncoding {
    /// Canonical encoding name, used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::UsAscii => "US-ASCII",
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
        }
    }

    /// Largest number of bytes one code point can occupy.
    ///
    /// UTF-8 reports the historic six-byte form so that carry buffers
    /// can always hold a complete (if invalid) sequence.
    pub const fn max_bytes_per_char(self) -> usize {
        match self {
            Self::UsAscii => 1,
            Self::Utf8 => 6,
            Self::Utf16Le | Self::Utf16Be => 4,
        }
    }

    /// Byte-order mark for this encoding, if it has one.
    pub const fn bom(self) -> Option<&'static [u8]> {
        match self {
            Self::UsAscii => None,
            Self::Utf8 => Some(&[0xEF, 0xBB, 0xBF]),
            Self::Utf16Le => Some(&[0xFF, 0xFE]),
            Self::Utf16Be => Some(&[0xFE, 0xFF]),
        }
    }

    /// Character substituted for bad input under [`ErrorAction::Replace`]
    /// unless the caller configures another one.
    pub const fn default_replacement(self) -> char {
        match self {
            Self::UsAscii => '?',
            _ => char::REPLACEMENT_CHARACTER,
        }
    }

    /// Pick an encoding from the first raw bytes of a stream.
    ///
    /// Returns the encoding and the number of BOM bytes to skip.
    /// `FE FF` is UTF-16BE, `FF FE` is UTF-16LE, anything else is UTF-8
    /// (with an optional `EF BB BF` mark).
    pub fn sniff(prefix: &[u8]) -> (Self, usize) {
        match prefix {
            [0xFE, 0xFF, ..] => (Self::Utf16Be, 2),
            [0xFF, 0xFE, ..] => (Self::Utf16Le, 2),
            [0xEF, 0xBB, 0xBF, ..] => (Self::Utf8, 3),
            _ => (Self::Utf8, 0),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = StrandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match norm.as_str() {
            "ascii" | "usascii" => Ok(Self::UsAscii),
            "utf8" => Ok(Self::Utf8),
            "utf16le" | "utf16" => Ok(Self::Utf16Le),
            "utf16be" => Ok(Self::Utf16Be),
            _ => Err(StrandError::Conversion {
                text: s.to_string(),
                type_name: "TextEncoding",
            }),
        }
    }
}

// ── ErrorAction ──────────────────────────────────────────────────

/// What a transcoder does when it meets input it cannot convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorAction {
    /// Fail on the first bad unit.
    #[default]
    Throw,
    /// Substitute the replacement character and keep going.
    Replace,
    /// Return what was converted so far; fail only when nothing was.
    StopThenThrow,
}

impl FromStr for ErrorAction {
    type Err = StrandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "throw" | "fail" => Ok(Self::Throw),
            "replace" => Ok(Self::Replace),
            "stop" | "stopthenthrow" | "stop-then-throw" => Ok(Self::StopThenThrow),
            _ => Err(StrandError::Conversion {
                text: s.to_string(),
                type_name: "ErrorAction",
            }),
        }
    }
}

// ── NewlineMode ──────────────────────────────────────────────────

/// Line-break convention of a text stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NewlineMode {
    /// Carriage return only.
    Cr,
    /// Line feed only.
    Lf,
    /// Carriage return followed by line feed.
    CrLf,
}

impl NewlineMode {
    /// The characters written for one logical line break.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cr => "\r",
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

impl FromStr for NewlineMode {
    type Err = StrandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cr" => Ok(Self::Cr),
            "lf" => Ok(Self::Lf),
            "crlf" => Ok(Self::CrLf),
            _ => Err(StrandError::Conversion {
                text: s.to_string(),
                type_name: "NewlineMode",
            }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
