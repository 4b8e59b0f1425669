//! Fixed 12-byte RTP header.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! ```
//!
//! All multi-byte fields are big-endian.

use crate::error::{Result, StrandError};
use crate::rtp::flags::{CSRC_COUNT_MASK, MARKER_BIT, RtpFlags};

/// Protocol version written into every header.
pub const RTP_VERSION: u8 = 2;

/// Encoded size of the fixed header.
pub const RTP_HEADER_SIZE: usize = 12;

pub type RtpHeaderBytes = [u8; RTP_HEADER_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtpHeader {
    pub flags: RtpFlags,
    /// Number of CSRC identifiers following the fixed header.
    pub csrc_count: u8,
    pub marker: bool,
    /// 7-bit payload type.
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// Header for a plain packet (no padding, extension or CSRCs).
    pub fn new(payload_type: u8, sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            payload_type: payload_type & 0x7F,
            sequence,
            timestamp,
            ssrc,
            ..Self::default()
        }
    }

    pub fn to_bytes(&self) -> RtpHeaderBytes {
        let mut buf: RtpHeaderBytes = [0; RTP_HEADER_SIZE];
        buf[0] = (RTP_VERSION << 6) | self.flags.bits() | (self.csrc_count & CSRC_COUNT_MASK);
        buf[1] = (u8::from(self.marker) << 7) | (self.payload_type & 0x7F);
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some(fixed) = bytes.get(..RTP_HEADER_SIZE) else {
            return Err(StrandError::InvalidPacket("RTP header shorter than 12 bytes"));
        };
        let version = fixed[0] >> 6;
        if version != RTP_VERSION {
            return Err(StrandError::UnknownVariant {
                type_name: "RtpVersion",
                value: u64::from(version),
            });
        }
        Ok(Self {
            flags: RtpFlags::from_bits_truncate(fixed[0]),
            csrc_count: fixed[0] & CSRC_COUNT_MASK,
            marker: fixed[1] & MARKER_BIT != 0,
            payload_type: fixed[1] & 0x7F,
            sequence: u16::from_be_bytes([fixed[2], fixed[3]]),
            timestamp: u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]),
            ssrc: u32::from_be_bytes([fixed[8], fixed[9], fixed[10], fixed[11]]),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
