//! RTP packet: fixed header plus payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, StrandError};
use crate::rtp::flags::RtpFlags;
use crate::rtp::header::{RTP_HEADER_SIZE, RtpHeader};

/// Largest payload accepted when building a packet; keeps datagrams
/// within a single Ethernet frame.
pub const MAX_RTP_PAYLOAD: usize = 1460 - RTP_HEADER_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: Bytes,
}

impl RtpPacket {
    pub fn new(header: RtpHeader, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_RTP_PAYLOAD {
            return Err(StrandError::Other(format!(
                "RTP payload of {} bytes exceeds {MAX_RTP_PAYLOAD}",
                payload.len()
            )));
        }
        Ok(Self { header, payload })
    }

    /// Encoded size on the wire.
    pub fn len(&self) -> usize {
        RTP_HEADER_SIZE + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.len());
        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Parse one datagram. CSRC entries and header extensions are skipped;
    /// padding is stripped from the payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = RtpHeader::from_bytes(bytes)?;
        let mut start = RTP_HEADER_SIZE + 4 * usize::from(header.csrc_count);
        if bytes.len() < start {
            return Err(StrandError::InvalidPacket("CSRC list truncated"));
        }

        if header.flags.contains(RtpFlags::EXTENSION) {
            let Some(ext) = bytes.get(start..start + 4) else {
                return Err(StrandError::InvalidPacket("extension header truncated"));
            };
            let words = usize::from(u16::from_be_bytes([ext[2], ext[3]]));
            start += 4 + 4 * words;
            if bytes.len() < start {
                return Err(StrandError::InvalidPacket("extension truncated"));
            }
        }

        let mut end = bytes.len();
        if header.flags.contains(RtpFlags::PADDING) {
            let pad = usize::from(bytes[end - 1]);
            if pad == 0 || end - start < pad {
                return Err(StrandError::InvalidPacket("bad padding length"));
            }
            end -= pad;
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&bytes[start..end]),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
