//! RTCP sender reports, source descriptions and BYE packets.
//!
//! Every RTCP packet starts with the same 4-byte header:
//!
//! ```text
//! byte 0   version (2 bits) = 2 | padding (1 bit) | count (5 bits)
//! byte 1   packet type
//! byte 2-3 length in 32-bit words minus one, big-endian
//! ```
//!
//! Packets are sent as compound datagrams: a sender report first, then a
//! CNAME description, then (at end of stream) a BYE.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, StrandError};
use crate::text::bits::BitSequence;

const RTCP_VERSION: u64 = 2;
const RTCP_HEADER_SIZE: usize = 4;
const SDES_CNAME: u8 = 1;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

// ── Packet types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RtcpPacketType {
    SenderReport = 200,
    ReceiverReport = 201,
    SourceDescription = 202,
    Bye = 203,
    App = 204,
}

impl TryFrom<u8> for RtcpPacketType {
    type Error = StrandError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            200 => Ok(Self::SenderReport),
            201 => Ok(Self::ReceiverReport),
            202 => Ok(Self::SourceDescription),
            203 => Ok(Self::Bye),
            204 => Ok(Self::App),
            other => Err(StrandError::UnknownVariant {
                type_name: "RtcpPacketType",
                value: u64::from(other),
            }),
        }
    }
}

// ── Common header ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpHeader {
    /// Report count, source count or chunk count, depending on type.
    pub count: u8,
    pub packet_type: RtcpPacketType,
    /// Packet length in 32-bit words minus one.
    pub length: u16,
}

impl RtcpHeader {
    /// Header with the length implied by the packet type and count:
    /// `7 + 6 * count - 1` for sender reports, `2 + count - 1` for BYE.
    pub fn for_report(packet_type: RtcpPacketType, count: u8) -> Self {
        let count_words = u16::from(count);
        let length = match packet_type {
            RtcpPacketType::SenderReport => 7 + 6 * count_words - 1,
            RtcpPacketType::Bye => 2 + count_words - 1,
            RtcpPacketType::ReceiverReport => 2 + 6 * count_words - 1,
            RtcpPacketType::SourceDescription | RtcpPacketType::App => 0,
        };
        Self {
            count,
            packet_type,
            length,
        }
    }

    pub fn to_bytes(&self) -> Result<[u8; RTCP_HEADER_SIZE]> {
        let mut bits = BitSequence::with_capacity(32);
        bits.append_bits(RTCP_VERSION, 2)?;
        bits.append_bit(false);
        bits.append_bits(u64::from(self.count), 5)?;
        bits.append_bits(self.packet_type as u64, 8)?;
        bits.append_bits(u64::from(self.length), 16)?;
        let mut out = [0u8; RTCP_HEADER_SIZE];
        out.copy_from_slice(bits.as_bytes());
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some(raw) = bytes.get(..RTCP_HEADER_SIZE) else {
            return Err(StrandError::InvalidPacket("RTCP header shorter than 4 bytes"));
        };
        let mut bits = BitSequence::from_bytes(raw, 32)?;
        let version = bits.read_bits(2)?;
        if version != RTCP_VERSION {
            return Err(StrandError::UnknownVariant {
                type_name: "RtcpVersion",
                value: version,
            });
        }
        let _padding = bits.read_bits(1)?;
        let count = bits.read_bits(5)? as u8;
        let packet_type = RtcpPacketType::try_from(bits.read_bits(8)? as u8)?;
        let length = bits.read_bits(16)? as u16;
        Ok(Self {
            count,
            packet_type,
            length,
        })
    }

    /// Total packet size in bytes, header included.
    pub fn packet_len(&self) -> usize {
        (usize::from(self.length) + 1) * 4
    }
}

// ── NTP timestamps ───────────────────────────────────────────────

/// 64-bit NTP timestamp: seconds since 1900 and a 32-bit fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct NtpTimestamp {
    pub seconds: u32,
    pub fraction: u32,
}

impl NtpTimestamp {
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let since_unix = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        let seconds = since_unix.as_secs() + NTP_UNIX_OFFSET;
        let fraction = (u64::from(since_unix.subsec_nanos()) << 32) / 1_000_000_000;
        Self {
            // NTP era rollover wraps the seconds field.
            seconds: seconds as u32,
            fraction: fraction as u32,
        }
    }

    pub fn as_u64(&self) -> u64 {
        (u64::from(self.seconds) << 32) | u64::from(self.fraction)
    }
}

// ── Packets ──────────────────────────────────────────────────────

/// Sender report without reception report blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderReport {
    pub ssrc: u32,
    pub ntp: NtpTimestamp,
    /// RTP timestamp corresponding to `ntp`.
    pub rtp_timestamp: u32,
    pub packet_count: u32,
    pub octet_count: u32,
}

/// Source description with a single CNAME item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescription {
    pub ssrc: u32,
    pub cname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goodbye {
    pub ssrc: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    SenderReport(SenderReport),
    SourceDescription(SourceDescription),
    Bye(Goodbye),
}

impl RtcpPacket {
    pub fn packet_type(&self) -> RtcpPacketType {
        match self {
            Self::SenderReport(_) => RtcpPacketType::SenderReport,
            Self::SourceDescription(_) => RtcpPacketType::SourceDescription,
            Self::Bye(_) => RtcpPacketType::Bye,
        }
    }

    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Self::SenderReport(sr) => {
                let header = RtcpHeader::for_report(RtcpPacketType::SenderReport, 0);
                dst.put_slice(&header.to_bytes()?);
                dst.put_u32(sr.ssrc);
                dst.put_u32(sr.ntp.seconds);
                dst.put_u32(sr.ntp.fraction);
                dst.put_u32(sr.rtp_timestamp);
                dst.put_u32(sr.packet_count);
                dst.put_u32(sr.octet_count);
            }
            Self::SourceDescription(sdes) => {
                let cname = truncate_cname(&sdes.cname).as_bytes();
                // SSRC, item type, item length, text, then at least one
                // zero byte ending the item list, padded to a word.
                let chunk_len = (4 + 2 + cname.len() + 1).next_multiple_of(4);
                let header = RtcpHeader {
                    count: 1,
                    packet_type: RtcpPacketType::SourceDescription,
                    length: ((RTCP_HEADER_SIZE + chunk_len) / 4 - 1) as u16,
                };
                dst.put_slice(&header.to_bytes()?);
                dst.put_u32(sdes.ssrc);
                dst.put_u8(SDES_CNAME);
                dst.put_u8(cname.len() as u8);
                dst.put_slice(cname);
                dst.put_bytes(0, chunk_len - 4 - 2 - cname.len());
            }
            Self::Bye(bye) => {
                let header = RtcpHeader::for_report(RtcpPacketType::Bye, 1);
                dst.put_slice(&header.to_bytes()?);
                dst.put_u32(bye.ssrc);
                // Empty reason: zero length byte padded to a word.
                dst.put_u32(0);
            }
        }
        Ok(())
    }

    /// Encode several packets as one compound datagram.
    pub fn encode_compound(packets: &[RtcpPacket]) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(128);
        for packet in packets {
            packet.encode_into(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    /// Split a compound datagram into its packets.
    pub fn parse_compound(mut bytes: &[u8]) -> Result<Vec<RtcpPacket>> {
        let mut packets = Vec::new();
        while !bytes.is_empty() {
            let header = RtcpHeader::from_bytes(bytes)?;
            let len = header.packet_len();
            let Some(body) = bytes.get(RTCP_HEADER_SIZE..len) else {
                return Err(StrandError::InvalidPacket("RTCP packet truncated"));
            };
            packets.push(Self::parse_body(&header, body)?);
            bytes = &bytes[len..];
        }
        Ok(packets)
    }

    fn parse_body(header: &RtcpHeader, body: &[u8]) -> Result<Self> {
        let word = |i: usize| -> Result<u32> {
            body.get(i * 4..i * 4 + 4)
                .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
                .ok_or(StrandError::InvalidPacket("RTCP body truncated"))
        };
        match header.packet_type {
            RtcpPacketType::SenderReport => Ok(Self::SenderReport(SenderReport {
                ssrc: word(0)?,
                ntp: NtpTimestamp {
                    seconds: word(1)?,
                    fraction: word(2)?,
                },
                rtp_timestamp: word(3)?,
                packet_count: word(4)?,
                octet_count: word(5)?,
            })),
            RtcpPacketType::SourceDescription => {
                let ssrc = word(0)?;
                let item = &body[4..];
                match item {
                    [SDES_CNAME, len, rest @ ..] if rest.len() >= usize::from(*len) => {
                        let text = &rest[..usize::from(*len)];
                        let cname = String::from_utf8(text.to_vec())
                            .map_err(|_| StrandError::InvalidPacket("CNAME is not UTF-8"))?;
                        Ok(Self::SourceDescription(SourceDescription { ssrc, cname }))
                    }
                    _ => Err(StrandError::InvalidPacket("SDES chunk without CNAME")),
                }
            }
            RtcpPacketType::Bye => Ok(Self::Bye(Goodbye { ssrc: word(0)? })),
            other => Err(StrandError::UnknownVariant {
                type_name: "RtcpPacketType",
                value: other as u64,
            }),
        }
    }
}

/// Longest prefix of `cname` that fits the one-byte SDES item length
/// without splitting a character.
fn truncate_cname(cname: &str) -> &str {
    let mut end = cname.len().min(255);
    while !cname.is_char_boundary(end) {
        end -= 1;
    }
    &cname[..end]
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lengths_follow_type() {
        let sr = RtcpHeader::for_report(RtcpPacketType::SenderReport, 0);
        assert_eq!(sr.length, 6);
        assert_eq!(sr.to_bytes().unwrap(), [0x80, 200, 0, 6]);

        let sr2 = RtcpHeader::for_report(RtcpPacketType::SenderReport, 2);
        assert_eq!(sr2.length, 18);

        let bye = RtcpHeader::for_report(RtcpPacketType::Bye, 1);
        assert_eq!(bye.length, 2);
        assert_eq!(bye.to_bytes().unwrap(), [0x81, 203, 0, 2]);
    }

    #[test]
    fn header_rejects_bad_version_and_type() {
        assert!(RtcpHeader::from_bytes(&[0x40, 200, 0, 6]).is_err());
        assert!(matches!(
            RtcpHeader::from_bytes(&[0x80, 199, 0, 0]),
            Err(StrandError::UnknownVariant { value: 199, .. })
        ));
        assert!(RtcpHeader::from_bytes(&[0x80, 200]).is_err());
    }

    #[test]
    fn sender_report_layout() {
        let sr = SenderReport {
            ssrc: 0x0A0B_0C0D,
            ntp: NtpTimestamp {
                seconds: 1,
                fraction: 2,
            },
            rtp_timestamp: 3,
            packet_count: 4,
            octet_count: 5,
        };
        let bytes = RtcpPacket::encode_compound(&[RtcpPacket::SenderReport(sr)]).unwrap();
        assert_eq!(bytes.len(), 28);
        assert_eq!(&bytes[4..8], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(&bytes[24..28], &[0, 0, 0, 5]);
    }

    #[test]
    fn compound_round_trip() {
        let packets = vec![
            RtcpPacket::SenderReport(SenderReport {
                ssrc: 77,
                ntp: NtpTimestamp::now(),
                rtp_timestamp: 960,
                packet_count: 10,
                octet_count: 1760,
            }),
            RtcpPacket::SourceDescription(SourceDescription {
                ssrc: 77,
                cname: "strand@host".into(),
            }),
            RtcpPacket::Bye(Goodbye { ssrc: 77 }),
        ];
        let bytes = RtcpPacket::encode_compound(&packets).unwrap();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(RtcpPacket::parse_compound(&bytes).unwrap(), packets);
    }

    #[test]
    fn sdes_padding_always_terminates_items() {
        for len in 0..8 {
            let cname = "x".repeat(len);
            let pkt = RtcpPacket::SourceDescription(SourceDescription { ssrc: 1, cname });
            let bytes = RtcpPacket::encode_compound(&[pkt.clone()]).unwrap();
            assert_eq!(bytes.len() % 4, 0);
            assert_eq!(*bytes.last().unwrap(), 0);
            let header = RtcpHeader::from_bytes(&bytes).unwrap();
            assert_eq!(header.packet_len(), bytes.len());
            assert_eq!(RtcpPacket::parse_compound(&bytes).unwrap(), vec![pkt]);
        }
    }

    #[test]
    fn long_cname_is_cut_on_a_char_boundary() {
        // 127 two-byte characters plus one more straddle the 255-byte limit.
        let cname = "é".repeat(128);
        let packet = RtcpPacket::SourceDescription(SourceDescription { ssrc: 3, cname });
        let bytes = RtcpPacket::encode_compound(&[packet]).unwrap();
        match RtcpPacket::parse_compound(&bytes).unwrap().as_slice() {
            [RtcpPacket::SourceDescription(sdes)] => {
                assert_eq!(sdes.cname.len(), 254);
                assert_eq!(sdes.cname, "é".repeat(127));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truncated_compound_is_rejected() {
        let bytes = RtcpPacket::encode_compound(&[RtcpPacket::Bye(Goodbye { ssrc: 1 })]).unwrap();
        assert!(RtcpPacket::parse_compound(&bytes[..8]).is_err());
    }

    #[test]
    fn ntp_epoch_offset() {
        let t = UNIX_EPOCH + Duration::from_millis(1500);
        let ntp = NtpTimestamp::from_system_time(t);
        assert_eq!(u64::from(ntp.seconds), NTP_UNIX_OFFSET + 1);
        assert_eq!(ntp.fraction, 1 << 31);
    }
}
