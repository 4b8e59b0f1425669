//! `tokio_util` codecs for RTP and RTCP datagrams.
//!
//! Both codecs treat the whole buffer as one datagram, which is what
//! `UdpFramed` hands them. They keep no state between calls.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::StrandError;
use crate::rtp::header::RTP_HEADER_SIZE;
use crate::rtp::packet::RtpPacket;
use crate::rtp::rtcp::RtcpPacket;

#[derive(Debug, Clone, Copy, Default)]
pub struct RtpCodec;

impl Decoder for RtpCodec {
    type Item = RtpPacket;
    type Error = StrandError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let datagram = src.split();
        if datagram.len() < RTP_HEADER_SIZE {
            return Err(StrandError::InvalidPacket("datagram shorter than RTP header"));
        }
        RtpPacket::from_bytes(&datagram).map(Some)
    }
}

impl Encoder<RtpPacket> for RtpCodec {
    type Error = StrandError;

    fn encode(&mut self, item: RtpPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RtcpCodec;

impl Decoder for RtcpCodec {
    type Item = Vec<RtcpPacket>;
    type Error = StrandError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let datagram = src.split();
        RtcpPacket::parse_compound(&datagram).map(Some)
    }
}

impl Encoder<Vec<RtcpPacket>> for RtcpCodec {
    type Error = StrandError;

    fn encode(&mut self, item: Vec<RtcpPacket>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        for packet in &item {
            packet.encode_into(dst)?;
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtp::header::RtpHeader;
    use crate::rtp::rtcp::{Goodbye, NtpTimestamp, SenderReport};

    #[test]
    fn rtp_codec_consumes_whole_datagram() {
        let mut codec = RtpCodec;
        let packet = RtpPacket::new(RtpHeader::new(11, 7, 160, 0xDEAD), vec![9u8; 40]).unwrap();
        let mut buf = BytesMut::new();
        codec.encode(packet.clone(), &mut buf).unwrap();
        assert_eq!(buf.len(), 52);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, packet);
        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn rtp_codec_rejects_runt() {
        let mut buf = BytesMut::from(&[0x80u8, 0, 0][..]);
        assert!(RtpCodec.decode(&mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn rtcp_codec_round_trip() {
        let mut codec = RtcpCodec;
        let packets = vec![
            RtcpPacket::SenderReport(SenderReport {
                ssrc: 5,
                ntp: NtpTimestamp::default(),
                rtp_timestamp: 0,
                packet_count: 1,
                octet_count: 2,
            }),
            RtcpPacket::Bye(Goodbye { ssrc: 5 }),
        ];
        let mut buf = BytesMut::new();
        codec.encode(packets.clone(), &mut buf).unwrap();
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), packets);
    }
}
