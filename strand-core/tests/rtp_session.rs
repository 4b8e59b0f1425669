//! Integration tests: a full RTP session streaming PCM to loopback
//! receivers, decoded with the crate's own codecs.

use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use strand_core::rtp::{RtcpCodec, RtpCodec};
use strand_core::{
    Endpoint, MediaSource, PcmFileSource, PcmParams, RtcpPacket, RtpPacket, RtpSession,
    SessionCommand, SessionConfig, SessionParams, StrandError,
};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_util::udp::UdpFramed;

const CHUNK_BYTES: usize = 882;

// ── Helpers ──────────────────────────────────────────────────────

fn pcm_source(chunks: usize) -> Box<dyn MediaSource> {
    let data: Vec<u8> = (0..chunks * CHUNK_BYTES).map(|i| (i % 251) as u8).collect();
    let len = data.len() as u64;
    Box::new(PcmFileSource::from_reader(Cursor::new(data), len, PcmParams::default()))
}

async fn receivers() -> (UdpSocket, UdpSocket) {
    let rtp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let rtcp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    (rtp, rtcp)
}

fn session_params(rtp: SocketAddr, rtcp: SocketAddr) -> SessionParams {
    SessionParams {
        rtp_target: Endpoint::from(rtp),
        rtcp_target: Endpoint::from(rtcp),
        local_rtp_port: 0,
        local_rtcp_port: 0,
        cname: "strand@loopback".into(),
    }
}

/// Small pool so the reader is throttled by the writer, and frequent
/// reports so a short run still produces several.
fn test_config() -> SessionConfig {
    SessionConfig {
        pool_capacity: 4,
        queue_depth: 4,
        checkout_timeout: Duration::from_millis(50),
        queue_pop_timeout: Duration::from_millis(50),
        idle_poll: Duration::from_millis(10),
        join_timeout: Duration::from_secs(2),
        rtcp_interval: Duration::from_millis(100),
        ..SessionConfig::default()
    }
}

/// Collect RTCP compounds until one carries a BYE.
async fn collect_reports(socket: UdpSocket) -> Vec<Vec<RtcpPacket>> {
    let mut framed = UdpFramed::new(socket, RtcpCodec);
    let mut reports = Vec::new();
    while let Some(Ok((packets, _))) = framed.next().await {
        let bye = packets.iter().any(|p| matches!(p, RtcpPacket::Bye(_)));
        reports.push(packets);
        if bye {
            break;
        }
    }
    reports
}

/// Drain every RTP packet already delivered to `socket`.
async fn drain_rtp(socket: UdpSocket) -> Vec<RtpPacket> {
    let mut framed = UdpFramed::new(socket, RtpCodec);
    let mut packets = Vec::new();
    while let Ok(Some(item)) = timeout(Duration::from_millis(300), framed.next()).await {
        let (packet, _) = item.unwrap();
        packets.push(packet);
    }
    packets
}

// ── Streaming ────────────────────────────────────────────────────

#[tokio::test]
async fn streams_every_chunk_in_order_then_says_bye() {
    const CHUNKS: usize = 30;
    let (rtp_rx, rtcp_rx) = receivers().await;
    let params = session_params(rtp_rx.local_addr().unwrap(), rtcp_rx.local_addr().unwrap());

    let mut session = RtpSession::start(params, pcm_source(CHUNKS), test_config())
        .await
        .unwrap();
    let reports = tokio::spawn(collect_reports(rtcp_rx));
    assert_eq!(session.do_command(SessionCommand::Play), Some((1, 0)));

    let reports = timeout(Duration::from_secs(10), reports).await.unwrap().unwrap();
    let packets = drain_rtp(rtp_rx).await;

    // Sequence numbers 1..=N, timestamps advance by the sample count.
    let seqs: Vec<u16> = packets.iter().map(|p| p.header.sequence).collect();
    assert_eq!(seqs, (1..=CHUNKS as u16).collect::<Vec<_>>());
    for (i, packet) in packets.iter().enumerate() {
        assert_eq!(packet.header.timestamp, i as u32 * 441);
        assert_eq!(packet.header.ssrc, session.ssrc());
        assert_eq!(packet.header.payload_type, 11);
        assert_eq!(packet.payload.len(), CHUNK_BYTES);
        assert_eq!(packet.payload[0], ((i * CHUNK_BYTES) % 251) as u8);
    }

    // Every compound is SR then SDES; exactly one BYE, in the last one.
    assert!(reports.len() >= 2, "expected periodic reports, got {}", reports.len());
    let byes = reports
        .iter()
        .flatten()
        .filter(|p| matches!(p, RtcpPacket::Bye(_)))
        .count();
    assert_eq!(byes, 1);
    let mut last_count = 0;
    for compound in &reports {
        let RtcpPacket::SenderReport(sr) = &compound[0] else {
            panic!("compound does not start with a sender report: {compound:?}");
        };
        assert_eq!(sr.ssrc, session.ssrc());
        assert!(sr.packet_count >= last_count);
        assert_eq!(sr.octet_count, sr.packet_count * CHUNK_BYTES as u32);
        last_count = sr.packet_count;
        match &compound[1] {
            RtcpPacket::SourceDescription(sdes) => assert_eq!(sdes.cname, "strand@loopback"),
            other => panic!("expected SDES, got {other:?}"),
        }
    }
    let last = reports.last().unwrap();
    assert_eq!(last.len(), 3);
    assert!(matches!(last[2], RtcpPacket::Bye(_)));
    assert_eq!(last_count, CHUNKS as u32);

    let stats = session.stats();
    assert_eq!(stats.packets, CHUNKS as u64);
    assert_eq!(stats.octets, (CHUNKS * CHUNK_BYTES) as u64);
    assert_eq!(stats.send_failures, 0);

    session.end_session().await.unwrap();
    session.end_session().await.unwrap();
    let pool = session.pool_stats();
    assert_eq!(pool.free, pool.capacity);
    assert_eq!(pool.checked_out, 0);
}

#[tokio::test]
async fn replay_restarts_numbering_without_rewinding_media() {
    const CHUNKS: usize = 60;
    let (rtp_rx, rtcp_rx) = receivers().await;
    let params = session_params(rtp_rx.local_addr().unwrap(), rtcp_rx.local_addr().unwrap());

    let mut session = RtpSession::start(params, pcm_source(CHUNKS), test_config())
        .await
        .unwrap();
    let reports = tokio::spawn(collect_reports(rtcp_rx));
    let received = tokio::spawn(drain_rtp(rtp_rx));

    assert_eq!(session.do_command(SessionCommand::Play), Some((1, 0)));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(session.do_command(SessionCommand::Pause), None);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(session.do_command(SessionCommand::Play), Some((1, 0)));

    timeout(Duration::from_secs(10), reports).await.unwrap().unwrap();
    let packets = received.await.unwrap();
    let seqs: Vec<u16> = packets.iter().map(|p| p.header.sequence).collect();

    let restart = seqs.iter().rposition(|&s| s == 1).unwrap();
    assert!(restart > 0, "second play did not restart numbering: {seqs:?}");
    let (first, second) = seqs.split_at(restart);
    assert_eq!(first.to_vec(), (1..=first.len() as u16).collect::<Vec<_>>());
    assert_eq!(second.to_vec(), (1..=second.len() as u16).collect::<Vec<_>>());
    assert_eq!(packets[restart].header.timestamp, 0);

    // Media carries on where the pause left it: every chunk once, in order.
    assert_same_media(&packets, CHUNKS);
    assert_eq!(session.stats().packets, CHUNKS as u64);

    session.end_session().await.unwrap();
}

#[tokio::test]
async fn quick_pause_and_replay_loses_no_media() {
    const CHUNKS: usize = 300;
    let (rtp_rx, rtcp_rx) = receivers().await;
    let params = session_params(rtp_rx.local_addr().unwrap(), rtcp_rx.local_addr().unwrap());

    let mut session = RtpSession::start(params, pcm_source(CHUNKS), SessionConfig::default())
        .await
        .unwrap();
    let reports = tokio::spawn(collect_reports(rtcp_rx));
    let received = tokio::spawn(drain_rtp(rtp_rx));

    session.do_command(SessionCommand::Play);
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.do_command(SessionCommand::Pause);
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.do_command(SessionCommand::Play);

    timeout(Duration::from_secs(15), reports).await.unwrap().unwrap();
    let packets = received.await.unwrap();
    assert_same_media(&packets, CHUNKS);

    let stats = session.stats();
    assert_eq!(stats.packets, CHUNKS as u64);
    assert_eq!(stats.octets, (CHUNKS * CHUNK_BYTES) as u64);
    assert_eq!(stats.fill_failures, 0);
    session.end_session().await.unwrap();
}

/// Every chunk of a `pcm_source(chunks)` arrived exactly once, in file order.
fn assert_same_media(packets: &[RtpPacket], chunks: usize) {
    assert_eq!(packets.len(), chunks);
    for (i, packet) in packets.iter().enumerate() {
        assert_eq!(packet.payload.len(), CHUNK_BYTES);
        assert_eq!(packet.payload[0], ((i * CHUNK_BYTES) % 251) as u8, "chunk {i}");
        assert_eq!(packet.payload[CHUNK_BYTES - 1], (((i + 1) * CHUNK_BYTES - 1) % 251) as u8);
    }
}

// ── Lifecycle ────────────────────────────────────────────────────

#[tokio::test]
async fn rejects_initialized_source() {
    let (rtp_rx, rtcp_rx) = receivers().await;
    let params = session_params(rtp_rx.local_addr().unwrap(), rtcp_rx.local_addr().unwrap());
    let mut source = pcm_source(1);
    source.initialize().unwrap();
    let result = RtpSession::start(params, source, test_config()).await;
    assert!(matches!(result, Err(StrandError::AlreadyInitialized)));
}

#[tokio::test]
async fn bind_failure_is_session_init_error() {
    let (rtp_rx, rtcp_rx) = receivers().await;
    let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut params = session_params(rtp_rx.local_addr().unwrap(), rtcp_rx.local_addr().unwrap());
    params.local_rtcp_port = taken.local_addr().unwrap().port();
    let result = RtpSession::start(params, pcm_source(1), test_config()).await;
    assert!(matches!(result, Err(StrandError::SessionInit(_))));
}

#[tokio::test]
async fn paused_session_sends_nothing_and_ends_cleanly() {
    let (rtp_rx, rtcp_rx) = receivers().await;
    let params = session_params(rtp_rx.local_addr().unwrap(), rtcp_rx.local_addr().unwrap());
    let mut session = RtpSession::start(params, pcm_source(10), test_config())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.is_running());
    assert_eq!(session.stats().packets, 0);

    session.end_session().await.unwrap();
    assert!(!session.is_running());
    assert_eq!(session.do_command(SessionCommand::Play), None);
    drop(rtcp_rx);
    assert!(drain_rtp(rtp_rx).await.is_empty());
}
