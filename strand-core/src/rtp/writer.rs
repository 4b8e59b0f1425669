//! Consumer task: paces queued buffers against the wall clock, sends
//! them as RTP and emits RTCP reports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, StrandError};
use crate::rtp::buffer::PooledBuffer;
use crate::rtp::codec::{RtcpCodec, RtpCodec};
use crate::rtp::header::RtpHeader;
use crate::rtp::packet::RtpPacket;
use crate::rtp::rtcp::{Goodbye, NtpTimestamp, RtcpPacket, SenderReport, SourceDescription};
use crate::rtp::session::{SessionConfig, SessionShared};

pub(crate) struct WriterTask {
    pub(crate) rtp_socket: Arc<UdpSocket>,
    pub(crate) rtcp_socket: Arc<UdpSocket>,
    pub(crate) rtp_target: SocketAddr,
    pub(crate) rtcp_target: SocketAddr,
    pub(crate) cname: String,
    pub(crate) queue: mpsc::Receiver<PooledBuffer>,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) config: SessionConfig,
    pub(crate) cancel: CancellationToken,
}

/// Fields copied out of a buffer before it goes back to the pool.
struct Outgoing {
    header: RtpHeader,
    payload: Bytes,
    end_of_stream: bool,
}

/// Numbering for the current play epoch.
#[derive(Debug, Clone, Copy)]
struct Stamp {
    epoch: u64,
    sequence: u16,
    timestamp: u32,
    /// Media time of the next chunk since the epoch started.
    offset_ms: u64,
}

impl Stamp {
    fn restart(epoch: u64) -> Self {
        Self {
            epoch,
            sequence: 1,
            timestamp: 0,
            offset_ms: 0,
        }
    }

    fn advance(&mut self, samples: u32, ms: u32) {
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(samples);
        self.offset_ms += u64::from(ms);
    }
}

impl WriterTask {
    pub(crate) async fn run(mut self) -> Result<()> {
        info!(ssrc = self.shared.ssrc, rtp = %self.rtp_target, rtcp = %self.rtcp_target, "writer started");
        let result = self.run_loop().await;
        match &result {
            Ok(()) => info!(ssrc = self.shared.ssrc, "writer stopped"),
            Err(e) => warn!(ssrc = self.shared.ssrc, error = %e, "writer failed"),
        }
        result
    }

    async fn run_loop(&mut self) -> Result<()> {
        let mut scratch = BytesMut::with_capacity(2048);
        let mut last_report = Instant::now();
        let mut last_timestamp = 0u32;
        let mut stamp = Stamp::restart(0);

        loop {
            let popped = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                popped = tokio::time::timeout(self.config.queue_pop_timeout, self.queue.recv()) => popped,
            };
            let mut buf = match popped {
                Err(_elapsed) => continue,
                // Reader is gone and the queue is drained.
                Ok(None) => return Ok(()),
                Ok(Some(buf)) => buf,
            };

            // Audio queued before a pause is held, not dropped, and goes
            // out under the numbering of the next play.
            if !buf.end_of_stream && !self.wait_while_paused().await {
                return Ok(());
            }

            let clock = self.shared.clock();
            if clock.epoch != stamp.epoch {
                stamp = Stamp::restart(clock.epoch);
                debug!(epoch = clock.epoch, "numbering restarted");
            }
            let offset_ms = stamp.offset_ms;
            if !buf.end_of_stream {
                buf.sequence = stamp.sequence;
                buf.timestamp = stamp.timestamp;
                stamp.advance(buf.samples, buf.duration_ms);
            }

            let out = Self::copy_out(buf);

            if !out.payload.is_empty() {
                if !self.pace(offset_ms, clock.started).await {
                    return Ok(());
                }
                last_timestamp = out.header.timestamp;
                self.send_rtp(&mut scratch, out.header, out.payload).await?;
            }

            if out.end_of_stream || last_report.elapsed() >= self.config.rtcp_interval {
                self.send_rtcp(&mut scratch, last_timestamp, out.end_of_stream)
                    .await?;
                last_report = Instant::now();
            }

            if out.end_of_stream {
                return Ok(());
            }
        }
    }

    /// Copy what the send needs, then hand the buffer straight back.
    fn copy_out(buf: PooledBuffer) -> Outgoing {
        let out = Outgoing {
            header: RtpHeader::new(buf.payload_type, buf.sequence, buf.timestamp, buf.ssrc),
            payload: Bytes::copy_from_slice(buf.payload()),
            end_of_stream: buf.end_of_stream,
        };
        buf.release();
        out
    }

    /// Poll until playing. Returns `false` if cancelled while waiting.
    async fn wait_while_paused(&self) -> bool {
        while !self.shared.is_playing() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.config.idle_poll) => {}
            }
        }
        true
    }

    /// Sleep until the chunk is at most `pacing_lead` ahead of real
    /// time. Returns `false` if cancelled while waiting.
    async fn pace(&self, offset_ms: u64, started: Instant) -> bool {
        let target = Duration::from_millis(offset_ms);
        let wait = target.saturating_sub(started.elapsed() + self.config.pacing_lead);
        if wait <= self.config.pacing_slack {
            return true;
        }
        trace!(?wait, "pacing");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }

    async fn send_rtp(&self, scratch: &mut BytesMut, header: RtpHeader, payload: Bytes) -> Result<()> {
        let len = payload.len();
        let seq = header.sequence;
        RtpCodec.encode(RtpPacket::new(header, payload)?, scratch)?;
        let datagram = scratch.split();
        match self.rtp_socket.send_to(&datagram, self.rtp_target).await {
            Ok(_) => {
                self.shared.stats.record_packet(len);
                Ok(())
            }
            Err(e) => self.send_failed(e, "RTP", seq),
        }
    }

    async fn send_rtcp(&self, scratch: &mut BytesMut, rtp_timestamp: u32, bye: bool) -> Result<()> {
        let ssrc = self.shared.ssrc;
        let stats = &self.shared.stats;
        let mut packets = vec![
            RtcpPacket::SenderReport(SenderReport {
                ssrc,
                ntp: NtpTimestamp::now(),
                rtp_timestamp,
                packet_count: stats.packets() as u32,
                octet_count: stats.octets() as u32,
            }),
            RtcpPacket::SourceDescription(SourceDescription {
                ssrc,
                cname: self.cname.clone(),
            }),
        ];
        if bye {
            packets.push(RtcpPacket::Bye(Goodbye { ssrc }));
        }
        RtcpCodec.encode(packets, scratch)?;
        let datagram = scratch.split();
        match self.rtcp_socket.send_to(&datagram, self.rtcp_target).await {
            Ok(_) => {
                stats.record_report();
                debug!(ssrc, packets = stats.packets(), octets = stats.octets(), bye, "RTCP report sent");
                Ok(())
            }
            Err(e) => self.send_failed(e, "RTCP", 0),
        }
    }

    /// One lost datagram is logged and counted; a dead socket ends the task.
    fn send_failed(&self, e: std::io::Error, what: &'static str, seq: u16) -> Result<()> {
        let err = StrandError::Io(e);
        if err.is_fatal_io() {
            return Err(err);
        }
        self.shared.stats.record_send_failure();
        warn!(seq, error = %err, "{what} send failed; continuing");
        Ok(())
    }
}
