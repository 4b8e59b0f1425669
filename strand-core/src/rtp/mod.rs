//! RTP media transmission.
//!
//! Wire types ([`RtpHeader`], [`RtpPacket`], [`RtcpPacket`]) and their
//! `tokio_util` codecs, plus the sender pipeline: a [`MediaSource`]
//! drained by a reader task into a [`MediaBufferPool`]-backed queue, paced
//! out by a writer task, all owned by an [`RtpSession`].

pub mod buffer;
pub mod codec;
pub mod flags;
pub mod header;
pub mod packet;
mod reader;
pub mod rtcp;
pub mod session;
pub mod socket;
pub mod source;
pub mod state;
pub mod stats;
pub mod task;
mod writer;

pub use buffer::{MediaBuffer, MediaBufferPool, PoolStats, PooledBuffer};
pub use codec::{RtcpCodec, RtpCodec};
pub use flags::RtpFlags;
pub use header::{RTP_HEADER_SIZE, RTP_VERSION, RtpHeader};
pub use packet::{MAX_RTP_PAYLOAD, RtpPacket};
pub use rtcp::{
    Goodbye, NtpTimestamp, RtcpHeader, RtcpPacket, RtcpPacketType, SenderReport,
    SourceDescription,
};
pub use session::{RtpSession, SessionCommand, SessionConfig, SessionParams};
pub use socket::{Endpoint, bind_for_remote};
pub use source::{MediaFormat, MediaSource, PcmFileSource, PcmParams, SampleChunk};
pub use state::StreamPhase;
pub use stats::{SenderStats, StatsSnapshot};
pub use task::WorkerTask;
