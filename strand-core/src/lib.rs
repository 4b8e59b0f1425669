//! # strand-core
//!
//! Streaming text transcoding and RTP media transmission.
//!
//! This crate contains:
//! - **Text**: `Transcoder` for US-ASCII / UTF-8 / UTF-16 block conversion,
//!   `TextReader` / `TextWriter` for buffered character, line and formatted
//!   I/O over any byte channel, `BitSequence` for bit-packed fields
//! - **RTP**: packet and RTCP wire types with `tokio_util` codecs, the
//!   `MediaBufferPool`, and `RtpSession` driving a paced reader/writer task pair
//! - **Error**: `StrandError`, a typed `thiserror`-based error hierarchy
//!
//! Text streams are single-owner values and are not meant to be shared
//! between threads; wrap one in a lock if several tasks must use it.

pub mod error;
pub mod rtp;
pub mod text;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::{Result, StrandError, TaskError};
pub use rtp::{
    Endpoint, MediaBufferPool, MediaFormat, MediaSource, PcmFileSource, PcmParams, RtcpPacket,
    RtpHeader, RtpPacket, RtpSession, SessionCommand, SessionConfig, SessionParams,
};
pub use text::{
    BitSequence, ErrorAction, NewlineMode, TextEncoding, TextReader, TextWriter, Transcoder,
};
