//! Domain-specific error types for strand.
//!
//! All fallible operations return `Result<T, StrandError>`.
//! Codec and stream errors surface synchronously to the caller; RTP
//! worker tasks log steady-state failures and only report through
//! [`TaskError`] when they die.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StrandError>;

/// The canonical error type for strand.
#[derive(Debug, Error)]
pub enum StrandError {
    // ── Text codec errors ────────────────────────────────────────
    /// Raw bytes do not form a valid sequence in the selected encoding.
    #[error("invalid {encoding} data{}{}", fmt_byte(.byte), fmt_offset(.offset))]
    InvalidEncoding {
        encoding: &'static str,
        byte: Option<u8>,
        offset: Option<usize>,
    },

    /// A character cannot be represented in the target encoding.
    #[error("character U+{code_point:04X} cannot be encoded as {encoding}")]
    UnrepresentableCharacter {
        code_point: u32,
        encoding: &'static str,
    },

    // ── Text stream errors ───────────────────────────────────────
    /// A read ran out of input.
    #[error("end of stream")]
    EndOfStream,

    /// A parsed numeric value does not fit the requested type.
    #[error("value {value} is out of range for {type_name}")]
    ConversionRange {
        value: String,
        type_name: &'static str,
    },

    /// Text could not be converted to the requested type at all.
    #[error("cannot convert {text:?} to {type_name}")]
    Conversion {
        text: String,
        type_name: &'static str,
    },

    /// A `%(...)` replacement token is malformed.
    #[error("malformed format token at offset {position}: {reason}")]
    FormatToken {
        position: usize,
        reason: &'static str,
    },

    /// A replacement token refers to an argument that was not supplied.
    #[error("format token refers to missing argument {index}")]
    MissingFormatArgument { index: usize },

    // ── RTP session errors ───────────────────────────────────────
    /// `start` was handed a media source that is already initialized.
    #[error("media source is already initialized")]
    AlreadyInitialized,

    /// Opening or binding a session socket failed.
    #[error("session initialization failed: {0}")]
    SessionInit(#[source] std::io::Error),

    /// A received datagram is not a well-formed RTP/RTCP packet.
    #[error("invalid packet: {0}")]
    InvalidPacket(&'static str),

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// An invalid state transition was requested.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    // ── I/O and plumbing ─────────────────────────────────────────
    /// The byte channel or socket reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A worker task failed.
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

fn fmt_byte(byte: &Option<u8>) -> String {
    byte.map(|b| format!(" (byte {b:#04x})")).unwrap_or_default()
}

fn fmt_offset(offset: &Option<usize>) -> String {
    offset.map(|o| format!(" at offset {o}")).unwrap_or_default()
}

impl StrandError {
    /// `true` for errors that mean the underlying transport is gone and a
    /// worker loop must stop rather than log and continue.
    pub fn is_fatal_io(&self) -> bool {
        match self {
            StrandError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::AddrNotAvailable
                    | std::io::ErrorKind::InvalidInput
            ),
            StrandError::ChannelClosed => true,
            _ => false,
        }
    }
}

// ── TaskError ─────────────────────────────────────────────────────

/// Typed error for RTP worker tasks.
///
/// The session learns a task died by inspecting its join result, never by
/// an error crossing the task boundary mid-stream.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task did not exit within the join deadline.
    #[error("task {name} did not stop within {timeout:?}")]
    JoinTimeout {
        name: &'static str,
        timeout: Duration,
    },

    /// The task panicked or was aborted by the runtime.
    #[error("task {name} terminated abnormally: {reason}")]
    Aborted { name: &'static str, reason: String },

    /// The task exited with an unrecoverable error.
    #[error("task {name} failed: {reason}")]
    Failed { name: &'static str, reason: String },
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for StrandError {
    fn from(s: String) -> Self {
        StrandError::Other(s)
    }
}

impl From<&str> for StrandError {
    fn from(s: &str) -> Self {
        StrandError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for StrandError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        StrandError::ChannelClosed
    }
}
