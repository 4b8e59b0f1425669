//! Text transcoding and streaming character I/O.
//!
//! [`Transcoder`] converts between UTF-16 code units and US-ASCII, UTF-8
//! or UTF-16 bytes a block at a time. [`TextReader`] and [`TextWriter`]
//! layer buffered character, line and formatted-value I/O on top of any
//! [`ByteSource`] / [`ByteSink`].

pub mod bits;
pub mod byte_cache;
pub mod encoding;
pub mod format;
pub mod io;
pub mod literals;
pub mod reader;
pub mod transcoder;
pub mod writer;

pub use bits::BitSequence;
pub use byte_cache::ByteCache;
pub use encoding::{ErrorAction, NewlineMode, TextEncoding};
pub use format::{FormatState, Formattable, Justify};
pub use io::{ByteSink, ByteSource, MemorySink, MemorySource, ReadSource, WriteSink};
pub use literals::{BoolLiterals, bool_literals, reset_bool_literals, set_bool_literals};
pub use reader::TextReader;
pub use transcoder::{DecodeOutcome, EncodeOutcome, Transcoder};
pub use writer::{FormatGuard, TextWriter};
