//! Buffered, formatted text output over a byte channel.

use std::ops::{Deref, DerefMut};

use crate::error::{Result, StrandError};
use crate::text::encoding::{NewlineMode, TextEncoding};
use crate::text::format::{self, FormatState, Formattable, Justify, Segment};
use crate::text::io::ByteSink;
use crate::text::transcoder::Transcoder;

const CHAR_CACHE_SIZE: usize = 1024;
const BYTE_BLOCK_SIZE: usize = 4096;

/// Buffered text writer.
///
/// Characters collect in a UTF-16 cache and are encoded into the sink
/// when the cache fills, on [`flush`](Self::flush), and on drop. Line
/// breaks requested through [`new_line`](Self::new_line) use the
/// configured [`NewlineMode`]; text passed to the `write_*` methods is
/// written as given.
///
/// Not synchronised; callers serialise access.
pub struct TextWriter<S: ByteSink> {
    sink: S,
    transcoder: Transcoder,
    state: FormatState,
    chars: Vec<u16>,
    capacity: usize,
    block: Box<[u8]>,
    bom: bool,
    bom_written: bool,
    at_line_start: bool,
}

impl<S: ByteSink> TextWriter<S> {
    /// UTF-8 writer.
    pub fn new(sink: S) -> Self {
        Self::with_transcoder(sink, Transcoder::new(TextEncoding::Utf8))
    }

    pub fn with_transcoder(sink: S, transcoder: Transcoder) -> Self {
        Self {
            sink,
            transcoder,
            state: FormatState::default(),
            chars: Vec::with_capacity(CHAR_CACHE_SIZE),
            capacity: CHAR_CACHE_SIZE,
            block: vec![0u8; BYTE_BLOCK_SIZE].into_boxed_slice(),
            bom: false,
            bom_written: false,
            at_line_start: true,
        }
    }

    /// Emit the encoding's byte-order mark before the first bytes.
    pub fn with_bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }

    /// Shrink or grow the character cache; must hold a surrogate pair.
    pub fn with_cache_size(mut self, chars: usize) -> Self {
        assert!(chars >= 2, "character cache must hold a surrogate pair");
        self.capacity = chars;
        self.chars = Vec::with_capacity(chars);
        self
    }

    pub fn encoding(&self) -> TextEncoding {
        self.transcoder.encoding()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    // ── Format state ─────────────────────────────────────────────

    pub fn format_state(&self) -> &FormatState {
        &self.state
    }

    pub fn set_format_state(&mut self, state: FormatState) {
        self.state = state;
    }

    pub fn set_fill(&mut self, fill: char) {
        self.state.fill = fill;
    }

    pub fn set_width(&mut self, width: usize) {
        self.state.width = width;
    }

    pub fn set_justify(&mut self, justify: Justify) {
        self.state.justify = justify;
    }

    pub fn set_radix(&mut self, radix: u32) -> Result<()> {
        if !(2..=36).contains(&radix) {
            return Err(StrandError::Other(format!("radix {radix} out of range")));
        }
        self.state.radix = radix;
        Ok(())
    }

    pub fn set_precision(&mut self, precision: Option<usize>) {
        self.state.precision = precision;
    }

    pub fn set_indent(&mut self, indent: usize) {
        self.state.indent = indent;
    }

    pub fn set_newline_mode(&mut self, newline: NewlineMode) {
        self.state.newline = newline;
    }

    pub fn set_suppress_indent(&mut self, suppress: bool) {
        self.state.suppress_indent = suppress;
    }

    /// Snapshot the format state; it is restored when the guard drops,
    /// however the scope is left.
    pub fn scoped_format(&mut self) -> FormatGuard<'_, S> {
        let saved = self.state.clone();
        FormatGuard { writer: self, saved }
    }

    // ── Output ───────────────────────────────────────────────────

    fn push_char(&mut self, c: char) -> Result<()> {
        if self.chars.len() + 2 > self.capacity {
            self.flush_chars()?;
        }
        let mut units = [0u16; 2];
        self.chars.extend_from_slice(c.encode_utf16(&mut units));
        Ok(())
    }

    /// Write text as given, indenting the start of each line.
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        for c in text.chars() {
            let is_break = matches!(c, '\r' | '\n');
            if self.at_line_start && !is_break {
                if !self.state.suppress_indent {
                    for _ in 0..self.state.indent {
                        self.push_char(self.state.fill)?;
                    }
                }
                self.at_line_start = false;
            }
            self.push_char(c)?;
            if is_break {
                self.at_line_start = true;
            }
        }
        Ok(())
    }

    pub fn write_char(&mut self, c: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.write_str(c.encode_utf8(&mut buf))
    }

    /// Write a value using the current radix, precision and field width.
    pub fn write_value<T: Formattable + ?Sized>(&mut self, value: &T) -> Result<()> {
        let text = self.state.pad(value.render(&self.state));
        self.write_str(&text)
    }

    /// Write the configured line break.
    pub fn new_line(&mut self) -> Result<()> {
        let newline = self.state.newline.as_str();
        for c in newline.chars() {
            self.push_char(c)?;
        }
        self.at_line_start = true;
        Ok(())
    }

    pub fn write_line(&mut self, text: &str) -> Result<()> {
        self.write_str(text)?;
        self.new_line()
    }

    /// Expand `%(index[,width[,fill[,precision]]])` tokens against `args`.
    ///
    /// The whole format string is validated before anything is written.
    pub fn write_formatted(&mut self, fmt: &str, args: &[&dyn Formattable]) -> Result<()> {
        let segments = format::parse_format(fmt)?;
        for segment in &segments {
            if let Segment::Token(token) = segment {
                if token.index > args.len() {
                    return Err(StrandError::MissingFormatArgument { index: token.index });
                }
            }
        }

        for segment in segments {
            match segment {
                Segment::Literal(text) => self.write_str(text)?,
                Segment::Token(token) => {
                    let state = token.apply(&self.state);
                    let text = state.pad(args[token.index - 1].render(&state));
                    self.write_str(&text)?;
                }
            }
        }
        Ok(())
    }

    // ── Flushing ─────────────────────────────────────────────────

    fn flush_chars(&mut self) -> Result<()> {
        if self.bom && !self.bom_written {
            if let Some(bom) = self.transcoder.encoding().bom() {
                self.sink.write_raw_bytes(bom)?;
            }
            self.bom_written = true;
        }

        let mut consumed = 0;
        let result = loop {
            if consumed == self.chars.len() {
                break Ok(());
            }
            let out = match self.transcoder.encode(&self.chars[consumed..], &mut self.block, true) {
                Ok(out) => out,
                Err(e) => break Err(e),
            };
            if let Err(e) = self.sink.write_raw_bytes(&self.block[..out.bytes_written]) {
                break Err(e);
            }
            if out.chars_consumed == 0 {
                break Ok(());
            }
            consumed += out.chars_consumed;
        };

        // Text that failed to encode is dropped so the writer stays usable.
        if result.is_err() {
            self.chars.clear();
        } else {
            self.chars.drain(..consumed);
        }
        result
    }

    /// Encode everything buffered and flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_chars()?;
        self.sink.flush()
    }

    /// Discard buffered text and reset the sink. The format state is kept.
    pub fn reset(&mut self) -> Result<()> {
        self.chars.clear();
        self.bom_written = false;
        self.at_line_start = true;
        self.sink.reset()
    }
}

impl<S: ByteSink> Drop for TextWriter<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "text writer flush on drop failed");
        }
    }
}

// ── FormatGuard ──────────────────────────────────────────────────

/// Restores a writer's format state when dropped.
pub struct FormatGuard<'a, S: ByteSink> {
    writer: &'a mut TextWriter<S>,
    saved: FormatState,
}

impl<S: ByteSink> Deref for FormatGuard<'_, S> {
    type Target = TextWriter<S>;

    fn deref(&self) -> &Self::Target {
        &*self.writer
    }
}

impl<S: ByteSink> DerefMut for FormatGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.writer
    }
}

impl<S: ByteSink> Drop for FormatGuard<'_, S> {
    fn drop(&mut self) {
        self.writer.state = std::mem::take(&mut self.saved);
    }
}

// ── Tests ────────────────────────────────────────────────────────
