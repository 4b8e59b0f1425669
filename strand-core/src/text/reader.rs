//! Character, line and typed-value input over a byte channel.

use crate::error::{Result, StrandError};
use crate::text::byte_cache::ByteCache;
use crate::text::encoding::{ErrorAction, NewlineMode, TextEncoding};
use crate::text::io::ByteSource;
use crate::text::literals;
use crate::text::transcoder::Transcoder;

const CHAR_CACHE_SIZE: usize = 1024;
const BYTE_CACHE_SIZE: usize = 4096;

/// Bytes needed to recognise any byte-order mark.
const SNIFF_LEN: usize = 3;

/// Buffered text reader.
///
/// Raw bytes are staged in a [`ByteCache`], converted block-wise by a
/// [`Transcoder`] into a cache of UTF-16 code units, and handed out as
/// `char`s. One character of pushback is kept outside the cache.
///
/// When built with [`TextReader::new`] the encoding is chosen from the
/// byte-order mark on first read, and the mark is skipped.
///
/// A reader is not synchronised; share one between threads only behind
/// a lock.
pub struct TextReader<S> {
    source: S,
    transcoder: Option<Transcoder>,
    /// Encoding comes from sniffing the byte-order mark.
    detect: bool,
    /// The byte-order mark has been looked at since the last reset.
    started: bool,
    action: ErrorAction,
    bytes: ByteCache,
    chars: Box<[u16]>,
    char_pos: usize,
    char_len: usize,
    unget: Option<char>,
    newline: NewlineMode,
    source_done: bool,
}

impl<S: ByteSource> TextReader<S> {
    /// Reader that detects the encoding from the first bytes.
    pub fn new(source: S) -> Self {
        Self::build(source, None)
    }

    /// Reader with a fixed encoding. A leading byte-order mark for that
    /// encoding is still skipped.
    pub fn with_transcoder(source: S, transcoder: Transcoder) -> Self {
        Self::build(source, Some(transcoder))
    }

    fn build(source: S, transcoder: Option<Transcoder>) -> Self {
        Self {
            source,
            detect: transcoder.is_none(),
            started: false,
            action: transcoder.as_ref().map_or(ErrorAction::Throw, Transcoder::error_action),
            transcoder,
            bytes: ByteCache::with_capacity(BYTE_CACHE_SIZE),
            chars: vec![0u16; CHAR_CACHE_SIZE].into_boxed_slice(),
            char_pos: 0,
            char_len: 0,
            unget: None,
            newline: NewlineMode::CrLf,
            source_done: false,
        }
    }

    /// Error policy for an auto-detected encoding.
    pub fn with_error_action(mut self, action: ErrorAction) -> Self {
        self.action = action;
        if let Some(t) = self.transcoder.take() {
            self.transcoder = Some(t.with_error_action(action));
        }
        self
    }

    /// Resize the internal caches. Needs room for a surrogate pair and
    /// for the longest byte sequence.
    pub fn with_cache_sizes(mut self, chars: usize, bytes: usize) -> Self {
        assert!(chars >= 2, "character cache must hold a surrogate pair");
        assert!(
            bytes >= TextEncoding::Utf8.max_bytes_per_char(),
            "byte cache must hold one full sequence"
        );
        self.chars = vec![0u16; chars].into_boxed_slice();
        self.bytes = ByteCache::with_capacity(bytes);
        self.char_pos = 0;
        self.char_len = 0;
        self
    }

    /// The encoding in use, once known.
    pub fn encoding(&self) -> Option<TextEncoding> {
        self.transcoder.as_ref().map(Transcoder::encoding)
    }

    pub fn newline_mode(&self) -> NewlineMode {
        self.newline
    }

    pub fn set_newline_mode(&mut self, mode: NewlineMode) {
        self.newline = mode;
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    // ── Cache management ─────────────────────────────────────────

    /// Pick the transcoder and skip any byte-order mark.
    fn ensure_transcoder(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        while self.bytes.len() < SNIFF_LEN && !self.source_done {
            if self.bytes.fill_from(&mut self.source)? == 0 {
                self.source_done = true;
            }
        }

        match &self.transcoder {
            Some(t) => {
                let bom = t.encoding().bom().unwrap_or(&[]);
                if !bom.is_empty() && self.bytes.as_slice().starts_with(bom) {
                    self.bytes.consume(bom.len());
                }
            }
            None => {
                let (encoding, bom_len) = TextEncoding::sniff(self.bytes.as_slice());
                self.bytes.consume(bom_len);
                tracing::trace!(%encoding, bom_len, "detected text encoding");
                self.transcoder = Some(Transcoder::new(encoding).with_error_action(self.action));
            }
        }
        self.started = true;
        Ok(())
    }

    /// Convert more bytes into the character cache. `false` at end of input.
    fn reload(&mut self) -> Result<bool> {
        self.ensure_transcoder()?;
        let Some(transcoder) = self.transcoder.as_ref() else {
            return Ok(false);
        };

        loop {
            if !self.bytes.is_empty() || self.source_done {
                let out = transcoder.decode(self.bytes.as_slice(), &mut self.chars, self.source_done)?;
                self.bytes.consume(out.bytes_consumed);
                if out.chars_written > 0 {
                    self.char_pos = 0;
                    self.char_len = out.chars_written;
                    return Ok(true);
                }
                if self.source_done {
                    return Ok(false);
                }
            }
            if self.bytes.fill_from(&mut self.source)? == 0 {
                self.source_done = true;
            }
        }
    }

    fn next_unit(&mut self) -> Result<Option<u16>> {
        if self.char_pos == self.char_len && !self.reload()? {
            return Ok(None);
        }
        let unit = self.chars[self.char_pos];
        self.char_pos += 1;
        Ok(Some(unit))
    }

    fn lone_surrogate(&self, unit: u16) -> Result<Option<char>> {
        let t = self.transcoder.as_ref();
        if self.action == ErrorAction::Replace {
            return Ok(Some(t.map_or(char::REPLACEMENT_CHARACTER, Transcoder::replacement)));
        }
        tracing::debug!(unit = format_args!("{unit:#06X}"), "unpaired surrogate");
        Err(StrandError::InvalidEncoding {
            encoding: t.map_or("UTF-16", |t| t.encoding().name()),
            byte: None,
            offset: None,
        })
    }

    // ── Characters ───────────────────────────────────────────────

    /// Next character, or `None` at end of input.
    pub fn next_char(&mut self) -> Result<Option<char>> {
        if let Some(c) = self.unget.take() {
            return Ok(Some(c));
        }
        let Some(unit) = self.next_unit()? else {
            return Ok(None);
        };
        match unit {
            0xD800..=0xDBFF => match self.next_unit()? {
                Some(lo) if (0xDC00..=0xDFFF).contains(&lo) => {
                    let cp = 0x1_0000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(lo) - 0xDC00);
                    Ok(char::from_u32(cp))
                }
                Some(_) => {
                    // Leave the unit that broke the pair for the next read.
                    self.char_pos -= 1;
                    self.lone_surrogate(unit)
                }
                None => self.lone_surrogate(unit),
            },
            0xDC00..=0xDFFF => self.lone_surrogate(unit),
            _ => Ok(char::from_u32(u32::from(unit))),
        }
    }

    /// Next character; running out of input is an error.
    pub fn read_char(&mut self) -> Result<char> {
        self.next_char()?.ok_or(StrandError::EndOfStream)
    }

    /// Look at the next character without consuming it.
    pub fn try_peek_char(&mut self) -> Result<Option<char>> {
        if self.unget.is_none() {
            self.unget = self.next_char()?;
        }
        Ok(self.unget)
    }

    pub fn peek_char(&mut self) -> Result<char> {
        self.try_peek_char()?.ok_or(StrandError::EndOfStream)
    }

    /// Push one character back. Only one can be pending at a time.
    pub fn unget_char(&mut self, c: char) -> Result<()> {
        if self.unget.is_some() {
            return Err(StrandError::Other("a character is already pushed back".into()));
        }
        self.unget = Some(c);
        Ok(())
    }

    pub fn is_at_end(&mut self) -> Result<bool> {
        Ok(self.try_peek_char()?.is_none())
    }

    // ── Lines ────────────────────────────────────────────────────

    /// Consume the rest of a line break that started with `c`.
    fn finish_newline(&mut self, c: char) -> Result<bool> {
        match c {
            '\n' => Ok(true),
            '\r' => {
                if self.newline == NewlineMode::CrLf && self.try_peek_char()? == Some('\n') {
                    self.unget = None;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Read one line without its terminator.
    ///
    /// `\n`, `\r` and (in CRLF mode) `\r\n` each end a line. At most
    /// `max_chars` characters are kept (0 means no limit); the rest of an
    /// over-long line is read and discarded. Returns `None` only when the
    /// input was already exhausted.
    pub fn read_line(&mut self, max_chars: usize, strip: bool) -> Result<Option<String>> {
        let Some(mut c) = self.next_char()? else {
            return Ok(None);
        };
        let mut line = String::new();
        let mut kept = 0;
        loop {
            if self.finish_newline(c)? {
                break;
            }
            if max_chars == 0 || kept < max_chars {
                line.push(c);
                kept += 1;
            }
            match self.next_char()? {
                Some(next) => c = next,
                None => break,
            }
        }
        if strip {
            line = line.trim().to_string();
        }
        Ok(Some(line))
    }

    /// Next whitespace-delimited word. The delimiter is left unread.
    pub fn read_token(&mut self) -> Result<Option<String>> {
        let mut c = loop {
            match self.next_char()? {
                None => return Ok(None),
                Some(c) if c.is_whitespace() => continue,
                Some(c) => break c,
            }
        };
        let mut token = String::new();
        loop {
            token.push(c);
            match self.next_char()? {
                None => break,
                Some(next) if next.is_whitespace() => {
                    self.unget = Some(next);
                    break;
                }
                Some(next) => c = next,
            }
        }
        Ok(Some(token))
    }

    // ── Typed values ─────────────────────────────────────────────

    fn value_line(&mut self) -> Result<String> {
        self.read_line(0, true)?.ok_or(StrandError::EndOfStream)
    }

    /// Read a line holding `true`/`false`, `1`/`0`, or the configured
    /// literal words.
    pub fn read_bool(&mut self) -> Result<bool> {
        let text = self.value_line()?;
        literals::parse_bool(&text).ok_or(StrandError::Conversion {
            text,
            type_name: "bool",
        })
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let text = self.value_line()?;
        text.parse::<f64>().map_err(|_| StrandError::Conversion {
            text,
            type_name: "f64",
        })
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let text = self.value_line()?;
        let value = text.parse::<f64>().map_err(|_| StrandError::Conversion {
            text: text.clone(),
            type_name: "f32",
        })?;
        if value.is_finite() && value.abs() > f64::from(f32::MAX) {
            return Err(StrandError::ConversionRange {
                value: text,
                type_name: "f32",
            });
        }
        Ok(value as f32)
    }

    // ── Reset ────────────────────────────────────────────────────

    /// Drop all cached state and rewind the source to its start.
    pub fn reset(&mut self) -> Result<()> {
        self.source.reset()?;
        self.bytes.clear();
        self.char_pos = 0;
        self.char_len = 0;
        self.unget = None;
        self.source_done = false;
        self.started = false;
        if self.detect {
            self.transcoder = None;
        }
        Ok(())
    }
}

fn parse_integer(text: &str, radix: u32, type_name: &'static str) -> Result<i128> {
    if !(2..=36).contains(&radix) {
        return Err(StrandError::Other(format!("radix {radix} out of range")));
    }
    i128::from_str_radix(text, radix).map_err(|e| match e.kind() {
        std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow => {
            StrandError::ConversionRange {
                value: text.to_string(),
                type_name,
            }
        }
        _ => StrandError::Conversion {
            text: text.to_string(),
            type_name,
        },
    })
}

macro_rules! typed_integer_reads {
    ($($name:ident => $ty:ty),* $(,)?) => {
        impl<S: ByteSource> TextReader<S> {
            $(
                #[doc = concat!("Read a line holding a `", stringify!($ty), "` in `radix`.")]
                pub fn $name(&mut self, radix: u32) -> Result<$ty> {
                    let text = self.value_line()?;
                    let value = parse_integer(&text, radix, stringify!($ty))?;
                    <$ty>::try_from(value).map_err(|_| StrandError::ConversionRange {
                        value: text,
                        type_name: stringify!($ty),
                    })
                }
            )*
        }
    };
}

typed_integer_reads! {
    read_u8 => u8,
    read_u16 => u16,
    read_u32 => u32,
    read_u64 => u64,
    read_i8 => i8,
    read_i16 => i16,
    read_i32 => i32,
    read_i64 => i64,
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::io::MemorySource;
    use proptest::prelude::*;

    /// Hands out at most one byte per read.
    struct Trickle(MemorySource);

    impl ByteSource for Trickle {
        fn read_raw_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(1);
            self.0.read_raw_bytes(&mut buf[..n])
        }

        fn reset(&mut self) -> Result<()> {
            self.0.reset()
        }
    }

    fn reader(bytes: &[u8]) -> TextReader<MemorySource> {
        TextReader::new(MemorySource::new(bytes.to_vec()))
    }

    fn read_all(r: &mut TextReader<impl ByteSource>) -> String {
        let mut out = String::new();
        while let Some(c) = r.next_char().unwrap() {
            out.push(c);
        }
        out
    }

    #[test]
    fn detects_utf16le_bom() {
        let mut r = reader(&[0xFF, 0xFE, 0x41, 0x00, 0x42, 0x00]);
        assert_eq!(r.read_line(0, false).unwrap().as_deref(), Some("AB"));
        assert_eq!(r.encoding(), Some(TextEncoding::Utf16Le));
        assert_eq!(r.read_line(0, false).unwrap(), None);
    }

    #[test]
    fn detects_utf16be_and_utf8_boms() {
        let mut be = reader(&[0xFE, 0xFF, 0x00, 0x41]);
        assert_eq!(read_all(&mut be), "A");
        assert_eq!(be.encoding(), Some(TextEncoding::Utf16Be));

        let mut utf8 = reader(&[0xEF, 0xBB, 0xBF, b'h', b'i']);
        assert_eq!(read_all(&mut utf8), "hi");

        let mut plain = reader(b"x");
        assert_eq!(read_all(&mut plain), "x");
        assert_eq!(plain.encoding(), Some(TextEncoding::Utf8));
    }

    #[test]
    fn fixed_encoding_skips_its_own_bom() {
        let src = MemorySource::new(vec![0xFE, 0xFF, 0x00, 0x5A]);
        let mut r = TextReader::with_transcoder(src, Transcoder::new(TextEncoding::Utf16Be));
        assert_eq!(read_all(&mut r), "Z");
    }

    #[test]
    fn empty_input() {
        let mut r = reader(b"");
        assert_eq!(r.next_char().unwrap(), None);
        assert!(r.is_at_end().unwrap());
        assert!(matches!(r.read_char(), Err(StrandError::EndOfStream)));
        assert!(matches!(r.read_bool(), Err(StrandError::EndOfStream)));
    }

    #[test]
    fn crlf_mode_counts_each_break_once() {
        let mut r = reader(b"a\nb\rc\r\nd\r\n");
        let mut lines = Vec::new();
        while let Some(line) = r.read_line(0, false).unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, ["a", "b", "c", "d"]);
    }

    #[test]
    fn lf_mode_treats_cr_lf_as_two_breaks() {
        let mut r = reader(b"a\r\nb");
        r.set_newline_mode(NewlineMode::Lf);
        assert_eq!(r.read_line(0, false).unwrap().as_deref(), Some("a"));
        assert_eq!(r.read_line(0, false).unwrap().as_deref(), Some(""));
        assert_eq!(r.read_line(0, false).unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn long_lines_are_truncated_and_skipped() {
        let mut r = reader(b"abcdef\r\nxyz");
        assert_eq!(r.read_line(3, false).unwrap().as_deref(), Some("abc"));
        assert_eq!(r.read_line(3, false).unwrap().as_deref(), Some("xyz"));
        assert_eq!(r.read_line(3, false).unwrap(), None);
    }

    #[test]
    fn strip_trims_whitespace() {
        let mut r = reader(b"  padded \t\n");
        assert_eq!(r.read_line(0, true).unwrap().as_deref(), Some("padded"));
    }

    #[test]
    fn peek_and_unget() {
        let mut r = reader(b"xy");
        assert_eq!(r.peek_char().unwrap(), 'x');
        assert_eq!(r.peek_char().unwrap(), 'x');
        assert_eq!(r.read_char().unwrap(), 'x');
        r.unget_char('q').unwrap();
        assert!(r.unget_char('r').is_err());
        assert_eq!(r.read_char().unwrap(), 'q');
        assert_eq!(r.read_char().unwrap(), 'y');
        assert_eq!(r.try_peek_char().unwrap(), None);
    }

    #[test]
    fn tokens() {
        let mut r = reader(b"  alpha beta\n\tgamma");
        assert_eq!(r.read_token().unwrap().as_deref(), Some("alpha"));
        assert_eq!(r.read_token().unwrap().as_deref(), Some("beta"));
        assert_eq!(r.read_token().unwrap().as_deref(), Some("gamma"));
        assert_eq!(r.read_token().unwrap(), None);
    }

    #[test]
    fn typed_integers() {
        let mut r = reader(b"255\n256\n-1\nff\nzz\n-129\n+7\n");
        assert_eq!(r.read_u8(10).unwrap(), 255);
        match r.read_u8(10) {
            Err(StrandError::ConversionRange { value, type_name }) => {
                assert_eq!(value, "256");
                assert_eq!(type_name, "u8");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(r.read_i8(10).unwrap(), -1);
        assert_eq!(r.read_u8(16).unwrap(), 255);
        assert!(matches!(
            r.read_u32(10),
            Err(StrandError::Conversion { type_name: "u32", .. })
        ));
        assert!(matches!(r.read_i8(10), Err(StrandError::ConversionRange { .. })));
        assert_eq!(r.read_i64(10).unwrap(), 7);
    }

    #[test]
    fn huge_and_bad_radix() {
        let mut r = reader(b"99999999999999999999999999999999999999999\n5\n");
        assert!(matches!(r.read_u64(10), Err(StrandError::ConversionRange { .. })));
        assert!(r.read_u16(1).is_err());
    }

    #[test]
    fn typed_bools_and_floats() {
        let mut r = reader(b" TRUE \n0\nmaybe\n3.25\n1e39\nnope\n");
        assert!(r.read_bool().unwrap());
        assert!(!r.read_bool().unwrap());
        assert!(matches!(
            r.read_bool(),
            Err(StrandError::Conversion { type_name: "bool", .. })
        ));
        assert_eq!(r.read_f64().unwrap(), 3.25);
        assert!(matches!(r.read_f32(), Err(StrandError::ConversionRange { .. })));
        assert!(matches!(r.read_f64(), Err(StrandError::Conversion { .. })));
    }

    #[test]
    fn tiny_caches_and_trickled_bytes() {
        let text = "héllo, 𝕏!\r\nline two";
        let src = Trickle(MemorySource::new(text.as_bytes().to_vec()));
        let mut r = TextReader::new(src).with_cache_sizes(2, 6);
        assert_eq!(r.read_line(0, false).unwrap().as_deref(), Some("héllo, 𝕏!"));
        assert_eq!(r.read_line(0, false).unwrap().as_deref(), Some("line two"));
    }

    #[test]
    fn surrogate_pair_split_across_reloads() {
        // UTF-16 pairs arrive one unit per two bytes.
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "a𝕏b".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let mut r = reader(&bytes).with_cache_sizes(2, 6);
        assert_eq!(read_all(&mut r), "a𝕏b");
    }

    #[test]
    fn lone_surrogate_policy() {
        let bytes = [0xFF, 0xFE, 0x00, 0xD8, 0x41, 0x00];
        let mut strict = reader(&bytes);
        assert!(matches!(strict.next_char(), Err(StrandError::InvalidEncoding { .. })));

        let mut lenient = reader(&bytes).with_error_action(ErrorAction::Replace);
        assert_eq!(read_all(&mut lenient), "\u{FFFD}A");
    }

    #[test]
    fn invalid_bytes_surface_from_reads() {
        let mut r = reader(b"ok\xFF");
        assert!(matches!(r.read_line(0, false), Err(StrandError::InvalidEncoding { .. })));

        let mut lenient = reader(b"ok\xFFgo").with_error_action(ErrorAction::Replace);
        assert_eq!(read_all(&mut lenient), "ok\u{FFFD}go");
    }

    #[test]
    fn stop_then_throw_yields_prefix_first() {
        let src = MemorySource::new(b"fine\xFF".to_vec());
        let t = Transcoder::new(TextEncoding::Utf8).with_error_action(ErrorAction::StopThenThrow);
        let mut r = TextReader::with_transcoder(src, t);
        for expected in "fine".chars() {
            assert_eq!(r.read_char().unwrap(), expected);
        }
        assert!(r.read_char().is_err());
    }

    #[test]
    fn reset_replays_identically() {
        let mut r = reader(&[0xFF, 0xFE, b'x', 0, b'\n', 0, b'y', 0]);
        let first = (r.read_line(0, false).unwrap(), r.read_char().unwrap());
        r.reset().unwrap();
        let second = (r.read_line(0, false).unwrap(), r.read_char().unwrap());
        assert_eq!(first, second);
        assert_eq!(r.encoding(), Some(TextEncoding::Utf16Le));
    }

    proptest! {
        #[test]
        fn chunked_reads_preserve_text(
            s in "\\PC{0,64}",
            chars in 2usize..8,
            bytes in 6usize..12,
        ) {
            let src = Trickle(MemorySource::new(s.as_bytes().to_vec()));
            let mut r = TextReader::new(src).with_cache_sizes(chars, bytes);
            prop_assert_eq!(read_all(&mut r), s);
        }
    }
}
