//! Block-oriented conversion between UTF-16 code units and external
//! byte encodings.
//!
//! A [`Transcoder`] never assumes it sees a whole document. Each call
//! converts as much of a bounded input block as fits in a bounded output
//! block and reports exactly how much of each side it used, so the caller
//! can re-present an unconsumed tail together with more input later. The
//! transcoder itself carries no state between calls.
//!
//! All byte-order and shift/mask arithmetic lives here; the text streams
//! built on top only move buffers around.

use crate::error::{Result, StrandError};
use crate::text::encoding::{ErrorAction, TextEncoding};

// ── Outcomes ─────────────────────────────────────────────────────

/// Result of one [`Transcoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOutcome {
    /// Code units written to the output block.
    pub chars_written: usize,
    /// Bytes taken from the input block.
    pub bytes_consumed: usize,
    /// Conversion stopped at invalid input under
    /// [`ErrorAction::StopThenThrow`]; the next call will fail.
    pub stopped: bool,
}

/// Result of one [`Transcoder::encode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOutcome {
    /// Bytes written to the output block.
    pub bytes_written: usize,
    /// Code units taken from the input block.
    pub chars_consumed: usize,
    /// Conversion stopped at an unrepresentable character under
    /// [`ErrorAction::StopThenThrow`].
    pub stopped: bool,
}

// ── UTF-8 tables ─────────────────────────────────────────────────

const INVALID_LEAD: u8 = 0xFF;

/// Number of continuation bytes announced by each possible lead byte.
static UTF8_TRAILING: [u8; 256] = build_trailing_table();

const fn build_trailing_table() -> [u8; 256] {
    let mut table = [INVALID_LEAD; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = match i {
            0x00..=0x7F => 0,
            0xC0..=0xDF => 1,
            0xE0..=0xEF => 2,
            0xF0..=0xF7 => 3,
            0xF8..=0xFB => 4,
            0xFC..=0xFD => 5,
            _ => INVALID_LEAD,
        };
        i += 1;
    }
    table
}

/// Payload bits kept from the lead byte, indexed by trailing count.
const LEAD_MASK: [u8; 6] = [0x7F, 0x1F, 0x0F, 0x07, 0x03, 0x01];

/// Smallest code point that legitimately needs N trailing bytes.
const MIN_FOR_TRAILING: [u32; 6] = [0, 0x80, 0x800, 0x1_0000, 0x20_0000, 0x400_0000];

const MAX_CODE_POINT: u32 = 0x10_FFFF;

// ── Scan results ─────────────────────────────────────────────────

/// What the scanner found at the current input position.
enum Scan {
    /// A complete unit: code point value and encoded width.
    Char(u32, usize),
    /// The input ends partway through a unit.
    Truncated,
    /// The unit is malformed; skip this many bytes to resynchronise.
    Invalid(usize),
}

#[derive(Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

// ── Transcoder ───────────────────────────────────────────────────

/// Converter between UTF-16 code units and one [`TextEncoding`].
///
/// Configuration is fixed at construction. The per-encoding behaviour is
/// an internal `match`, not a trait object, so the per-character loops
/// stay monomorphic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoder {
    encoding: TextEncoding,
    action: ErrorAction,
    replacement: char,
}

impl Transcoder {
    /// A transcoder that fails on bad input.
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            action: ErrorAction::Throw,
            replacement: encoding.default_replacement(),
        }
    }

    pub fn with_error_action(mut self, action: ErrorAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_replacement(mut self, replacement: char) -> Self {
        self.replacement = replacement;
        self
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn error_action(&self) -> ErrorAction {
        self.action
    }

    pub fn replacement(&self) -> char {
        self.replacement
    }

    fn invalid(&self, src: &[u8], at: usize) -> StrandError {
        StrandError::InvalidEncoding {
            encoding: self.encoding.name(),
            byte: src.get(at).copied(),
            offset: Some(at),
        }
    }

    fn unrepresentable(&self, code_point: u32) -> StrandError {
        StrandError::UnrepresentableCharacter {
            code_point,
            encoding: self.encoding.name(),
        }
    }

    // ── Decoding ─────────────────────────────────────────────────

    /// Convert bytes from `src` into code units in `dst`.
    ///
    /// Never writes more than `dst.len()` units and never splits a
    /// surrogate pair: a supplementary character that needs two slots when
    /// only one is left stays unconsumed. When `is_final` is false, a
    /// sequence cut off by the end of `src` is left unconsumed too; when it
    /// is true, such a tail is invalid input.
    pub fn decode(&self, src: &[u8], dst: &mut [u16], is_final: bool) -> Result<DecodeOutcome> {
        let order = match self.encoding {
            TextEncoding::Utf16Le => ByteOrder::Little,
            _ => ByteOrder::Big,
        };

        let mut i = 0;
        let mut o = 0;
        while i < src.len() && o < dst.len() {
            let scan = match self.encoding {
                TextEncoding::UsAscii => scan_ascii(src[i]),
                TextEncoding::Utf8 => scan_utf8(&src[i..]),
                TextEncoding::Utf16Le | TextEncoding::Utf16Be => scan_utf16(&src[i..], order),
            };

            let width = match scan {
                Scan::Char(cp, width) => {
                    match put_code_point(cp, &mut dst[o..]) {
                        Some(n) => o += n,
                        None => break,
                    }
                    i += width;
                    continue;
                }
                Scan::Truncated if !is_final => break,
                Scan::Truncated => src.len() - i,
                Scan::Invalid(width) => width,
            };

            match self.action {
                ErrorAction::Throw => return Err(self.invalid(src, i)),
                ErrorAction::StopThenThrow if o > 0 => {
                    return Ok(DecodeOutcome {
                        chars_written: o,
                        bytes_consumed: i,
                        stopped: true,
                    });
                }
                ErrorAction::StopThenThrow => return Err(self.invalid(src, i)),
                ErrorAction::Replace => match put_code_point(self.replacement as u32, &mut dst[o..]) {
                    Some(n) => {
                        o += n;
                        i += width;
                    }
                    None => break,
                },
            }
        }

        Ok(DecodeOutcome {
            chars_written: o,
            bytes_consumed: i,
            stopped: false,
        })
    }

    /// Decode a complete byte buffer into a `String`.
    pub fn decode_all(&self, src: &[u8]) -> Result<String> {
        let mut units = Vec::with_capacity(src.len());
        let mut block = [0u16; 1024];
        let mut consumed = 0;
        while consumed < src.len() {
            let out = self.decode(&src[consumed..], &mut block, true)?;
            units.extend_from_slice(&block[..out.chars_written]);
            consumed += out.bytes_consumed;
            if out.bytes_consumed == 0 && out.chars_written == 0 {
                break;
            }
        }
        self.units_to_string(&units)
    }

    /// Assemble code units into a `String`, applying the error policy to
    /// unpaired surrogates.
    pub fn units_to_string(&self, units: &[u16]) -> Result<String> {
        let mut text = String::with_capacity(units.len());
        let mut offset = 0;
        for unit in char::decode_utf16(units.iter().copied()) {
            match unit {
                Ok(c) => {
                    text.push(c);
                    offset += c.len_utf16();
                }
                Err(_) if self.action == ErrorAction::Replace => {
                    text.push(self.replacement);
                    offset += 1;
                }
                Err(_) => {
                    return Err(StrandError::InvalidEncoding {
                        encoding: self.encoding.name(),
                        byte: None,
                        offset: Some(offset),
                    });
                }
            }
        }
        Ok(text)
    }

    // ── Encoding ─────────────────────────────────────────────────

    /// Convert code units from `src` into bytes in `dst`.
    ///
    /// Surrogate pairs are recombined before encoding. A lead surrogate at
    /// the end of a non-final block is left unconsumed. A character whose
    /// full encoding does not fit in the remaining output is left
    /// unconsumed; partial sequences are never written.
    pub fn encode(&self, src: &[u16], dst: &mut [u8], is_final: bool) -> Result<EncodeOutcome> {
        let mut i = 0;
        let mut o = 0;
        while i < src.len() {
            let unit = src[i];
            let (cp, width, paired) = match unit {
                0xD800..=0xDBFF => match src.get(i + 1) {
                    Some(&lo) if (0xDC00..=0xDFFF).contains(&lo) => {
                        let cp = 0x1_0000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(lo) - 0xDC00);
                        (cp, 2, true)
                    }
                    None if !is_final => break,
                    _ => (u32::from(unit), 1, false),
                },
                0xDC00..=0xDFFF => (u32::from(unit), 1, false),
                _ => (u32::from(unit), 1, true),
            };

            let mut seq = [0u8; 4];
            let encoded = if paired { self.put_bytes(cp, &mut seq) } else { None };
            let n = match encoded {
                Some(n) => n,
                None => match self.action {
                    ErrorAction::Throw => return Err(self.unrepresentable(cp)),
                    ErrorAction::StopThenThrow if i > 0 => {
                        return Ok(EncodeOutcome {
                            bytes_written: o,
                            chars_consumed: i,
                            stopped: true,
                        });
                    }
                    ErrorAction::StopThenThrow => return Err(self.unrepresentable(cp)),
                    ErrorAction::Replace => {
                        let rep = self.replacement as u32;
                        self.put_bytes(rep, &mut seq).ok_or_else(|| self.unrepresentable(rep))?
                    }
                },
            };

            if o + n > dst.len() {
                break;
            }
            dst[o..o + n].copy_from_slice(&seq[..n]);
            o += n;
            i += width;
        }

        Ok(EncodeOutcome {
            bytes_written: o,
            chars_consumed: i,
            stopped: false,
        })
    }

    /// Encode a whole string.
    pub fn encode_str(&self, text: &str) -> Result<Vec<u8>> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let mut bytes = Vec::with_capacity(units.len() * 2);
        let mut block = [0u8; 1024];
        let mut consumed = 0;
        while consumed < units.len() {
            let out = self.encode(&units[consumed..], &mut block, true)?;
            bytes.extend_from_slice(&block[..out.bytes_written]);
            consumed += out.chars_consumed;
            if out.chars_consumed == 0 {
                break;
            }
        }
        Ok(bytes)
    }

    /// Encode one code point, returning its length, or `None` when the
    /// encoding cannot represent it.
    fn put_bytes(&self, cp: u32, out: &mut [u8; 4]) -> Option<usize> {
        match self.encoding {
            TextEncoding::UsAscii => {
                if cp == 0 || cp > 0x7F {
                    return None;
                }
                out[0] = cp as u8;
                Some(1)
            }
            TextEncoding::Utf8 => put_utf8(cp, out),
            TextEncoding::Utf16Le => put_utf16(cp, out, u16::to_le_bytes),
            TextEncoding::Utf16Be => put_utf16(cp, out, u16::to_be_bytes),
        }
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(TextEncoding::Utf8)
    }
}

// ── Scanners ─────────────────────────────────────────────────────

fn scan_ascii(byte: u8) -> Scan {
    if byte == 0 || byte >= 0x80 {
        Scan::Invalid(1)
    } else {
        Scan::Char(u32::from(byte), 1)
    }
}

fn scan_utf8(src: &[u8]) -> Scan {
    let lead = src[0];
    let trailing = UTF8_TRAILING[lead as usize];
    if trailing == INVALID_LEAD {
        return Scan::Invalid(1);
    }
    if trailing == 0 {
        return Scan::Char(u32::from(lead), 1);
    }

    let trailing = trailing as usize;
    let available = (src.len() - 1).min(trailing);
    let mut cp = u32::from(lead & LEAD_MASK[trailing]);
    for (k, &b) in src[1..=available].iter().enumerate() {
        if b & 0xC0 != 0x80 {
            return Scan::Invalid(k + 1);
        }
        cp = (cp << 6) | u32::from(b & 0x3F);
    }
    if available < trailing {
        return Scan::Truncated;
    }

    let width = trailing + 1;
    if cp > MAX_CODE_POINT || cp < MIN_FOR_TRAILING[trailing] || (0xD800..=0xDFFF).contains(&cp) {
        return Scan::Invalid(width);
    }
    Scan::Char(cp, width)
}

fn scan_utf16(src: &[u8], order: ByteOrder) -> Scan {
    match src {
        [a, b, ..] => {
            let unit = match order {
                ByteOrder::Little => u16::from_le_bytes([*a, *b]),
                ByteOrder::Big => u16::from_be_bytes([*a, *b]),
            };
            Scan::Char(u32::from(unit), 2)
        }
        _ => Scan::Truncated,
    }
}

// ── Emitters ─────────────────────────────────────────────────────

/// Write a code point as one or two code units. `None` if it doesn't fit.
fn put_code_point(cp: u32, dst: &mut [u16]) -> Option<usize> {
    if cp > 0xFFFF {
        if dst.len() < 2 {
            return None;
        }
        let v = cp - 0x1_0000;
        dst[0] = 0xD800 | (v >> 10) as u16;
        dst[1] = 0xDC00 | (v & 0x3FF) as u16;
        Some(2)
    } else {
        *dst.first_mut()? = cp as u16;
        Some(1)
    }
}

fn put_utf8(cp: u32, out: &mut [u8; 4]) -> Option<usize> {
    match cp {
        0..=0x7F => {
            out[0] = cp as u8;
            Some(1)
        }
        0x80..=0x7FF => {
            out[0] = 0xC0 | (cp >> 6) as u8;
            out[1] = 0x80 | (cp & 0x3F) as u8;
            Some(2)
        }
        0xD800..=0xDFFF => None,
        0x800..=0xFFFF => {
            out[0] = 0xE0 | (cp >> 12) as u8;
            out[1] = 0x80 | ((cp >> 6) & 0x3F) as u8;
            out[2] = 0x80 | (cp & 0x3F) as u8;
            Some(3)
        }
        0x1_0000..=MAX_CODE_POINT => {
            out[0] = 0xF0 | (cp >> 18) as u8;
            out[1] = 0x80 | ((cp >> 12) & 0x3F) as u8;
            out[2] = 0x80 | ((cp >> 6) & 0x3F) as u8;
            out[3] = 0x80 | (cp & 0x3F) as u8;
            Some(4)
        }
        _ => None,
    }
}

fn put_utf16(cp: u32, out: &mut [u8; 4], to_bytes: fn(u16) -> [u8; 2]) -> Option<usize> {
    let mut units = [0u16; 2];
    let n = match cp {
        0xD800..=0xDFFF => return None,
        0..=MAX_CODE_POINT => put_code_point(cp, &mut units)?,
        _ => return None,
    };
    for (k, unit) in units[..n].iter().enumerate() {
        out[k * 2..k * 2 + 2].copy_from_slice(&to_bytes(*unit));
    }
    Some(n * 2)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [TextEncoding; 4] = [
        TextEncoding::UsAscii,
        TextEncoding::Utf8,
        TextEncoding::Utf16Le,
        TextEncoding::Utf16Be,
    ];

    fn utf16(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn mixed_string_through_utf8() {
        let t = Transcoder::new(TextEncoding::Utf8);
        let text = "héllo, 𝕏!";
        let bytes = t.encode_str(text).unwrap();
        assert_eq!(bytes.len(), 13);
        assert_eq!(bytes, text.as_bytes());
        assert_eq!(t.decode_all(&bytes).unwrap(), text);
    }

    #[test]
    fn utf16_byte_orders() {
        let le = Transcoder::new(TextEncoding::Utf16Le);
        let be = Transcoder::new(TextEncoding::Utf16Be);
        assert_eq!(le.encode_str("A𝕏").unwrap(), vec![0x41, 0x00, 0x35, 0xD8, 0xD5, 0xDD]);
        assert_eq!(be.encode_str("A𝕏").unwrap(), vec![0x00, 0x41, 0xD8, 0x35, 0xDD, 0xD5]);
        assert_eq!(le.decode_all(&[0x41, 0x00, 0x42, 0x00]).unwrap(), "AB");
        assert_eq!(be.decode_all(&[0x00, 0x41, 0x00, 0x42]).unwrap(), "AB");
    }

    #[test]
    fn ascii_rejects_high_and_nul_bytes() {
        let t = Transcoder::new(TextEncoding::UsAscii);
        let mut dst = [0u16; 8];
        let err = t.decode(b"ab\x80", &mut dst, true).unwrap_err();
        match err {
            StrandError::InvalidEncoding { encoding, byte, offset } => {
                assert_eq!(encoding, "US-ASCII");
                assert_eq!(byte, Some(0x80));
                assert_eq!(offset, Some(2));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(t.decode(b"\0", &mut dst, true).is_err());
    }

    #[test]
    fn ascii_encode_reports_unrepresentable() {
        let t = Transcoder::new(TextEncoding::UsAscii);
        let err = t.encode_str("café").unwrap_err();
        assert!(matches!(
            err,
            StrandError::UnrepresentableCharacter { code_point: 0xE9, encoding: "US-ASCII" }
        ));

        let lenient = t.clone().with_error_action(ErrorAction::Replace);
        assert_eq!(lenient.encode_str("café").unwrap(), b"caf?");
    }

    #[test]
    fn surrogate_pair_needs_two_output_slots() {
        let t = Transcoder::new(TextEncoding::Utf8);
        let src = "ab𝕏".as_bytes();

        let mut two = [0u16; 2];
        let out = t.decode(src, &mut two, false).unwrap();
        assert_eq!(out.chars_written, 2);
        assert_eq!(out.bytes_consumed, 2);

        let mut three = [0u16; 3];
        let out = t.decode(src, &mut three, false).unwrap();
        assert_eq!(out.chars_written, 2);
        assert_eq!(out.bytes_consumed, 2);

        let mut four = [0u16; 4];
        let out = t.decode(src, &mut four, false).unwrap();
        assert_eq!(out.chars_written, 4);
        assert_eq!(out.bytes_consumed, 6);
        assert_eq!(&four[..], &utf16("ab𝕏")[..]);
    }

    #[test]
    fn truncated_tail_waits_unless_final() {
        let t = Transcoder::new(TextEncoding::Utf8);
        let mut dst = [0u16; 8];
        // "é" is C3 A9; hand over only the lead byte.
        let out = t.decode(&[b'x', 0xC3], &mut dst, false).unwrap();
        assert_eq!(out.chars_written, 1);
        assert_eq!(out.bytes_consumed, 1);
        assert!(!out.stopped);

        assert!(t.decode(&[b'x', 0xC3], &mut dst, true).is_err());

        let utf16 = Transcoder::new(TextEncoding::Utf16Le);
        let out = utf16.decode(&[0x41, 0x00, 0x42], &mut dst, false).unwrap();
        assert_eq!(out.bytes_consumed, 2);
    }

    #[test]
    fn replace_substitutes_one_char_per_bad_unit() {
        let t = Transcoder::new(TextEncoding::Utf8).with_error_action(ErrorAction::Replace);
        // Stray continuation, invalid lead, broken two-byte sequence.
        let src = [b'a', 0x80, b'b', 0xFF, 0xC3, b'c'];
        assert_eq!(t.decode_all(&src).unwrap(), "a\u{FFFD}b\u{FFFD}\u{FFFD}c");
    }

    #[test]
    fn replace_skips_whole_out_of_range_sequence() {
        let t = Transcoder::new(TextEncoding::Utf8)
            .with_error_action(ErrorAction::Replace)
            .with_replacement('#');
        // F4 90 80 80 encodes 0x110000.
        assert_eq!(t.decode_all(&[0xF4, 0x90, 0x80, 0x80, b'z']).unwrap(), "#z");
        // Overlong encoding of '/'.
        assert_eq!(t.decode_all(&[0xC0, 0xAF]).unwrap(), "#");
        // Encoded surrogate.
        assert_eq!(t.decode_all(&[0xED, 0xA0, 0x80]).unwrap(), "#");
        // Historic six-byte form.
        assert_eq!(t.decode_all(&[0xFC, 0x84, 0x80, 0x80, 0x80, 0x80, b'!']).unwrap(), "#!");
    }

    #[test]
    fn stop_then_throw_drains_valid_prefix_first() {
        let t = Transcoder::new(TextEncoding::Utf8).with_error_action(ErrorAction::StopThenThrow);
        let src = [b'o', b'k', 0xFF, b'x'];
        let mut dst = [0u16; 8];

        let first = t.decode(&src, &mut dst, false).unwrap();
        assert!(first.stopped);
        assert_eq!(first.chars_written, 2);
        assert_eq!(first.bytes_consumed, 2);

        let rest = &src[first.bytes_consumed..];
        assert!(matches!(
            t.decode(rest, &mut dst, false),
            Err(StrandError::InvalidEncoding { byte: Some(0xFF), .. })
        ));
    }

    #[test]
    fn throw_fails_on_first_bad_unit() {
        let t = Transcoder::new(TextEncoding::Utf8);
        let mut dst = [0u16; 8];
        assert!(t.decode(&[b'o', b'k', 0xFF], &mut dst, false).is_err());
    }

    #[test]
    fn encode_waits_for_trailing_surrogate() {
        let t = Transcoder::new(TextEncoding::Utf8);
        let units = utf16("a𝕏");
        let mut dst = [0u8; 16];

        let out = t.encode(&units[..2], &mut dst, false).unwrap();
        assert_eq!(out.chars_consumed, 1);
        assert_eq!(out.bytes_written, 1);

        let err = t.encode(&units[..2], &mut dst, true).unwrap_err();
        assert!(matches!(err, StrandError::UnrepresentableCharacter { code_point: 0xD835, .. }));
    }

    #[test]
    fn encode_never_splits_a_sequence() {
        let t = Transcoder::new(TextEncoding::Utf8);
        let units = utf16("aé");
        let mut dst = [0u8; 2];
        let out = t.encode(&units, &mut dst, true).unwrap();
        assert_eq!(out.chars_consumed, 1);
        assert_eq!(out.bytes_written, 1);
    }

    #[test]
    fn encode_stop_then_throw() {
        let t = Transcoder::new(TextEncoding::UsAscii).with_error_action(ErrorAction::StopThenThrow);
        let units = utf16("abé");
        let mut dst = [0u8; 8];
        let out = t.encode(&units, &mut dst, true).unwrap();
        assert!(out.stopped);
        assert_eq!(out.chars_consumed, 2);
        assert!(t.encode(&units[2..], &mut dst, true).is_err());
    }

    #[test]
    fn lone_surrogate_from_utf16_follows_policy() {
        let strict = Transcoder::new(TextEncoding::Utf16Le);
        assert!(strict.decode_all(&[0x00, 0xD8, 0x41, 0x00]).is_err());
        let lenient = strict.with_error_action(ErrorAction::Replace);
        assert_eq!(lenient.decode_all(&[0x00, 0xD8, 0x41, 0x00]).unwrap(), "\u{FFFD}A");
    }

    #[test]
    fn boundary_code_points_round_trip() {
        for enc in [TextEncoding::Utf8, TextEncoding::Utf16Le, TextEncoding::Utf16Be] {
            let t = Transcoder::new(enc);
            for c in ['\u{7F}', '\u{80}', '\u{7FF}', '\u{800}', '\u{FFFF}', '\u{10000}', '\u{10FFFF}'] {
                let s = c.to_string();
                assert_eq!(t.decode_all(&t.encode_str(&s).unwrap()).unwrap(), s, "{enc} {c:?}");
            }
        }
    }

    fn chunked_decode(t: &Transcoder, bytes: &[u8], chunk: usize, out_cap: usize) -> Vec<u16> {
        let mut units = Vec::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut dst = vec![0u16; out_cap];
        let mut fed = 0;
        loop {
            let end = (fed + chunk).min(bytes.len());
            pending.extend_from_slice(&bytes[fed..end]);
            fed = end;
            let is_final = fed == bytes.len();
            loop {
                let out = t.decode(&pending, &mut dst, is_final).unwrap();
                units.extend_from_slice(&dst[..out.chars_written]);
                pending.drain(..out.bytes_consumed);
                if out.chars_written == 0 {
                    break;
                }
            }
            if is_final {
                assert!(pending.is_empty());
                return units;
            }
        }
    }

    proptest! {
        #[test]
        fn round_trip_unicode(s in "\\PC*") {
            for enc in [TextEncoding::Utf8, TextEncoding::Utf16Le, TextEncoding::Utf16Be] {
                let t = Transcoder::new(enc);
                let bytes = t.encode_str(&s).unwrap();
                prop_assert_eq!(t.decode_all(&bytes).unwrap(), s.clone());
            }
        }

        #[test]
        fn round_trip_ascii(s in "[\\x01-\\x7F]*") {
            let t = Transcoder::new(TextEncoding::UsAscii);
            let bytes = t.encode_str(&s).unwrap();
            prop_assert_eq!(bytes.len(), s.len());
            prop_assert_eq!(t.decode_all(&bytes).unwrap(), s);
        }

        #[test]
        fn chunking_never_changes_output(
            s in "\\PC{0,40}",
            chunk in 1usize..8,
            out_cap in 2usize..6,
            enc_idx in 1usize..4,
        ) {
            let t = Transcoder::new(ALL[enc_idx]);
            let bytes = t.encode_str(&s).unwrap();
            let whole = chunked_decode(&t, &bytes, bytes.len().max(1), 4096);
            let pieces = chunked_decode(&t, &bytes, chunk, out_cap);
            prop_assert_eq!(&whole, &pieces);
            prop_assert_eq!(whole, utf16(&s));
        }
    }
}
