//! Output formatting state, value rendering and `%(...)` token parsing.

use crate::error::{Result, StrandError};
use crate::text::encoding::NewlineMode;
use crate::text::literals;

// ── FormatState ──────────────────────────────────────────────────

/// How a field is aligned inside its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Justify {
    /// No padding is applied, whatever the width.
    #[default]
    None,
    Left,
    Right,
}

/// Formatting settings applied to every write of a
/// [`TextWriter`](super::TextWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatState {
    pub fill: char,
    /// Minimum field width in characters; 0 disables padding.
    pub width: usize,
    pub justify: Justify,
    /// Radix for integers, 2 through 36.
    pub radix: u32,
    /// Digits after the decimal point for floats; `None` prints the
    /// shortest exact form.
    pub precision: Option<usize>,
    /// Fill characters written at the start of each line.
    pub indent: usize,
    pub newline: NewlineMode,
    pub suppress_indent: bool,
}

impl Default for FormatState {
    fn default() -> Self {
        Self {
            fill: ' ',
            width: 0,
            justify: Justify::None,
            radix: 10,
            precision: None,
            indent: 0,
            newline: NewlineMode::Lf,
            suppress_indent: false,
        }
    }
}

impl FormatState {
    /// Pad `text` out to the field width.
    pub fn pad(&self, text: String) -> String {
        let len = text.chars().count();
        if self.width <= len || self.justify == Justify::None {
            return text;
        }
        let padding: String = std::iter::repeat_n(self.fill, self.width - len).collect();
        match self.justify {
            Justify::Left => text + &padding,
            _ => padding + &text,
        }
    }
}

// ── Formattable ──────────────────────────────────────────────────

/// A value a [`TextWriter`](super::TextWriter) can print.
///
/// `render` produces the bare text (radix, precision and boolean words
/// applied); the writer adds padding and indentation.
pub trait Formattable {
    fn render(&self, state: &FormatState) -> String;
}

impl<T: Formattable + ?Sized> Formattable for &T {
    fn render(&self, state: &FormatState) -> String {
        (**self).render(state)
    }
}

impl Formattable for str {
    fn render(&self, _: &FormatState) -> String {
        self.to_string()
    }
}

impl Formattable for String {
    fn render(&self, _: &FormatState) -> String {
        self.clone()
    }
}

impl Formattable for char {
    fn render(&self, _: &FormatState) -> String {
        self.to_string()
    }
}

impl Formattable for bool {
    fn render(&self, _: &FormatState) -> String {
        literals::bool_word(*self)
    }
}

const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn render_unsigned(mut value: u128, radix: u32) -> String {
    let radix = u128::from(radix.clamp(2, 36));
    if value == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % radix) as usize]);
        value /= radix;
    }
    digits.reverse();
    // Only ASCII digits were pushed.
    String::from_utf8_lossy(&digits).into_owned()
}

macro_rules! formattable_unsigned {
    ($($ty:ty),*) => {$(
        impl Formattable for $ty {
            fn render(&self, state: &FormatState) -> String {
                render_unsigned(*self as u128, state.radix)
            }
        }
    )*};
}

macro_rules! formattable_signed {
    ($($ty:ty),*) => {$(
        impl Formattable for $ty {
            fn render(&self, state: &FormatState) -> String {
                let digits = render_unsigned(self.unsigned_abs() as u128, state.radix);
                if *self < 0 { format!("-{digits}") } else { digits }
            }
        }
    )*};
}

formattable_unsigned!(u8, u16, u32, u64, usize);
formattable_signed!(i8, i16, i32, i64, isize);

macro_rules! formattable_float {
    ($($ty:ty),*) => {$(
        impl Formattable for $ty {
            fn render(&self, state: &FormatState) -> String {
                match state.precision {
                    Some(p) => format!("{:.*}", p, self),
                    None => self.to_string(),
                }
            }
        }
    )*};
}

formattable_float!(f32, f64);

// ── Format tokens ────────────────────────────────────────────────

/// One `%(index[,width[,fill[,precision]]])` token. Absent fields keep
/// the writer's current setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatToken {
    /// 1-based argument index.
    pub index: usize,
    pub width: Option<(usize, Justify)>,
    pub fill: Option<char>,
    pub precision: Option<usize>,
}

impl FormatToken {
    /// Apply this token's overrides on top of `base`.
    pub fn apply(&self, base: &FormatState) -> FormatState {
        let mut state = base.clone();
        if let Some((width, justify)) = self.width {
            state.width = width;
            state.justify = justify;
        }
        if let Some(fill) = self.fill {
            state.fill = fill;
        }
        if self.precision.is_some() {
            state.precision = self.precision;
        }
        state
    }
}

/// A piece of a parsed format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Token(FormatToken),
}

/// Split a format string into literal runs and tokens.
///
/// `%%` is a literal `%`, and so is a `%` not followed by `(`.
pub fn parse_format(fmt: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;
    let bytes = fmt.as_bytes();

    while pos < bytes.len() {
        if bytes[pos] != b'%' {
            pos += 1;
            continue;
        }
        match bytes.get(pos + 1) {
            Some(b'%') => {
                // Keep the first '%' in the run, drop the second.
                segments.push(Segment::Literal(&fmt[literal_start..pos + 1]));
                pos += 2;
                literal_start = pos;
            }
            Some(b'(') => {
                if literal_start < pos {
                    segments.push(Segment::Literal(&fmt[literal_start..pos]));
                }
                let body_start = pos + 2;
                let close = fmt[body_start..].find(')').ok_or(StrandError::FormatToken {
                    position: pos,
                    reason: "unterminated token",
                })?;
                let body = &fmt[body_start..body_start + close];
                segments.push(Segment::Token(parse_token(body, pos)?));
                pos = body_start + close + 1;
                literal_start = pos;
            }
            _ => pos += 1,
        }
    }
    if literal_start < fmt.len() {
        segments.push(Segment::Literal(&fmt[literal_start..]));
    }
    segments.retain(|s| !matches!(s, Segment::Literal("")));
    Ok(segments)
}

fn parse_token(body: &str, position: usize) -> Result<FormatToken> {
    let err = |reason| StrandError::FormatToken { position, reason };
    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() > 4 {
        return Err(err("too many fields"));
    }

    let index = fields[0]
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&i| i > 0)
        .ok_or_else(|| err("index must be a positive number"))?;

    let width = match fields.get(1).map(|f| f.trim()) {
        None | Some("") => None,
        Some(w) => {
            let (justify, digits) = if let Some(rest) = w.strip_prefix('-') {
                (Justify::Left, rest)
            } else if let Some(rest) = w.strip_prefix('+') {
                (Justify::Right, rest)
            } else {
                (Justify::Right, w)
            };
            let width = digits.parse::<usize>().map_err(|_| err("bad width"))?;
            Some((width, justify))
        }
    };

    let fill = match fields.get(2) {
        None => None,
        Some(f) => {
            let mut chars = f.chars();
            match (chars.next(), chars.next()) {
                (None, _) => None,
                (Some(c), None) => Some(c),
                _ => return Err(err("fill must be a single character")),
            }
        }
    };

    let precision = match fields.get(3).map(|f| f.trim()) {
        None | Some("") => None,
        Some(p) => Some(p.parse::<usize>().map_err(|_| err("bad precision"))?),
    };

    Ok(FormatToken {
        index,
        width,
        fill,
        precision,
    })
}

// ── Tests ────────────────────────────────────────────────────────
