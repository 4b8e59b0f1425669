//! File-to-file text conversion behind `strand transcode`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tracing::{debug, info};

use strand_core::text::{ByteSink, ByteSource, ReadSource, WriteSink};
use strand_core::{ErrorAction, NewlineMode, Result, TextEncoding, TextReader, TextWriter, Transcoder};

/// How one conversion runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    /// `None` detects the input encoding from its byte-order mark.
    pub from: Option<TextEncoding>,
    pub to: TextEncoding,
    pub on_error: ErrorAction,
    pub bom: bool,
    /// Line break written for every line break read.
    pub newline: NewlineMode,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            from: None,
            to: TextEncoding::Utf8,
            on_error: ErrorAction::Throw,
            bom: false,
            newline: NewlineMode::Lf,
        }
    }
}

/// What a conversion produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TranscodeSummary {
    pub source_encoding: Option<TextEncoding>,
    pub chars: u64,
    pub lines: u64,
}

/// Convert `input` into `output`.
pub fn transcode_file(input: &Path, output: &Path, options: &TranscodeOptions) -> Result<TranscodeSummary> {
    let source = ReadSource::new(File::open(input)?);
    let sink = WriteSink::new(BufWriter::new(File::create(output)?));
    let summary = transcode(source, sink, options)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        from = ?summary.source_encoding,
        to = %options.to,
        chars = summary.chars,
        lines = summary.lines,
        "transcoded"
    );
    Ok(summary)
}

/// Pump every character from `source` to `sink`, rewriting line breaks.
pub fn transcode<S: ByteSource, K: ByteSink>(
    source: S,
    sink: K,
    options: &TranscodeOptions,
) -> Result<TranscodeSummary> {
    let mut reader = match options.from {
        Some(encoding) => TextReader::with_transcoder(
            source,
            Transcoder::new(encoding).with_error_action(options.on_error),
        ),
        None => TextReader::new(source).with_error_action(options.on_error),
    };
    let mut writer = TextWriter::with_transcoder(
        sink,
        Transcoder::new(options.to).with_error_action(options.on_error),
    )
    .with_bom(options.bom);
    writer.set_newline_mode(options.newline);

    let mut summary = TranscodeSummary::default();
    let mut pending = String::new();
    while let Some(c) = reader.next_char()? {
        match c {
            '\r' | '\n' => {
                if c == '\r' && reader.try_peek_char()? == Some('\n') {
                    reader.read_char()?;
                }
                writer.write_str(&pending)?;
                pending.clear();
                writer.new_line()?;
                summary.lines += 1;
            }
            _ => pending.push(c),
        }
        summary.chars += 1;
    }
    writer.write_str(&pending)?;
    writer.flush()?;
    summary.source_encoding = reader.encoding();
    debug!(?summary, "transcode finished");
    Ok(summary)
}

// ── Tests ────────────────────────────────────────────────────────
