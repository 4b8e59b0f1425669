//! Media sources feeding the reader task.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{Result, StrandError};

/// RTP payload type for 16-bit linear PCM, mono, 44.1 kHz.
pub const PAYLOAD_TYPE_L16_MONO: u8 = 11;

// ── MediaSource ──────────────────────────────────────────────────

/// What a source negotiated on [`MediaSource::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFormat {
    pub payload_type: u8,
    /// Nominal chunk duration.
    pub payload_ms: u32,
    /// Nominal chunk size in bytes; pool buffers are sized to this.
    pub payload_bytes: usize,
    pub payload_samples: u32,
    /// Bytes per sample frame (all channels).
    pub sample_bytes: usize,
    pub sample_rate: u32,
    pub total_ms: u64,
    pub total_bytes: u64,
}

/// Result of one [`MediaSource::read_samples`] call. `bytes == 0` means
/// the source is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleChunk {
    pub bytes: usize,
    pub samples: u32,
    pub ms: u32,
}

impl SampleChunk {
    pub fn is_end(&self) -> bool {
        self.bytes == 0
    }
}

#[async_trait]
pub trait MediaSource: Send {
    /// Open the source and report its format. Fails with
    /// [`StrandError::AlreadyInitialized`] when called twice.
    fn initialize(&mut self) -> Result<MediaFormat>;

    /// Fill `buf` with at most one chunk of whole samples.
    async fn read_samples(&mut self, buf: &mut [u8]) -> Result<SampleChunk>;

    fn terminate(&mut self);

    fn is_initialized(&self) -> bool;
}

// ── PcmFileSource ────────────────────────────────────────────────

/// Layout of a raw PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmParams {
    pub payload_type: u8,
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
    /// Duration of each chunk handed to the reader task.
    pub chunk_ms: u32,
}

impl Default for PcmParams {
    fn default() -> Self {
        Self {
            payload_type: PAYLOAD_TYPE_L16_MONO,
            sample_rate: 44_100,
            channels: 1,
            bytes_per_sample: 2,
            chunk_ms: 10,
        }
    }
}

impl PcmParams {
    fn frame_bytes(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bytes_per_sample)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.channels == 0 || self.bytes_per_sample == 0 {
            return Err(StrandError::Other(format!("invalid PCM layout: {self:?}")));
        }
        if self.chunk_ms == 0 || u64::from(self.sample_rate) * u64::from(self.chunk_ms) < 1000 {
            return Err(StrandError::Other(format!(
                "chunk of {} ms holds no samples at {} Hz",
                self.chunk_ms, self.sample_rate
            )));
        }
        Ok(())
    }
}

/// Headerless PCM read from any async byte stream, split into
/// fixed-duration chunks.
#[derive(Debug)]
pub struct PcmFileSource<R> {
    reader: R,
    params: PcmParams,
    total_bytes: u64,
    format: Option<MediaFormat>,
    exhausted: bool,
}

impl PcmFileSource<tokio::fs::File> {
    pub async fn open(path: impl AsRef<Path>, params: PcmParams) -> Result<Self> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        let total_bytes = file.metadata().await?.len();
        debug!(path = %path.as_ref().display(), total_bytes, "opened PCM source");
        Ok(Self::from_reader(file, total_bytes, params))
    }
}

impl<R: AsyncRead + Unpin + Send> PcmFileSource<R> {
    pub fn from_reader(reader: R, total_bytes: u64, params: PcmParams) -> Self {
        Self {
            reader,
            params,
            total_bytes,
            format: None,
            exhausted: false,
        }
    }

    pub fn params(&self) -> &PcmParams {
        &self.params
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> MediaSource for PcmFileSource<R> {
    fn initialize(&mut self) -> Result<MediaFormat> {
        if self.format.is_some() {
            return Err(StrandError::AlreadyInitialized);
        }
        self.params.validate()?;
        let p = &self.params;
        let sample_bytes = p.frame_bytes();
        let payload_samples = (u64::from(p.sample_rate) * u64::from(p.chunk_ms) / 1000) as u32;
        let total_samples = self.total_bytes / sample_bytes as u64;
        let format = MediaFormat {
            payload_type: p.payload_type,
            payload_ms: p.chunk_ms,
            payload_bytes: payload_samples as usize * sample_bytes,
            payload_samples,
            sample_bytes,
            sample_rate: p.sample_rate,
            total_ms: total_samples * 1000 / u64::from(p.sample_rate),
            total_bytes: self.total_bytes,
        };
        self.format = Some(format);
        self.exhausted = false;
        Ok(format)
    }

    async fn read_samples(&mut self, buf: &mut [u8]) -> Result<SampleChunk> {
        let Some(format) = self.format else {
            return Err(StrandError::Other("PCM source read before initialize".into()));
        };
        if self.exhausted {
            return Ok(SampleChunk::default());
        }
        let want = format.payload_bytes.min(buf.len());
        let want = want - want % format.sample_bytes;
        let mut filled = 0;
        while filled < want {
            let n = self.reader.read(&mut buf[filled..want]).await?;
            if n == 0 {
                self.exhausted = true;
                break;
            }
            filled += n;
        }
        // A trailing partial sample frame is dropped.
        let bytes = filled - filled % format.sample_bytes;
        let samples = (bytes / format.sample_bytes) as u32;
        let ms = (u64::from(samples) * 1000 / u64::from(format.sample_rate)) as u32;
        Ok(SampleChunk { bytes, samples, ms })
    }

    fn terminate(&mut self) {
        if self.format.take().is_some() {
            debug!("PCM source terminated");
        }
    }

    fn is_initialized(&self) -> bool {
        self.format.is_some()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(bytes: usize) -> PcmFileSource<Cursor<Vec<u8>>> {
        let data: Vec<u8> = (0..bytes).map(|i| i as u8).collect();
        PcmFileSource::from_reader(Cursor::new(data), bytes as u64, PcmParams::default())
    }

    #[test]
    fn initialize_reports_format_once() {
        let mut src = source(44_100 * 2);
        let format = src.initialize().unwrap();
        assert_eq!(format.payload_samples, 441);
        assert_eq!(format.payload_bytes, 882);
        assert_eq!(format.total_ms, 1000);
        assert!(src.is_initialized());
        assert!(matches!(src.initialize(), Err(StrandError::AlreadyInitialized)));

        src.terminate();
        assert!(!src.is_initialized());
    }

    #[test]
    fn degenerate_layout_is_rejected() {
        let params = PcmParams {
            sample_rate: 8000,
            chunk_ms: 0,
            ..PcmParams::default()
        };
        let mut src = PcmFileSource::from_reader(Cursor::new(Vec::<u8>::new()), 0, params);
        assert!(src.initialize().is_err());
        assert!(!src.is_initialized());
    }

    #[tokio::test]
    async fn reads_whole_chunks_then_tail_then_end() {
        let mut src = source(882 * 2 + 101);
        src.initialize().unwrap();
        let mut buf = vec![0u8; 882];

        let first = src.read_samples(&mut buf).await.unwrap();
        assert_eq!(first, SampleChunk { bytes: 882, samples: 441, ms: 10 });
        assert_eq!(buf[1], 1);

        src.read_samples(&mut buf).await.unwrap();
        let tail = src.read_samples(&mut buf).await.unwrap();
        assert_eq!(tail.bytes, 100);
        assert_eq!(tail.samples, 50);
        assert_eq!(tail.ms, 1);

        assert!(src.read_samples(&mut buf).await.unwrap().is_end());
    }

    #[tokio::test]
    async fn read_before_initialize_fails() {
        let mut src = source(10);
        let mut buf = [0u8; 8];
        assert!(src.read_samples(&mut buf).await.is_err());
    }
}
