//! Configuration for the `strand` command line.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use strand_core::rtp::{Endpoint, PcmParams, SessionConfig, SessionParams};
use strand_core::{ErrorAction, NewlineMode, Result, StrandError, TextEncoding};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrandConfig {
    /// Where RTP and RTCP are sent.
    pub network: NetworkConfig,
    /// Raw PCM input layout.
    pub media: MediaConfig,
    /// Session timings and pool sizes.
    pub session: SessionTuning,
    /// Defaults for `strand transcode`.
    pub text: TextConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Receiver host name or address.
    pub target_host: String,
    pub rtp_port: u16,
    /// 0 means `rtp_port + 1`.
    pub rtcp_port: u16,
    /// Local ports to bind; 0 picks an ephemeral port.
    pub local_rtp_port: u16,
    pub local_rtcp_port: u16,
    /// RTCP canonical name.
    pub cname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Headerless PCM file to stream.
    pub file: String,
    pub payload_type: u8,
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
    pub chunk_ms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    pub pool_capacity: usize,
    pub queue_depth: usize,
    pub checkout_timeout_ms: u64,
    pub queue_pop_timeout_ms: u64,
    pub idle_poll_ms: u64,
    pub join_timeout_ms: u64,
    pub pacing_slack_ms: u64,
    pub pacing_lead_ms: u64,
    pub rtcp_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Input encoding, or "auto" to detect it from the byte-order mark.
    pub from: String,
    pub to: String,
    /// "throw", "replace" or "stop-then-throw".
    pub on_error: String,
    /// Write a byte-order mark to the output.
    pub bom: bool,
    /// Output line breaks: "lf", "crlf" or "cr".
    pub newline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            target_host: "127.0.0.1".into(),
            rtp_port: 5004,
            rtcp_port: 0,
            local_rtp_port: 0,
            local_rtcp_port: 0,
            cname: "strand@localhost".into(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        let pcm = PcmParams::default();
        Self {
            file: "audio.pcm".into(),
            payload_type: pcm.payload_type,
            sample_rate: pcm.sample_rate,
            channels: pcm.channels,
            bytes_per_sample: pcm.bytes_per_sample,
            chunk_ms: pcm.chunk_ms,
        }
    }
}

impl Default for SessionTuning {
    fn default() -> Self {
        let cfg = SessionConfig::default();
        let ms = |d: Duration| d.as_millis() as u64;
        Self {
            pool_capacity: cfg.pool_capacity,
            queue_depth: cfg.queue_depth,
            checkout_timeout_ms: ms(cfg.checkout_timeout),
            queue_pop_timeout_ms: ms(cfg.queue_pop_timeout),
            idle_poll_ms: ms(cfg.idle_poll),
            join_timeout_ms: ms(cfg.join_timeout),
            pacing_slack_ms: ms(cfg.pacing_slack),
            pacing_lead_ms: ms(cfg.pacing_lead),
            rtcp_interval_ms: ms(cfg.rtcp_interval),
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            from: "auto".into(),
            to: "utf-8".into(),
            on_error: "throw".into(),
            bom: false,
            newline: "lf".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl StrandConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Session tuning with zero sizes and intervals raised to something
    /// the session can run with.
    pub fn to_session_config(&self) -> SessionConfig {
        let s = &self.session;
        let ms = |v: u64, min: u64| Duration::from_millis(v.max(min));
        let pool_capacity = s.pool_capacity.clamp(1, 65_536);
        SessionConfig {
            pool_capacity,
            queue_depth: s.queue_depth.clamp(1, pool_capacity),
            checkout_timeout: ms(s.checkout_timeout_ms, 1),
            queue_pop_timeout: ms(s.queue_pop_timeout_ms, 1),
            idle_poll: ms(s.idle_poll_ms, 1),
            join_timeout: ms(s.join_timeout_ms, 1),
            pacing_slack: ms(s.pacing_slack_ms, 0),
            pacing_lead: ms(s.pacing_lead_ms, 0),
            rtcp_interval: ms(s.rtcp_interval_ms, 100),
        }
    }

    pub fn to_pcm_params(&self) -> PcmParams {
        let m = &self.media;
        PcmParams {
            payload_type: m.payload_type & 0x7F,
            sample_rate: m.sample_rate,
            channels: m.channels,
            bytes_per_sample: m.bytes_per_sample,
            chunk_ms: m.chunk_ms,
        }
    }

    pub fn to_session_params(&self) -> SessionParams {
        let n = &self.network;
        let rtcp_port = match n.rtcp_port {
            0 => n.rtp_port.wrapping_add(1),
            port => port,
        };
        SessionParams {
            rtp_target: Endpoint::new(n.target_host.clone(), n.rtp_port),
            rtcp_target: Endpoint::new(n.target_host.clone(), rtcp_port),
            local_rtp_port: n.local_rtp_port,
            local_rtcp_port: n.local_rtcp_port,
            cname: n.cname.clone(),
        }
    }

    /// Input encoding, `None` for byte-order-mark detection.
    pub fn input_encoding(&self) -> Result<Option<TextEncoding>> {
        parse_encoding(&self.text.from)
    }

    pub fn output_encoding(&self) -> Result<TextEncoding> {
        parse_encoding(&self.text.to)?
            .ok_or_else(|| StrandError::Other("output encoding cannot be \"auto\"".into()))
    }

    pub fn error_action(&self) -> Result<ErrorAction> {
        self.text.on_error.parse()
    }

    pub fn newline_mode(&self) -> Result<NewlineMode> {
        self.text.newline.parse()
    }
}

/// `"auto"` (any case) means detect; anything else must name an encoding.
pub fn parse_encoding(name: &str) -> Result<Option<TextEncoding>> {
    if name.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    name.parse().map(Some)
}

// ── Tests ────────────────────────────────────────────────────────
