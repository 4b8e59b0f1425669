//! Streaming service behind `strand stream`.
//!
//! Opens the configured PCM file, starts an RTP session, plays it and
//! waits until the stream ends or the service is told to stop.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use strand_core::rtp::StatsSnapshot;
use strand_core::{PcmFileSource, Result, RtpSession, SessionCommand};

use crate::config::StrandConfig;

/// How often the run loop checks the session and the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ── StreamService ────────────────────────────────────────────────

pub struct StreamService {
    config: StrandConfig,
    running: Arc<AtomicBool>,
}

impl StreamService {
    pub fn new(config: StrandConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle another task can clear to stop the service.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stream the configured file once.
    ///
    /// Returns the session counters after the session has been ended,
    /// whether the file ran out or the service was stopped.
    pub async fn run(&self) -> Result<StatsSnapshot> {
        self.running.store(true, Ordering::SeqCst);

        let path = PathBuf::from(&self.config.media.file);
        let source = PcmFileSource::open(&path, self.config.to_pcm_params()).await?;
        let params = self.config.to_session_params();
        let mut session =
            RtpSession::start(params, Box::new(source), self.config.to_session_config()).await?;

        let format = *session.format();
        info!(
            file = %path.display(),
            ssrc = session.ssrc(),
            local = %session.local_rtp_addr(),
            duration_ms = format.total_ms,
            chunk_ms = format.payload_ms,
            "streaming"
        );
        session.do_command(SessionCommand::Play);

        tokio::select! {
            _ = Self::wait_for_end(&session) => info!("end of stream"),
            _ = Self::wait_for_stop(&self.running) => info!("stop requested"),
        }

        let result = session.end_session().await;
        self.running.store(false, Ordering::SeqCst);
        let stats = session.stats();
        info!(
            packets = stats.packets,
            octets = stats.octets,
            reports = stats.reports,
            "stream service stopped"
        );
        if stats.send_failures > 0 || stats.fill_failures > 0 {
            warn!(
                send_failures = stats.send_failures,
                fill_failures = stats.fill_failures,
                "stream had failures"
            );
        }
        result.map(|()| stats)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn wait_for_end(session: &RtpSession) {
        while !session.is_finished() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        while running.load(Ordering::SeqCst) {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
