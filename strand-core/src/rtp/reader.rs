//! Producer task: pulls chunks from the media source, stamps them and
//! queues them for the writer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, StrandError};
use crate::rtp::buffer::{MediaBufferPool, PooledBuffer};
use crate::rtp::session::{SessionConfig, SessionShared};
use crate::rtp::source::{MediaFormat, MediaSource};
use crate::rtp::state::StreamPhase;

pub(crate) struct ReaderTask {
    pub(crate) source: Box<dyn MediaSource>,
    pub(crate) format: MediaFormat,
    pub(crate) pool: MediaBufferPool,
    pub(crate) queue: mpsc::Sender<PooledBuffer>,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) config: SessionConfig,
    pub(crate) cancel: CancellationToken,
}

/// Consecutive non-fatal fill failures after which the reader gives up.
const MAX_FILL_FAILURES: u32 = 20;

impl ReaderTask {
    /// Run until end of input or cancellation. The source is terminated
    /// on every exit path.
    pub(crate) async fn run(mut self) -> Result<()> {
        info!(ssrc = self.shared.ssrc, "reader started");
        let mut phase = StreamPhase::default();
        let result = self.run_loop(&mut phase).await;
        self.source.terminate();
        debug!(phase = %phase, "reader exiting");
        match &result {
            Ok(()) => info!(ssrc = self.shared.ssrc, "reader stopped"),
            Err(e) => warn!(ssrc = self.shared.ssrc, error = %e, "reader failed"),
        }
        result
    }

    async fn run_loop(&mut self, phase: &mut StreamPhase) -> Result<()> {
        let mut failures = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let playing = self.shared.is_playing();
            if playing && !phase.is_playing() {
                phase.play()?;
                debug!("reader playing");
            } else if !playing && phase.is_playing() {
                phase.pause()?;
                debug!("reader paused");
            }

            if !phase.is_playing() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.config.idle_poll) => continue,
                }
            }

            let checkout = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                buf = self.pool.checkout(self.config.checkout_timeout) => buf,
            };
            let Some(mut buf) = checkout else {
                if self.pool.is_closed() {
                    return Ok(());
                }
                trace!("pool exhausted; reader waiting");
                continue;
            };

            let read = self.source.read_samples(buf.fill_slot()).await;
            let chunk = match read {
                Ok(chunk) => {
                    failures = 0;
                    chunk
                }
                Err(e) if e.is_fatal_io() => return Err(e),
                Err(e) => {
                    // Back to the pool before waiting out the retry delay.
                    drop(buf);
                    failures += 1;
                    self.shared.stats.record_fill_failure();
                    if failures >= MAX_FILL_FAILURES {
                        return Err(e);
                    }
                    warn!(error = %e, failures, "media fill failed; skipping chunk");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(self.config.idle_poll) => continue,
                    }
                }
            };

            buf.payload_type = self.format.payload_type;
            buf.ssrc = self.shared.ssrc;

            if chunk.is_end() {
                buf.end_of_stream = true;
                phase.drain()?;
                debug!("end of media; queueing end-of-stream");
            } else {
                buf.set_len(chunk.bytes)?;
                buf.samples = chunk.samples;
                buf.duration_ms = chunk.ms;
                trace!(bytes = chunk.bytes, samples = chunk.samples, "chunk queued");
            }

            let end = buf.end_of_stream;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                sent = self.queue.send(buf) => sent.map_err(|_| StrandError::ChannelClosed)?,
            }

            if end {
                phase.stop()?;
                return Ok(());
            }
        }
    }
}
