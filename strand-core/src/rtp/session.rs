//! RTP session orchestrator.
//!
//! An [`RtpSession`] owns the buffer pool, both UDP sockets and two
//! worker tasks:
//!
//! ```text
//!  MediaSource ─► reader ──(queue)──► writer ─► RTP / RTCP sockets
//!                   ▲                   │
//!                   └──── buffer pool ◄─┘
//! ```
//!
//! The caller only sees `start`, `do_command` and `end_session`;
//! streaming failures are logged inside the tasks and surface as a
//! [`TaskError`](crate::error::TaskError) when the session is ended.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Result, StrandError};
use crate::rtp::buffer::{MediaBufferPool, PoolStats};
use crate::rtp::packet::MAX_RTP_PAYLOAD;
use crate::rtp::reader::ReaderTask;
use crate::rtp::socket::{Endpoint, bind_for_remote};
use crate::rtp::source::{MediaFormat, MediaSource};
use crate::rtp::stats::{SenderStats, StatsSnapshot};
use crate::rtp::task::WorkerTask;
use crate::rtp::writer::WriterTask;

// ── SessionConfig ────────────────────────────────────────────────

/// Tunable timings and sizes for an [`RtpSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Buffers in the pool; bounds how far the reader runs ahead.
    pub pool_capacity: usize,
    pub checkout_timeout: Duration,
    pub queue_pop_timeout: Duration,
    /// Reader poll interval while paused.
    pub idle_poll: Duration,
    /// Per-task deadline in `end_session`.
    pub join_timeout: Duration,
    /// Waits shorter than this are skipped.
    pub pacing_slack: Duration,
    /// How far ahead of real time packets may be sent. With a lead of
    /// zero the writer sleeps whenever a chunk is more than
    /// `pacing_slack` ahead of its media time.
    pub pacing_lead: Duration,
    pub rtcp_interval: Duration,
    pub queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 256,
            checkout_timeout: Duration::from_millis(250),
            queue_pop_timeout: Duration::from_millis(250),
            idle_poll: Duration::from_millis(100),
            join_timeout: Duration::from_millis(5000),
            pacing_slack: Duration::from_millis(5),
            pacing_lead: Duration::from_millis(80),
            rtcp_interval: Duration::from_secs(5),
            queue_depth: 256,
        }
    }
}

/// Where a session sends to and binds from.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub rtp_target: Endpoint,
    pub rtcp_target: Endpoint,
    /// 0 picks an ephemeral port.
    pub local_rtp_port: u16,
    pub local_rtcp_port: u16,
    /// Canonical name carried in every RTCP source description.
    pub cname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Play,
    Pause,
}

// ── Shared state ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub(crate) struct PlayClock {
    /// Incremented on every pause-to-play transition.
    pub(crate) epoch: u64,
    /// Wall-clock start of the current epoch.
    pub(crate) started: Instant,
}

/// State read by both tasks and written by the session.
#[derive(Debug)]
pub(crate) struct SessionShared {
    playing: AtomicBool,
    clock: Mutex<PlayClock>,
    pub(crate) stats: SenderStats,
    pub(crate) ssrc: u32,
}

impl SessionShared {
    pub(crate) fn new(ssrc: u32) -> Self {
        Self {
            playing: AtomicBool::new(false),
            clock: Mutex::new(PlayClock {
                epoch: 0,
                started: Instant::now(),
            }),
            stats: SenderStats::new(),
            ssrc,
        }
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub(crate) fn clock(&self) -> PlayClock {
        *self.clock.lock()
    }

    /// Start a new epoch. `false` if already playing.
    fn begin_play(&self) -> bool {
        let mut clock = self.clock.lock();
        if self.playing.load(Ordering::Acquire) {
            return false;
        }
        clock.epoch += 1;
        clock.started = Instant::now();
        self.playing.store(true, Ordering::Release);
        true
    }

    /// `false` if already paused.
    fn pause(&self) -> bool {
        let _clock = self.clock.lock();
        self.playing.swap(false, Ordering::AcqRel)
    }
}

// ── RtpSession ───────────────────────────────────────────────────

pub struct RtpSession {
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
    pool: MediaBufferPool,
    reader: Option<WorkerTask>,
    writer: Option<WorkerTask>,
    rtp_socket: Option<Arc<UdpSocket>>,
    rtcp_socket: Option<Arc<UdpSocket>>,
    local_rtp_addr: SocketAddr,
    local_rtcp_addr: SocketAddr,
    format: MediaFormat,
    config: SessionConfig,
}

struct SessionSockets {
    rtp: UdpSocket,
    rtcp: UdpSocket,
    rtp_target: SocketAddr,
    rtcp_target: SocketAddr,
}

impl RtpSession {
    /// Initialize `source`, bind both sockets and spawn the tasks.
    ///
    /// The session starts paused; send [`SessionCommand::Play`] to begin.
    /// Any failure after the source was initialized terminates it again.
    pub async fn start(
        params: SessionParams,
        mut source: Box<dyn MediaSource>,
        config: SessionConfig,
    ) -> Result<Self> {
        if source.is_initialized() {
            return Err(StrandError::AlreadyInitialized);
        }
        let format = source.initialize()?;
        if format.payload_bytes == 0 || format.payload_bytes > MAX_RTP_PAYLOAD {
            source.terminate();
            return Err(StrandError::Other(format!(
                "media chunk of {} bytes does not fit one RTP packet (max {MAX_RTP_PAYLOAD})",
                format.payload_bytes
            )));
        }

        let sockets = match Self::open_sockets(&params).await {
            Ok(sockets) => sockets,
            Err(e) => {
                source.terminate();
                return Err(e);
            }
        };
        let (local_rtp_addr, local_rtcp_addr) =
            match (sockets.rtp.local_addr(), sockets.rtcp.local_addr()) {
                (Ok(rtp), Ok(rtcp)) => (rtp, rtcp),
                (Err(e), _) | (_, Err(e)) => {
                    source.terminate();
                    return Err(StrandError::SessionInit(e));
                }
            };

        let ssrc: u32 = rand::random();
        let shared = Arc::new(SessionShared::new(ssrc));
        let cancel = CancellationToken::new();
        let pool = MediaBufferPool::new(config.pool_capacity.max(1), format.payload_bytes);
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let rtp_socket = Arc::new(sockets.rtp);
        let rtcp_socket = Arc::new(sockets.rtcp);

        let reader = ReaderTask {
            source,
            format,
            pool: pool.clone(),
            queue: tx,
            shared: Arc::clone(&shared),
            config: config.clone(),
            cancel: cancel.clone(),
        };
        let writer = WriterTask {
            rtp_socket: Arc::clone(&rtp_socket),
            rtcp_socket: Arc::clone(&rtcp_socket),
            rtp_target: sockets.rtp_target,
            rtcp_target: sockets.rtcp_target,
            cname: params.cname,
            queue: rx,
            shared: Arc::clone(&shared),
            config: config.clone(),
            cancel: cancel.clone(),
        };

        info!(
            ssrc,
            rtp = %sockets.rtp_target,
            rtcp = %sockets.rtcp_target,
            local = %local_rtp_addr,
            payload_type = format.payload_type,
            "RTP session started"
        );

        Ok(Self {
            shared,
            cancel,
            pool,
            reader: Some(WorkerTask::spawn("rtp-reader", reader.run())),
            writer: Some(WorkerTask::spawn("rtp-writer", writer.run())),
            rtp_socket: Some(rtp_socket),
            rtcp_socket: Some(rtcp_socket),
            local_rtp_addr,
            local_rtcp_addr,
            format,
            config,
        })
    }

    async fn open_sockets(params: &SessionParams) -> Result<SessionSockets> {
        let as_init = |e: StrandError| match e {
            StrandError::Io(io) => StrandError::SessionInit(io),
            other => other,
        };
        let rtp_target = params.rtp_target.resolve().await.map_err(as_init)?;
        let rtcp_target = params.rtcp_target.resolve().await.map_err(as_init)?;
        let rtp = bind_for_remote(rtp_target, params.local_rtp_port).await?;
        // `rtp` is dropped, closing it, if this bind fails.
        let rtcp = bind_for_remote(rtcp_target, params.local_rtcp_port).await?;
        Ok(SessionSockets {
            rtp,
            rtcp,
            rtp_target,
            rtcp_target,
        })
    }

    /// Apply a play/pause command.
    ///
    /// A pause-to-play transition returns the starting `(sequence,
    /// timestamp)` of the new epoch, always `(1, 0)`. Everything else,
    /// including commands to a stopped session, returns `None`.
    pub fn do_command(&self, command: SessionCommand) -> Option<(u16, u32)> {
        if !self.is_running() {
            return None;
        }
        match command {
            SessionCommand::Play => {
                if self.shared.begin_play() {
                    debug!(ssrc = self.shared.ssrc, epoch = self.shared.clock().epoch, "play");
                    Some((1, 0))
                } else {
                    None
                }
            }
            SessionCommand::Pause => {
                if self.shared.pause() {
                    debug!(ssrc = self.shared.ssrc, "pause");
                }
                None
            }
        }
    }

    /// Stop both tasks and release the session's resources.
    ///
    /// Both tasks are signalled before either is awaited, and each join
    /// is bounded by `join_timeout`. Calling this again is a no-op.
    pub async fn end_session(&mut self) -> Result<()> {
        if self.reader.is_none() && self.writer.is_none() {
            return Ok(());
        }
        self.cancel.cancel();
        self.shared.playing.store(false, Ordering::Release);
        self.pool.close();

        let timeout = self.config.join_timeout;
        let join = move |task: Option<WorkerTask>| async move {
            match task {
                Some(mut task) => task.join(timeout).await,
                None => Ok(()),
            }
        };
        let (reader, writer) =
            futures::future::join(join(self.reader.take()), join(self.writer.take())).await;

        self.rtp_socket = None;
        self.rtcp_socket = None;

        let mut first = None;
        for outcome in [reader, writer] {
            if let Err(e) = outcome {
                error!(ssrc = self.shared.ssrc, error = %e, "session task ended badly");
                first.get_or_insert(e);
            }
        }
        info!(ssrc = self.shared.ssrc, stats = ?self.shared.stats.snapshot(), "RTP session ended");
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// `true` while at least one task is alive and the session has not
    /// been ended.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && [&self.reader, &self.writer]
                .into_iter()
                .flatten()
                .any(|task| !task.is_finished())
    }

    /// `true` once the writer has exited, normally after end of stream.
    pub fn is_finished(&self) -> bool {
        self.writer.as_ref().is_none_or(|w| w.is_finished())
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn ssrc(&self) -> u32 {
        self.shared.ssrc
    }

    pub fn format(&self) -> &MediaFormat {
        &self.format
    }

    pub fn local_rtp_addr(&self) -> SocketAddr {
        self.local_rtp_addr
    }

    pub fn local_rtcp_addr(&self) -> SocketAddr {
        self.local_rtcp_addr
    }
}

impl Drop for RtpSession {
    fn drop(&mut self) {
        // Tasks exit on their own once cancelled; nothing to await here.
        self.cancel.cancel();
        self.pool.close();
    }
}

// ── Tests ────────────────────────────────────────────────────────
