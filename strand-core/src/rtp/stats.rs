//! Running sender counters shared by the session and its tasks.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by the worker tasks.
#[derive(Debug, Default)]
pub struct SenderStats {
    packets: AtomicU64,
    octets: AtomicU64,
    reports: AtomicU64,
    send_failures: AtomicU64,
    fill_failures: AtomicU64,
}

/// Point-in-time copy of [`SenderStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// RTP packets sent.
    pub packets: u64,
    /// RTP payload bytes sent, headers excluded.
    pub octets: u64,
    /// RTCP compound reports sent.
    pub reports: u64,
    pub send_failures: u64,
    pub fill_failures: u64,
}

impl SenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_packet(&self, payload_len: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.octets.fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub fn record_report(&self) {
        self.reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fill_failure(&self) {
        self.fill_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn octets(&self) -> u64 {
        self.octets.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            octets: self.octets.load(Ordering::Relaxed),
            reports: self.reports.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            fill_failures: self.fill_failures.load(Ordering::Relaxed),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
