//! Reader task lifecycle.
//!
//! ```text
//!   Idle ◄──────► Playing ──► Draining ──► Stopped
//!     │                                       ▲
//!     └───────────────────────────────────────┘
//! ```
//!
//! Pausing returns to `Idle` without losing the media position.
//! `Draining` covers the window between the end-of-stream buffer being
//! queued and the task exiting.

use std::time::Instant;

use crate::error::{Result, StrandError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    Playing {
        since: Instant,
    },
    Draining,
    Stopped,
}

impl std::fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StreamPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Playing { .. } => "Playing",
            Self::Draining => "Draining",
            Self::Stopped => "Stopped",
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    fn invalid(&self, to: &'static str) -> StrandError {
        StrandError::InvalidTransition {
            from: self.as_str(),
            to,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Idle`.
    pub fn play(&mut self) -> Result<()> {
        match self {
            Self::Idle => {
                *self = Self::Playing {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(self.invalid("Playing")),
        }
    }

    /// Valid from: `Playing`.
    pub fn pause(&mut self) -> Result<()> {
        match self {
            Self::Playing { .. } => {
                *self = Self::Idle;
                Ok(())
            }
            _ => Err(self.invalid("Idle")),
        }
    }

    /// End of input was reached. Valid from: `Playing`.
    pub fn drain(&mut self) -> Result<()> {
        match self {
            Self::Playing { .. } => {
                *self = Self::Draining;
                Ok(())
            }
            _ => Err(self.invalid("Draining")),
        }
    }

    /// Valid from any phase but `Stopped`.
    pub fn stop(&mut self) -> Result<()> {
        match self {
            Self::Stopped => Err(self.invalid("Stopped")),
            _ => {
                *self = Self::Stopped;
                Ok(())
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
