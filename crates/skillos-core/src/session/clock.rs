//! Idle/uptime tracker.
//!
//! Advances `elapsed_secs` by one per tick while the user is active. The
//! tracker goes idle once no interaction has been recorded for the idle
//! threshold, and idle ticks do not count. Returning from idle resumes the
//! count without resetting it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClock {
    elapsed_secs: u64,
    is_idle: bool,
    last_activity_at: DateTime<Utc>,
    idle_threshold_secs: u64,
}

impl SessionClock {
    /// Create a clock mounted at `now`. Mounting counts as an interaction.
    pub fn new(idle_threshold_secs: u64, now: DateTime<Utc>) -> Self {
        Self {
            elapsed_secs: 0,
            is_idle: false,
            last_activity_at: now,
            idle_threshold_secs: idle_threshold_secs.max(1),
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn is_idle(&self) -> bool {
        self.is_idle
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// One fixed-interval tick. Returns `Some(IdleStarted)` on the tick that
    /// crosses the idle threshold.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let quiet_secs = (now - self.last_activity_at).num_seconds().max(0) as u64;
        if quiet_secs >= self.idle_threshold_secs {
            if self.is_idle {
                return None;
            }
            self.is_idle = true;
            tracing::debug!(elapsed_secs = self.elapsed_secs, "session went idle");
            return Some(Event::IdleStarted {
                elapsed_secs: self.elapsed_secs,
                at: now,
            });
        }
        if !self.is_idle {
            self.elapsed_secs += 1;
        }
        None
    }

    /// Record a user interaction. Returns `Some(IdleEnded)` if it ends an
    /// idle period.
    pub fn record_activity(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let previous = self.last_activity_at;
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
        if !self.is_idle {
            return None;
        }
        self.is_idle = false;
        let idle_secs = (now - previous).num_seconds().max(0) as u64;
        tracing::debug!(idle_secs, "session resumed from idle");
        Some(Event::IdleEnded { idle_secs, at: now })
    }
}
