//! Safe Mode gate - lockout after unanswered critical burnout
//!
//! ## States
//!
//! ```text
//! Unlocked --(critical for >= grace)--> Locked --(unlock)--> Unlocked
//! ```
//!
//! Locking is timer-driven through [`SafeModeGate::observe`]; unlocking only
//! ever happens through [`SafeModeGate::unlock`]. An acknowledging action
//! while still unlocked restarts the grace window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::session::burnout::{BurnoutLevel, BurnoutState};

/// Longest grace window the config accepts: one day.
pub const MAX_GRACE_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum GateState {
    Unlocked {
        /// When the current unanswered critical stretch began.
        critical_since: Option<DateTime<Utc>>,
    },
    Locked {
        since: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeModeGate {
    state: GateState,
    grace_secs: u64,
}

impl SafeModeGate {
    pub fn new(grace_secs: u64) -> Self {
        Self {
            state: GateState::Unlocked {
                critical_since: None,
            },
            grace_secs,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, GateState::Locked { .. })
    }

    /// Grace window as a duration, saturating at [`Duration::MAX`].
    pub fn grace(&self) -> Duration {
        i64::try_from(self.grace_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Feed the current burnout state. Returns `Some(SafeModeLocked)` when
    /// the grace window runs out.
    pub fn observe(&mut self, burnout: &BurnoutState, now: DateTime<Utc>) -> Option<Event> {
        let GateState::Unlocked { critical_since } = self.state else {
            return None;
        };
        if burnout.level != BurnoutLevel::Critical {
            self.state = GateState::Unlocked {
                critical_since: None,
            };
            return None;
        }
        let since = critical_since.unwrap_or(now);
        if now - since >= self.grace() {
            self.state = GateState::Locked { since: now };
            tracing::info!(grace_secs = self.grace_secs, "safe mode locked");
            return Some(Event::SafeModeLocked {
                triggers: burnout.triggers.iter().copied().collect(),
                at: now,
            });
        }
        self.state = GateState::Unlocked {
            critical_since: Some(since),
        };
        None
    }

    /// User responded to the critical prompt; restart the grace window.
    /// Returns false while locked, where only unlock is accepted.
    pub fn acknowledge(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            GateState::Unlocked {
                critical_since: Some(_),
            } => {
                self.state = GateState::Unlocked {
                    critical_since: Some(now),
                };
                true
            }
            GateState::Unlocked {
                critical_since: None,
            } => true,
            GateState::Locked { .. } => false,
        }
    }

    /// Explicit unlock. No-op unless locked.
    pub fn unlock(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let GateState::Locked { since } = self.state else {
            return None;
        };
        self.state = GateState::Unlocked {
            critical_since: None,
        };
        let locked_secs = (now - since).num_seconds().max(0) as u64;
        tracing::info!(locked_secs, "safe mode unlocked");
        Some(Event::SafeModeUnlocked {
            locked_secs,
            at: now,
        })
    }
}
