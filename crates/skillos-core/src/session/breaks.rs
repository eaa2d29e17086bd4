//! Break scheduler.
//!
//! Fixed-interval policy over active time: a break is due once
//! `elapsed - baseline >= interval`. At most one break is outstanding at a
//! time (`current`), so at most one can ever be active.
//!
//! ## State Transitions
//!
//! ```text
//! Pending -> Active -> Completed
//!                   -> Skipped
//!                   -> Snoozed -> Active (re-armed on snooze expiry)
//! ```
//!
//! Transitions requested against anything but the active break are no-ops
//! and return `None`, so UI re-renders can safely invoke them twice.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakState {
    Pending,
    Active,
    Snoozed,
    Skipped,
    Completed,
}

impl BreakState {
    pub fn is_final(self) -> bool {
        matches!(self, BreakState::Skipped | BreakState::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Break {
    pub id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    /// Active seconds on the session clock when the break fell due.
    pub due_at_elapsed_secs: u64,
    pub state: BreakState,
    /// Re-arm deadline while snoozed.
    #[serde(default)]
    pub snoozed_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Break {
    fn new(scheduled_at: DateTime<Utc>, due_at_elapsed_secs: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            scheduled_at,
            due_at_elapsed_secs,
            state: BreakState::Pending,
            snoozed_until: None,
            resolved_at: None,
        }
    }
}

/// Scheduler policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakPolicy {
    /// Active seconds between breaks.
    pub interval_secs: u64,
    /// Finished breaks retained for inspection.
    pub history_limit: usize,
}

impl Default for BreakPolicy {
    fn default() -> Self {
        Self {
            interval_secs: 50 * 60,
            history_limit: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakScheduler {
    policy: BreakPolicy,
    /// Interval counter baseline in active seconds.
    baseline_secs: u64,
    /// Active seconds at the last completed break.
    last_completed_secs: u64,
    current: Option<Break>,
    history: VecDeque<Break>,
    skip_log: Vec<DateTime<Utc>>,
}

impl BreakScheduler {
    pub fn new(policy: BreakPolicy) -> Self {
        Self {
            policy: BreakPolicy {
                interval_secs: policy.interval_secs.max(1),
                history_limit: policy.history_limit,
            },
            baseline_secs: 0,
            last_completed_secs: 0,
            current: None,
            history: VecDeque::new(),
            skip_log: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn policy(&self) -> &BreakPolicy {
        &self.policy
    }

    pub fn baseline_secs(&self) -> u64 {
        self.baseline_secs
    }

    pub fn last_completed_secs(&self) -> u64 {
        self.last_completed_secs
    }

    /// The outstanding break, if any (pending, active or snoozed).
    pub fn current(&self) -> Option<&Break> {
        self.current.as_ref()
    }

    pub fn active_break(&self) -> Option<&Break> {
        self.current
            .as_ref()
            .filter(|b| b.state == BreakState::Active)
    }

    pub fn history(&self) -> impl Iterator<Item = &Break> {
        self.history.iter()
    }

    /// Number of skips recorded within `window` before `now`.
    pub fn skips_within(&self, window: Duration, now: DateTime<Utc>) -> u32 {
        let cutoff = now - window;
        self.skip_log.iter().filter(|at| **at > cutoff).count() as u32
    }

    pub fn is_due(&self, elapsed_secs: u64) -> bool {
        elapsed_secs.saturating_sub(self.baseline_secs) >= self.policy.interval_secs
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Run the due check. Creates and activates a break when due and nothing
    /// is outstanding; re-arms a snoozed break whose snooze has expired.
    pub fn check_due(&mut self, elapsed_secs: u64, now: DateTime<Utc>) -> Option<Event> {
        match self.current.as_ref().map(|b| (b.state, b.snoozed_until)) {
            None => {
                if !self.is_due(elapsed_secs) {
                    return None;
                }
                let mut pending = Break::new(now, elapsed_secs);
                pending.state = BreakState::Active;
                let event = Event::BreakDue {
                    break_id: pending.id,
                    scheduled_at: pending.scheduled_at,
                    elapsed_secs,
                    at: now,
                };
                tracing::debug!(break_id = %pending.id, elapsed_secs, "break due");
                self.current = Some(pending);
                Some(event)
            }
            Some((BreakState::Snoozed, Some(until))) if now >= until => {
                if !self.is_due(elapsed_secs) {
                    return None;
                }
                let current = self.current.as_mut()?;
                current.state = BreakState::Active;
                current.snoozed_until = None;
                tracing::debug!(break_id = %current.id, "snoozed break re-armed");
                Some(Event::BreakRearmed {
                    break_id: current.id,
                    scheduled_at: current.scheduled_at,
                    at: now,
                })
            }
            _ => None,
        }
    }

    pub fn complete_break(
        &mut self,
        id: Uuid,
        elapsed_secs: u64,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        self.take_active(id, BreakState::Completed, now)?;
        self.baseline_secs = elapsed_secs;
        self.last_completed_secs = elapsed_secs;
        tracing::debug!(break_id = %id, elapsed_secs, "break completed");
        Some(Event::BreakCompleted {
            break_id: id,
            elapsed_secs,
            at: now,
        })
    }

    /// Snooze the active break. `minutes` below one is treated as one.
    pub fn snooze_break(&mut self, id: Uuid, minutes: u32, now: DateTime<Utc>) -> Option<Event> {
        let current = self.current.as_mut()?;
        if current.id != id || current.state != BreakState::Active {
            return None;
        }
        let until = now + Duration::minutes(i64::from(minutes.max(1)));
        current.state = BreakState::Snoozed;
        current.snoozed_until = Some(until);
        tracing::debug!(break_id = %id, %until, "break snoozed");
        Some(Event::BreakSnoozed {
            break_id: id,
            until,
            at: now,
        })
    }

    pub fn skip_break(&mut self, id: Uuid, elapsed_secs: u64, now: DateTime<Utc>) -> Option<Event> {
        self.take_active(id, BreakState::Skipped, now)?;
        self.baseline_secs = elapsed_secs;
        self.skip_log.push(now);
        tracing::debug!(break_id = %id, elapsed_secs, "break skipped");
        Some(Event::BreakSkipped {
            break_id: id,
            elapsed_secs,
            at: now,
        })
    }

    /// Drop skip records older than `window`; they can no longer count.
    pub fn prune_skips(&mut self, window: Duration, now: DateTime<Utc>) {
        let cutoff = now - window;
        self.skip_log.retain(|at| *at > cutoff);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn take_active(&mut self, id: Uuid, to: BreakState, now: DateTime<Utc>) -> Option<()> {
        let matches = self
            .current
            .as_ref()
            .is_some_and(|b| b.id == id && b.state == BreakState::Active);
        if !matches {
            return None;
        }
        let mut finished = self.current.take()?;
        finished.state = to;
        finished.resolved_at = Some(now);
        self.history.push_back(finished);
        while self.history.len() > self.policy.history_limit {
            self.history.pop_front();
        }
        Some(())
    }
}
