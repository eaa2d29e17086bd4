use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{Break, BurnoutLevel, BurnoutState, TriggerReason};

/// Every state change in the session subsystem produces an Event.
/// The presenter translates them; observers subscribe to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// No interaction observed for the idle threshold; uptime stops counting.
    IdleStarted {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// Interaction observed after an idle period; uptime resumes.
    IdleEnded {
        idle_secs: u64,
        at: DateTime<Utc>,
    },
    /// A new break became active.
    BreakDue {
        break_id: Uuid,
        scheduled_at: DateTime<Utc>,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// A snoozed break's snooze expired and it is active again.
    BreakRearmed {
        break_id: Uuid,
        scheduled_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    BreakCompleted {
        break_id: Uuid,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    BreakSnoozed {
        break_id: Uuid,
        until: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    BreakSkipped {
        break_id: Uuid,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// Burnout level moved; triggers is the full replacement set.
    BurnoutChanged {
        from: BurnoutLevel,
        to: BurnoutLevel,
        triggers: Vec<TriggerReason>,
        at: DateTime<Utc>,
    },
    /// Same level, but the set of active triggers changed.
    BurnoutTriggersChanged {
        level: BurnoutLevel,
        triggers: Vec<TriggerReason>,
        at: DateTime<Utc>,
    },
    /// Critical level persisted past the grace window.
    SafeModeLocked {
        triggers: Vec<TriggerReason>,
        at: DateTime<Utc>,
    },
    SafeModeUnlocked {
        locked_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        elapsed_secs: u64,
        is_idle: bool,
        current_break: Option<Break>,
        burnout: BurnoutState,
        safe_mode_locked: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::IdleStarted { at, .. }
            | Event::IdleEnded { at, .. }
            | Event::BreakDue { at, .. }
            | Event::BreakRearmed { at, .. }
            | Event::BreakCompleted { at, .. }
            | Event::BreakSnoozed { at, .. }
            | Event::BreakSkipped { at, .. }
            | Event::BurnoutChanged { at, .. }
            | Event::BurnoutTriggersChanged { at, .. }
            | Event::SafeModeLocked { at, .. }
            | Event::SafeModeUnlocked { at, .. }
            | Event::StateSnapshot { at, .. } => *at,
        }
    }
}
