//! Session scheduler: uptime tracking, break scheduling, burnout
//! estimation and the safe mode gate, wired into one state container.
//!
//! [`Session`] is a wall-clock-driven state machine with no internal
//! threads. The caller invokes [`Session::tick`] once per second and routes
//! user actions through [`Session::apply`]; both return the events produced
//! and also hand them to any registered observers. See
//! [`crate::runtime`] for the async driver that does this on a timer.

mod breaks;
mod burnout;
mod clock;
mod safe_mode;

pub use breaks::{Break, BreakPolicy, BreakScheduler, BreakState};
pub use burnout::{
    estimate, BurnoutInputs, BurnoutLevel, BurnoutMonitor, BurnoutState, BurnoutThresholds,
    TriggerReason,
};
pub use clock::SessionClock;
pub use safe_mode::{GateState, SafeModeGate, MAX_GRACE_SECS};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::Event;

/// Interval between ticks, in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub idle_threshold_secs: u64,
    pub breaks: BreakPolicy,
    pub burnout: BurnoutThresholds,
    pub grace_secs: u64,
    pub default_snooze_min: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_threshold_secs: 300,
            breaks: BreakPolicy::default(),
            burnout: BurnoutThresholds::default(),
            grace_secs: 120,
            default_snooze_min: 5,
        }
    }
}

/// A user action routed back from the notification surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    /// Any interaction (input event); keeps the idle tracker awake.
    Activity,
    Complete { break_id: Uuid },
    Snooze {
        break_id: Uuid,
        /// Falls back to the configured default when absent.
        #[serde(default)]
        minutes: Option<u32>,
    },
    Skip { break_id: Uuid },
    /// Response to a critical burnout prompt.
    Acknowledge,
    Unlock,
}

type Observer = Box<dyn FnMut(&Event) + Send>;

pub struct Session {
    settings: SessionSettings,
    clock: SessionClock,
    breaks: BreakScheduler,
    monitor: BurnoutMonitor,
    gate: SafeModeGate,
    observers: Vec<Observer>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("clock", &self.clock)
            .field("breaks", &self.breaks)
            .field("monitor", &self.monitor)
            .field("gate", &self.gate)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Session {
    /// Mount a session at `now`.
    pub fn new(settings: SessionSettings, now: DateTime<Utc>) -> Self {
        Self {
            clock: SessionClock::new(settings.idle_threshold_secs, now),
            breaks: BreakScheduler::new(settings.breaks.clone()),
            monitor: BurnoutMonitor::new(settings.burnout.clone()),
            gate: SafeModeGate::new(settings.grace_secs),
            observers: Vec::new(),
            settings,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn breaks(&self) -> &BreakScheduler {
        &self.breaks
    }

    pub fn burnout(&self) -> &BurnoutState {
        self.monitor.state()
    }

    pub fn gate(&self) -> &SafeModeGate {
        &self.gate
    }

    pub fn is_locked(&self) -> bool {
        self.gate.is_locked()
    }

    /// Id of the outstanding break, whatever its state.
    pub fn current_break_id(&self) -> Option<Uuid> {
        self.breaks.current().map(|b| b.id)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            elapsed_secs: self.clock.elapsed_secs(),
            is_idle: self.clock.is_idle(),
            current_break: self.breaks.current().cloned(),
            burnout: self.monitor.state().clone(),
            safe_mode_locked: self.gate.is_locked(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Register an observer called with every event, in order.
    pub fn subscribe(&mut self, observer: impl FnMut(&Event) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// One timer tick: clock, due check, burnout recompute, gate.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        events.extend(self.clock.tick(now));
        events.extend(self.breaks.check_due(self.clock.elapsed_secs(), now));
        self.refresh(now, false, &mut events);
        self.notify(&events);
        events
    }

    /// Apply a user action. Invalid transitions produce no events.
    ///
    /// While safe mode is locked only `Unlock` and `Activity` get through.
    pub fn apply(&mut self, action: UserAction, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        events.extend(self.clock.record_activity(now));

        if self.gate.is_locked()
            && !matches!(action, UserAction::Unlock | UserAction::Activity)
        {
            tracing::debug!(?action, "action blocked while safe mode is locked");
            self.notify(&events);
            return events;
        }

        let elapsed = self.clock.elapsed_secs();
        let mut acknowledged = false;
        match action {
            UserAction::Activity => {}
            UserAction::Complete { break_id } => {
                if let Some(event) = self.breaks.complete_break(break_id, elapsed, now) {
                    self.gate.acknowledge(now);
                    acknowledged = true;
                    events.push(event);
                }
            }
            UserAction::Snooze { break_id, minutes } => {
                let minutes = minutes.unwrap_or(self.settings.default_snooze_min);
                events.extend(self.breaks.snooze_break(break_id, minutes, now));
            }
            UserAction::Skip { break_id } => {
                events.extend(self.breaks.skip_break(break_id, elapsed, now));
            }
            UserAction::Acknowledge => {
                self.gate.acknowledge(now);
            }
            UserAction::Unlock => {
                events.extend(self.gate.unlock(now));
            }
        }

        self.refresh(now, acknowledged, &mut events);
        self.notify(&events);
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn refresh(&mut self, now: DateTime<Utc>, acknowledged: bool, events: &mut Vec<Event>) {
        let window = self.settings.burnout.skip_window();
        self.breaks.prune_skips(window, now);
        let inputs = BurnoutInputs {
            active_secs: self
                .clock
                .elapsed_secs()
                .saturating_sub(self.breaks.last_completed_secs()),
            skipped_in_window: self.breaks.skips_within(window, now),
        };
        let before = self.monitor.state().triggers.clone();
        let triggers = |monitor: &BurnoutMonitor| -> Vec<TriggerReason> {
            monitor.state().triggers.iter().copied().collect()
        };
        if let Some((from, to)) = self.monitor.update(inputs, acknowledged) {
            events.push(Event::BurnoutChanged {
                from,
                to,
                triggers: triggers(&self.monitor),
                at: now,
            });
        } else if self.monitor.state().triggers != before {
            events.push(Event::BurnoutTriggersChanged {
                level: self.monitor.level(),
                triggers: triggers(&self.monitor),
                at: now,
            });
        }
        events.extend(self.gate.observe(self.monitor.state(), now));
    }

    fn notify(&mut self, events: &[Event]) {
        for event in events {
            for observer in self.observers.iter_mut() {
                observer(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            idle_threshold_secs: 10_000,
            breaks: BreakPolicy {
                interval_secs: 60,
                history_limit: 16,
            },
            burnout: BurnoutThresholds {
                warning_after_secs: 120,
                critical_after_secs: 240,
                warning_skips: 2,
                critical_skips: 3,
                skip_window_secs: 3600,
            },
            grace_secs: 30,
            default_snooze_min: 5,
        }
    }

    /// Tick `n` times after second `from`. The idle threshold is far away.
    fn run(session: &mut Session, from: u64, n: u64) -> Vec<Event> {
        let mut out = Vec::new();
        for s in from + 1..=from + n {
            out.extend(session.tick(t0() + Duration::seconds(s as i64)));
        }
        out
    }

    #[test]
    fn break_becomes_due_after_interval() {
        let mut session = Session::new(settings(), t0());
        let events = run(&mut session, 0, 60);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::BreakDue { .. }))
                .count(),
            1
        );
        assert!(session.breaks().active_break().is_some());
    }

    #[test]
    fn completion_lowers_burnout_level() {
        let mut session = Session::new(settings(), t0());
        run(&mut session, 0, 120);
        assert_eq!(session.burnout().level, BurnoutLevel::Warning);

        let id = session.current_break_id().unwrap();
        let events = session.apply(
            UserAction::Complete { break_id: id },
            t0() + Duration::seconds(121),
        );
        assert!(events.iter().any(|e| matches!(
            e,
            Event::BurnoutChanged {
                from: BurnoutLevel::Warning,
                to: BurnoutLevel::Normal,
                ..
            }
        )));
        assert_eq!(session.burnout().level, BurnoutLevel::Normal);
    }

    #[test]
    fn skipping_does_not_lower_level() {
        let mut session = Session::new(settings(), t0());
        run(&mut session, 0, 120);
        let id = session.current_break_id().unwrap();
        session.apply(UserAction::Skip { break_id: id }, t0() + Duration::seconds(121));
        assert_eq!(session.burnout().level, BurnoutLevel::Warning);
    }

    #[test]
    fn repeated_skips_escalate_to_critical_and_lock() {
        let mut session = Session::new(settings(), t0());
        let mut secs = 0;
        for _ in 0..3 {
            run(&mut session, secs, 60);
            secs += 60;
            let id = session.current_break_id().unwrap();
            session.apply(
                UserAction::Skip { break_id: id },
                t0() + Duration::seconds(secs as i64),
            );
        }
        assert_eq!(session.burnout().level, BurnoutLevel::Critical);
        assert!(session
            .burnout()
            .triggers
            .contains(&TriggerReason::SkipsCritical));

        let events = run(&mut session, secs, 30);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SafeModeLocked { .. })));
        assert!(session.is_locked());
    }

    #[test]
    fn new_trigger_at_same_level_is_published() {
        let mut session = Session::new(settings(), t0());
        run(&mut session, 0, 60);
        let id = session.current_break_id().unwrap();
        session.apply(UserAction::Skip { break_id: id }, t0() + Duration::seconds(60));

        run(&mut session, 60, 60);
        assert_eq!(session.burnout().level, BurnoutLevel::Warning);
        let id = session.current_break_id().unwrap();
        let events = session.apply(UserAction::Skip { break_id: id }, t0() + Duration::seconds(120));

        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::BurnoutChanged { .. })));
        let changed = events
            .iter()
            .find(|e| matches!(e, Event::BurnoutTriggersChanged { .. }));
        match changed {
            Some(Event::BurnoutTriggersChanged { level, triggers, .. }) => {
                assert_eq!(*level, BurnoutLevel::Warning);
                assert_eq!(
                    triggers,
                    &vec![TriggerReason::ElapsedWarning, TriggerReason::SkipsWarning]
                );
            }
            other => panic!("expected BurnoutTriggersChanged, got {other:?}"),
        }
    }

    #[test]
    fn locked_session_blocks_break_actions_until_unlock() {
        let mut session = Session::new(settings(), t0());
        run(&mut session, 0, 240 + 30);
        assert!(session.is_locked());

        let id = session.current_break_id().unwrap();
        let now = t0() + Duration::seconds(271);
        assert!(session
            .apply(UserAction::Complete { break_id: id }, now)
            .is_empty());
        assert!(session.breaks().active_break().is_some());

        let events = session.apply(UserAction::Unlock, now);
        assert!(matches!(events.first(), Some(Event::SafeModeUnlocked { .. })));
        assert!(!session.is_locked());

        let events = session.apply(UserAction::Complete { break_id: id }, now);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::BreakCompleted { .. })));
    }

    #[test]
    fn observers_see_every_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut session = Session::new(settings(), t0());
        session.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        let events = run(&mut session, 0, 60);
        assert_eq!(*seen.lock().unwrap(), events);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut session = Session::new(settings(), t0());
        run(&mut session, 0, 10);
        match session.snapshot(t0()) {
            Event::StateSnapshot {
                elapsed_secs,
                is_idle,
                current_break,
                safe_mode_locked,
                ..
            } => {
                assert_eq!(elapsed_secs, 10);
                assert!(!is_idle);
                assert!(current_break.is_none());
                assert!(!safe_mode_locked);
            }
            other => panic!("expected StateSnapshot, got {other:?}"),
        }
    }
}
