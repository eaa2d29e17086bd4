//! Integration tests for the session scheduler.
//!
//! Drives a `Session` second by second through whole scenarios: breaks
//! falling due, snoozes re-arming, burnout escalating and safe mode locking.

use chrono::{DateTime, Duration, Utc};
use skillos_core::presenter::{present, NotificationChannel, NotificationKind, PresenterOptions};
use skillos_core::session::{BreakPolicy, BurnoutThresholds};
use skillos_core::{BurnoutLevel, Event, Session, SessionSettings, TriggerReason, UserAction};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn at(secs: u64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs as i64)
}

/// Tick seconds `from+1..=to`, recording activity every minute so the
/// session never goes idle.
fn drive(session: &mut Session, from: u64, to: u64) -> Vec<(u64, Event)> {
    let mut out = Vec::new();
    for s in from + 1..=to {
        out.extend(session.tick(at(s)).into_iter().map(|e| (s, e)));
        if s % 60 == 0 {
            out.extend(session.apply(UserAction::Activity, at(s)).into_iter().map(|e| (s, e)));
        }
    }
    out
}

fn first<'a>(events: &'a [(u64, Event)], pred: impl Fn(&Event) -> bool) -> Option<&'a (u64, Event)> {
    events.iter().find(|(_, e)| pred(e))
}

fn quick_settings() -> SessionSettings {
    SessionSettings {
        idle_threshold_secs: 100_000,
        breaks: BreakPolicy {
            interval_secs: 60,
            history_limit: 16,
        },
        burnout: BurnoutThresholds {
            warning_after_secs: 100_000,
            critical_after_secs: 200_000,
            warning_skips: 2,
            critical_skips: 4,
            skip_window_secs: 3600,
        },
        grace_secs: 30,
        default_snooze_min: 5,
    }
}

#[test]
fn test_fresh_session_is_calm() {
    let session = Session::new(SessionSettings::default(), t0());
    match session.snapshot(t0()) {
        Event::StateSnapshot {
            elapsed_secs,
            is_idle,
            current_break,
            burnout,
            safe_mode_locked,
            ..
        } => {
            assert_eq!(elapsed_secs, 0);
            assert!(!is_idle);
            assert!(current_break.is_none());
            assert_eq!(burnout.level, BurnoutLevel::Normal);
            assert!(burnout.triggers.is_empty());
            assert!(!safe_mode_locked);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
}

#[test]
fn test_long_session_escalates_and_locks_with_defaults() {
    let mut session = Session::new(SessionSettings::default(), t0());
    let events = drive(&mut session, 0, 3 * 3600 + 200);

    let (warn_at, _) = first(&events, |e| {
        matches!(e, Event::BurnoutChanged { to: BurnoutLevel::Warning, .. })
    })
    .expect("warning");
    assert_eq!(*warn_at, 90 * 60);

    let (crit_at, crit) = first(&events, |e| {
        matches!(e, Event::BurnoutChanged { to: BurnoutLevel::Critical, .. })
    })
    .expect("critical");
    assert_eq!(*crit_at, 180 * 60);
    if let Event::BurnoutChanged { triggers, .. } = crit {
        assert_eq!(triggers, &vec![TriggerReason::ElapsedCritical]);
    }

    let (lock_at, _) =
        first(&events, |e| matches!(e, Event::SafeModeLocked { .. })).expect("locked");
    assert_eq!(*lock_at, 180 * 60 + 120);
    assert!(session.is_locked());

    // The first break fell due at 50 minutes and was never answered.
    let dues = events
        .iter()
        .filter(|(_, e)| matches!(e, Event::BreakDue { .. }))
        .count();
    assert_eq!(dues, 1);
}

#[test]
fn test_locked_session_only_accepts_unlock() {
    let mut settings = quick_settings();
    settings.breaks.interval_secs = 100_000;
    settings.burnout.warning_after_secs = 120;
    settings.burnout.critical_after_secs = 240;
    let mut session = Session::new(settings, t0());

    let events = drive(&mut session, 0, 269);
    assert!(first(&events, |e| matches!(e, Event::SafeModeLocked { .. })).is_none());
    let events = drive(&mut session, 269, 270);
    assert!(first(&events, |e| matches!(e, Event::SafeModeLocked { .. })).is_some());

    assert!(session.apply(UserAction::Acknowledge, at(271)).is_empty());
    assert!(session.is_locked());

    let events = session.apply(UserAction::Unlock, at(300));
    assert!(matches!(
        events.as_slice(),
        [Event::SafeModeUnlocked { locked_secs: 30, .. }]
    ));
    assert!(!session.is_locked());

    // Still critical, so the grace window starts over from the unlock.
    let events = drive(&mut session, 300, 400);
    let (relock_at, _) =
        first(&events, |e| matches!(e, Event::SafeModeLocked { .. })).expect("relocked");
    assert_eq!(*relock_at, 330);
}

#[test]
fn test_acknowledging_critical_prompt_defers_lock() {
    let mut settings = quick_settings();
    settings.breaks.interval_secs = 100_000;
    settings.burnout.warning_after_secs = 120;
    settings.burnout.critical_after_secs = 240;
    let mut session = Session::new(settings, t0());

    drive(&mut session, 0, 260);
    session.apply(UserAction::Acknowledge, at(260));
    let events = drive(&mut session, 260, 320);
    let (lock_at, _) =
        first(&events, |e| matches!(e, Event::SafeModeLocked { .. })).expect("locked");
    assert_eq!(*lock_at, 290);
}

#[test]
fn test_snoozed_break_rearms_after_five_minutes() {
    let mut session = Session::new(quick_settings(), t0());
    let events = drive(&mut session, 0, 60);
    let (_, due) = first(&events, |e| matches!(e, Event::BreakDue { .. })).expect("due");
    let Event::BreakDue { break_id, .. } = *due else {
        unreachable!()
    };

    let snoozed = session.apply(
        UserAction::Snooze {
            break_id,
            minutes: None,
        },
        at(60),
    );
    assert!(matches!(
        snoozed.as_slice(),
        [Event::BreakSnoozed { until, .. }] if *until == at(360)
    ));

    let events = drive(&mut session, 60, 359);
    assert!(first(&events, |e| matches!(e, Event::BreakRearmed { .. })).is_none());
    let events = drive(&mut session, 359, 360);
    let (_, rearmed) =
        first(&events, |e| matches!(e, Event::BreakRearmed { .. })).expect("rearmed");
    assert!(matches!(rearmed, Event::BreakRearmed { break_id: id, .. } if *id == break_id));
    assert_eq!(session.breaks().active_break().map(|b| b.id), Some(break_id));
}

#[test]
fn test_repeated_skips_reach_critical_early() {
    let mut session = Session::new(quick_settings(), t0());
    let mut levels = Vec::new();

    for round in 1..=4u64 {
        let due_at = round * 60;
        drive(&mut session, due_at - 60, due_at);
        let id = session.current_break_id().expect("break due");
        for event in session.apply(UserAction::Skip { break_id: id }, at(due_at)) {
            if let Event::BurnoutChanged { to, .. } = event {
                levels.push((round, to));
            }
        }
    }

    assert_eq!(
        levels,
        vec![(2, BurnoutLevel::Warning), (4, BurnoutLevel::Critical)]
    );
    assert!(session
        .burnout()
        .triggers
        .contains(&TriggerReason::SkipsCritical));
    assert!(session.clock().elapsed_secs() < 300);
}

#[test]
fn test_completion_acknowledges_warning() {
    let mut settings = quick_settings();
    settings.burnout.warning_after_secs = 50;
    let mut session = Session::new(settings, t0());

    drive(&mut session, 0, 60);
    assert_eq!(session.burnout().level, BurnoutLevel::Warning);

    let id = session.current_break_id().unwrap();
    let events = session.apply(UserAction::Complete { break_id: id }, at(61));
    assert!(matches!(events[0], Event::BreakCompleted { .. }));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::BurnoutChanged {
            to: BurnoutLevel::Normal,
            ..
        }
    )));

    // A second completion of the same break is a no-op.
    assert!(session
        .apply(UserAction::Complete { break_id: id }, at(62))
        .is_empty());
}

#[test]
fn test_events_flow_to_observers_and_presenter() {
    use std::sync::{Arc, Mutex};

    let mut session = Session::new(quick_settings(), t0());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session.subscribe(move |event| {
        if let Some(n) = present(event, &PresenterOptions::default()) {
            sink.lock().unwrap().push(n);
        }
    });

    drive(&mut session, 0, 60);
    let notifications = seen.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    let prompt = &notifications[0];
    assert_eq!(prompt.kind, NotificationKind::BreakPrompt);
    assert_eq!(prompt.channel, NotificationChannel::Toast);
    let labels: Vec<_> = prompt.actions.iter().map(|a| a.label.as_str()).collect();
    assert_eq!(labels, ["Done", "Snooze 5m", "Skip"]);
}

#[test]
fn test_idle_time_does_not_count() {
    let mut settings = quick_settings();
    settings.idle_threshold_secs = 300;
    settings.breaks.interval_secs = 100_000;
    let mut session = Session::new(settings, t0());

    let mut events = Vec::new();
    for s in 1..=900 {
        events.extend(session.tick(at(s)));
    }
    assert!(session.clock().is_idle());
    assert_eq!(session.clock().elapsed_secs(), 299);

    let resumed = session.apply(UserAction::Activity, at(901));
    assert!(matches!(
        resumed.as_slice(),
        [Event::IdleEnded { idle_secs: 901, .. }]
    ));
    session.tick(at(902));
    assert_eq!(session.clock().elapsed_secs(), 300);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::IdleStarted { .. }))
            .count(),
        1
    );
}
