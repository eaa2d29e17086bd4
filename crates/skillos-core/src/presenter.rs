//! Notification presenter.
//!
//! Pure translation between session events and a human-observable surface.
//! Owns no state transitions: [`present`] maps an [`Event`] to a
//! [`Notification`] descriptor, and every prompt action carries the
//! [`UserAction`] that should be routed back into [`crate::Session::apply`].
//!
//! ## Channels
//!
//! - **Badge**: passive status indicator
//! - **Toast**: dismissible notification with optional actions
//! - **Lockout**: full-screen recovery surface; only unlock is offered

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::session::{BurnoutLevel, TriggerReason, UserAction};

/// Notification channel type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Badge,
    Toast,
    Lockout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BreakPrompt,
    BurnoutWarning,
    BurnoutCritical,
    BurnoutCleared,
    SafeMode,
    SafeModeCleared,
}

/// A button on a notification and the action it routes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptAction {
    pub label: String,
    pub action: UserAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub channel: NotificationChannel,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub actions: Vec<PromptAction>,
    /// Auto-dismiss delay; `None` stays until acted on.
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Presenter options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenterOptions {
    /// Minutes offered on the snooze button.
    pub snooze_min: u32,
}

impl Default for PresenterOptions {
    fn default() -> Self {
        Self { snooze_min: 5 }
    }
}

/// Translate one event. Events with no visible surface return `None`.
pub fn present(event: &Event, options: &PresenterOptions) -> Option<Notification> {
    match event {
        Event::BreakDue { break_id, .. } | Event::BreakRearmed { break_id, .. } => {
            let break_id = *break_id;
            Some(Notification {
                kind: NotificationKind::BreakPrompt,
                channel: NotificationChannel::Toast,
                title: "Break Time".to_string(),
                body: "You've been active for a while. Step away for a few minutes."
                    .to_string(),
                actions: vec![
                    PromptAction {
                        label: "Done".to_string(),
                        action: UserAction::Complete { break_id },
                    },
                    PromptAction {
                        label: format!("Snooze {}m", options.snooze_min),
                        action: UserAction::Snooze {
                            break_id,
                            minutes: Some(options.snooze_min),
                        },
                    },
                    PromptAction {
                        label: "Skip".to_string(),
                        action: UserAction::Skip { break_id },
                    },
                ],
                duration_ms: None,
            })
        }
        Event::BurnoutChanged { to, .. } => Some(burnout_notification(*to)),
        Event::SafeModeLocked { triggers, .. } => Some(Notification {
            kind: NotificationKind::SafeMode,
            channel: NotificationChannel::Lockout,
            title: "Safe Mode Engaged".to_string(),
            body: describe_triggers(triggers),
            actions: vec![PromptAction {
                label: "I have rested - unlock".to_string(),
                action: UserAction::Unlock,
            }],
            duration_ms: None,
        }),
        Event::SafeModeUnlocked { .. } => Some(Notification {
            kind: NotificationKind::SafeModeCleared,
            channel: NotificationChannel::Badge,
            title: "Safe Mode Released".to_string(),
            body: "Welcome back. Pace yourself.".to_string(),
            actions: Vec::new(),
            duration_ms: Some(3000),
        }),
        _ => None,
    }
}

fn burnout_notification(level: BurnoutLevel) -> Notification {
    match level {
        BurnoutLevel::Warning => Notification {
            kind: NotificationKind::BurnoutWarning,
            channel: NotificationChannel::Toast,
            title: "System Stability Dropping".to_string(),
            body: "Cognitive load is accumulating. Consider a tactical pause.".to_string(),
            actions: Vec::new(),
            duration_ms: Some(5000),
        },
        BurnoutLevel::Critical => Notification {
            kind: NotificationKind::BurnoutCritical,
            channel: NotificationChannel::Toast,
            title: "Critical System Stress".to_string(),
            body: "Burnout imminent. Protocol recommends immediate cooldown.".to_string(),
            actions: vec![PromptAction {
                label: "Take Break".to_string(),
                action: UserAction::Acknowledge,
            }],
            duration_ms: Some(8000),
        },
        BurnoutLevel::Normal => Notification {
            kind: NotificationKind::BurnoutCleared,
            channel: NotificationChannel::Badge,
            title: "System Stable".to_string(),
            body: "Load is back to normal.".to_string(),
            actions: Vec::new(),
            duration_ms: Some(3000),
        },
    }
}

/// One line per trigger, for the recovery screen.
pub fn describe_triggers(triggers: &[TriggerReason]) -> String {
    if triggers.is_empty() {
        return "Sustained critical load detected.".to_string();
    }
    triggers
        .iter()
        .map(|t| format!("- {}", t.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `"{h}h {m}m"`
pub fn format_uptime(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    format!("{h}h {m}m")
}

/// The always-visible uptime pill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusLine {
    Idle,
    Uptime { text: String },
}

impl StatusLine {
    pub fn new(elapsed_secs: u64, is_idle: bool) -> Self {
        if is_idle {
            StatusLine::Idle
        } else {
            StatusLine::Uptime {
                text: format_uptime(elapsed_secs),
            }
        }
    }
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusLine::Idle => write!(f, "IDLE"),
            StatusLine::Uptime { text } => write!(f, "UPTIME: {text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn break_prompt_routes_actions_to_break_id() {
        let break_id = Uuid::new_v4();
        let event = Event::BreakDue {
            break_id,
            scheduled_at: Utc::now(),
            elapsed_secs: 3000,
            at: Utc::now(),
        };
        let n = present(&event, &PresenterOptions { snooze_min: 10 }).unwrap();
        assert_eq!(n.kind, NotificationKind::BreakPrompt);
        assert_eq!(n.channel, NotificationChannel::Toast);
        assert_eq!(
            n.actions.iter().map(|a| a.action).collect::<Vec<_>>(),
            vec![
                UserAction::Complete { break_id },
                UserAction::Snooze {
                    break_id,
                    minutes: Some(10)
                },
                UserAction::Skip { break_id },
            ]
        );
        assert_eq!(n.actions[1].label, "Snooze 10m");
    }

    #[test]
    fn burnout_toasts_match_levels() {
        let warn = burnout_notification(BurnoutLevel::Warning);
        assert_eq!(warn.title, "System Stability Dropping");
        assert_eq!(warn.duration_ms, Some(5000));

        let crit = burnout_notification(BurnoutLevel::Critical);
        assert_eq!(crit.title, "Critical System Stress");
        assert_eq!(crit.duration_ms, Some(8000));
        assert_eq!(crit.actions[0].action, UserAction::Acknowledge);
    }

    #[test]
    fn safe_mode_uses_lockout_with_only_unlock() {
        let event = Event::SafeModeLocked {
            triggers: vec![TriggerReason::SkipsCritical],
            at: Utc::now(),
        };
        let n = present(&event, &PresenterOptions::default()).unwrap();
        assert_eq!(n.channel, NotificationChannel::Lockout);
        assert_eq!(n.actions.len(), 1);
        assert_eq!(n.actions[0].action, UserAction::Unlock);
        assert!(n.body.contains("Repeatedly skipping breaks"));
    }

    #[test]
    fn status_events_are_silent() {
        let event = Event::IdleStarted {
            elapsed_secs: 10,
            at: Utc::now(),
        };
        assert!(present(&event, &PresenterOptions::default()).is_none());
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(0), "0h 0m");
        assert_eq!(format_uptime(3599), "0h 59m");
        assert_eq!(format_uptime(3 * 3600 + 25 * 60 + 7), "3h 25m");
        assert_eq!(StatusLine::new(3700, false).to_string(), "UPTIME: 1h 1m");
        assert_eq!(StatusLine::new(3700, true).to_string(), "IDLE");
    }
}
