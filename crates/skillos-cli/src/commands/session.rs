use std::time::Duration;

use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use serde::Serialize;
use skillos_core::presenter::{present, Notification, NotificationChannel, PresenterOptions, StatusLine};
use skillos_core::{BurnoutLevel, Config, Event, Session, SessionDriver, SessionHandle, UserAction};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::CmdResult;

/// Upper bound for `simulate --minutes`, about ten weeks.
const MAX_SIMULATED_MINUTES: u64 = 100_000;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run a live session. Reads actions from stdin, one per line:
    /// activity, complete, snooze [min], skip, ack, unlock, status, quit
    Run {
        /// Stop after this many seconds
        #[arg(long)]
        for_secs: Option<u64>,
        /// Print raw events as JSON lines instead of notifications
        #[arg(long)]
        json: bool,
    },
    /// Simulate a session against a virtual clock and print a summary
    Simulate {
        /// Length of the simulated session
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_SIMULATED_MINUTES))]
        minutes: u64,
        /// How the simulated user answers break prompts
        #[arg(long, value_enum, default_value = "complete")]
        policy: PromptPolicy,
        /// Minute the user walks away
        #[arg(long, requires = "idle_to")]
        idle_from: Option<u64>,
        /// Minute the user comes back
        #[arg(long, requires = "idle_from")]
        idle_to: Option<u64>,
        /// Also print every event as a JSON line
        #[arg(long)]
        events: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PromptPolicy {
    Complete,
    Skip,
    Snooze,
    Ignore,
}

pub async fn run(action: SessionAction) -> CmdResult {
    match action {
        SessionAction::Run { for_secs, json } => run_live(for_secs, json).await,
        SessionAction::Simulate {
            minutes,
            policy,
            idle_from,
            idle_to,
            events,
        } => {
            let idle = idle_from.zip(idle_to);
            let summary = simulate(&Config::load()?, minutes, policy, idle, events)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

// ── Live session ─────────────────────────────────────────────────────

/// One line of stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Activity,
    Complete,
    Snooze(Option<u32>),
    Skip,
    Ack,
    Unlock,
    Status,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Input::Activity);
    };
    let input = match command.to_ascii_lowercase().as_str() {
        "activity" | "a" => Input::Activity,
        "complete" | "done" => Input::Complete,
        "snooze" => {
            let minutes = words
                .next()
                .map(|m| m.parse::<u32>().map_err(|_| format!("invalid minutes: {m}")))
                .transpose()?;
            Input::Snooze(minutes)
        }
        "skip" => Input::Skip,
        "ack" | "acknowledge" => Input::Ack,
        "unlock" => Input::Unlock,
        "status" => Input::Status,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(input)
}

/// Break actions need the outstanding break; the rest do not.
fn to_action(input: Input, current_break: Option<Uuid>) -> Option<UserAction> {
    match input {
        Input::Activity => Some(UserAction::Activity),
        Input::Ack => Some(UserAction::Acknowledge),
        Input::Unlock => Some(UserAction::Unlock),
        Input::Complete => current_break.map(|break_id| UserAction::Complete { break_id }),
        Input::Snooze(minutes) => {
            current_break.map(|break_id| UserAction::Snooze { break_id, minutes })
        }
        Input::Skip => current_break.map(|break_id| UserAction::Skip { break_id }),
        Input::Status | Input::Quit => None,
    }
}

fn current_break_id(snapshot: &Event) -> Option<Uuid> {
    match snapshot {
        Event::StateSnapshot { current_break, .. } => current_break.as_ref().map(|b| b.id),
        _ => None,
    }
}

fn channel_tag(channel: NotificationChannel) -> &'static str {
    match channel {
        NotificationChannel::Badge => "badge",
        NotificationChannel::Toast => "toast",
        NotificationChannel::Lockout => "LOCKOUT",
    }
}

fn render(notification: &Notification) -> String {
    let mut out = format!(
        "[{}] {}: {}",
        channel_tag(notification.channel),
        notification.title,
        notification.body
    );
    if !notification.actions.is_empty() {
        let labels: Vec<_> = notification.actions.iter().map(|a| a.label.as_str()).collect();
        out.push_str(&format!("\n  options: {}", labels.join(" | ")));
    }
    out
}

fn print_event(event: &Event, options: &PresenterOptions, json: bool) -> CmdResult {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else if let Some(notification) = present(event, options) {
        println!("{}", render(&notification));
    }
    Ok(())
}

fn print_status(snapshot: &Event, json: bool) -> CmdResult {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }
    if let Event::StateSnapshot {
        elapsed_secs,
        is_idle,
        current_break,
        burnout,
        safe_mode_locked,
        ..
    } = snapshot
    {
        println!("{}", StatusLine::new(*elapsed_secs, *is_idle));
        println!("burnout: {}", burnout.level.as_str());
        if let Some(b) = current_break {
            println!("break: {:?}", b.state);
        }
        if *safe_mode_locked {
            println!("safe mode: locked");
        }
    }
    Ok(())
}

/// Returns false when the user asked to quit.
async fn handle_line(handle: &SessionHandle, line: &str, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let input = match parse_input(line) {
        Ok(input) => input,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(true);
        }
    };
    match input {
        Input::Quit => return Ok(false),
        Input::Status => print_status(&handle.snapshot().await?, json)?,
        input => {
            let snapshot = handle.snapshot().await?;
            match to_action(input, current_break_id(&snapshot)) {
                Some(action) => handle.send(action)?,
                None => eprintln!("no break is outstanding"),
            }
        }
    }
    Ok(true)
}

async fn run_live(for_secs: Option<u64>, json: bool) -> CmdResult {
    let config = Config::load()?;
    let options = config.presenter_options();
    let handle = SessionDriver::new(config.session_settings()).spawn();
    let mut events = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    tracing::info!(for_secs, "session started");

    let deadline = async {
        match for_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            received = events.recv() => match received {
                Ok(event) => print_event(&event, &options, json)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if !handle_line(&handle, &line, json).await? {
                        break;
                    }
                }
                // Without a deadline, EOF ends the session.
                None if for_secs.is_none() => break,
                None => stdin_open = false,
            },
        }
    }

    print_status(&handle.snapshot().await?, json)?;
    handle.shutdown().await;
    Ok(())
}

// ── Simulation ───────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
struct SimulationSummary {
    minutes: u64,
    active_secs: u64,
    idle_periods: u32,
    breaks_due: u32,
    breaks_completed: u32,
    breaks_snoozed: u32,
    breaks_skipped: u32,
    peak_burnout: Option<BurnoutLevel>,
    final_burnout: Option<BurnoutLevel>,
    safe_mode_locks: u32,
    locked_at_end: bool,
}

impl SimulationSummary {
    fn record(&mut self, event: &Event) {
        match event {
            Event::IdleStarted { .. } => self.idle_periods += 1,
            Event::BreakDue { .. } => self.breaks_due += 1,
            Event::BreakCompleted { .. } => self.breaks_completed += 1,
            Event::BreakSnoozed { .. } => self.breaks_snoozed += 1,
            Event::BreakSkipped { .. } => self.breaks_skipped += 1,
            Event::BurnoutChanged { to, .. } => {
                self.peak_burnout = self.peak_burnout.max(Some(*to));
            }
            Event::SafeModeLocked { .. } => self.safe_mode_locks += 1,
            _ => {}
        }
    }
}

fn respond(event: &Event, policy: PromptPolicy) -> Option<UserAction> {
    let break_id = match event {
        Event::BreakDue { break_id, .. } | Event::BreakRearmed { break_id, .. } => *break_id,
        _ => return None,
    };
    match policy {
        PromptPolicy::Complete => Some(UserAction::Complete { break_id }),
        PromptPolicy::Skip => Some(UserAction::Skip { break_id }),
        PromptPolicy::Snooze => Some(UserAction::Snooze {
            break_id,
            minutes: None,
        }),
        PromptPolicy::Ignore => None,
    }
}

/// Drive a session second by second. The simulated user is active once a
/// minute, except between `idle` minutes, and answers prompts per `policy`.
fn simulate(
    config: &Config,
    minutes: u64,
    policy: PromptPolicy,
    idle: Option<(u64, u64)>,
    print_events: bool,
) -> Result<SimulationSummary, Box<dyn std::error::Error>> {
    if minutes > MAX_SIMULATED_MINUTES {
        return Err(format!("at most {MAX_SIMULATED_MINUTES} minutes can be simulated").into());
    }
    let start = Utc::now();
    let mut session = Session::new(config.session_settings(), start);
    let mut summary = SimulationSummary {
        minutes,
        peak_burnout: Some(BurnoutLevel::Normal),
        ..SimulationSummary::default()
    };

    for s in 1..=minutes * 60 {
        let now = start + chrono::Duration::seconds(i64::try_from(s)?);
        let mut events = session.tick(now);

        let minute = s / 60;
        let away = idle.is_some_and(|(from, to)| minute >= from && minute < to);
        if s % 60 == 0 && !away {
            events.extend(session.apply(UserAction::Activity, now));
        }

        let responses: Vec<UserAction> = events.iter().filter_map(|e| respond(e, policy)).collect();
        for action in responses {
            events.extend(session.apply(action, now));
        }

        for event in &events {
            summary.record(event);
            if print_events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
    }

    summary.active_secs = session.clock().elapsed_secs();
    summary.final_burnout = Some(session.burnout().level);
    summary.locked_at_end = session.is_locked();
    tracing::debug!(?summary, "simulation finished");
    Ok(summary)
}
