//! Async driver for a [`Session`].
//!
//! One tokio task owns the session. It ticks it once per second and applies
//! user actions as they arrive. Everything runs on that single task, so no
//! two transitions interleave. The `select!` is biased: cancellation is
//! checked first, then queued user actions, then the tick, so an explicit
//! `Complete` always wins over a break falling due in the same instant.
//!
//! ```ignore
//! let handle = SessionDriver::new(settings).spawn();
//! let mut events = handle.subscribe();
//! handle.send(UserAction::Activity)?;
//! handle.shutdown().await;
//! ```
//!
//! Dropping the [`SessionHandle`] cancels the task, so no timer can fire
//! against a torn-down session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::session::{Session, SessionSettings, UserAction, TICK_INTERVAL_MS};

const EVENT_CAPACITY: usize = 256;

enum Command {
    Action(UserAction),
    Snapshot(oneshot::Sender<Event>),
}

/// Wall clock anchored to the runtime's monotonic clock at spawn time.
#[derive(Debug, Clone, Copy)]
struct AnchoredClock {
    wall: DateTime<Utc>,
    instant: Instant,
}

impl AnchoredClock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            instant: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.instant.elapsed()).unwrap_or_default();
        self.wall + offset
    }
}

pub struct SessionDriver {
    settings: SessionSettings,
    tick_interval: Duration,
}

impl SessionDriver {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
        }
    }

    /// Spawn the session task on the current tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        let clock = AnchoredClock::start();
        let session = Session::new(self.settings, clock.now());
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let cancel = CancellationToken::new();

        let join = tokio::spawn(session_loop(
            session,
            clock,
            self.tick_interval,
            action_rx,
            event_tx.clone(),
            cancel.clone(),
        ));

        SessionHandle {
            actions: action_tx,
            events: event_tx,
            cancel,
            join: Some(join),
        }
    }
}

async fn session_loop(
    mut session: Session,
    clock: AnchoredClock,
    tick_interval: Duration,
    mut actions: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<Event>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + tick_interval, tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("session loop cancelled");
                break;
            }
            command = actions.recv() => {
                let Some(command) = command else {
                    tracing::debug!("session handle dropped; stopping loop");
                    break;
                };
                match command {
                    Command::Action(action) => {
                        publish(&events, session.apply(action, clock.now()));
                    }
                    Command::Snapshot(reply) => {
                        let _ = reply.send(session.snapshot(clock.now()));
                    }
                }
            }
            _ = ticker.tick() => {
                if cancel.is_cancelled() {
                    break;
                }
                publish(&events, session.tick(clock.now()));
            }
        }
    }
}

fn publish(tx: &broadcast::Sender<Event>, events: Vec<Event>) {
    for event in events {
        // No subscribers is fine; the event is simply dropped.
        let _ = tx.send(event);
    }
}

/// Scoped handle to a running session. Cancels the task on drop.
pub struct SessionHandle {
    actions: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<Event>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Queue a user action ahead of the next tick.
    pub fn send(&self, action: UserAction) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Custom("session is shut down".into()));
        }
        self.actions
            .send(Command::Action(action))
            .map_err(|_| CoreError::Custom("session is shut down".into()))
    }

    pub async fn snapshot(&self) -> Result<Event> {
        let (tx, rx) = oneshot::channel();
        self.actions
            .send(Command::Snapshot(tx))
            .map_err(|_| CoreError::Custom("session is shut down".into()))?;
        rx.await
            .map_err(|_| CoreError::Custom("session is shut down".into()))
    }

    /// Cancel the timer and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!("session task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
