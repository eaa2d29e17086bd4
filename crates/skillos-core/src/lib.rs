//! # SkillOS Core Library
//!
//! Session scheduling for long learning sessions: it counts active time,
//! prompts for breaks, estimates burnout risk and locks the session into
//! safe mode when the risk stays critical. The CLI is a thin front end over
//! this crate.
//!
//! ## Architecture
//!
//! - **Session**: a wall-clock-driven state machine. The caller invokes
//!   `tick()` once per second and routes user actions through `apply()`
//! - **Runtime**: an async driver that owns a [`Session`] and ticks it on a
//!   tokio timer
//! - **Presenter**: maps events to notifications (badge, toast, lockout)
//! - **Collaborators**: hosted auth, the learning-log store and the
//!   embedding API, all reached over HTTP
//! - **Storage**: TOML configuration and the OS keyring
//!
//! ## Key Components
//!
//! - [`Session`]: uptime, breaks, burnout and safe mode in one container
//! - [`SessionDriver`]: spawns the ticking task and returns a [`SessionHandle`]
//! - [`present`]: event to [`Notification`]
//! - [`Config`]: application configuration management

pub mod auth;
pub mod backend;
pub mod embedding;
pub mod error;
pub mod events;
pub mod knowledge;
pub mod presenter;
pub mod runtime;
pub mod session;
pub mod storage;

pub use auth::{AuthFlow, AuthOutcome, AuthProvider, AuthSession, HostedAuthClient};
pub use backend::BackendClient;
pub use embedding::{spawn_embedding_job, EmbeddingClient, EmbeddingRequest};
pub use error::{AuthError, ConfigError, CoreError, EmbeddingError, ValidationError};
pub use events::Event;
pub use knowledge::{KnowledgeGraph, KnowledgeStore, LogRecord, SearchMatch};
pub use presenter::{present, Notification, NotificationChannel, NotificationKind, StatusLine};
pub use runtime::{SessionDriver, SessionHandle};
pub use session::{
    Break, BreakState, BurnoutLevel, BurnoutState, Session, SessionSettings, TriggerReason,
    UserAction,
};
pub use storage::Config;
