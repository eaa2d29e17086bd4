//! Core error types for skillos-core.
//!
//! Nothing in this crate is fatal: every variant here is recoverable by the
//! caller and can be retried by the user. Invalid scheduler transitions are
//! not errors at all; they surface as `None` from the transition methods.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for skillos-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bad local input, rejected before any network call
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Hosted auth provider rejected the request
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Embedding service failures
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Collaborator unreachable or returned an unexpected status
    #[error("Network error for '{service}': {message}")]
    Network { service: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Keyring access errors
    #[error("Credential store error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

impl CoreError {
    pub fn network(service: &str, message: impl Into<String>) -> Self {
        CoreError::Network {
            service: service.to_string(),
            message: message.into(),
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Phone number is not E.164 after sanitizing
    #[error("Please enter a valid phone number in E.164 format (e.g., +1234567890)")]
    InvalidPhone { input: String },

    /// Email or password missing
    #[error("Please fill in all fields")]
    MissingCredentials,

    /// OTP code is not a 6-digit code
    #[error("Verification code must be {expected} digits")]
    InvalidOtp { expected: usize },

    /// OTP resend attempted during the cooldown
    #[error("Please wait {remaining_secs}s before requesting a new code")]
    OtpCooldown { remaining_secs: u64 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors reported by the hosted auth provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Too many requests in a short period
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Provider rejected the request with a message
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// No stored session to act on
    #[error("Not signed in")]
    NotSignedIn,
}

impl AuthError {
    /// Message suitable for the dismissible error banner.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::RateLimit => {
                "Too many attempts. Please wait a moment before trying again.".to_string()
            }
            AuthError::Rejected { message, .. } => message.clone(),
            AuthError::NotSignedIn => "You are not signed in.".to_string(),
        }
    }
}

/// Embedding service errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    /// Request carried no content
    #[error("Missing content")]
    MissingContent,

    /// API key environment variable is not set
    #[error("Embedding API key not configured (expected env var {env_var})")]
    MissingApiKey { env_var: String },

    /// Upstream provider or transport failure
    #[error("{message}")]
    Upstream { message: String },
}

impl EmbeddingError {
    /// HTTP status equivalent, for callers exposing this over HTTP.
    pub fn status_code(&self) -> u16 {
        match self {
            EmbeddingError::MissingContent => 400,
            EmbeddingError::MissingApiKey { .. } => 500,
            EmbeddingError::Upstream { .. } => 502,
        }
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::Upstream {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Config(ConfigError::InvalidValue {
            key: "<file>".to_string(),
            message: err.to_string(),
        })
    }
}

impl From<toml::ser::Error> for CoreError {
    fn from(err: toml::ser::Error) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
