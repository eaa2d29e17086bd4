//! TOML-based application configuration.
//!
//! Stores:
//! - Idle, break and burnout thresholds for the session scheduler
//! - Safe mode grace window
//! - Hosted backend and embedding endpoints
//! - Log level
//!
//! Configuration is stored at `~/.config/skillos/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::presenter::PresenterOptions;
use crate::session::{BreakPolicy, BurnoutThresholds, SessionSettings, MAX_GRACE_SECS};

/// Idle tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,
}

/// Break scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreaksConfig {
    /// Active minutes between breaks.
    #[serde(default = "default_interval_min")]
    pub interval_min: u32,
    #[serde(default = "default_snooze_min")]
    pub snooze_min: u32,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

/// Burnout estimator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnoutConfig {
    #[serde(default = "default_warning_after_min")]
    pub warning_after_min: u32,
    #[serde(default = "default_critical_after_min")]
    pub critical_after_min: u32,
    #[serde(default = "default_warning_skips")]
    pub warning_skips: u32,
    #[serde(default = "default_critical_skips")]
    pub critical_skips: u32,
    #[serde(default = "default_skip_window_min")]
    pub skip_window_min: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeModeConfig {
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

/// Hosted database/auth backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,
    /// Public anon key sent as `apikey`.
    #[serde(default)]
    pub anon_key: String,
}

/// Third-party embedding API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_api_base")]
    pub api_base: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Name of the env var holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Name of the env var holding the backend service key used for write-back.
    #[serde(default = "default_service_key_env")]
    pub service_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `skillos_core=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/skillos/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub breaks: BreaksConfig,
    #[serde(default)]
    pub burnout: BurnoutConfig,
    #[serde(default)]
    pub safe_mode: SafeModeConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_idle_threshold_secs() -> u64 {
    300
}
fn default_interval_min() -> u32 {
    50
}
fn default_snooze_min() -> u32 {
    5
}
fn default_history_limit() -> usize {
    64
}
fn default_warning_after_min() -> u32 {
    90
}
fn default_critical_after_min() -> u32 {
    180
}
fn default_warning_skips() -> u32 {
    2
}
fn default_critical_skips() -> u32 {
    4
}
fn default_skip_window_min() -> u32 {
    120
}
fn default_grace_secs() -> u64 {
    120
}
fn default_embedding_api_base() -> String {
    "https://api.openai.com".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_service_key_env() -> String {
    "SKILLOS_SERVICE_ROLE_KEY".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: default_idle_threshold_secs(),
        }
    }
}

impl Default for BreaksConfig {
    fn default() -> Self {
        Self {
            interval_min: default_interval_min(),
            snooze_min: default_snooze_min(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for BurnoutConfig {
    fn default() -> Self {
        Self {
            warning_after_min: default_warning_after_min(),
            critical_after_min: default_critical_after_min(),
            warning_skips: default_warning_skips(),
            critical_skips: default_critical_skips(),
            skip_window_min: default_skip_window_min(),
        }
    }
}

impl Default for SafeModeConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_grace_secs(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: default_embedding_api_base(),
            model: default_embedding_model(),
            api_key_env: default_api_key_env(),
            service_key_env: default_service_key_env(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation, or if the default config cannot be written.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("falling back to default config: {e}");
                Self::default()
            }
        }
    }

    /// Check ordering constraints between thresholds.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let b = &self.burnout;
        if b.warning_after_min >= b.critical_after_min {
            return Err(ConfigError::InvalidValue {
                key: "burnout.warning_after_min".into(),
                message: format!(
                    "must be below burnout.critical_after_min ({})",
                    b.critical_after_min
                ),
            });
        }
        if b.warning_skips >= b.critical_skips {
            return Err(ConfigError::InvalidValue {
                key: "burnout.warning_skips".into(),
                message: format!("must be below burnout.critical_skips ({})", b.critical_skips),
            });
        }
        if self.breaks.interval_min == 0 {
            return Err(ConfigError::InvalidValue {
                key: "breaks.interval_min".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.safe_mode.grace_secs > MAX_GRACE_SECS {
            return Err(ConfigError::InvalidValue {
                key: "safe_mode.grace_secs".into(),
                message: format!("must be at most {MAX_GRACE_SECS}"),
            });
        }
        if self.session.idle_threshold_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "session.idle_threshold_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value in memory. The result must still validate.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)?;
        self.save()
    }

    pub fn session_settings(&self) -> SessionSettings {
        let b = &self.burnout;
        SessionSettings {
            idle_threshold_secs: self.session.idle_threshold_secs,
            breaks: BreakPolicy {
                interval_secs: u64::from(self.breaks.interval_min) * 60,
                history_limit: self.breaks.history_limit,
            },
            burnout: BurnoutThresholds {
                warning_after_secs: u64::from(b.warning_after_min) * 60,
                critical_after_secs: u64::from(b.critical_after_min) * 60,
                warning_skips: b.warning_skips,
                critical_skips: b.critical_skips,
                skip_window_secs: u64::from(b.skip_window_min) * 60,
            },
            grace_secs: self.safe_mode.grace_secs,
            default_snooze_min: self.breaks.snooze_min,
        }
    }

    pub fn presenter_options(&self) -> PresenterOptions {
        PresenterOptions {
            snooze_min: self.breaks.snooze_min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.breaks.interval_min, 50);
        assert_eq!(parsed.embedding.model, "text-embedding-3-small");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[breaks]\ninterval_min = 25\n").unwrap();
        assert_eq!(parsed.breaks.interval_min, 25);
        assert_eq!(parsed.breaks.snooze_min, 5);
        assert_eq!(parsed.safe_mode.grace_secs, 120);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("breaks.interval_min").as_deref(), Some("50"));
        assert_eq!(cfg.get("logging.level").as_deref(), Some("info"));
        assert!(cfg.get("breaks.missing_key").is_none());
    }

    #[test]
    fn set_value_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.set_value("safe_mode.grace_secs", "30").unwrap();
        assert_eq!(cfg.safe_mode.grace_secs, 30);
    }

    #[test]
    fn set_value_updates_nested_string() {
        let mut cfg = Config::default();
        cfg.set_value("backend.url", "https://demo.supabase.co").unwrap();
        assert_eq!(cfg.backend.url, "https://demo.supabase.co");
    }

    #[test]
    fn set_value_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.set_value("breaks.nonexistent", "1").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn set_value_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set_value("breaks.interval_min", "soon").is_err());
        assert_eq!(cfg.breaks.interval_min, 50);
    }

    #[test]
    fn set_value_rejects_inverted_thresholds() {
        let mut cfg = Config::default();
        assert!(cfg.set_value("burnout.warning_after_min", "200").is_err());
        assert!(cfg.set_value("burnout.critical_skips", "1").is_err());
        assert_eq!(cfg.burnout.warning_after_min, 90);
    }

    #[test]
    fn set_value_rejects_unbounded_grace() {
        let mut cfg = Config::default();
        let err = cfg
            .set_value("safe_mode.grace_secs", "10000000000000000")
            .unwrap_err();
        assert!(err.to_string().contains("safe_mode.grace_secs"));
        assert_eq!(cfg.safe_mode.grace_secs, 120);

        cfg.set_value("safe_mode.grace_secs", &MAX_GRACE_SECS.to_string())
            .unwrap();
        assert_eq!(cfg.safe_mode.grace_secs, MAX_GRACE_SECS);
    }

    #[test]
    fn session_settings_convert_minutes() {
        let s = Config::default().session_settings();
        assert_eq!(s.breaks.interval_secs, 50 * 60);
        assert_eq!(s.burnout.warning_after_secs, 90 * 60);
        assert_eq!(s.burnout.critical_after_secs, 180 * 60);
        assert_eq!(s.burnout.skip_window_secs, 120 * 60);
        assert_eq!(s.default_snooze_min, 5);
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.breaks.interval_min, 50);

        let mut cfg = cfg;
        cfg.set_value("breaks.interval_min", "25").unwrap();
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().breaks.interval_min, 25);
    }

    #[test]
    fn load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[burnout]\nwarning_skips = 9\ncritical_skips = 3\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
