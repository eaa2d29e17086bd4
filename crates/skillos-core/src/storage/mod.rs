mod config;
pub mod keyring_store;

pub use config::{
    BackendConfig, BreaksConfig, BurnoutConfig, Config, EmbeddingConfig, LoggingConfig,
    SafeModeConfig, SessionConfig,
};

use std::path::PathBuf;

/// Returns the SkillOS data directory.
///
/// `SKILLOS_CONFIG_DIR` overrides everything. Otherwise this is
/// `~/.config/skillos[-dev]/`, with the `-dev` suffix when `SKILLOS_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("SKILLOS_CONFIG_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("SKILLOS_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("skillos-dev")
            } else {
                base_dir.join("skillos")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
