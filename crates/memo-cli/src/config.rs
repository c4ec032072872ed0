//! Application configuration persistence.
//!
//! This module re-exports the unified configuration from memo-core.

pub use memo_core::config::save_config;

use memo_core::AppConfig;
use memo_core::config::{backup_corrupted_config, get_config_path, load_config_from};

/// Load the configuration, falling back to defaults if the file is unreadable.
///
/// A corrupted file is copied aside so the next save does not lose it.
pub fn load_or_default() -> AppConfig {
    let path = match get_config_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("No config location: {}", e);
            return AppConfig::default();
        }
    };

    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config {}: {}", path.display(), e);
            match backup_corrupted_config(&path) {
                Ok(backup) => tracing::warn!("Corrupted config saved to {}", backup.display()),
                Err(e) => tracing::warn!("Could not back up config: {}", e),
            }
            AppConfig::default()
        }
    }
}
