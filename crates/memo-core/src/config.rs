//! Application configuration and persistence utilities.
//!
//! Everything the client remembers between runs lives in one JSON file:
//! - Default chain and claim API location
//! - Identity verification options
//! - Wallets, the wallets the user connected, and the selected account

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::identity::IdentityOptions;
use crate::types::{ChainKey, StoredAccount};

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Other configuration error.
    #[error("{0}")]
    Other(String),
}

/// An account exposed by a configured wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletAccount {
    /// SS58-encoded address.
    pub address: String,
    /// Optional label/name for the account.
    #[serde(default)]
    pub name: Option<String>,
}

/// A named source of accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub name: String,
    #[serde(default)]
    pub accounts: Vec<WalletAccount>,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chain connected to on startup.
    #[serde(default = "default_chain")]
    pub default_chain: ChainKey,
    /// Base URL of the claim-code API.
    #[serde(default = "default_memo_api_url")]
    pub memo_api_url: String,
    /// Directory holding chain spec JSON files (defaults to the data dir).
    #[serde(default)]
    pub chain_spec_dir: Option<PathBuf>,
    /// Identity verification options.
    #[serde(default)]
    pub identity: IdentityOptions,
    /// Wallets accounts can be picked from.
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
    /// Wallets the user connected, restored on startup.
    #[serde(default)]
    pub connected_extensions: Vec<String>,
    /// Last selected account.
    #[serde(default)]
    pub selected_account: Option<StoredAccount>,
}

fn default_chain() -> ChainKey {
    ChainKey::KusamaAssetHub
}

fn default_memo_api_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_chain: default_chain(),
            memo_api_url: default_memo_api_url(),
            chain_spec_dir: None,
            identity: IdentityOptions::default(),
            wallets: Vec::new(),
            connected_extensions: Vec::new(),
            selected_account: None,
        }
    }
}

impl AppConfig {
    /// Directory chain specs are read from.
    pub fn resolved_chain_spec_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.chain_spec_dir {
            Some(dir) => Ok(dir.clone()),
            None => get_chain_spec_dir(),
        }
    }

    /// Find a configured wallet by name.
    pub fn wallet(&self, name: &str) -> Option<&WalletConfig> {
        self.wallets.iter().find(|w| w.name == name)
    }
}

// ==================== Path Utilities ====================

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("xyz", "memo", "memo-claim")
        .ok_or_else(|| ConfigError::Other("Could not determine home directory".to_string()))
}

/// Get the application data directory.
/// Uses platform-specific paths via `directories` crate.
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the config directory.
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the config file path.
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    get_config_dir().map(|dir| dir.join("config.json"))
}

/// Get the default chain spec directory.
pub fn get_chain_spec_dir() -> Result<PathBuf, ConfigError> {
    get_data_dir().map(|dir| dir.join("chain-specs"))
}

// ==================== Config I/O ====================

/// Load configuration from disk.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path()?)
}

/// Load configuration from a specific file, defaulting when it is absent.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save configuration to disk.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path()?)
}

/// Save configuration to a specific file.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

/// Backup a corrupted config file for debugging.
pub fn backup_corrupted_config(path: &Path) -> Result<PathBuf, ConfigError> {
    let parent = path
        .parent()
        .ok_or_else(|| ConfigError::Other("Config path has no parent".to_string()))?;
    let backup_path = parent.join(format!(
        "config.backup.{}",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    ));
    fs::copy(path, &backup_path)?;
    Ok(backup_path)
}
