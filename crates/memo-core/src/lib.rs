//! Core domain types for the MEMO claim client.
//!
//! This crate provides:
//! - Chain, balance and account types (`types` module)
//! - MEMO records from the claim API (`memo` module)
//! - Identity verification app configuration (`identity` module)
//! - Display helpers for frontends (`display` module)
//!
//! With the `persistence` feature enabled:
//! - Configuration management (`config` module)

pub mod display;
pub mod identity;
pub mod memo;
pub mod types;

#[cfg(feature = "persistence")]
pub mod config;

pub use display::*;
pub use identity::{Disclosures, IdentityError, IdentityOptions, SelfApp};
pub use memo::{ApiErrorBody, Memo};
pub use types::*;

#[cfg(feature = "persistence")]
pub use config::{AppConfig, ConfigError, WalletAccount, WalletConfig};
