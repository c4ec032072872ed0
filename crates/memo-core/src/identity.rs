//! Identity verification app configuration.
//!
//! The verification protocol itself runs in the Self mobile app and reports
//! its verdict to the configured endpoint; the client only builds the app
//! configuration that the QR code / universal link carries.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// User id used until the claimant provides one.
pub const ZERO_USER_ID: &str = "0x0000000000000000000000000000000000000000";

/// Base of the universal link the mobile app is opened with.
pub const UNIVERSAL_LINK_BASE: &str = "https://redirect.self.xyz";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid user id '{0}': expected 0x followed by 40 hex digits")]
    InvalidUserId(String),

    #[error("Missing identity option: {0}")]
    MissingOption(&'static str),
}

/// What the verifier asks the claimant to disclose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disclosures {
    #[serde(default = "default_minimum_age")]
    pub minimum_age: u8,
    #[serde(default)]
    pub ofac: bool,
    /// ISO 3166-1 alpha-3 codes.
    #[serde(default)]
    pub excluded_countries: Vec<String>,
    #[serde(default)]
    pub name: bool,
    #[serde(default)]
    pub issuing_state: bool,
    #[serde(default)]
    pub nationality: bool,
    #[serde(default)]
    pub date_of_birth: bool,
    #[serde(default)]
    pub passport_number: bool,
    #[serde(default)]
    pub gender: bool,
    #[serde(default)]
    pub expiry_date: bool,
}

fn default_minimum_age() -> u8 {
    18
}

impl Default for Disclosures {
    fn default() -> Self {
        Self {
            minimum_age: 18,
            ofac: false,
            excluded_countries: vec!["PRK".to_string()],
            name: false,
            issuing_state: false,
            nationality: true,
            date_of_birth: false,
            passport_number: false,
            gender: true,
            expiry_date: false,
        }
    }
}

/// User-tunable verification options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityOptions {
    pub app_name: String,
    pub scope: String,
    pub endpoint: String,
    pub logo_base64: String,
    pub user_defined_data: String,
    #[serde(default)]
    pub disclosures: Disclosures,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self {
            app_name: "MEMO Identity Verification".to_string(),
            scope: "memo-verification".to_string(),
            endpoint: "https://api.self.inc".to_string(),
            logo_base64: "https://i.postimg.cc/mrmVf9hm/self.png".to_string(),
            user_defined_data: "MEMO Protocol Verification".to_string(),
            disclosures: Disclosures::default(),
        }
    }
}

/// Configuration handed to the Self app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfApp {
    pub app_name: String,
    pub logo_base64: String,
    pub endpoint_type: String,
    pub endpoint: String,
    pub header: String,
    pub scope: String,
    pub session_id: String,
    pub user_id: String,
    pub user_id_type: String,
    pub dev_mode: bool,
    pub disclosures: Disclosures,
    pub version: u8,
    pub user_defined_data: String,
}

impl SelfApp {
    /// Build the app configuration for `user_id` (an EVM-style hex address).
    pub fn build(options: &IdentityOptions, user_id: &str) -> Result<Self, IdentityError> {
        if !is_hex_user_id(user_id) {
            return Err(IdentityError::InvalidUserId(user_id.to_string()));
        }
        if options.app_name.is_empty() {
            return Err(IdentityError::MissingOption("appName"));
        }
        if options.scope.is_empty() {
            return Err(IdentityError::MissingOption("scope"));
        }
        if options.endpoint.is_empty() {
            return Err(IdentityError::MissingOption("endpoint"));
        }

        Ok(Self {
            app_name: options.app_name.clone(),
            logo_base64: options.logo_base64.clone(),
            endpoint_type: "staging_https".to_string(),
            endpoint: options.endpoint.clone(),
            header: String::new(),
            scope: options.scope.clone(),
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.trim_start_matches("0x").to_lowercase(),
            user_id_type: "hex".to_string(),
            dev_mode: false,
            disclosures: options.disclosures.clone(),
            version: 2,
            user_defined_data: options.user_defined_data.clone(),
        })
    }
}

fn is_hex_user_id(user_id: &str) -> bool {
    user_id
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
