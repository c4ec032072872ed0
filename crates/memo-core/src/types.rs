//! Core domain types for the MEMO claim client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Balance = u128;
pub type BlockNumber = u32;

/// Chains the client knows how to reach - exhaustive match required (no default case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKey {
    Polkadot,
    #[serde(rename = "ahp")]
    PolkadotAssetHub,
    Kusama,
    #[serde(rename = "ahk")]
    KusamaAssetHub,
}

impl ChainKey {
    /// Short identifier, stable across sessions.
    pub fn key(&self) -> &'static str {
        match self {
            ChainKey::Polkadot => "polkadot",
            ChainKey::PolkadotAssetHub => "ahp",
            ChainKey::Kusama => "kusama",
            ChainKey::KusamaAssetHub => "ahk",
        }
    }

    /// Look a chain up by its short identifier.
    pub fn from_key(key: &str) -> Option<ChainKey> {
        Self::all().iter().copied().find(|c| c.key() == key)
    }

    pub fn token_symbol(&self) -> &'static str {
        match self {
            ChainKey::Polkadot | ChainKey::PolkadotAssetHub => "DOT",
            ChainKey::Kusama | ChainKey::KusamaAssetHub => "KSM",
        }
    }

    pub fn token_decimals(&self) -> u8 {
        match self {
            ChainKey::Polkadot | ChainKey::PolkadotAssetHub => 10,
            ChainKey::Kusama | ChainKey::KusamaAssetHub => 12,
        }
    }

    /// The relay chain a parachain depends on, if any.
    pub fn relay_chain(&self) -> Option<ChainKey> {
        match self {
            ChainKey::Polkadot | ChainKey::Kusama => None,
            ChainKey::PolkadotAssetHub => Some(ChainKey::Polkadot),
            ChainKey::KusamaAssetHub => Some(ChainKey::Kusama),
        }
    }

    /// Returns all known chains, in registry order.
    pub fn all() -> &'static [ChainKey] {
        &[
            ChainKey::Polkadot,
            ChainKey::PolkadotAssetHub,
            ChainKey::Kusama,
            ChainKey::KusamaAssetHub,
        ]
    }
}

impl std::fmt::Display for ChainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainKey::Polkadot => write!(f, "Polkadot"),
            ChainKey::PolkadotAssetHub => write!(f, "Polkadot Asset Hub"),
            ChainKey::Kusama => write!(f, "Kusama"),
            ChainKey::KusamaAssetHub => write!(f, "Kusama Asset Hub"),
        }
    }
}

/// Coarse connection state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

/// Block tag a storage subscription follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    /// Latest block, not yet finalized.
    Best,
    Finalized,
}

/// A finalized block as reported by the light client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedBlock {
    pub number: BlockNumber,
    pub hash: [u8; 32],
}

/// `AccountData` part of `System.Account`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountData {
    pub free: Balance,
    pub reserved: Balance,
    pub frozen: Balance,
    pub flags: Balance,
}

/// Latest observed balance of the selected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountBalance {
    pub free: Balance,
    pub reserved: Balance,
    pub frozen: Balance,
    pub flags: Balance,
    pub last_updated: DateTime<Utc>,
}

impl AccountBalance {
    pub fn new(data: AccountData, last_updated: DateTime<Utc>) -> Self {
        Self {
            free: data.free,
            reserved: data.reserved,
            frozen: data.frozen,
            flags: data.flags,
            last_updated,
        }
    }

    /// Free balance not held by freezes.
    pub fn transferable(&self) -> Balance {
        self.free.saturating_sub(self.frozen)
    }

    pub fn data(&self) -> AccountData {
        AccountData {
            free: self.free,
            reserved: self.reserved,
            frozen: self.frozen,
            flags: self.flags,
        }
    }
}

/// Account picked by the user from one of the connected wallets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedAccount {
    pub wallet: String,
    pub address: String,
    pub name: Option<String>,
}

/// Persisted reference to the selected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAccount {
    pub extension_name: String,
    pub address: String,
}

impl From<&SelectedAccount> for StoredAccount {
    fn from(account: &SelectedAccount) -> Self {
        Self {
            extension_name: account.wallet.clone(),
            address: account.address.clone(),
        }
    }
}
