//! Wallet registry.
//!
//! Tracks which wallets the user connected, the accounts they expose, and
//! the account selected for balance display. Owned by whoever constructs
//! it; changes are published through watch channels.

use async_trait::async_trait;
use memo_core::{SelectedAccount, StoredAccount};
use thiserror::Error;
use tokio::sync::{Mutex, watch};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Connection to {0} was cancelled")]
    Cancelled(String),

    #[error("Wallet {0} is not available")]
    Unavailable(String),

    #[error("Wallet {0} is not connected")]
    NotConnected(String),

    #[error("Account {address} not found in {wallet}")]
    UnknownAccount { wallet: String, address: String },

    #[error("Wallet error: {0}")]
    Provider(String),
}

/// An account exposed by a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedAccount {
    pub address: String,
    pub name: Option<String>,
}

/// Source of wallets and their accounts.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    fn available_wallets(&self) -> Vec<String>;

    /// Ask `wallet` for its accounts. A user refusing the request is
    /// reported as [`WalletError::Cancelled`].
    async fn connect(&self, wallet: &str) -> Result<Vec<InjectedAccount>, WalletError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedWallet {
    pub name: String,
    pub accounts: Vec<InjectedAccount>,
}

/// Result of [`WalletRegistry::toggle_wallet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Connected,
    Disconnected,
    /// The user declined; nothing changed.
    Cancelled,
    /// Another toggle was still in progress; nothing changed.
    Busy,
}

pub struct WalletRegistry<P> {
    provider: P,
    connected: watch::Sender<Vec<ConnectedWallet>>,
    selected: watch::Sender<Option<SelectedAccount>>,
    toggling: Mutex<()>,
}

impl<P: WalletProvider> WalletRegistry<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            connected: watch::Sender::new(Vec::new()),
            selected: watch::Sender::new(None),
            toggling: Mutex::new(()),
        }
    }

    pub fn available_wallets(&self) -> Vec<String> {
        self.provider.available_wallets()
    }

    /// Connected wallets, in connection order.
    pub fn connected_wallets(&self) -> Vec<ConnectedWallet> {
        self.connected.borrow().clone()
    }

    pub fn connected_names(&self) -> Vec<String> {
        self.connected.borrow().iter().map(|w| w.name.clone()).collect()
    }

    pub fn is_connected(&self, wallet: &str) -> bool {
        self.connected.borrow().iter().any(|w| w.name == wallet)
    }

    /// Connect `wallet` if it is disconnected, disconnect it otherwise.
    pub async fn toggle_wallet(&self, wallet: &str) -> Result<ToggleOutcome, WalletError> {
        let Ok(_toggling) = self.toggling.try_lock() else {
            tracing::debug!("Ignoring toggle of {}: another toggle is running", wallet);
            return Ok(ToggleOutcome::Busy);
        };

        if self.is_connected(wallet) {
            self.disconnect(wallet);
            return Ok(ToggleOutcome::Disconnected);
        }

        match self.connect(wallet).await {
            Ok(()) => Ok(ToggleOutcome::Connected),
            Err(WalletError::Cancelled(_)) => {
                tracing::info!("Connection to {} cancelled by the user", wallet);
                Ok(ToggleOutcome::Cancelled)
            }
            Err(e) => Err(e),
        }
    }

    /// Reconnect wallets remembered from a previous run. Returns how many
    /// were connected.
    pub async fn connect_saved(&self, wallets: &[String]) -> usize {
        let mut count = 0;
        for wallet in wallets {
            if self.is_connected(wallet) {
                continue;
            }
            match self.connect(wallet).await {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!("Could not reconnect {}: {}", wallet, e),
            }
        }
        count
    }

    async fn connect(&self, wallet: &str) -> Result<(), WalletError> {
        if !self.available_wallets().iter().any(|w| w == wallet) {
            return Err(WalletError::Unavailable(wallet.to_string()));
        }

        let accounts = self.provider.connect(wallet).await?;
        tracing::info!("Connected {} ({} accounts)", wallet, accounts.len());
        self.connected.send_modify(|connected| {
            connected.push(ConnectedWallet {
                name: wallet.to_string(),
                accounts,
            })
        });
        Ok(())
    }

    fn disconnect(&self, wallet: &str) {
        self.connected
            .send_modify(|connected| connected.retain(|w| w.name != wallet));
        self.selected.send_if_modified(|selected| {
            if selected.as_ref().is_some_and(|s| s.wallet == wallet) {
                *selected = None;
                true
            } else {
                false
            }
        });
        tracing::info!("Disconnected {}", wallet);
    }

    /// Select an account of a connected wallet.
    pub fn select_account(
        &self,
        wallet: &str,
        address: &str,
    ) -> Result<SelectedAccount, WalletError> {
        let account = {
            let connected = self.connected.borrow();
            let source = connected
                .iter()
                .find(|w| w.name == wallet)
                .ok_or_else(|| WalletError::NotConnected(wallet.to_string()))?;
            let account = source
                .accounts
                .iter()
                .find(|a| a.address == address)
                .ok_or_else(|| WalletError::UnknownAccount {
                    wallet: wallet.to_string(),
                    address: address.to_string(),
                })?;
            SelectedAccount {
                wallet: wallet.to_string(),
                address: account.address.clone(),
                name: account.name.clone(),
            }
        };

        self.selected.send_if_modified(|selected| {
            if selected.as_ref() == Some(&account) {
                false
            } else {
                *selected = Some(account.clone());
                true
            }
        });
        Ok(account)
    }

    /// Re-select a remembered account if its wallet is connected.
    pub fn restore_selected(&self, stored: &StoredAccount) -> Option<SelectedAccount> {
        match self.select_account(&stored.extension_name, &stored.address) {
            Ok(account) => Some(account),
            Err(e) => {
                tracing::debug!("Not restoring selected account: {}", e);
                None
            }
        }
    }

    pub fn clear_selection(&self) {
        self.selected.send_if_modified(|selected| selected.take().is_some());
    }

    pub fn selected_account(&self) -> Option<SelectedAccount> {
        self.selected.borrow().clone()
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<Option<SelectedAccount>> {
        self.selected.subscribe()
    }

    pub fn subscribe_connected(&self) -> watch::Receiver<Vec<ConnectedWallet>> {
        self.connected.subscribe()
    }
}
