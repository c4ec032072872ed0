//! Wallets backed by the configuration file.

use async_trait::async_trait;
use memo_chain::{InjectedAccount, WalletError, WalletProvider};
use memo_core::WalletConfig;

/// Exposes the wallets listed in the config. Connecting never prompts.
pub struct ConfigWalletProvider {
    wallets: Vec<WalletConfig>,
}

impl ConfigWalletProvider {
    pub fn new(wallets: Vec<WalletConfig>) -> Self {
        Self { wallets }
    }
}

#[async_trait]
impl WalletProvider for ConfigWalletProvider {
    fn available_wallets(&self) -> Vec<String> {
        self.wallets.iter().map(|w| w.name.clone()).collect()
    }

    async fn connect(&self, wallet: &str) -> Result<Vec<InjectedAccount>, WalletError> {
        let config = self
            .wallets
            .iter()
            .find(|w| w.name == wallet)
            .ok_or_else(|| WalletError::Unavailable(wallet.to_string()))?;

        Ok(config
            .accounts
            .iter()
            .map(|a| InjectedAccount {
                address: a.address.clone(),
                name: a.name.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memo_chain::{ToggleOutcome, WalletRegistry};
    use memo_core::{StoredAccount, WalletAccount};

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

    fn provider() -> ConfigWalletProvider {
        ConfigWalletProvider::new(vec![WalletConfig {
            name: "cold".to_string(),
            accounts: vec![WalletAccount {
                address: ALICE.to_string(),
                name: Some("Alice".to_string()),
            }],
        }])
    }

    #[tokio::test]
    async fn test_connect_lists_accounts() {
        let accounts = provider().connect("cold").await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_unknown_wallet_is_unavailable() {
        assert_eq!(
            provider().connect("hot").await,
            Err(WalletError::Unavailable("hot".to_string()))
        );
    }

    #[tokio::test]
    async fn test_restore_saved_selection() {
        let registry = WalletRegistry::new(provider());
        assert_eq!(registry.connect_saved(&["cold".to_string()]).await, 1);

        let stored = StoredAccount {
            extension_name: "cold".to_string(),
            address: ALICE.to_string(),
        };
        let selected = registry.restore_selected(&stored).unwrap();
        assert_eq!(selected.name.as_deref(), Some("Alice"));

        assert_eq!(
            registry.toggle_wallet("cold").await.unwrap(),
            ToggleOutcome::Disconnected
        );
        assert!(registry.selected_account().is_none());
    }
}
