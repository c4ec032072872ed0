//! MEMO claim client - command line interface.

mod config;
mod identity;
mod memo_api;
mod wallets;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use memo_chain::{
    AccountBalanceWatcher, ChainConfig, ChainRegistry, ChainStatusObserver, SessionManager,
    SmoldotBackend, ToggleOutcome, WalletRegistry, fetch_missing_specs,
};
use memo_core::identity::ZERO_USER_ID;
use memo_core::{
    AccountBalance, AppConfig, ChainKey, SelectedAccount, SelfApp, StoredAccount,
    format_balance_with_unit, format_last_updated, trim_address,
};
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use memo_api::MemoApiClient;
use wallets::ConfigWalletProvider;

/// MEMO claim client - follow a chain over a light client and look up MEMOs.
#[derive(Parser, Debug)]
#[command(name = "memo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding chain spec JSON files
    #[arg(long = "spec-dir", global = true)]
    spec_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the supported chains and whether their specs are available
    Chains {
        /// Download missing chain specs
        #[arg(long)]
        fetch: bool,
    },
    /// Connect to a chain and follow its finalized blocks until Ctrl-C
    Connect {
        /// Chain to connect to (defaults to the configured chain)
        #[arg(short, long)]
        chain: Option<ChainArg>,
    },
    /// Watch the balance of an account until Ctrl-C
    Balance {
        /// Account to watch (defaults to the selected account)
        #[arg(short, long)]
        address: Option<String>,
        #[arg(short, long)]
        chain: Option<ChainArg>,
    },
    /// Look up the MEMO a claim code belongs to
    Lookup {
        #[arg(long)]
        code: String,
        /// Claim API base URL (defaults to the configured URL)
        #[arg(long = "api-url")]
        api_url: Option<String>,
        /// Only check that the code is valid
        #[arg(long)]
        check: bool,
    },
    /// Show the identity verification QR code
    Verify {
        /// User id the verification is bound to
        #[arg(long = "user-id", default_value = ZERO_USER_ID)]
        user_id: String,
        /// Invert the QR code for dark terminals
        #[arg(long)]
        dark: bool,
    },
    /// Manage wallets and the selected account
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
}

#[derive(Subcommand, Debug)]
enum WalletAction {
    /// List configured wallets and their accounts
    List,
    /// Connect a wallet if disconnected, disconnect it otherwise
    Toggle { name: String },
    /// Select the account used for balance display
    Select { wallet: String, address: String },
}

/// Chain argument that can be parsed from string.
#[derive(Debug, Clone)]
struct ChainArg(ChainKey);

impl std::str::FromStr for ChainArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "polkadot" | "dot" => Ok(ChainArg(ChainKey::Polkadot)),
            "kusama" | "ksm" => Ok(ChainArg(ChainKey::Kusama)),
            key => ChainKey::from_key(key).map(ChainArg).ok_or_else(|| {
                format!(
                    "Unknown chain '{}'. Valid options: polkadot, ahp, kusama, ahk",
                    s
                )
            }),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    color_eyre::install()?;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("memo=info".parse()?)
        .add_directive("memo_chain=info".parse()?)
        .add_directive("memo_core=info".parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = config::load_or_default();
    let spec_dir = match args.spec_dir {
        Some(dir) => dir,
        None => config.resolved_chain_spec_dir()?,
    };

    match args.command {
        Command::Chains { fetch } => run_chains(&spec_dir, fetch).await,
        Command::Connect { chain } => {
            let key = chain.map(|c| c.0).unwrap_or(config.default_chain);
            run_connect(&spec_dir, key).await
        }
        Command::Balance { address, chain } => {
            let key = chain.map(|c| c.0).unwrap_or(config.default_chain);
            run_balance(&config, &spec_dir, key, address).await
        }
        Command::Lookup {
            code,
            api_url,
            check,
        } => {
            let api_url = api_url.unwrap_or_else(|| config.memo_api_url.clone());
            run_lookup(&api_url, &code, check).await
        }
        Command::Verify { user_id, dark } => run_verify(&config, &user_id, dark),
        Command::Wallet { action } => run_wallet(config, action).await,
    }
}

async fn run_chains(spec_dir: &Path, fetch: bool) -> Result<()> {
    if fetch {
        let fetched = fetch_missing_specs(spec_dir).await?;
        for key in &fetched {
            println!("Fetched chain spec for {}", key);
        }
    }

    let registry = ChainRegistry::load(spec_dir);
    println!("Chain specs in {}", spec_dir.display());
    for chain in registry.chains() {
        let state = match chain.validate() {
            Ok(spec) => format!("ready ({})", spec.name()),
            Err(e) => e.to_string(),
        };
        println!(
            "  {:<4} {:<20} {:<4} {}",
            chain.key.key(),
            chain.name,
            chain.key.token_symbol(),
            state
        );
    }
    Ok(())
}

/// Find `key` in the registry, downloading missing specs first if needed.
async fn resolve_chain(spec_dir: &Path, key: ChainKey) -> Result<Arc<ChainConfig>> {
    let registry = ChainRegistry::load(spec_dir);
    let chain = registry
        .get(key)
        .ok_or_else(|| eyre!("Chain {} is not supported", key))?;
    if chain.validate().is_ok() {
        return Ok(chain);
    }

    tracing::info!("Chain specs for {} missing, fetching", key);
    if let Err(e) = fetch_missing_specs(spec_dir).await {
        // Activation reports the missing spec.
        tracing::warn!("Failed to fetch chain specs: {}", e);
        return Ok(chain);
    }
    ChainRegistry::load(spec_dir)
        .get(key)
        .ok_or_else(|| eyre!("Chain {} is not supported", key))
}

async fn run_connect(spec_dir: &Path, key: ChainKey) -> Result<()> {
    let chain = resolve_chain(spec_dir, key).await?;
    let manager = SessionManager::start(SmoldotBackend, chain);
    let observer = ChainStatusObserver::spawn(&manager);
    let mut indicator = observer.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("{}", *indicator.borrow_and_update());
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = indicator.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *indicator.borrow_and_update());
            }
        }
    }

    observer.shutdown().await;
    manager.shutdown().await;
    Ok(())
}

async fn run_balance(
    config: &AppConfig,
    spec_dir: &Path,
    key: ChainKey,
    address: Option<String>,
) -> Result<()> {
    let selected = match address {
        Some(address) => SelectedAccount {
            wallet: "cli".to_string(),
            address,
            name: None,
        },
        None => restore_selection(config)
            .await
            .ok_or_else(|| eyre!("No account selected; pass --address or run `memo wallet select`"))?,
    };
    let (_account_tx, account_rx) = watch::channel(Some(selected.clone()));

    let chain = resolve_chain(spec_dir, key).await?;
    let manager = SessionManager::start(SmoldotBackend, chain);
    let observer = ChainStatusObserver::spawn(&manager);
    let watcher = AccountBalanceWatcher::spawn(&manager, account_rx);
    let mut indicator = observer.subscribe();
    let mut balance = watcher.subscribe();

    let label = selected
        .name
        .clone()
        .unwrap_or_else(|| trim_address(&selected.address, None));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = indicator.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *indicator.borrow_and_update());
            }
            changed = balance.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = balance.borrow_and_update().clone();
                if let Some(current) = current {
                    println!("{}: {}", label, describe_balance(&current, key));
                }
            }
        }
    }

    watcher.shutdown().await;
    observer.shutdown().await;
    manager.shutdown().await;
    Ok(())
}

fn describe_balance(balance: &AccountBalance, key: ChainKey) -> String {
    let decimals = key.token_decimals();
    let unit = key.token_symbol();
    format!(
        "{} transferable, {} free, {} reserved (updated {})",
        format_balance_with_unit(balance.transferable(), decimals, Some(4), unit),
        format_balance_with_unit(balance.free, decimals, Some(4), unit),
        format_balance_with_unit(balance.reserved, decimals, Some(4), unit),
        format_last_updated(Some(balance.last_updated), &Local::now())
    )
}

async fn run_lookup(api_url: &str, code: &str, check: bool) -> Result<()> {
    let client = MemoApiClient::new(api_url);
    if check {
        if !client.validate_claim_code(code).await {
            return Err(eyre!("Claim code {} is not valid", code));
        }
        println!("Claim code {} is valid", code);
        return Ok(());
    }

    let memo = client
        .fetch_memo_by_code(code)
        .await
        .wrap_err_with(|| format!("Claim code {} is not valid", code))?;

    let chain = memo
        .chain_key()
        .map(|c| c.to_string())
        .unwrap_or_else(|| memo.chain.clone());
    println!("{}", memo.name);
    println!("  {}", memo.description);
    println!("  Chain:      {}", chain);
    println!("  Collection: {}", memo.collection);
    println!("  Image:      {}", memo.image);
    println!("  Expires:    {}", memo.expires_at);
    Ok(())
}

fn run_verify(config: &AppConfig, user_id: &str, dark: bool) -> Result<()> {
    let app = SelfApp::build(&config.identity, user_id)?;
    let link = identity::universal_link(&app)?;
    let qr = identity::render_qr(link.as_str(), dark)?;

    println!("Scan with the Self app to verify your identity");
    println!("{}", qr);
    println!("{}", link);
    Ok(())
}

fn wallet_registry(config: &AppConfig) -> WalletRegistry<ConfigWalletProvider> {
    WalletRegistry::new(ConfigWalletProvider::new(config.wallets.clone()))
}

/// Reconnect saved wallets and return the remembered account, if still valid.
async fn restore_selection(config: &AppConfig) -> Option<SelectedAccount> {
    let registry = wallet_registry(config);
    registry.connect_saved(&config.connected_extensions).await;
    config
        .selected_account
        .as_ref()
        .and_then(|stored| registry.restore_selected(stored))
}

async fn run_wallet(mut config: AppConfig, action: WalletAction) -> Result<()> {
    let registry = wallet_registry(&config);
    registry.connect_saved(&config.connected_extensions).await;
    if let Some(stored) = &config.selected_account {
        registry.restore_selected(stored);
    }

    match action {
        WalletAction::List => {
            let selected = registry.selected_account();
            for wallet in &config.wallets {
                let state = if registry.is_connected(&wallet.name) {
                    "connected"
                } else {
                    "disconnected"
                };
                println!("{} ({})", wallet.name, state);
                for account in &wallet.accounts {
                    let marker = if selected
                        .as_ref()
                        .is_some_and(|s| s.wallet == wallet.name && s.address == account.address)
                    {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "  {} {} {}",
                        marker,
                        account.address,
                        account.name.as_deref().unwrap_or("")
                    );
                }
            }
            return Ok(());
        }
        WalletAction::Toggle { name } => match registry.toggle_wallet(&name).await? {
            ToggleOutcome::Connected => println!("Connected {}", name),
            ToggleOutcome::Disconnected => println!("Disconnected {}", name),
            ToggleOutcome::Cancelled | ToggleOutcome::Busy => {
                println!("{} unchanged", name);
                return Ok(());
            }
        },
        WalletAction::Select { wallet, address } => {
            let account = registry.select_account(&wallet, &address)?;
            println!(
                "Selected {} from {}",
                account.name.as_deref().unwrap_or(&account.address),
                account.wallet
            );
        }
    }

    config.connected_extensions = registry.connected_names();
    config.selected_account = registry.selected_account().as_ref().map(StoredAccount::from);
    config::save_config(&config).wrap_err("Failed to save config")?;
    Ok(())
}
