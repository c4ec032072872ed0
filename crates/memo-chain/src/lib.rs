//! Light client sessions for the MEMO claim client.
//!
//! - `registry`: the chains that can be activated and their specs
//! - `backend`: the light client boundary, implemented over smoldot in `lightclient`
//! - `session`: the session manager owning the one live worker
//! - `status` and `balance`: consumers that follow the active session
//! - `wallet`: connected wallets and the selected account

pub mod backend;
pub mod balance;
pub mod client;
pub mod config;
pub mod error;
pub mod lightclient;
pub mod queries;
pub mod registry;
pub mod session;
pub mod status;
pub mod wallet;

pub use backend::{
    AccountDataStream, FinalizedBlockStream, LightClientBackend, LightClientWorker, RuntimeClient,
    WorkerGuard,
};
pub use balance::AccountBalanceWatcher;
pub use client::{ChainApi, ChainClient, SessionId, TypedApi};
pub use config::*;
pub use error::*;
pub use lightclient::SmoldotBackend;
pub use registry::{
    ChainConfig, ChainDescriptors, ChainRegistry, ChainSpec, DEFAULT_CHAIN, fetch_chain_spec,
    fetch_missing_specs,
};
pub use session::{ActiveHandles, SessionHandle, SessionManager, SessionStatus};
pub use status::{ChainIndicator, ChainStatusObserver, derive_status};
pub use wallet::{
    ConnectedWallet, InjectedAccount, ToggleOutcome, WalletError, WalletProvider, WalletRegistry,
};
