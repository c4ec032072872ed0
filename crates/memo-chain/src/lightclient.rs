//! Light client backend using smoldot.
//!
//! Provides trustless connections to Polkadot-SDK chains without relying on
//! centralized RPC endpoints. The light client verifies all data cryptographically.
//!
//! # Architecture
//!
//! A worker wraps one smoldot instance. The first chain added to it is a
//! standalone (relay) chain; parachains are added afterwards and follow that
//! relay chain. Clients built from a worker share its lifetime: once the
//! worker is terminated they refuse every request.

use crate::backend::{
    AccountDataStream, FinalizedBlockStream, LightClientBackend, LightClientWorker, RuntimeClient,
};
use crate::error::ChainError;
use crate::queries::account::fetch_account_data;
use crate::registry::ChainSpec;
use async_trait::async_trait;
use futures::{StreamExt, future};
use memo_core::{AccountData, BlockTag, FinalizedBlock};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use subxt::dynamic::At;
use subxt::lightclient::{LightClient, LightClientRpc};
use subxt::utils::AccountId32;
use subxt::{OnlineClient, PolkadotConfig};

type SharedClient = Arc<Mutex<Option<OnlineClient<PolkadotConfig>>>>;

/// Spawns smoldot workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoldotBackend;

#[async_trait]
impl LightClientBackend for SmoldotBackend {
    type Worker = SmoldotWorker;

    async fn spawn_worker(&self) -> Result<SmoldotWorker, ChainError> {
        // smoldot itself starts with the first chain
        tracing::debug!("Spawning smoldot light client worker");
        Ok(SmoldotWorker::default())
    }
}

/// A chain hosted by a smoldot worker.
pub struct SmoldotChain {
    name: String,
    rpc: LightClientRpc,
}

/// One smoldot instance and the clients built from it.
#[derive(Default)]
pub struct SmoldotWorker {
    light_client: Option<LightClient>,
    clients: Vec<SharedClient>,
    terminated: bool,
}

#[async_trait]
impl LightClientWorker for SmoldotWorker {
    type Chain = SmoldotChain;

    async fn add_chain(
        &mut self,
        chain_spec: &ChainSpec,
        potential_relay_chains: &[&SmoldotChain],
    ) -> Result<SmoldotChain, ChainError> {
        if self.terminated {
            return Err(ChainError::WorkerTerminated);
        }

        let name = chain_spec.name().to_string();
        let start = std::time::Instant::now();
        let rpc = match (potential_relay_chains.first(), &self.light_client) {
            (None, None) => {
                tracing::info!("Starting smoldot light client for {}...", name);
                let (light_client, rpc) = LightClient::relay_chain(chain_spec.as_json())
                    .map_err(|e| {
                        ChainError::LightClient(format!(
                            "Failed to start light client for {}: {}",
                            name, e
                        ))
                    })?;
                self.light_client = Some(light_client);
                rpc
            }
            (Some(relay), Some(light_client)) => {
                tracing::info!("Adding {} as parachain of {}...", name, relay.name);
                light_client.parachain(chain_spec.as_json()).map_err(|e| {
                    ChainError::LightClient(format!("Failed to add parachain {}: {}", name, e))
                })?
            }
            (None, Some(_)) => {
                return Err(ChainError::LightClient(format!(
                    "Cannot add {} without a relay chain: worker already hosts a chain",
                    name
                )));
            }
            (Some(relay), None) => {
                return Err(ChainError::LightClient(format!(
                    "Relay chain {} is not hosted by this worker",
                    relay.name
                )));
            }
        };
        tracing::debug!("{} added in {:?}", name, start.elapsed());

        Ok(SmoldotChain { name, rpc })
    }

    async fn create_client(
        &mut self,
        chain: &SmoldotChain,
    ) -> Result<Arc<dyn RuntimeClient>, ChainError> {
        if self.terminated {
            return Err(ChainError::WorkerTerminated);
        }

        // This is where the actual chain sync happens - waiting for finalized blocks
        tracing::info!("Waiting for {} to sync...", chain.name);
        let start = std::time::Instant::now();
        let client = OnlineClient::<PolkadotConfig>::from_rpc_client(chain.rpc.clone())
            .await
            .map_err(|e| {
                ChainError::LightClient(format!(
                    "Failed to create client for {}: {}",
                    chain.name, e
                ))
            })?;
        tracing::info!("{} synced in {:?}", chain.name, start.elapsed());

        let spec_name = runtime_spec_name(&client);
        let shared: SharedClient = Arc::new(Mutex::new(Some(client)));
        self.clients.push(shared.clone());

        Ok(Arc::new(SmoldotClient {
            client: shared,
            spec_name,
        }))
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        for client in self.clients.drain(..) {
            if let Ok(mut slot) = client.lock() {
                slot.take();
            }
        }
        self.light_client = None;
        tracing::info!("Light client worker terminated");
    }
}

/// Read the runtime `spec_name` from the `System.Version` constant.
fn runtime_spec_name(client: &OnlineClient<PolkadotConfig>) -> Option<String> {
    let constant = subxt::dynamic::constant("System", "Version");
    let decoded = client.constants().at(&constant).ok()?.to_value().ok()?;
    decoded
        .at("spec_name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Client for a chain hosted by a smoldot worker.
struct SmoldotClient {
    client: SharedClient,
    spec_name: Option<String>,
}

impl SmoldotClient {
    fn online(&self) -> Result<OnlineClient<PolkadotConfig>, ChainError> {
        let slot = self
            .client
            .lock()
            .map_err(|_| ChainError::LightClient("Client lock poisoned".to_string()))?;
        slot.as_ref().cloned().ok_or(ChainError::WorkerTerminated)
    }
}

#[async_trait]
impl RuntimeClient for SmoldotClient {
    async fn finalized_blocks(&self) -> Result<FinalizedBlockStream, ChainError> {
        let client = self.online()?;
        let blocks = client.blocks().subscribe_finalized().await?;

        Ok(blocks
            .map(|block| -> Result<FinalizedBlock, ChainError> {
                let block = block.map_err(|e| ChainError::Subscription(e.to_string()))?;
                Ok(FinalizedBlock {
                    number: block.number(),
                    hash: block.hash().0,
                })
            })
            .boxed())
    }

    async fn system_account(
        &self,
        address: &str,
        at: BlockTag,
    ) -> Result<AccountDataStream, ChainError> {
        let account = AccountId32::from_str(address)
            .map_err(|e| ChainError::InvalidData(format!("Invalid address {}: {}", address, e)))?;
        let client = self.online()?;
        let blocks = match at {
            BlockTag::Best => client.blocks().subscribe_best().await?,
            BlockTag::Finalized => client.blocks().subscribe_finalized().await?,
        };

        let values = blocks.then(move |block| {
            let client = client.clone();
            let account = account.clone();
            async move {
                let block = block.map_err(|e| ChainError::Subscription(e.to_string()))?;
                fetch_account_data(&client, &account, block.hash()).await
            }
        });

        // Only report changes
        let mut last: Option<AccountData> = None;
        let changes = values.filter_map(move |item| {
            future::ready(match item {
                Ok(data) if last == Some(data) => None,
                Ok(data) => {
                    last = Some(data);
                    Some(Ok(data))
                }
                Err(e) => Some(Err(e)),
            })
        });

        Ok(changes.boxed())
    }

    fn spec_name(&self) -> Option<String> {
        self.spec_name.clone()
    }
}
