//! In-memory light client backend for driving the session manager.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{StreamExt, future};
use futures::channel::mpsc::{UnboundedSender, unbounded};
use memo_chain::{
    AccountDataStream, ChainConfig, ChainError, ChainRegistry, ChainSpec, FinalizedBlockStream,
    LightClientBackend, LightClientWorker, RuntimeClient,
};
use memo_core::{AccountData, BlockTag, ChainKey, FinalizedBlock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, watch};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
pub const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

/// Hold key for `spawn_worker`.
pub const SPAWN: &str = "spawn";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("memo_chain=debug,info")
        .with_test_writer()
        .try_init();
}

fn spec_json(key: ChainKey) -> String {
    let (name, id, relay) = match key {
        ChainKey::Polkadot => ("Polkadot", "polkadot", None),
        ChainKey::PolkadotAssetHub => ("Polkadot Asset Hub", "asset-hub-polkadot", Some("polkadot")),
        ChainKey::Kusama => ("Kusama", "ksmcc3", None),
        ChainKey::KusamaAssetHub => ("Kusama Asset Hub", "asset-hub-kusama", Some("ksmcc3")),
    };
    let relay = relay
        .map(|r| format!(r#""relay_chain": "{}", "para_id": 1000,"#, r))
        .unwrap_or_default();
    format!(
        r#"{{"name": "{}", "id": "{}", "chainType": "Live", "bootNodes": [], {} "genesis": {{"stateRootHash": "0x00"}}}}"#,
        name, id, relay
    )
}

/// Registry with a spec for every chain.
pub fn registry() -> ChainRegistry {
    ChainRegistry::from_specs(|key| ChainSpec::parse(spec_json(key)).ok())
}

pub fn chain(key: ChainKey) -> Arc<ChainConfig> {
    registry().get(key).expect("chain in registry")
}

/// Everything the backend was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Spawn { worker: u32 },
    AddChain { worker: u32, chain: String, relays: Vec<String> },
    CreateClient { worker: u32, chain: String },
    Terminate { worker: u32 },
}

pub struct MockState {
    calls: watch::Sender<Vec<Call>>,
    next_worker: AtomicU32,
    live_workers: AtomicUsize,
    max_live_workers: AtomicUsize,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    pub fail_spawn: AtomicBool,
    /// Subscriptions opened by clients never resolve while set.
    pub stall_subscriptions: Arc<AtomicBool>,
    failing_chains: Mutex<HashSet<String>>,
    clients: Mutex<Vec<Arc<MockClient>>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: watch::Sender::new(Vec::new()),
            next_worker: AtomicU32::new(0),
            live_workers: AtomicUsize::new(0),
            max_live_workers: AtomicUsize::new(0),
            holds: Mutex::default(),
            fail_spawn: AtomicBool::new(false),
            stall_subscriptions: Arc::default(),
            failing_chains: Mutex::default(),
            clients: Mutex::default(),
        }
    }
}

impl MockState {
    fn record(&self, call: Call) {
        self.calls.send_modify(|calls| calls.push(call));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub async fn wait_for_call(&self, call: Call) {
        let mut calls = self.calls.subscribe();
        tokio::time::timeout(TIMEOUT, calls.wait_for(|calls| calls.contains(&call)))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {:?}", call))
            .unwrap();
    }

    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    pub fn max_live_workers(&self) -> usize {
        self.max_live_workers.load(Ordering::SeqCst)
    }

    /// Block the step named `key` (a chain name or [`SPAWN`]) until released.
    pub fn hold(&self, key: &str) {
        self.holds
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, key: &str) {
        if let Some(gate) = self.holds.lock().unwrap().remove(key) {
            gate.notify_one();
        }
    }

    async fn pass(&self, key: &str) {
        let gate = self.holds.lock().unwrap().get(key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    pub fn fail_chain(&self, name: &str) {
        self.failing_chains.lock().unwrap().insert(name.to_string());
    }

    /// Client built by `worker`.
    pub fn client(&self, worker: u32) -> Arc<MockClient> {
        self.clients
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.worker == worker)
            .cloned()
            .unwrap_or_else(|| panic!("no client for worker {}", worker))
    }
}

#[derive(Clone, Default)]
pub struct MockBackend {
    pub state: Arc<MockState>,
}

#[async_trait]
impl LightClientBackend for MockBackend {
    type Worker = MockWorker;

    async fn spawn_worker(&self) -> Result<MockWorker, ChainError> {
        self.state.pass(SPAWN).await;
        if self.state.fail_spawn.load(Ordering::SeqCst) {
            return Err(ChainError::WorkerSpawn("wasm runtime unavailable".into()));
        }

        let id = self.state.next_worker.fetch_add(1, Ordering::SeqCst) + 1;
        let live = self.state.live_workers.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live_workers.fetch_max(live, Ordering::SeqCst);
        self.state.record(Call::Spawn { worker: id });

        Ok(MockWorker {
            id,
            state: self.state.clone(),
            terminated: Arc::new(AtomicBool::new(false)),
        })
    }
}

pub struct MockWorker {
    id: u32,
    state: Arc<MockState>,
    terminated: Arc<AtomicBool>,
}

pub struct MockChain {
    worker: u32,
    name: String,
}

#[async_trait]
impl LightClientWorker for MockWorker {
    type Chain = MockChain;

    async fn add_chain(
        &mut self,
        chain_spec: &ChainSpec,
        potential_relay_chains: &[&MockChain],
    ) -> Result<MockChain, ChainError> {
        let name = chain_spec.name().to_string();
        self.state.record(Call::AddChain {
            worker: self.id,
            chain: name.clone(),
            relays: potential_relay_chains
                .iter()
                .map(|c| c.name.clone())
                .collect(),
        });
        assert!(potential_relay_chains.iter().all(|c| c.worker == self.id));

        self.state.pass(&name).await;
        if self.state.failing_chains.lock().unwrap().contains(&name) {
            return Err(ChainError::LightClient(format!("{} has no bootnodes", name)));
        }
        Ok(MockChain {
            worker: self.id,
            name,
        })
    }

    async fn create_client(
        &mut self,
        chain: &MockChain,
    ) -> Result<Arc<dyn RuntimeClient>, ChainError> {
        self.state.record(Call::CreateClient {
            worker: self.id,
            chain: chain.name.clone(),
        });
        let client = Arc::new(MockClient {
            worker: self.id,
            terminated: self.terminated.clone(),
            stall: self.state.stall_subscriptions.clone(),
            stalled: AtomicUsize::new(0),
            blocks: Mutex::default(),
            accounts: Mutex::default(),
        });
        self.state.clients.lock().unwrap().push(client.clone());
        Ok(client)
    }

    fn terminate(&mut self) {
        if !self.terminated.swap(true, Ordering::SeqCst) {
            self.state.live_workers.fetch_sub(1, Ordering::SeqCst);
            self.state.record(Call::Terminate { worker: self.id });
        }
    }
}

type Sender<T> = UnboundedSender<Result<T, ChainError>>;

pub struct MockClient {
    pub worker: u32,
    terminated: Arc<AtomicBool>,
    stall: Arc<AtomicBool>,
    stalled: AtomicUsize,
    blocks: Mutex<Vec<Sender<FinalizedBlock>>>,
    accounts: Mutex<Vec<(String, Sender<AccountData>)>>,
}

impl MockClient {
    pub fn push_block(&self, number: u32) {
        for tx in self.blocks.lock().unwrap().iter() {
            let _ = tx.unbounded_send(Ok(FinalizedBlock {
                number,
                hash: [number as u8; 32],
            }));
        }
    }

    pub fn fail_blocks(&self, reason: &str) {
        for tx in self.blocks.lock().unwrap().iter() {
            let _ = tx.unbounded_send(Err(ChainError::Subscription(reason.to_string())));
        }
    }

    pub fn push_account(&self, address: &str, data: AccountData) {
        for (watched, tx) in self.accounts.lock().unwrap().iter() {
            if watched == address {
                let _ = tx.unbounded_send(Ok(data));
            }
        }
    }

    pub fn open_block_subscriptions(&self) -> usize {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    pub fn open_account_subscriptions(&self, address: &str) -> usize {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|(watched, tx)| watched == address && !tx.is_closed())
            .count()
    }

    pub fn total_account_subscriptions(&self) -> usize {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    /// Subscription requests that got stuck opening.
    pub fn stalled_subscriptions(&self) -> usize {
        self.stalled.load(Ordering::SeqCst)
    }

    async fn maybe_stall(&self) {
        if self.stall.load(Ordering::SeqCst) {
            self.stalled.fetch_add(1, Ordering::SeqCst);
            future::pending::<()>().await;
        }
    }

    fn ensure_live(&self) -> Result<(), ChainError> {
        if self.terminated.load(Ordering::SeqCst) {
            Err(ChainError::WorkerTerminated)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RuntimeClient for MockClient {
    async fn finalized_blocks(&self) -> Result<FinalizedBlockStream, ChainError> {
        self.ensure_live()?;
        self.maybe_stall().await;
        let (tx, rx) = unbounded();
        self.blocks.lock().unwrap().push(tx);
        Ok(rx.boxed())
    }

    async fn system_account(
        &self,
        address: &str,
        at: BlockTag,
    ) -> Result<AccountDataStream, ChainError> {
        self.ensure_live()?;
        assert_eq!(at, BlockTag::Best);
        self.maybe_stall().await;
        let (tx, rx) = unbounded();
        self.accounts.lock().unwrap().push((address.to_string(), tx));
        Ok(rx.boxed())
    }

    fn spec_name(&self) -> Option<String> {
        None
    }
}

/// Poll `condition` until it holds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the watched value satisfies `condition`.
pub async fn wait_until<T>(rx: &mut watch::Receiver<T>, condition: impl FnMut(&T) -> bool) -> T
where
    T: Clone,
{
    tokio::time::timeout(TIMEOUT, rx.wait_for(condition))
        .await
        .expect("timed out waiting for watch value")
        .expect("watch sender dropped")
        .clone()
}
