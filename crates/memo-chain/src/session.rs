//! Light client session manager.
//!
//! Owns the light client worker, the chains attached to it, the client and
//! typed API built on top, and the session status. Activation requests are
//! handled by a single task, so they serialize and the newest one wins: a
//! superseded attempt is dropped mid-flight, which terminates its worker.
//!
//! ```text
//! Idle -> Connecting -> Connected
//!   |          |
//!   +----------+-----> Error       (invalid specs skip Connecting)
//! ```

use crate::backend::{LightClientBackend, LightClientWorker, RuntimeClient, WorkerGuard};
use crate::client::{ChainApi, ChainClient, SessionId};
use crate::error::{ChainError, ChainRole};
use crate::registry::{ChainConfig, ChainSpec};
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use memo_core::{ChainKey, ConnectionStatus};
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Status of the light client session.
#[derive(Debug, Clone)]
pub enum SessionStatus {
    /// No chain has been activated yet.
    Idle,
    Connecting {
        chain: ChainKey,
    },
    Connected {
        chain: ChainKey,
    },
    Error {
        chain: ChainKey,
        error: Arc<ChainError>,
    },
}

impl SessionStatus {
    pub fn chain(&self) -> Option<ChainKey> {
        match self {
            SessionStatus::Idle => None,
            SessionStatus::Connecting { chain }
            | SessionStatus::Connected { chain }
            | SessionStatus::Error { chain, .. } => Some(*chain),
        }
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        match self {
            SessionStatus::Idle | SessionStatus::Connecting { .. } => ConnectionStatus::Connecting,
            SessionStatus::Connected { .. } => ConnectionStatus::Connected,
            SessionStatus::Error { .. } => ConnectionStatus::Error,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionStatus::Connected { .. })
    }

    pub fn error(&self) -> Option<&ChainError> {
        match self {
            SessionStatus::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// What consumers of the active session work with.
#[derive(Debug, Clone)]
pub struct ActiveHandles {
    pub session: SessionId,
    pub chain: Arc<ChainConfig>,
    pub client: ChainClient,
    pub api: ChainApi,
}

#[derive(Debug)]
enum Command {
    Activate(Arc<ChainConfig>),
}

/// Cloneable access to a running session manager.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    handles: watch::Receiver<Option<ActiveHandles>>,
}

impl SessionHandle {
    /// Switch to `chain`, tearing the current session down first.
    ///
    /// Only fails when the manager has shut down; connection failures are
    /// reported through [`SessionHandle::status`].
    pub fn activate_chain(&self, chain: Arc<ChainConfig>) -> Result<(), ChainError> {
        self.commands
            .send(Command::Activate(chain))
            .map_err(|_| ChainError::ManagerStopped)
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Client and API of the connected session, if any.
    pub fn active_handles(&self) -> Option<ActiveHandles> {
        self.handles.borrow().clone()
    }

    pub fn subscribe_handles(&self) -> watch::Receiver<Option<ActiveHandles>> {
        self.handles.clone()
    }
}

/// Runs the session actor. Dropping the manager stops it.
pub struct SessionManager {
    handle: SessionHandle,
    task: JoinHandle<()>,
    shutdown: DropGuard,
}

impl SessionManager {
    /// Spawn an idle manager on the current tokio runtime.
    pub fn spawn<B: LightClientBackend>(backend: B) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::Idle);
        let (handles_tx, handles_rx) = watch::channel(None);
        let shutdown = CancellationToken::new();

        let actor = SessionActor {
            backend: Arc::new(backend),
            status_tx,
            handles_tx,
            last_session: 0,
            current: None,
        };
        let task = tokio::spawn(actor.run(command_rx, shutdown.clone()));

        Self {
            handle: SessionHandle {
                commands: command_tx,
                status: status_rx,
                handles: handles_rx,
            },
            task,
            shutdown: shutdown.drop_guard(),
        }
    }

    /// Spawn a manager and activate `chain` right away.
    pub fn start<B: LightClientBackend>(backend: B, chain: Arc<ChainConfig>) -> Self {
        let manager = Self::spawn(backend);
        if let Err(e) = manager.activate_chain(chain) {
            tracing::warn!("Failed to activate default chain: {}", e);
        }
        manager
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop the actor and wait until the worker has been terminated.
    pub async fn shutdown(self) {
        let SessionManager { task, shutdown, .. } = self;
        shutdown.disarm().cancel();
        if let Err(e) = task.await {
            tracing::warn!("Session manager task failed: {}", e);
        }
    }
}

impl Deref for SessionManager {
    type Target = SessionHandle;

    fn deref(&self) -> &SessionHandle {
        &self.handle
    }
}

/// Resources of a connected session.
struct Session<W: LightClientWorker> {
    id: SessionId,
    scope: CancellationToken,
    // Dropped in order: chains, then the worker.
    chains: Vec<W::Chain>,
    worker: WorkerGuard<W>,
}

impl<W: LightClientWorker> Drop for Session<W> {
    fn drop(&mut self) {
        self.scope.cancel();
        tracing::info!(
            "Tearing down session {} ({} chains)",
            self.id,
            self.chains.len()
        );
    }
}

/// Outcome of a successful activation.
struct Established<W: LightClientWorker> {
    worker: WorkerGuard<W>,
    chains: Vec<W::Chain>,
    client: Arc<dyn RuntimeClient>,
}

struct PendingActivation<W: LightClientWorker> {
    session: SessionId,
    chain: Arc<ChainConfig>,
    future: BoxFuture<'static, Result<Established<W>, ChainError>>,
}

struct SessionActor<B: LightClientBackend> {
    backend: Arc<B>,
    status_tx: watch::Sender<SessionStatus>,
    handles_tx: watch::Sender<Option<ActiveHandles>>,
    last_session: u64,
    current: Option<Session<B::Worker>>,
}

impl<B: LightClientBackend> SessionActor<B> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        let mut pending: Option<PendingActivation<B::Worker>> = None;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(Command::Activate(chain)) => {
                        if let Some(superseded) = pending.take() {
                            tracing::info!(
                                "Abandoning activation {} of {}",
                                superseded.session,
                                superseded.chain.name
                            );
                        }
                        pending = self.begin(chain);
                    }
                    None => break,
                },
                result = poll_pending(&mut pending) => {
                    if let Some(activation) = pending.take() {
                        self.finish(activation.session, activation.chain, result);
                    }
                }
            }
        }

        drop(pending);
        self.teardown();
        self.status_tx.send_replace(SessionStatus::Idle);
        tracing::info!("Session manager stopped");
    }

    /// Release the current session and start connecting to `chain`.
    fn begin(&mut self, chain: Arc<ChainConfig>) -> Option<PendingActivation<B::Worker>> {
        self.teardown();

        // An unusable spec never gets as far as connecting
        if let Err(e) = chain.validate() {
            tracing::warn!("Not activating {}: {}", chain.name, e);
            self.status_tx.send_replace(SessionStatus::Error {
                chain: chain.key,
                error: Arc::new(e),
            });
            return None;
        }

        self.last_session += 1;
        let session = SessionId(self.last_session);
        tracing::info!(
            "Connecting to {} via light client (session {})...",
            chain.name,
            session
        );
        self.status_tx
            .send_replace(SessionStatus::Connecting { chain: chain.key });

        Some(PendingActivation {
            session,
            chain: chain.clone(),
            future: establish(self.backend.clone(), chain).boxed(),
        })
    }

    fn finish(
        &mut self,
        session: SessionId,
        chain: Arc<ChainConfig>,
        result: Result<Established<B::Worker>, ChainError>,
    ) {
        let established = match result {
            Ok(established) => established,
            Err(e) => {
                tracing::error!("Failed to connect to {}: {}", chain.name, e);
                self.status_tx.send_replace(SessionStatus::Error {
                    chain: chain.key,
                    error: Arc::new(e),
                });
                return;
            }
        };

        let scope = CancellationToken::new();
        let client = ChainClient::new(session, established.client, scope.clone());
        check_runtime(&chain, &client);
        let api = ChainApi::bind(chain.descriptors, &client);

        self.current = Some(Session {
            id: session,
            scope,
            chains: established.chains,
            worker: established.worker,
        });
        self.handles_tx.send_replace(Some(ActiveHandles {
            session,
            chain: chain.clone(),
            client,
            api,
        }));
        self.status_tx
            .send_replace(SessionStatus::Connected { chain: chain.key });
        tracing::info!("Connected to {} (session {})", chain.name, session);
    }

    fn teardown(&mut self) {
        self.handles_tx.send_replace(None);
        self.current = None;
    }
}

async fn poll_pending<W: LightClientWorker>(
    pending: &mut Option<PendingActivation<W>>,
) -> Result<Established<W>, ChainError> {
    match pending {
        Some(activation) => (&mut activation.future).await,
        None => future::pending().await,
    }
}

/// Spawn a worker and attach the chain, relay first.
async fn establish<B: LightClientBackend>(
    backend: Arc<B>,
    chain: Arc<ChainConfig>,
) -> Result<Established<B::Worker>, ChainError> {
    let target_spec = chain.validate()?;
    let total_start = std::time::Instant::now();

    let worker = backend.spawn_worker().await.map_err(|e| {
        if e.is_session_failure() {
            e
        } else {
            ChainError::WorkerSpawn(e.to_string())
        }
    })?;
    let mut worker = WorkerGuard::new(worker);
    tracing::debug!("Light client worker spawned in {:?}", total_start.elapsed());

    let relay = match &chain.relay_chain_spec {
        Some(relay_spec) => {
            let start = std::time::Instant::now();
            let relay = worker
                .add_chain(relay_spec, &[])
                .await
                .map_err(|e| attach_failure(ChainRole::Relay, relay_spec, e))?;
            tracing::debug!(
                "Relay chain {} attached in {:?}",
                relay_spec.name(),
                start.elapsed()
            );
            Some(relay)
        }
        None => None,
    };

    let start = std::time::Instant::now();
    let target = {
        let potential_relay_chains: Vec<_> = relay.iter().collect();
        worker
            .add_chain(target_spec, &potential_relay_chains)
            .await
            .map_err(|e| attach_failure(ChainRole::Target, target_spec, e))?
    };
    let client = worker
        .create_client(&target)
        .await
        .map_err(|e| attach_failure(ChainRole::Target, target_spec, e))?;
    tracing::debug!(
        "{} attached in {:?}",
        target_spec.name(),
        start.elapsed()
    );

    let mut chains: Vec<_> = relay.into_iter().collect();
    chains.push(target);

    tracing::info!(
        "Light client session for {} ready in {:?}",
        chain.name,
        total_start.elapsed()
    );

    Ok(Established {
        worker,
        chains,
        client,
    })
}

fn attach_failure(role: ChainRole, spec: &ChainSpec, error: ChainError) -> ChainError {
    match error {
        ChainError::ChainAttach { .. } => error,
        other => ChainError::ChainAttach {
            role,
            chain: spec.name().to_string(),
            reason: other.to_string(),
        },
    }
}

/// Warn when the runtime is not the one the typed API expects.
fn check_runtime(chain: &ChainConfig, client: &ChainClient) {
    let expected = chain.descriptors.spec_name();
    match client.spec_name() {
        Some(actual) if actual != expected => tracing::warn!(
            "{} runs runtime '{}' but its API was built for '{}'",
            chain.name,
            actual,
            expected
        ),
        Some(_) => tracing::debug!("{} runtime matches '{}'", chain.name, expected),
        None => tracing::debug!("Could not read runtime version of {}", chain.name),
    }
}
