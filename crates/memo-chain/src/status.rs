//! Chain status observer.
//!
//! Combines the session status with the finalized block stream of the
//! active client into the indicator shown to the user. Only reports
//! `connected` once a finalized block has arrived from the current session.

use crate::backend::FinalizedBlockStream;
use crate::error::ChainError;
use crate::session::{ActiveHandles, SessionHandle, SessionStatus};
use futures::future::{self, BoxFuture};
use futures::{FutureExt, StreamExt};
use memo_core::{BlockNumber, ChainKey, ConnectionStatus, FinalizedBlock};
use std::fmt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Derive the user-facing status.
///
/// `latest_block` is the newest finalized block seen from the current
/// session, if any.
pub fn derive_status(session: &SessionStatus, latest_block: Option<BlockNumber>) -> ConnectionStatus {
    match session {
        SessionStatus::Connected { .. } if latest_block.is_some() => ConnectionStatus::Connected,
        SessionStatus::Error { .. } => ConnectionStatus::Error,
        _ => ConnectionStatus::Connecting,
    }
}

/// Chain status as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainIndicator {
    pub status: ConnectionStatus,
    pub chain: Option<ChainKey>,
    pub block_number: Option<BlockNumber>,
    /// Why the session failed, when `status` is `Error`.
    pub cause: Option<String>,
}

impl ChainIndicator {
    fn new(session: &SessionStatus, latest_block: Option<BlockNumber>) -> Self {
        let status = derive_status(session, latest_block);
        Self {
            status,
            chain: session.chain(),
            block_number: match status {
                ConnectionStatus::Connected => latest_block,
                _ => None,
            },
            cause: session.error().map(|e| e.to_string()),
        }
    }
}

impl Default for ChainIndicator {
    fn default() -> Self {
        Self::new(&SessionStatus::Idle, None)
    }
}

impl fmt::Display for ChainIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = self
            .chain
            .map(|c| c.to_string())
            .unwrap_or_else(|| "chain".to_string());
        match (self.status, self.block_number) {
            (ConnectionStatus::Connected, Some(block)) => {
                write!(f, "connected to {} via lightclient #{}", chain, block)
            }
            (ConnectionStatus::Connected, None) => write!(f, "connected to {} via lightclient", chain),
            (ConnectionStatus::Connecting, _) => write!(f, "connecting to {} via lightclient", chain),
            (ConnectionStatus::Error, _) => write!(
                f,
                "error: {}",
                self.cause.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Keeps a [`ChainIndicator`] up to date. Dropping it stops observing.
pub struct ChainStatusObserver {
    indicator: watch::Receiver<ChainIndicator>,
    task: JoinHandle<()>,
    shutdown: DropGuard,
}

impl ChainStatusObserver {
    pub fn spawn(session: &SessionHandle) -> Self {
        let (indicator_tx, indicator_rx) = watch::channel(ChainIndicator::default());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(observe(
            session.subscribe_status(),
            session.subscribe_handles(),
            indicator_tx,
            shutdown.clone(),
        ));

        Self {
            indicator: indicator_rx,
            task,
            shutdown: shutdown.drop_guard(),
        }
    }

    pub fn indicator(&self) -> ChainIndicator {
        self.indicator.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChainIndicator> {
        self.indicator.clone()
    }

    pub async fn shutdown(self) {
        let ChainStatusObserver { task, shutdown, .. } = self;
        shutdown.disarm().cancel();
        if let Err(e) = task.await {
            tracing::warn!("Chain status observer failed: {}", e);
        }
    }
}

/// Finalized block subscription being opened for a session.
type Opening = BoxFuture<'static, (ActiveHandles, Result<FinalizedBlockStream, ChainError>)>;

async fn observe(
    mut status_rx: watch::Receiver<SessionStatus>,
    mut handles_rx: watch::Receiver<Option<ActiveHandles>>,
    indicator_tx: watch::Sender<ChainIndicator>,
    shutdown: CancellationToken,
) {
    let mut blocks: Option<FinalizedBlockStream> = None;
    let mut latest: Option<BlockNumber> = None;

    let handles = handles_rx.borrow_and_update().clone();
    let mut opening = open_blocks(handles, &mut blocks, &mut latest);

    loop {
        publish(&indicator_tx, &status_rx.borrow(), latest);

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            changed = handles_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let handles = handles_rx.borrow_and_update().clone();
                // Replaces any subscription still being opened
                opening = open_blocks(handles, &mut blocks, &mut latest);
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            (handles, result) = poll_opening(&mut opening) => {
                opening = None;
                match result {
                    Ok(stream) => {
                        tracing::debug!(
                            "Following finalized blocks of {} (session {})",
                            handles.chain.name,
                            handles.session
                        );
                        blocks = Some(stream);
                    }
                    Err(e) => tracing::warn!(
                        "Failed to subscribe to finalized blocks of {}: {}",
                        handles.chain.name,
                        e
                    ),
                }
            }
            item = next_block(&mut blocks) => match item {
                Some(Ok(block)) => latest = Some(block.number),
                Some(Err(e)) => {
                    tracing::warn!("Finalized block subscription failed: {}", e);
                    blocks = None;
                }
                None => {
                    tracing::debug!("Finalized block subscription ended");
                    blocks = None;
                }
            }
        }
    }
}

/// Drop the current subscription and start opening one for `handles`.
fn open_blocks(
    handles: Option<ActiveHandles>,
    blocks: &mut Option<FinalizedBlockStream>,
    latest: &mut Option<BlockNumber>,
) -> Option<Opening> {
    *blocks = None;
    *latest = None;

    let handles = handles?;
    Some(
        async move {
            let result = handles.client.finalized_blocks().await;
            (handles, result)
        }
        .boxed(),
    )
}

async fn poll_opening(
    opening: &mut Option<Opening>,
) -> (ActiveHandles, Result<FinalizedBlockStream, ChainError>) {
    match opening {
        Some(subscribe) => subscribe.await,
        None => future::pending().await,
    }
}

async fn next_block(
    blocks: &mut Option<FinalizedBlockStream>,
) -> Option<Result<FinalizedBlock, ChainError>> {
    match blocks {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}

fn publish(
    indicator_tx: &watch::Sender<ChainIndicator>,
    session: &SessionStatus,
    latest: Option<BlockNumber>,
) {
    let next = ChainIndicator::new(session, latest);
    indicator_tx.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}
