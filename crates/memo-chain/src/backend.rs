//! Light client backend abstraction.
//!
//! A backend spawns workers; a worker hosts chains and builds clients for
//! them. The session manager is the only caller, so a worker never outlives
//! the session that spawned it.

use crate::error::ChainError;
use crate::registry::ChainSpec;
use async_trait::async_trait;
use futures::stream::BoxStream;
use memo_core::{AccountData, BlockTag, FinalizedBlock};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

pub type FinalizedBlockStream = BoxStream<'static, Result<FinalizedBlock, ChainError>>;
pub type AccountDataStream = BoxStream<'static, Result<AccountData, ChainError>>;

/// Spawns light client workers.
#[async_trait]
pub trait LightClientBackend: Send + Sync + 'static {
    type Worker: LightClientWorker;

    async fn spawn_worker(&self) -> Result<Self::Worker, ChainError>;
}

/// A running light client instance.
#[async_trait]
pub trait LightClientWorker: Send + 'static {
    /// Handle on a chain hosted by this worker.
    type Chain: Send + Sync + 'static;

    /// Attach a chain. Parachains name the relay chain they follow in
    /// `potential_relay_chains`.
    async fn add_chain(
        &mut self,
        chain_spec: &ChainSpec,
        potential_relay_chains: &[&Self::Chain],
    ) -> Result<Self::Chain, ChainError>;

    /// Build a client talking to an attached chain.
    async fn create_client(
        &mut self,
        chain: &Self::Chain,
    ) -> Result<Arc<dyn RuntimeClient>, ChainError>;

    /// Stop the worker. Every chain and client derived from it stops working.
    fn terminate(&mut self);
}

/// Client for one chain's runtime.
#[async_trait]
pub trait RuntimeClient: Send + Sync + 'static {
    async fn finalized_blocks(&self) -> Result<FinalizedBlockStream, ChainError>;

    /// Watch `System.Account` for `address`, yielding each distinct value.
    async fn system_account(
        &self,
        address: &str,
        at: BlockTag,
    ) -> Result<AccountDataStream, ChainError>;

    /// Runtime `spec_name`, when the client can tell.
    fn spec_name(&self) -> Option<String>;
}

/// Owns a worker and terminates it when dropped.
pub struct WorkerGuard<W: LightClientWorker> {
    worker: W,
}

impl<W: LightClientWorker> WorkerGuard<W> {
    pub fn new(worker: W) -> Self {
        Self { worker }
    }
}

impl<W: LightClientWorker> Deref for WorkerGuard<W> {
    type Target = W;

    fn deref(&self) -> &W {
        &self.worker
    }
}

impl<W: LightClientWorker> DerefMut for WorkerGuard<W> {
    fn deref_mut(&mut self) -> &mut W {
        &mut self.worker
    }
}

impl<W: LightClientWorker> Drop for WorkerGuard<W> {
    fn drop(&mut self) {
        self.worker.terminate();
    }
}
