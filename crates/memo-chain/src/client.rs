//! Session-scoped chain client and typed query API.
//!
//! Both are handed out by the session manager. Every stream they produce
//! ends as soon as the session that created them is torn down.

use crate::backend::{AccountDataStream, FinalizedBlockStream, RuntimeClient};
use crate::error::ChainError;
use crate::registry::ChainDescriptors;
use futures::StreamExt;
use futures::stream::BoxStream;
use memo_core::{BlockTag, ChainKey};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Identifies one activation of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Client for the active chain, valid for the lifetime of one session.
#[derive(Clone)]
pub struct ChainClient {
    session: SessionId,
    inner: Arc<dyn RuntimeClient>,
    scope: CancellationToken,
}

impl ChainClient {
    pub(crate) fn new(
        session: SessionId,
        inner: Arc<dyn RuntimeClient>,
        scope: CancellationToken,
    ) -> Self {
        Self {
            session,
            inner,
            scope,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// False once the owning session has been torn down.
    pub fn is_active(&self) -> bool {
        !self.scope.is_cancelled()
    }

    pub fn spec_name(&self) -> Option<String> {
        self.inner.spec_name()
    }

    /// Subscribe to finalized blocks.
    pub async fn finalized_blocks(&self) -> Result<FinalizedBlockStream, ChainError> {
        self.ensure_active()?;
        let blocks = self.inner.finalized_blocks().await?;
        Ok(self.scoped(blocks))
    }

    async fn system_account(
        &self,
        address: &str,
        at: BlockTag,
    ) -> Result<AccountDataStream, ChainError> {
        self.ensure_active()?;
        let values = self.inner.system_account(address, at).await?;
        Ok(self.scoped(values))
    }

    fn ensure_active(&self) -> Result<(), ChainError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ChainError::WorkerTerminated)
        }
    }

    fn scoped<T: Send + 'static>(&self, stream: BoxStream<'static, T>) -> BoxStream<'static, T> {
        stream
            .take_until(self.scope.clone().cancelled_owned())
            .boxed()
    }
}

impl fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainClient")
            .field("session", &self.session)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Query API bound to one chain's runtime schema.
#[derive(Debug, Clone)]
pub struct TypedApi {
    client: ChainClient,
    descriptors: ChainDescriptors,
}

impl TypedApi {
    pub fn descriptors(&self) -> ChainDescriptors {
        self.descriptors
    }

    /// Watch `System.Account` for `address`.
    pub async fn system_account(
        &self,
        address: &str,
        at: BlockTag,
    ) -> Result<AccountDataStream, ChainError> {
        self.client.system_account(address, at).await
    }
}

/// Typed API of the active chain, one variant per known runtime.
#[derive(Debug, Clone)]
pub enum ChainApi {
    Polkadot(TypedApi),
    PolkadotAssetHub(TypedApi),
    Kusama(TypedApi),
    KusamaAssetHub(TypedApi),
}

impl ChainApi {
    /// Bind `client` to the runtime schema named by `descriptors`.
    pub fn bind(descriptors: ChainDescriptors, client: &ChainClient) -> Self {
        let api = TypedApi {
            client: client.clone(),
            descriptors,
        };
        match descriptors.chain() {
            ChainKey::Polkadot => ChainApi::Polkadot(api),
            ChainKey::PolkadotAssetHub => ChainApi::PolkadotAssetHub(api),
            ChainKey::Kusama => ChainApi::Kusama(api),
            ChainKey::KusamaAssetHub => ChainApi::KusamaAssetHub(api),
        }
    }

    pub fn chain(&self) -> ChainKey {
        match self {
            ChainApi::Polkadot(_) => ChainKey::Polkadot,
            ChainApi::PolkadotAssetHub(_) => ChainKey::PolkadotAssetHub,
            ChainApi::Kusama(_) => ChainKey::Kusama,
            ChainApi::KusamaAssetHub(_) => ChainKey::KusamaAssetHub,
        }
    }

    /// Queries shared by every known runtime.
    pub fn query(&self) -> &TypedApi {
        match self {
            ChainApi::Polkadot(api)
            | ChainApi::PolkadotAssetHub(api)
            | ChainApi::Kusama(api)
            | ChainApi::KusamaAssetHub(api) => api,
        }
    }

    pub fn session(&self) -> SessionId {
        self.query().client.session()
    }
}
