//! Chain registry: the static table of chains the client can activate.
//!
//! Chain specs are JSON documents stored by well-known file name in a spec
//! directory. They are handed to the light client verbatim; only the few
//! fields needed for validation and display are parsed.

use crate::config::{
    get_chain_spec_file, get_chain_spec_url, get_expected_spec_name, get_rpc_endpoints,
};
use crate::error::ChainError;
use memo_core::ChainKey;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Chain activated when nothing else is configured.
pub const DEFAULT_CHAIN: ChainKey = ChainKey::KusamaAssetHub;

/// Token properties advertised by a chain spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProperties {
    #[serde(default)]
    pub token_decimals: Option<u8>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub ss58_format: Option<u16>,
}

/// Fields of a chain spec the client looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSpecSummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub boot_nodes: Vec<String>,
    #[serde(default)]
    pub protocol_id: Option<String>,
    #[serde(default)]
    pub properties: ChainProperties,
    #[serde(default, rename = "relay_chain", alias = "relayChain")]
    pub relay_chain: Option<String>,
    #[serde(default, rename = "para_id", alias = "paraId")]
    pub para_id: Option<u32>,
}

/// A chain spec document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSpec {
    raw: String,
    summary: ChainSpecSummary,
}

impl ChainSpec {
    /// Parse a chain spec, keeping the document as-is.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ChainError> {
        let raw = raw.into();
        let summary: ChainSpecSummary = serde_json::from_str(&raw)
            .map_err(|e| ChainError::InvalidData(format!("Malformed chain spec: {}", e)))?;
        Ok(Self { raw, summary })
    }

    pub fn name(&self) -> &str {
        &self.summary.name
    }

    pub fn summary(&self) -> &ChainSpecSummary {
        &self.summary
    }

    /// The document passed to the light client.
    pub fn as_json(&self) -> &str {
        &self.raw
    }

    pub fn is_parachain(&self) -> bool {
        self.summary.relay_chain.is_some()
    }
}

/// Identity of the runtime schema a chain's typed API is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainDescriptors {
    chain: ChainKey,
}

impl ChainDescriptors {
    pub fn for_chain(chain: ChainKey) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> ChainKey {
        self.chain
    }

    /// Runtime `spec_name` the schema was generated from.
    pub fn spec_name(&self) -> &'static str {
        get_expected_spec_name(self.chain)
    }
}

/// Everything needed to activate a chain. Shared, never mutated.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub key: ChainKey,
    pub name: String,
    pub descriptors: ChainDescriptors,
    pub endpoints: Vec<String>,
    pub chain_spec: Option<ChainSpec>,
    /// Present iff the chain is a parachain; attached before `chain_spec`.
    pub relay_chain_spec: Option<ChainSpec>,
}

impl ChainConfig {
    pub fn new(
        key: ChainKey,
        chain_spec: Option<ChainSpec>,
        relay_chain_spec: Option<ChainSpec>,
    ) -> Self {
        Self {
            key,
            name: key.to_string(),
            descriptors: ChainDescriptors::for_chain(key),
            endpoints: get_rpc_endpoints(key).iter().map(|e| e.to_string()).collect(),
            chain_spec,
            relay_chain_spec,
        }
    }

    pub fn is_parachain(&self) -> bool {
        self.key.relay_chain().is_some()
    }

    /// Check the specs can be handed to a light client, returning the target spec.
    pub fn validate(&self) -> Result<&ChainSpec, ChainError> {
        let invalid = |reason: &str| ChainError::InvalidChainSpec {
            chain: self.name.clone(),
            reason: reason.to_string(),
        };

        let spec = self
            .chain_spec
            .as_ref()
            .ok_or_else(|| invalid("chain spec is missing"))?;
        if spec.name().trim().is_empty() {
            return Err(invalid("chain spec has no name"));
        }

        match (&self.relay_chain_spec, self.is_parachain()) {
            (Some(relay), _) if relay.name().trim().is_empty() => {
                Err(invalid("relay chain spec has no name"))
            }
            (None, true) => Err(invalid("relay chain spec is missing")),
            _ => Ok(spec),
        }
    }
}

/// The chains the client can activate, in display order.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<Arc<ChainConfig>>,
}

impl ChainRegistry {
    /// Build the registry, asking `spec_for` for each chain's spec once.
    pub fn from_specs(mut spec_for: impl FnMut(ChainKey) -> Option<ChainSpec>) -> Self {
        let specs: Vec<(ChainKey, Option<ChainSpec>)> = ChainKey::all()
            .iter()
            .map(|key| (*key, spec_for(*key)))
            .collect();
        let spec_of = |key: ChainKey| {
            specs
                .iter()
                .find(|(k, _)| *k == key)
                .and_then(|(_, spec)| spec.clone())
        };

        let chains = specs
            .iter()
            .map(|(key, spec)| {
                let relay = key.relay_chain().and_then(spec_of);
                Arc::new(ChainConfig::new(*key, spec.clone(), relay))
            })
            .collect();

        Self { chains }
    }

    /// Load chain specs from `dir`. Missing or unreadable specs leave the
    /// chain without a spec, which fails on activation.
    pub fn load(dir: &Path) -> Self {
        Self::from_specs(|key| read_chain_spec(dir, key))
    }

    pub fn chains(&self) -> &[Arc<ChainConfig>] {
        &self.chains
    }

    pub fn get(&self, key: ChainKey) -> Option<Arc<ChainConfig>> {
        self.chains.iter().find(|c| c.key == key).cloned()
    }

    pub fn default_chain(&self) -> Option<Arc<ChainConfig>> {
        self.get(DEFAULT_CHAIN)
    }
}

/// Path a chain's spec is stored at.
pub fn chain_spec_path(dir: &Path, key: ChainKey) -> PathBuf {
    dir.join(get_chain_spec_file(key))
}

fn read_chain_spec(dir: &Path, key: ChainKey) -> Option<ChainSpec> {
    let path = chain_spec_path(dir, key);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No chain spec for {} at {}", key, path.display());
            return None;
        }
        Err(e) => {
            tracing::warn!("Failed to read chain spec {}: {}", path.display(), e);
            return None;
        }
    };

    match ChainSpec::parse(raw) {
        Ok(spec) => Some(spec),
        Err(e) => {
            tracing::warn!("Ignoring chain spec {}: {}", path.display(), e);
            None
        }
    }
}

/// Fetch a chain spec from a URL.
pub async fn fetch_chain_spec(url: &str) -> Result<String, ChainError> {
    tracing::debug!("Fetching chain spec from {}", url);

    let start = std::time::Instant::now();
    let response = reqwest::get(url)
        .await
        .map_err(|e| ChainError::SpecFetch(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(ChainError::SpecFetch(format!(
            "{}: HTTP {}",
            url,
            response.status()
        )));
    }

    let spec = response
        .text()
        .await
        .map_err(|e| ChainError::SpecFetch(format!("{}: {}", url, e)))?;

    tracing::debug!(
        "Fetched chain spec ({} bytes) in {:?}",
        spec.len(),
        start.elapsed()
    );

    Ok(spec)
}

/// Download the specs missing from `dir`, returning the chains fetched.
pub async fn fetch_missing_specs(dir: &Path) -> Result<Vec<ChainKey>, ChainError> {
    tokio::fs::create_dir_all(dir).await?;

    let mut fetched = Vec::new();
    for key in ChainKey::all() {
        let path = chain_spec_path(dir, *key);
        if tokio::fs::try_exists(&path).await? {
            continue;
        }

        tracing::info!("Downloading {} chain spec...", key);
        let raw = fetch_chain_spec(&get_chain_spec_url(*key)).await?;
        ChainSpec::parse(raw.as_str())?;
        tokio::fs::write(&path, raw).await?;
        fetched.push(*key);
    }

    Ok(fetched)
}
