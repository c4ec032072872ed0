//! Static per-chain configuration.
//!
//! - RPC endpoints: ordered fallbacks, kept for parity with RPC-based clients
//! - Chain spec files: well-known names under the chain spec directory
//! - Chain spec URLs: where missing specs are downloaded from

use memo_core::ChainKey;

/// Base URL of the substrate-connect known chain specs.
const KNOWN_CHAINS_BASE_URL: &str = "https://raw.githubusercontent.com/paritytech/substrate-connect/main/packages/connect-known-chains/specs";

/// Get the RPC endpoints for a chain, in preference order.
pub fn get_rpc_endpoints(chain: ChainKey) -> &'static [&'static str] {
    match chain {
        ChainKey::Polkadot => &["wss://rpc.polkadot.io"],
        ChainKey::PolkadotAssetHub => &[
            "wss://polkadot-asset-hub-rpc.polkadot.io",
            "wss://statemint.api.onfinality.io/public-ws",
        ],
        ChainKey::Kusama => &["wss://rpc.ibp.network/kusama"],
        ChainKey::KusamaAssetHub => &["wss://asset-hub-kusama-rpc.dwellir.com"],
    }
}

/// Get the file name a chain's spec is stored under.
pub fn get_chain_spec_file(chain: ChainKey) -> &'static str {
    match chain {
        ChainKey::Polkadot => "polkadot.json",
        ChainKey::PolkadotAssetHub => "polkadot_asset_hub.json",
        ChainKey::Kusama => "ksmcc3.json",
        ChainKey::KusamaAssetHub => "ksmcc3_asset_hub.json",
    }
}

/// Get the URL a chain's spec can be downloaded from.
pub fn get_chain_spec_url(chain: ChainKey) -> String {
    format!("{}/{}", KNOWN_CHAINS_BASE_URL, get_chain_spec_file(chain))
}

/// Runtime `spec_name` the chain's typed API is generated for.
pub fn get_expected_spec_name(chain: ChainKey) -> &'static str {
    match chain {
        ChainKey::Polkadot => "polkadot",
        ChainKey::PolkadotAssetHub => "statemint",
        ChainKey::Kusama => "kusama",
        ChainKey::KusamaAssetHub => "statemine",
    }
}
