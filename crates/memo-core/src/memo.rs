//! MEMO claim records as returned by the claim-code API.

use serde::{Deserialize, Serialize};

/// A claimable MEMO, as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    pub id: String,
    pub chain: String,
    pub collection: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub mint: String,
    pub created_at: String,
    pub expires_at: String,
}

impl Memo {
    /// The chain this MEMO is minted on, if it is one we know.
    pub fn chain_key(&self) -> Option<crate::ChainKey> {
        crate::ChainKey::from_key(&self.chain)
    }
}

/// Error body returned by the API on non-success responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}
