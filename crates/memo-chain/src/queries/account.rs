//! Account-related chain queries.

use crate::error::ChainError;
use memo_core::AccountData;
use subxt::dynamic::{At, DecodedValueThunk, Value};
use subxt::utils::{AccountId32, H256};
use subxt::{OnlineClient, PolkadotConfig};

/// Fetch the `AccountData` of `account` at block `at`.
pub async fn fetch_account_data(
    client: &OnlineClient<PolkadotConfig>,
    account: &AccountId32,
    at: H256,
) -> Result<AccountData, ChainError> {
    let storage_query = subxt::dynamic::storage(
        "System",
        "Account",
        vec![Value::from_bytes(account.clone())],
    );

    let result: Option<DecodedValueThunk> =
        client.storage().at(at).fetch(&storage_query).await?;

    let Some(value) = result else {
        return Ok(AccountData::default());
    };

    Ok(account_data_from_value(&value.to_value()?))
}

/// Extract `AccountData` from a decoded `AccountInfo`.
///
/// AccountInfo = { nonce, consumers, providers, sufficients, data: AccountData }
/// AccountData = { free, reserved, frozen, flags }
pub fn account_data_from_value<T>(decoded: &Value<T>) -> AccountData {
    let data = decoded.at("data");
    let field = |name: &str| {
        data.and_then(|d| d.at(name))
            .and_then(|v: &Value<T>| v.as_u128())
            .unwrap_or(0)
    };

    // ExtraFlags is a newtype around u128
    let flags = data
        .and_then(|d| d.at("flags"))
        .and_then(|v: &Value<T>| v.as_u128().or_else(|| v.at(0).and_then(|inner| inner.as_u128())))
        .unwrap_or(0);

    AccountData {
        free: field("free"),
        reserved: field("reserved"),
        frozen: field("frozen"),
        flags,
    }
}
