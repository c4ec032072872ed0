//! Client for the claim-code API.

use memo_core::{ApiErrorBody, Memo};
use reqwest::{StatusCode, Url};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoApiError {
    /// Error message returned by the API.
    #[error("{0}")]
    Api(String),

    #[error("Failed to fetch memo: {0}")]
    Status(StatusCode),

    #[error("Invalid API URL {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct MemoApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl MemoApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn memo_url(&self, code: &str) -> Result<Url, MemoApiError> {
        let endpoint = format!("{}/api/memo", self.base_url.trim_end_matches('/'));
        Url::parse_with_params(&endpoint, &[("code", code)])
            .map_err(|e| MemoApiError::InvalidUrl(format!("{}: {}", endpoint, e)))
    }

    /// Look up the MEMO a claim code belongs to.
    pub async fn fetch_memo_by_code(&self, code: &str) -> Result<Memo, MemoApiError> {
        let url = self.memo_url(code)?;
        tracing::debug!("Fetching memo from {}", url);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ApiErrorBody>().await.ok();
            return Err(match body {
                Some(body) if !body.error.is_empty() => MemoApiError::Api(body.error),
                _ => MemoApiError::Status(status),
            });
        }

        Ok(response.json::<Memo>().await?)
    }

    /// Whether `code` refers to an existing MEMO.
    pub async fn validate_claim_code(&self, code: &str) -> bool {
        match self.fetch_memo_by_code(code).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Claim code rejected: {}", e);
                false
            }
        }
    }
}
