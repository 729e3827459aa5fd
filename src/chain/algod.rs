//! Algorand node (algod) REST client

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ChainClient, ChainError, ChainResult, NetworkParams, TxId};

/// Rounds a new transaction stays valid for
pub const VALIDITY_WINDOW: u64 = 1000;

const TOKEN_HEADER: &str = "X-Algo-API-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TransactionParams {
    fee: u64,
    genesis_hash: String,
    genesis_id: String,
    last_round: u64,
    min_fee: u64,
}

impl TransactionParams {
    fn into_network_params(self) -> ChainResult<NetworkParams> {
        let genesis_hash: [u8; 32] = BASE64
            .decode(&self.genesis_hash)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| ChainError::Decode("genesis-hash is not 32 base64 bytes".to_string()))?;

        Ok(NetworkParams {
            fee: self.fee,
            min_fee: self.min_fee,
            first_valid: self.last_round,
            last_valid: self.last_round + VALIDITY_WINDOW,
            genesis_id: self.genesis_id,
            genesis_hash,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

/// HTTP client for one algod node
#[derive(Clone)]
pub struct AlgodClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl AlgodClient {
    /// Create a client for `base_url`, with an optional API token
    pub fn new(base_url: &str, token: Option<String>) -> ChainResult<Self> {
        let base_url = base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ChainError::InvalidConfig("algod URL is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(AlgodClient {
            base_url: base_url.to_string(),
            token: token.filter(|t| !t.is_empty()),
            client,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ChainResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "algod request failed");
            return Err(ChainError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ChainError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for AlgodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgodClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[async_trait]
impl ChainClient for AlgodClient {
    async fn network_parameters(&self) -> ChainResult<NetworkParams> {
        let response = self
            .request(reqwest::Method::GET, "/v2/transactions/params")
            .send()
            .await?;
        let params: TransactionParams = Self::read_json(response).await?;
        let params = params.into_network_params()?;

        debug!(
            first_valid = params.first_valid,
            genesis = %params.genesis_id,
            "fetched network parameters"
        );
        Ok(params)
    }

    async fn submit(&self, signed: &[u8]) -> ChainResult<TxId> {
        let response = self
            .request(reqwest::Method::POST, "/v2/transactions")
            .header(CONTENT_TYPE, "application/x-binary")
            .body(signed.to_vec())
            .send()
            .await?;
        let submitted: SubmitResponse = Self::read_json(response).await?;

        Ok(TxId(submitted.tx_id))
    }
}
