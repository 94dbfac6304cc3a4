//! Remote signing service client
//!
//! Keys live in a signing sidecar; this client hands it seeds once at connect
//! time and message sets afterwards. The sidecar builds, signs and broadcasts
//! the transaction and reports the ledger's response code.
//!
//! ```text
//! POST {url}/v1/identities  { mnemonic, prefix, label, rpc_url } -> { address, key_id }
//! POST {url}/v1/broadcast   { key_id, chain_id, rpc_url, gas_price,
//!                             timeout_ms, memo, messages[] }      -> { code, txhash, raw_log }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::types::{BroadcastResponse, Identity, KeyHandle, LedgerMessage, Seed};
use super::SigningService;
use crate::error::{Error, Result};

/// Chain parameters the sidecar needs for every transaction
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub chain_id: String,
    /// Tendermint RPC endpoint the sidecar signs against and broadcasts to
    pub rpc_url: String,
    pub address_prefix: String,
    /// e.g. "0.025uempe"
    pub gas_price: String,
    pub broadcast_timeout_ms: u64,
}

#[derive(Debug, Serialize)]
struct DeriveRequest<'a> {
    mnemonic: &'a str,
    prefix: &'a str,
    label: &'a str,
    rpc_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct DeriveResponse {
    address: Option<String>,
    key_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct BroadcastRequest<'a> {
    key_id: &'a str,
    chain_id: &'a str,
    rpc_url: &'a str,
    gas_price: &'a str,
    timeout_ms: u64,
    memo: &'a str,
    messages: &'a [LedgerMessage],
}

/// The sidecar answers either with the ledger result or with `{ "error": ... }`
fn parse_broadcast_reply(reply: serde_json::Value) -> Result<BroadcastResponse> {
    if let Some(error) = reply.get("error").and_then(|e| e.as_str()) {
        return Err(Error::Broadcast(error.to_string()));
    }
    serde_json::from_value(reply)
        .map_err(|e| Error::Broadcast(format!("No transaction result in response: {}", e)))
}

/// HTTP client for the signing sidecar
pub struct RemoteSigner {
    client: Client,
    base_url: String,
    chain: ChainParams,
}

impl RemoteSigner {
    /// Create a new remote signer client
    pub fn new(base_url: &str, chain: ChainParams) -> Result<Self> {
        // Leave headroom over the sidecar's own broadcast timeout
        let timeout = Duration::from_millis(chain.broadcast_timeout_ms + 5_000);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain,
        })
    }
}

#[async_trait]
impl SigningService for RemoteSigner {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn derive_identity(&self, seed: &Seed, label: &str) -> Result<Identity> {
        let request = DeriveRequest {
            mnemonic: seed.expose(),
            prefix: &self.chain.address_prefix,
            label,
            rpc_url: &self.chain.rpc_url,
        };

        let response = self
            .client
            .post(format!("{}/v1/identities", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Signer(format!("HTTP request failed: {}", e)))?;

        let reply: DeriveResponse = response
            .json()
            .await
            .map_err(|e| Error::Deserialization(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = reply.error {
            return Err(Error::InvalidSeed(error));
        }

        let address = reply
            .address
            .ok_or_else(|| Error::Signer("No address in response".to_string()))?;
        let key_id = reply.key_id.unwrap_or_else(|| address.clone());

        info!("Signing service derived {} ({})", label, address);
        Ok(Identity::new(label, address, KeyHandle::new(key_id)))
    }

    async fn broadcast(
        &self,
        identity: &Identity,
        messages: &[LedgerMessage],
    ) -> Result<BroadcastResponse> {
        let request = BroadcastRequest {
            key_id: identity.key.as_str(),
            chain_id: &self.chain.chain_id,
            rpc_url: &self.chain.rpc_url,
            gas_price: &self.chain.gas_price,
            timeout_ms: self.chain.broadcast_timeout_ms,
            memo: "",
            messages,
        };

        debug!(
            "Broadcasting {} message(s) for {}",
            messages.len(),
            identity.address
        );

        let response = self
            .client
            .post(format!("{}/v1/broadcast", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Broadcast(format!("HTTP request failed: {}", e)))?;

        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Broadcast(format!("Failed to parse response: {}", e)))?;

        parse_broadcast_reply(reply)
    }
}
