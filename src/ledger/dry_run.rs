//! Dry-run signing service
//!
//! Derives a stable address from the seed and pretends every broadcast
//! succeeded. Nothing leaves the process.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::address::{self, ADDRESS_BYTES};
use super::types::{BroadcastResponse, Identity, KeyHandle, LedgerMessage, Seed};
use super::SigningService;
use crate::error::{Error, Result};

pub struct DryRunSigner {
    address_prefix: String,
    broadcasts: AtomicU64,
}

impl DryRunSigner {
    pub fn new(address_prefix: &str) -> Self {
        Self {
            address_prefix: address_prefix.to_string(),
            broadcasts: AtomicU64::new(0),
        }
    }

    /// Number of transactions "broadcast" so far
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SigningService for DryRunSigner {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn derive_identity(&self, seed: &Seed, label: &str) -> Result<Identity> {
        let digest = Sha256::digest(seed.expose().as_bytes());
        let address = address::encode(&self.address_prefix, &digest[..ADDRESS_BYTES])?;
        Ok(Identity::new(label, address.clone(), KeyHandle::new(address)))
    }

    async fn broadcast(
        &self,
        identity: &Identity,
        messages: &[LedgerMessage],
    ) -> Result<BroadcastResponse> {
        if messages.is_empty() {
            return Err(Error::Broadcast("transaction has no messages".to_string()));
        }

        let nonce = self.broadcasts.fetch_add(1, Ordering::SeqCst);
        let body = serde_json::to_vec(messages)?;

        let mut hasher = Sha256::new();
        hasher.update(identity.address.as_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.update(&body);
        let hash = format!("{:X}", hasher.finalize());

        info!(
            "DRY-RUN: would broadcast {} message(s) from {} ({})",
            messages.len(),
            identity.address,
            messages[0].type_url()
        );

        Ok(BroadcastResponse {
            code: 0,
            hash,
            raw_log: "dry-run".to_string(),
        })
    }
}
