//! Ledger access
//!
//! The orchestrator never signs or reads chain state itself. It talks to two
//! collaborators through the traits below:
//!
//! ```text
//! SigningService  - derive identity from seed, sign + broadcast messages
//! QueryService    - balances, account metadata, validators, rewards
//! ```
//!
//! Shipped implementations: `LcdClient` (REST query service), `RemoteSigner`
//! (HTTP signing sidecar) and `DryRunSigner` (hashes messages, submits nothing).

pub mod address;
pub mod dry_run;
pub mod lcd;
pub mod remote;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::amount::MicroAmount;
use crate::error::{Error, Result};

pub use dry_run::DryRunSigner;
pub use lcd::LcdClient;
pub use remote::RemoteSigner;
pub use types::{
    AccountMeta, BroadcastResponse, Coin, Identity, KeyHandle, LedgerMessage, RewardEntry,
    RewardSnapshot, Seed, ValidatorInfo,
};

/// Holds keys and submits signed transactions
#[async_trait]
pub trait SigningService: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Derive the signing identity for a seed
    async fn derive_identity(&self, seed: &Seed, label: &str) -> Result<Identity>;

    /// Sign all messages into one transaction and broadcast it.
    ///
    /// A ledger-side rejection is a successful call with a nonzero `code`.
    async fn broadcast(
        &self,
        identity: &Identity,
        messages: &[LedgerMessage],
    ) -> Result<BroadcastResponse>;

    /// Broadcast a single message, treating a nonzero code as an error
    async fn broadcast_single(&self, identity: &Identity, message: LedgerMessage) -> Result<String> {
        let response = self.broadcast(identity, std::slice::from_ref(&message)).await?;
        if response.is_success() {
            Ok(response.hash)
        } else {
            Err(Error::Rejected {
                code: response.code,
                raw_log: response.raw_log,
            })
        }
    }
}

/// Read side of the ledger
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Spendable balance in the network denom. Lookup failures read as zero.
    async fn balance(&self, address: &str) -> MicroAmount;

    /// Account number and sequence
    async fn account_meta(&self, address: &str) -> Result<AccountMeta>;

    /// Validators in the bonded set, at most `limit`
    async fn bonded_validators(&self, limit: u32) -> Result<Vec<ValidatorInfo>>;

    /// Pending delegation rewards for a delegator
    async fn rewards(&self, delegator: &str) -> Result<RewardSnapshot>;
}
