//! Scripted signing and query services for tests

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::types::{
    AccountMeta, BroadcastResponse, Identity, KeyHandle, LedgerMessage, RewardEntry,
    RewardSnapshot, Seed, ValidatorInfo,
};
use super::{QueryService, SigningService};
use crate::amount::MicroAmount;
use crate::error::{Error, Result};

/// Signer that replays queued responses, then succeeds with "TX{n}" hashes
#[derive(Default)]
pub(crate) struct ScriptedSigner {
    responses: Mutex<VecDeque<Result<BroadcastResponse>>>,
    sent: Mutex<Vec<(String, Vec<LedgerMessage>)>>,
    counter: AtomicUsize,
}

impl ScriptedSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, hash: &str) {
        self.push(Ok(BroadcastResponse {
            code: 0,
            hash: hash.to_string(),
            raw_log: String::new(),
        }));
    }

    pub fn push_code(&self, code: u32, raw_log: &str) {
        self.push(Ok(BroadcastResponse {
            code,
            hash: String::new(),
            raw_log: raw_log.to_string(),
        }));
    }

    pub fn push_err(&self, error: Error) {
        self.push(Err(error));
    }

    fn push(&self, response: Result<BroadcastResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Every broadcast so far: (signer address, messages)
    pub fn sent(&self) -> Vec<(String, Vec<LedgerMessage>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SigningService for ScriptedSigner {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn derive_identity(&self, _seed: &Seed, label: &str) -> Result<Identity> {
        Ok(identity(label))
    }

    async fn broadcast(
        &self,
        identity: &Identity,
        messages: &[LedgerMessage],
    ) -> Result<BroadcastResponse> {
        self.sent
            .lock()
            .unwrap()
            .push((identity.address.clone(), messages.to_vec()));
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(BroadcastResponse {
                code: 0,
                hash: format!("TX{}", n),
                raw_log: String::new(),
            }),
        }
    }
}

/// Query service over fixed data
#[derive(Default)]
pub(crate) struct StaticQuery {
    pub validators: Vec<ValidatorInfo>,
    pub fail_validators: bool,
    pub rewards: HashMap<String, RewardSnapshot>,
    pub fail_rewards_for: Vec<String>,
    pub balances: HashMap<String, MicroAmount>,
    pub validator_calls: AtomicUsize,
}

#[async_trait]
impl QueryService for StaticQuery {
    async fn balance(&self, address: &str) -> MicroAmount {
        self.balances.get(address).copied().unwrap_or_default()
    }

    async fn account_meta(&self, _address: &str) -> Result<AccountMeta> {
        Ok(AccountMeta {
            account_number: 1,
            sequence: 0,
        })
    }

    async fn bonded_validators(&self, limit: u32) -> Result<Vec<ValidatorInfo>> {
        self.validator_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_validators {
            return Err(Error::QueryStatus {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(self.validators.iter().take(limit as usize).cloned().collect())
    }

    async fn rewards(&self, delegator: &str) -> Result<RewardSnapshot> {
        if self.fail_rewards_for.iter().any(|d| d == delegator) {
            return Err(Error::Query(format!("rewards lookup for {} failed", delegator)));
        }
        Ok(self.rewards.get(delegator).cloned().unwrap_or_default())
    }
}

pub(crate) fn identity(label: &str) -> Identity {
    Identity::new(label, format!("empe1{}", label), KeyHandle::new(label))
}

pub(crate) fn validator(address: &str, commission: Decimal) -> ValidatorInfo {
    ValidatorInfo {
        operator_address: address.to_string(),
        moniker: address.to_string(),
        jailed: false,
        bonded: true,
        commission,
        tokens: MicroAmount::new(1_000_000_000),
    }
}

pub(crate) fn snapshot(entries: &[(&str, u128)]) -> RewardSnapshot {
    let entries: Vec<RewardEntry> = entries
        .iter()
        .map(|(validator, amount)| RewardEntry {
            validator: validator.to_string(),
            amount: MicroAmount::new(*amount),
        })
        .collect();
    let total = entries.iter().map(|e| e.amount.get()).sum();
    RewardSnapshot {
        total: MicroAmount::new(total),
        entries,
    }
}
