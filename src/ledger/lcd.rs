//! LCD (REST) query client
//!
//! Reads balances, account metadata, the bonded validator set and pending
//! rewards from a Cosmos-SDK light client daemon.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{AccountMeta, RewardEntry, RewardSnapshot, ValidatorInfo};
use super::QueryService;
use crate::amount::MicroAmount;
use crate::error::{Error, Result};

const BONDED_STATUS: &str = "BOND_STATUS_BONDED";

#[derive(Debug, Deserialize)]
struct ValidatorsResponse {
    #[serde(default)]
    validators: Vec<RawValidator>,
}

#[derive(Debug, Deserialize)]
struct RawValidator {
    operator_address: String,
    #[serde(default)]
    jailed: bool,
    #[serde(default)]
    status: String,
    #[serde(default)]
    tokens: String,
    commission: Option<RawCommission>,
    description: Option<RawDescription>,
}

#[derive(Debug, Deserialize)]
struct RawCommission {
    commission_rates: RawCommissionRates,
}

#[derive(Debug, Deserialize)]
struct RawCommissionRates {
    rate: String,
}

#[derive(Debug, Deserialize)]
struct RawDescription {
    #[serde(default)]
    moniker: String,
}

#[derive(Debug, Deserialize)]
struct RewardsResponse {
    #[serde(default)]
    rewards: Vec<RawDelegatorReward>,
    #[serde(default)]
    total: Vec<RawDecCoin>,
}

#[derive(Debug, Deserialize)]
struct RawDelegatorReward {
    validator_address: String,
    #[serde(default)]
    reward: Vec<RawDecCoin>,
}

#[derive(Debug, Deserialize)]
struct RawDecCoin {
    denom: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Option<RawDecCoin>,
}

impl RawValidator {
    fn into_info(self) -> Result<ValidatorInfo> {
        let commission = match self.commission {
            Some(c) => Decimal::from_str(c.commission_rates.rate.trim()).map_err(|e| {
                Error::Deserialization(format!(
                    "validator {} has bad commission {:?}: {}",
                    self.operator_address, c.commission_rates.rate, e
                ))
            })?,
            None => Decimal::ZERO,
        };

        Ok(ValidatorInfo {
            bonded: self.status.eq_ignore_ascii_case(BONDED_STATUS),
            tokens: MicroAmount::from_ledger(&self.tokens)?,
            moniker: self.description.map(|d| d.moniker).unwrap_or_default(),
            jailed: self.jailed,
            operator_address: self.operator_address,
            commission,
        })
    }
}

fn dec_coin_amount(coins: &[RawDecCoin], denom: &str) -> Result<MicroAmount> {
    coins
        .iter()
        .find(|c| c.denom == denom)
        .map(|c| MicroAmount::from_dec_coin(&c.amount))
        .unwrap_or(Ok(MicroAmount::ZERO))
}

fn parse_validators(body: ValidatorsResponse) -> Result<Vec<ValidatorInfo>> {
    body.validators
        .into_iter()
        .map(RawValidator::into_info)
        .collect()
}

fn parse_rewards(body: RewardsResponse, denom: &str) -> Result<RewardSnapshot> {
    let entries = body
        .rewards
        .into_iter()
        .map(|r| {
            Ok(RewardEntry {
                amount: dec_coin_amount(&r.reward, denom)?,
                validator: r.validator_address,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RewardSnapshot {
        total: dec_coin_amount(&body.total, denom)?,
        entries,
    })
}

/// Look up a numeric field anywhere in the account object.
///
/// Vesting and module accounts nest the base account one or two levels down.
fn find_u64(value: &serde_json::Value, key: &str) -> Option<u64> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(found) = map.get(key) {
                return match found {
                    serde_json::Value::String(s) => s.parse().ok(),
                    serde_json::Value::Number(n) => n.as_u64(),
                    _ => None,
                };
            }
            map.values().find_map(|v| find_u64(v, key))
        }
        _ => None,
    }
}

fn parse_account(body: &serde_json::Value) -> Result<AccountMeta> {
    let account = body
        .get("account")
        .ok_or_else(|| Error::Deserialization("account response has no account".to_string()))?;

    Ok(AccountMeta {
        account_number: find_u64(account, "account_number").unwrap_or(0),
        sequence: find_u64(account, "sequence").unwrap_or(0),
    })
}

/// REST client for the ledger's LCD endpoint
pub struct LcdClient {
    client: Client,
    base_url: String,
    denom: String,
}

impl LcdClient {
    /// Create a new LCD client
    pub fn new(base_url: &str, denom: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            denom: denom.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("LCD GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Query(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::QueryStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Deserialization(format!("{}: {}", path, e)))
    }

    async fn try_balance(&self, address: &str) -> Result<MicroAmount> {
        let body: BalanceResponse = self
            .get_json(&format!(
                "/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}",
                address, self.denom
            ))
            .await?;

        match body.balance {
            Some(coin) => MicroAmount::from_ledger(&coin.amount),
            None => Ok(MicroAmount::ZERO),
        }
    }
}

#[async_trait]
impl QueryService for LcdClient {
    async fn balance(&self, address: &str) -> MicroAmount {
        match self.try_balance(address).await {
            Ok(amount) => amount,
            Err(e) => {
                warn!("Failed to get balance for {}: {}", address, e);
                MicroAmount::ZERO
            }
        }
    }

    async fn account_meta(&self, address: &str) -> Result<AccountMeta> {
        let body: serde_json::Value = self
            .get_json(&format!("/cosmos/auth/v1beta1/accounts/{}", address))
            .await?;
        parse_account(&body)
    }

    async fn bonded_validators(&self, limit: u32) -> Result<Vec<ValidatorInfo>> {
        let body: ValidatorsResponse = self
            .get_json(&format!(
                "/cosmos/staking/v1beta1/validators?status={}&pagination.limit={}",
                BONDED_STATUS, limit
            ))
            .await?;

        let validators = parse_validators(body)?;
        debug!("Fetched {} bonded validators", validators.len());
        Ok(validators)
    }

    async fn rewards(&self, delegator: &str) -> Result<RewardSnapshot> {
        let body: RewardsResponse = self
            .get_json(&format!(
                "/cosmos/distribution/v1beta1/delegators/{}/rewards",
                delegator
            ))
            .await?;
        parse_rewards(body, &self.denom)
    }
}
