//! Core types for talking to the ledger
//!
//! Defines identities, validator and reward snapshots, and the closed set of
//! messages the orchestrator submits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::MicroAmount;
use crate::error::{Error, Result};

/// Word counts accepted for a BIP-39 style seed phrase
const SEED_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Seed phrase for one signing identity. Never printed.
#[derive(Clone)]
pub struct Seed(String);

impl Seed {
    /// Normalize whitespace and check the word count
    pub fn new(phrase: &str) -> Result<Self> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.is_empty() {
            return Err(Error::MissingSeed("seed phrase is empty".to_string()));
        }
        if !SEED_WORD_COUNTS.contains(&words.len()) {
            return Err(Error::InvalidSeed(format!(
                "expected 12, 15, 18, 21 or 24 words, got {}",
                words.len()
            )));
        }
        Ok(Self(words.join(" ")))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed(<redacted>)")
    }
}

/// Opaque reference to the signing key held by the signing service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyHandle(String);

impl KeyHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A signing-capable account on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Display name: "wallet-1"
    pub label: String,
    /// Bech32 address
    pub address: String,
    pub key: KeyHandle,
}

impl Identity {
    pub fn new(label: impl Into<String>, address: impl Into<String>, key: KeyHandle) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
            key,
        }
    }

    /// Shortened address for log lines: "empe1qx3f…9kzl"
    pub fn short_address(&self) -> String {
        short_address(&self.address)
    }
}

/// Shorten a long address for display
pub fn short_address(address: &str) -> String {
    let chars = address.chars().count();
    if chars <= 16 {
        return address.to_string();
    }
    let head: String = address.chars().take(10).collect();
    let tail: String = address.chars().skip(chars - 4).collect();
    format!("{}…{}", head, tail)
}

/// Amount with its denomination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: MicroAmount,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: MicroAmount) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

/// Every message kind the orchestrator can put in a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "@type")]
pub enum LedgerMessage {
    #[serde(rename = "/cosmos.bank.v1beta1.MsgSend")]
    Send {
        from_address: String,
        to_address: String,
        amount: Vec<Coin>,
    },

    #[serde(rename = "/cosmos.staking.v1beta1.MsgDelegate")]
    Delegate {
        delegator_address: String,
        validator_address: String,
        amount: Coin,
    },

    #[serde(rename = "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward")]
    WithdrawReward {
        delegator_address: String,
        validator_address: String,
    },
}

impl LedgerMessage {
    pub fn send(from: &str, to: &str, amount: Coin) -> Self {
        LedgerMessage::Send {
            from_address: from.to_string(),
            to_address: to.to_string(),
            amount: vec![amount],
        }
    }

    pub fn delegate(delegator: &str, validator: &str, amount: Coin) -> Self {
        LedgerMessage::Delegate {
            delegator_address: delegator.to_string(),
            validator_address: validator.to_string(),
            amount,
        }
    }

    pub fn withdraw_reward(delegator: &str, validator: &str) -> Self {
        LedgerMessage::WithdrawReward {
            delegator_address: delegator.to_string(),
            validator_address: validator.to_string(),
        }
    }

    /// Protobuf type URL the ledger routes on
    pub fn type_url(&self) -> &'static str {
        match self {
            LedgerMessage::Send { .. } => "/cosmos.bank.v1beta1.MsgSend",
            LedgerMessage::Delegate { .. } => "/cosmos.staking.v1beta1.MsgDelegate",
            LedgerMessage::WithdrawReward { .. } => {
                "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward"
            }
        }
    }

    /// Address that has to sign this message
    pub fn signer(&self) -> &str {
        match self {
            LedgerMessage::Send { from_address, .. } => from_address,
            LedgerMessage::Delegate {
                delegator_address, ..
            } => delegator_address,
            LedgerMessage::WithdrawReward {
                delegator_address, ..
            } => delegator_address,
        }
    }
}

/// Result of a signed broadcast as the ledger reports it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastResponse {
    /// 0 on success, ledger error code otherwise
    pub code: u32,
    #[serde(rename = "txhash", alias = "hash")]
    pub hash: String,
    #[serde(default)]
    pub raw_log: String,
}

impl BroadcastResponse {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Validator as reported by the staking module
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorInfo {
    pub operator_address: String,
    pub moniker: String,
    pub jailed: bool,
    pub bonded: bool,
    /// Commission rate in [0, 1]
    pub commission: Decimal,
    /// Total delegated tokens
    pub tokens: MicroAmount,
}

/// Pending reward from one validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardEntry {
    pub validator: String,
    pub amount: MicroAmount,
}

/// Claimable rewards for one delegator at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardSnapshot {
    pub total: MicroAmount,
    /// In the order the ledger returned them
    pub entries: Vec<RewardEntry>,
}

/// Account number and sequence, for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountMeta {
    pub account_number: u64,
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_validation() {
        let twelve = "abandon ".repeat(11) + "about";
        let seed = Seed::new(&format!("  {}  ", twelve)).unwrap();
        assert_eq!(seed.expose().split(' ').count(), 12);
        assert!(!format!("{:?}", seed).contains("abandon"));

        assert!(matches!(Seed::new("   "), Err(Error::MissingSeed(_))));
        assert!(matches!(
            Seed::new("only three words"),
            Err(Error::InvalidSeed(_))
        ));
    }

    #[test]
    fn test_message_json_shape() {
        let msg = LedgerMessage::send(
            "empe1from",
            "empe1to",
            Coin::new("uempe", MicroAmount::new(1_000)),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["@type"], "/cosmos.bank.v1beta1.MsgSend");
        assert_eq!(json["from_address"], "empe1from");
        assert_eq!(json["amount"][0]["denom"], "uempe");
        assert_eq!(json["amount"][0]["amount"], "1000");

        let claim = LedgerMessage::withdraw_reward("empe1me", "empevaloper1x");
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["@type"], claim.type_url());
        assert_eq!(json["validator_address"], "empevaloper1x");
        assert_eq!(claim.signer(), "empe1me");
    }

    #[test]
    fn test_broadcast_response_parse() {
        let ok: BroadcastResponse =
            serde_json::from_str(r#"{"code":0,"txhash":"ABC","raw_log":""}"#).unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.hash, "ABC");

        let failed: BroadcastResponse =
            serde_json::from_str(r#"{"code":5,"hash":"DEF"}"#).unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.raw_log, "");
    }

    #[test]
    fn test_short_address() {
        assert_eq!(short_address("empe1abc"), "empe1abc");
        assert_eq!(
            short_address("empe1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq9kzl"),
            "empe1qqqqq…9kzl"
        );

        // Multi-byte text from a remote signer must not split a char
        assert_eq!(short_address("ééééééééééééééééé"), "éééééééééé…éééé");
        assert_eq!(short_address("ädresse1ñññññññññ€"), "ädresse1ññ…ñññ€");
        assert_eq!(short_address("ündé"), "ündé");
    }
}
