//! Validated operator intents

use rust_decimal::Decimal;
use std::str::FromStr;

use super::rewards::DEFAULT_CLAIM_CHUNK;
use super::validators::EligibilityRules;
use crate::amount::MicroAmount;
use crate::error::{Error, Result};

/// Where transfers go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationPolicy {
    /// Freshly generated address per transfer
    Random,
    /// Uniform draw from a fixed, non-empty address list
    Pool(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    pub amount: MicroAmount,
    pub count: u32,
    pub destination: DestinationPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegateOptions {
    pub amount: MicroAmount,
    pub count: u32,
    pub rules: EligibilityRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOptions {
    pub chunk_size: usize,
}

impl Default for ClaimOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CLAIM_CHUNK,
        }
    }
}

/// One operation to run per identity
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    Transfer(TransferOptions),
    Delegate(DelegateOptions),
    ClaimRewards(ClaimOptions),
}

fn positive_amount(amount_human: &str, exponent: u32) -> Result<MicroAmount> {
    let amount = MicroAmount::from_human(amount_human, exponent)?;
    if amount.is_zero() {
        return Err(Error::InvalidAmount(format!(
            "{:?}: amount must be greater than zero",
            amount_human.trim()
        )));
    }
    Ok(amount)
}

fn positive_count(count: u32) -> Result<u32> {
    if count == 0 {
        return Err(Error::InvalidRequest(
            "count must be a positive integer".to_string(),
        ));
    }
    Ok(count)
}

/// Parse a commission ceiling such as "0.2" and check it is a rate in [0, 1]
pub fn parse_commission(raw: &str) -> Result<Decimal> {
    let rate = Decimal::from_str(raw.trim())
        .map_err(|e| Error::InvalidRequest(format!("max commission {:?}: {}", raw, e)))?;
    check_commission(rate)
}

pub fn check_commission(rate: Decimal) -> Result<Decimal> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(Error::InvalidRequest(format!(
            "max commission {} is outside [0, 1]",
            rate
        )));
    }
    Ok(rate)
}

impl OperationRequest {
    /// Transfers of `amount_human` display units, `count` times
    pub fn transfer(
        amount_human: &str,
        count: u32,
        destination: DestinationPolicy,
        exponent: u32,
    ) -> Result<Self> {
        if let DestinationPolicy::Pool(pool) = &destination {
            if pool.is_empty() {
                return Err(Error::InvalidRequest(
                    "destination pool is empty".to_string(),
                ));
            }
        }
        Ok(OperationRequest::Transfer(TransferOptions {
            amount: positive_amount(amount_human, exponent)?,
            count: positive_count(count)?,
            destination,
        }))
    }

    /// Delegations of `amount_human` display units to sampled eligible validators
    pub fn delegate(
        amount_human: &str,
        count: u32,
        rules: EligibilityRules,
        exponent: u32,
    ) -> Result<Self> {
        check_commission(rules.max_commission)?;
        Ok(OperationRequest::Delegate(DelegateOptions {
            amount: positive_amount(amount_human, exponent)?,
            count: positive_count(count)?,
            rules,
        }))
    }

    pub fn claim(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidRequest(
                "chunk size must be a positive integer".to_string(),
            ));
        }
        Ok(OperationRequest::ClaimRewards(ClaimOptions { chunk_size }))
    }

    /// Short name for logs and prompts
    pub fn label(&self) -> &'static str {
        match self {
            OperationRequest::Transfer(_) => "transfer",
            OperationRequest::Delegate(_) => "delegate",
            OperationRequest::ClaimRewards(_) => "claim rewards",
        }
    }

    /// Total amount leaving the account, if the operation spends a fixed amount
    pub fn spend(&self) -> Option<MicroAmount> {
        match self {
            OperationRequest::Transfer(o) => o.amount.checked_mul(u128::from(o.count)),
            OperationRequest::Delegate(o) => o.amount.checked_mul(u128::from(o.count)),
            OperationRequest::ClaimRewards(_) => None,
        }
    }
}
