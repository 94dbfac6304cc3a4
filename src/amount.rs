//! Integer amounts in the network's smallest unit
//!
//! Every amount the orchestrator touches is a `MicroAmount`. Conversion from
//! operator input goes through `rust_decimal` so "0.1" never becomes
//! 0.09999999 on the way to the ledger.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Decimal places between the display unit and the micro-unit (1 EMPE = 10^6 uempe)
pub const DEFAULT_EXPONENT: u32 = 6;

/// Largest exponent we accept; 10^18 still fits a u64 factor
pub const MAX_EXPONENT: u32 = 18;

/// Amount in micro-units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MicroAmount(u128);

impl MicroAmount {
    pub const ZERO: MicroAmount = MicroAmount(0);

    pub const fn new(micro: u128) -> Self {
        Self(micro)
    }

    pub fn get(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: MicroAmount) -> Option<MicroAmount> {
        self.0.checked_add(other.0).map(MicroAmount)
    }

    pub fn checked_mul(self, factor: u128) -> Option<MicroAmount> {
        self.0.checked_mul(factor).map(MicroAmount)
    }

    /// Parse operator input such as "0.001" into micro-units.
    ///
    /// Rejects empty, negative and non-numeric input, and input with more
    /// significant fractional digits than `exponent` allows.
    pub fn from_human(input: &str, exponent: u32) -> Result<Self> {
        if exponent > MAX_EXPONENT {
            return Err(Error::InvalidAmount(format!(
                "exponent {} exceeds maximum {}",
                exponent, MAX_EXPONENT
            )));
        }

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidAmount("empty amount".to_string()));
        }

        let value = Decimal::from_str(trimmed)
            .map_err(|e| Error::InvalidAmount(format!("{:?}: {}", trimmed, e)))?
            .normalize();

        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::InvalidAmount(format!(
                "{:?}: amount cannot be negative",
                trimmed
            )));
        }

        if value.scale() > exponent {
            return Err(Error::InvalidAmount(format!(
                "{:?}: more than {} fractional digits",
                trimmed, exponent
            )));
        }

        let factor = Decimal::from(10u64.pow(exponent));
        value
            .checked_mul(factor)
            .and_then(|micro| micro.to_u128())
            .map(MicroAmount)
            .ok_or_else(|| Error::InvalidAmount(format!("{:?}: amount out of range", trimmed)))
    }

    /// Parse an integer micro-unit string as the ledger reports balances ("123456")
    pub fn from_ledger(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(MicroAmount::ZERO);
        }
        trimmed
            .parse::<u128>()
            .map(MicroAmount)
            .map_err(|e| Error::Deserialization(format!("bad integer amount {:?}: {}", raw, e)))
    }

    /// Parse a ledger decimal coin ("1234.560000000000000000") into whole micro-units.
    ///
    /// The fractional micro-unit part is dropped, which is what the ledger pays
    /// out on withdrawal. Negative values collapse to zero.
    pub fn from_dec_coin(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.starts_with('-') {
            return Ok(MicroAmount::ZERO);
        }

        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Deserialization(format!(
                "bad decimal coin amount {:?}",
                raw
            )));
        }
        if whole.is_empty() {
            return Ok(MicroAmount::ZERO);
        }
        Self::from_ledger(whole)
    }

    /// Render in display units with trailing zeros removed ("1.5", "0.001", "0")
    pub fn to_human(self, exponent: u32) -> String {
        let factor = 10u128.pow(exponent.min(MAX_EXPONENT));
        let whole = self.0 / factor;
        let fraction = self.0 % factor;

        if fraction == 0 {
            return whole.to_string();
        }

        let width = exponent.min(MAX_EXPONENT) as usize;
        let digits = format!("{:0width$}", fraction, width = width);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl fmt::Display for MicroAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MicroAmount {
    fn from(micro: u64) -> Self {
        MicroAmount(micro as u128)
    }
}

// The ledger's JSON carries amounts as decimal strings
impl Serialize for MicroAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for MicroAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MicroAmount::from_ledger(&raw).map_err(serde::de::Error::custom)
    }
}
