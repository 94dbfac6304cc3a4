//! Validator eligibility for delegation

use rust_decimal::Decimal;

use crate::amount::MicroAmount;
use crate::ledger::ValidatorInfo;

/// 20% commission ceiling
pub fn default_max_commission() -> Decimal {
    Decimal::new(20, 2)
}

/// Thresholds a validator must meet to receive a delegation
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityRules {
    /// Highest acceptable commission rate, in [0, 1]
    pub max_commission: Decimal,
    /// Minimum delegated stake; zero disables the check
    pub min_tokens: MicroAmount,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            max_commission: default_max_commission(),
            min_tokens: MicroAmount::ZERO,
        }
    }
}

impl EligibilityRules {
    pub fn is_eligible(&self, validator: &ValidatorInfo) -> bool {
        !validator.jailed
            && validator.bonded
            && validator.commission <= self.max_commission
            && (self.min_tokens.is_zero() || validator.tokens >= self.min_tokens)
    }
}

/// Keep only validators that may receive a delegation, in input order.
///
/// An empty result means there is nothing to delegate to, not a failure.
pub fn filter_eligible(validators: &[ValidatorInfo], rules: &EligibilityRules) -> Vec<ValidatorInfo> {
    validators
        .iter()
        .filter(|v| rules.is_eligible(v))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::validator;
    use rust_decimal_macros::dec;

    fn mixed_set() -> Vec<ValidatorInfo> {
        let mut jailed = validator("v-jailed", dec!(0.05));
        jailed.jailed = true;
        let mut unbonded = validator("v-unbonded", dec!(0.05));
        unbonded.bonded = false;
        let mut small = validator("v-small", dec!(0.10));
        small.tokens = MicroAmount::new(10);

        vec![
            validator("v-a", dec!(0.05)),
            jailed,
            validator("v-expensive", dec!(0.25)),
            unbonded,
            validator("v-edge", dec!(0.20)),
            small,
            validator("v-free", dec!(0)),
        ]
    }

    #[test]
    fn test_filter_keeps_order_and_rules() {
        let input = mixed_set();
        let rules = EligibilityRules::default();
        let output = filter_eligible(&input, &rules);

        let names: Vec<&str> = output.iter().map(|v| v.operator_address.as_str()).collect();
        assert_eq!(names, vec!["v-a", "v-edge", "v-small", "v-free"]);

        // Subset of the input, in the same relative order
        let mut cursor = input.iter();
        for kept in &output {
            assert!(cursor.any(|v| v == kept));
        }
        for kept in &output {
            assert!(!kept.jailed && kept.bonded && kept.commission <= rules.max_commission);
        }
    }

    #[test]
    fn test_min_tokens() {
        let rules = EligibilityRules {
            min_tokens: MicroAmount::new(1_000),
            ..Default::default()
        };
        let output = filter_eligible(&mixed_set(), &rules);
        assert!(output.iter().all(|v| v.operator_address != "v-small"));
        assert_eq!(output.len(), 3);
    }

    #[test]
    fn test_single_expensive_validator_yields_empty() {
        let input = vec![validator("v-only", dec!(0.25))];
        let rules = EligibilityRules {
            max_commission: dec!(0.20),
            ..Default::default()
        };
        assert!(filter_eligible(&input, &rules).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(filter_eligible(&[], &EligibilityRules::default()).is_empty());
    }
}
