//! Reward claim planning
//!
//! A withdraw message per validator is cheap, but a transaction can only
//! carry so many before it runs out of gas or hits the size limit. Claims are
//! therefore split into chunks of at most `chunk_size` validators, one
//! transaction per chunk.

use crate::amount::MicroAmount;
use crate::ledger::RewardSnapshot;

/// Validators per claim transaction
pub const DEFAULT_CLAIM_CHUNK: usize = 16;

/// One claim transaction worth of validators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimChunk {
    /// 1-based position of the first validator in the positive-reward list
    pub first: usize,
    /// 1-based position of the last validator, inclusive
    pub last: usize,
    pub validators: Vec<String>,
}

/// Ordered claim chunks for one identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimPlan {
    pub total_claimable: MicroAmount,
    /// Validators with a positive reward, in snapshot order
    pub validator_count: usize,
    pub chunks: Vec<ClaimChunk>,
}

impl ClaimPlan {
    /// Nothing to claim
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Split the positive-reward validators of `snapshot` into chunks.
///
/// Zero-reward entries are dropped and the snapshot order is kept. A
/// `chunk_size` of zero is treated as one.
pub fn plan_claims(snapshot: &RewardSnapshot, chunk_size: usize) -> ClaimPlan {
    let chunk_size = chunk_size.max(1);

    let positive: Vec<&str> = snapshot
        .entries
        .iter()
        .filter(|e| !e.amount.is_zero())
        .map(|e| e.validator.as_str())
        .collect();

    let chunks = positive
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| {
            let first = i * chunk_size + 1;
            ClaimChunk {
                first,
                last: first + chunk.len() - 1,
                validators: chunk.iter().map(|v| v.to_string()).collect(),
            }
        })
        .collect();

    ClaimPlan {
        total_claimable: snapshot.total,
        validator_count: positive.len(),
        chunks,
    }
}
