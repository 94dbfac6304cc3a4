//! Pacing between submissions
//!
//! Keeps the submission rate under the network's throughput ceiling. In the
//! rate-limited mode every wait is at least the minimum spacing implied by
//! `max_tx_per_minute`, stretched by a random jitter so the cadence is not
//! perfectly regular. The fixed mode waits a constant delay.

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the governor spaces attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingMode {
    /// Base delay, throughput floor and jitter
    RateLimited,
    /// Constant delay between attempts
    Fixed,
}

/// Pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_mode")]
    pub mode: PacingMode,

    #[serde(default = "default_fixed_delay_ms")]
    pub fixed_delay_ms: u64,

    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    /// Uniform jitter in [-jitter_secs, +jitter_secs]
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,

    #[serde(default = "default_max_tx_per_minute")]
    pub max_tx_per_minute: u32,
}

fn default_mode() -> PacingMode {
    PacingMode::RateLimited
}
fn default_fixed_delay_ms() -> u64 {
    1_000
}
fn default_base_delay_secs() -> u64 {
    2
}
fn default_jitter_secs() -> u64 {
    2
}
fn default_max_tx_per_minute() -> u32 {
    20
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            fixed_delay_ms: default_fixed_delay_ms(),
            base_delay_secs: default_base_delay_secs(),
            jitter_secs: default_jitter_secs(),
            max_tx_per_minute: default_max_tx_per_minute(),
        }
    }
}

impl PacingConfig {
    /// No waiting at all; used by tests and the dry-run path
    pub fn immediate() -> Self {
        Self {
            mode: PacingMode::Fixed,
            fixed_delay_ms: 0,
            ..Default::default()
        }
    }
}

/// Minimum whole seconds between attempts for a per-minute ceiling
pub fn min_spacing_secs(max_per_minute: u32) -> u64 {
    60u64.div_ceil(u64::from(max_per_minute.max(1)))
}

/// Delay after attempt `attempt` of `total` (1-based) in the rate-limited mode.
///
/// `max(base_delay, ceil(60 / max_per_minute)) + uniform(-jitter, +jitter)`,
/// floored at zero. No wait after the last attempt.
pub fn rate_limited_delay<R: Rng>(
    attempt: u32,
    total: u32,
    base_delay_secs: u64,
    jitter_secs: u64,
    max_per_minute: u32,
    rng: &mut R,
) -> Duration {
    if attempt >= total {
        return Duration::ZERO;
    }

    let base = base_delay_secs.max(min_spacing_secs(max_per_minute)) as i64;
    let jitter = if jitter_secs > 0 {
        let span = jitter_secs as i64;
        rng.gen_range(-span..=span)
    } else {
        0
    };

    Duration::from_secs((base + jitter).max(0) as u64)
}

/// Computes the wait between consecutive submissions
pub struct RateGovernor {
    config: PacingConfig,
    rng: StdRng,
}

impl RateGovernor {
    /// Create a new governor with optional seed
    pub fn new(config: PacingConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    /// Create governor from entropy (random seed)
    pub fn from_entropy(config: PacingConfig) -> Self {
        Self::new(config, None)
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Delay to wait after attempt `attempt` of `total`
    pub fn next_delay(&mut self, attempt: u32, total: u32) -> Duration {
        if attempt >= total {
            return Duration::ZERO;
        }

        match self.config.mode {
            PacingMode::Fixed => Duration::from_millis(self.config.fixed_delay_ms),
            PacingMode::RateLimited => rate_limited_delay(
                attempt,
                total,
                self.config.base_delay_secs,
                self.config.jitter_secs,
                self.config.max_tx_per_minute,
                &mut self.rng,
            ),
        }
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::from_entropy(PacingConfig::default())
    }
}
