//! Configuration loading and validation

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::amount::{MicroAmount, DEFAULT_EXPONENT, MAX_EXPONENT};
use crate::ledger::address;
use crate::ledger::remote::ChainParams;
use crate::orchestrator::pacing::PacingConfig;
use crate::orchestrator::rewards::DEFAULT_CLAIM_CHUNK;
use crate::orchestrator::runner::DEFAULT_VALIDATOR_QUERY_LIMIT;
use crate::orchestrator::validators::{default_max_commission, EligibilityRules};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub validators: ValidatorConfig,
    #[serde(default)]
    pub claims: ClaimConfig,
    #[serde(default)]
    pub wallets: WalletsConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Ledger endpoints and denomination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// REST (LCD) endpoint used for queries
    #[serde(default = "default_lcd_url")]
    pub lcd_url: String,

    /// Tendermint RPC endpoint the signing sidecar broadcasts through
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// Micro-unit denom, e.g. "uempe"
    #[serde(default = "default_denom")]
    pub denom: String,

    /// Decimal places between display unit and micro-unit
    #[serde(default = "default_exponent")]
    pub exponent: u32,

    /// Bech32 human-readable part of account addresses
    #[serde(default = "default_address_prefix")]
    pub address_prefix: String,

    #[serde(default = "default_gas_price")]
    pub gas_price: String,

    #[serde(default = "default_broadcast_timeout_ms")]
    pub broadcast_timeout_ms: u64,

    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerMode {
    /// Signing sidecar over HTTP
    Remote,
    /// Hash messages locally, submit nothing
    DryRun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    #[serde(default = "default_signer_mode")]
    pub mode: SignerMode,

    #[serde(default = "default_signer_url")]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Highest commission rate accepted for delegation, in [0, 1]
    #[serde(default = "default_max_commission")]
    pub max_commission: Decimal,

    /// Minimum delegated stake in display units (0 = disabled)
    #[serde(default)]
    pub min_tokens: u64,

    /// Validators fetched per delegation run
    #[serde(default = "default_query_limit")]
    pub query_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Withdraw messages per claim transaction
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletsConfig {
    /// Environment variable holding a single seed phrase
    #[serde(default = "default_mnemonic_env")]
    pub mnemonic_env: String,

    /// Seed file, one phrase per line (multi-wallet mode)
    #[serde(default)]
    pub mnemonic_file: Option<PathBuf>,

    /// Pause between wallets in multi-wallet mode
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    #[serde(default = "default_address_pool_file")]
    pub address_pool_file: PathBuf,

    /// Balance kept aside for fees, in display units
    #[serde(default = "default_safety_buffer")]
    pub safety_buffer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

// Default value functions
fn default_lcd_url() -> String {
    "http://127.0.0.1:1317".to_string()
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:26657".to_string()
}

fn default_chain_id() -> String {
    "empe-testnet-2".to_string()
}

fn default_denom() -> String {
    "uempe".to_string()
}

fn default_exponent() -> u32 {
    DEFAULT_EXPONENT
}

fn default_address_prefix() -> String {
    "empe".to_string()
}

fn default_gas_price() -> String {
    "0.025uempe".to_string()
}

fn default_broadcast_timeout_ms() -> u64 {
    45_000
}

fn default_http_timeout_ms() -> u64 {
    15_000
}

fn default_signer_mode() -> SignerMode {
    SignerMode::Remote
}

fn default_signer_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_query_limit() -> u32 {
    DEFAULT_VALIDATOR_QUERY_LIMIT
}

fn default_chunk_size() -> usize {
    DEFAULT_CLAIM_CHUNK
}

fn default_mnemonic_env() -> String {
    "MNEMONIC".to_string()
}

fn default_cooldown_ms() -> u64 {
    5_000
}

fn default_address_pool_file() -> PathBuf {
    PathBuf::from(crate::wallet::address_pool::DEFAULT_POOL_FILE)
}

fn default_safety_buffer() -> String {
    "0.01".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            lcd_url: default_lcd_url(),
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            denom: default_denom(),
            exponent: default_exponent(),
            address_prefix: default_address_prefix(),
            gas_price: default_gas_price(),
            broadcast_timeout_ms: default_broadcast_timeout_ms(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            mode: default_signer_mode(),
            url: default_signer_url(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_commission: default_max_commission(),
            min_tokens: 0,
            query_limit: default_query_limit(),
        }
    }
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for WalletsConfig {
    fn default() -> Self {
        Self {
            mnemonic_env: default_mnemonic_env(),
            mnemonic_file: None,
            cooldown_ms: default_cooldown_ms(),
            address_pool_file: default_address_pool_file(),
            safety_buffer: default_safety_buffer(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("network.lcd_url", default_lcd_url())?
            .set_default("network.denom", default_denom())?
            .set_default("network.address_prefix", default_address_prefix())?
            .set_default("claims.chunk_size", default_chunk_size() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix BATCHER__)
            .add_source(
                config::Environment::with_prefix("BATCHER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.network.exponent > MAX_EXPONENT {
            anyhow::bail!(
                "network.exponent {} exceeds maximum {}",
                self.network.exponent,
                MAX_EXPONENT
            );
        }

        if self.network.denom.trim().is_empty() {
            anyhow::bail!("network.denom cannot be empty");
        }

        address::parse_prefix(&self.network.address_prefix)
            .context("network.address_prefix is not a usable bech32 prefix")?;

        if self.validators.max_commission < Decimal::ZERO
            || self.validators.max_commission > Decimal::ONE
        {
            anyhow::bail!(
                "validators.max_commission must be between 0 and 1, got {}",
                self.validators.max_commission
            );
        }

        if self.claims.chunk_size == 0 {
            anyhow::bail!("claims.chunk_size must be positive");
        }

        if self.pacing.max_tx_per_minute == 0 {
            anyhow::bail!("pacing.max_tx_per_minute must be positive");
        }

        if self.events.channel_capacity == 0 {
            anyhow::bail!("events.channel_capacity must be positive");
        }

        self.safety_buffer()
            .context("wallets.safety_buffer is not a valid amount")?;

        if self.signer.mode == SignerMode::DryRun {
            tracing::warn!("Signer mode is dry_run - nothing will be broadcast");
        }

        Ok(())
    }

    pub fn eligibility_rules(&self) -> EligibilityRules {
        let factor = 10u128.pow(self.network.exponent.min(MAX_EXPONENT));
        EligibilityRules {
            max_commission: self.validators.max_commission,
            min_tokens: MicroAmount::new(u128::from(self.validators.min_tokens) * factor),
        }
    }

    pub fn safety_buffer(&self) -> crate::Result<MicroAmount> {
        MicroAmount::from_human(&self.wallets.safety_buffer, self.network.exponent)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.wallets.cooldown_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.network.http_timeout_ms)
    }

    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            chain_id: self.network.chain_id.clone(),
            rpc_url: self.network.rpc_url.clone(),
            address_prefix: self.network.address_prefix.clone(),
            gas_price: self.network.gas_price.clone(),
            broadcast_timeout_ms: self.network.broadcast_timeout_ms,
        }
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Network:
    lcd_url: {}
    rpc_url: {}
    chain_id: {}
    denom: {} (exponent {})
    address_prefix: {}
    gas_price: {}
  Signer:
    mode: {:?}
    url: {}
  Pacing:
    mode: {:?}
    fixed_delay: {}ms
    base_delay: {}s
    jitter: +/-{}s
    max_tx_per_minute: {}
  Validators:
    max_commission: {}
    min_tokens: {}
    query_limit: {}
  Claims:
    chunk_size: {}
  Wallets:
    seed: ${} {}
    seed_file: {}
    cooldown: {}ms
    address_pool: {}
    safety_buffer: {}
"#,
            mask_url(&self.network.lcd_url),
            mask_url(&self.network.rpc_url),
            self.network.chain_id,
            self.network.denom,
            self.network.exponent,
            self.network.address_prefix,
            self.network.gas_price,
            self.signer.mode,
            mask_url(&self.signer.url),
            self.pacing.mode,
            self.pacing.fixed_delay_ms,
            self.pacing.base_delay_secs,
            self.pacing.jitter_secs,
            self.pacing.max_tx_per_minute,
            self.validators.max_commission,
            self.validators.min_tokens,
            self.validators.query_limit,
            self.claims.chunk_size,
            self.wallets.mnemonic_env,
            if std::env::var(&self.wallets.mnemonic_env).is_ok() {
                "(set)"
            } else {
                "(not set)"
            },
            self.wallets
                .mnemonic_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
            self.wallets.cooldown_ms,
            self.wallets.address_pool_file.display(),
            self.wallets.safety_buffer,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
