//! Stake Batcher Library
//!
//! Batch transfers, delegations and reward claims against a Cosmos-SDK
//! network, paced under the network's throughput limits and sequenced across
//! one or many wallets.

pub mod amount;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod wallet;

// Re-export commonly used types
pub use amount::MicroAmount;
pub use config::Config;
pub use error::{Error, Result};
