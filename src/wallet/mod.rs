//! Wallet handling
//!
//! ```text
//! seeds (env / file / prompt) -> SigningService::derive_identity -> WalletSequencer
//!                                                                       ^
//!                                         address_pool (transfer targets)
//! ```
//!
//! Seeds never leave this process except to the signing service, and are
//! never written to logs.

pub mod address_pool;
pub mod multi_wallet;
pub mod seeds;

pub use multi_wallet::{WalletReport, WalletSequencer};
