//! Batch transaction orchestrator
//!
//! Turns an operator intent into a paced sequence of signed submissions for
//! one identity:
//!
//! ```text
//! OperationRequest -> OperationRunner -> SigningService::broadcast
//!                          |  ^
//!                          |  +-- RateGovernor (wait between attempts)
//!                          |  +-- filter_eligible / plan_claims
//!                          v
//!                      EventSink -> reporter (StatsAggregator)
//! ```

pub mod events;
pub mod pacing;
pub mod request;
pub mod rewards;
pub mod runner;
pub mod stats;
pub mod validators;

pub use events::{
    AttemptOutcome, AttemptResult, AttemptTarget, EventSink, OperationEvent, OperationKind,
    RunEvent, RunOutcome, RunSummary, ScopedSink, WalletScope,
};
pub use pacing::{PacingConfig, PacingMode, RateGovernor};
pub use request::{DestinationPolicy, OperationRequest};
pub use rewards::{plan_claims, ClaimChunk, ClaimPlan};
pub use runner::OperationRunner;
pub use stats::{RunningStats, StatsAggregator};
pub use validators::{filter_eligible, EligibilityRules};
