//! Progress events
//!
//! The runner and the wallet sequencer push events into a bounded channel; a
//! single consumer (the console reporter) owns the statistics and prints one
//! line per event. Sending never blocks a run on a vanished consumer: if the
//! receiver is gone the event is dropped and the run carries on.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::amount::MicroAmount;

/// Kind of submission an attempt made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Transfer,
    Delegate,
    ClaimBatch,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Transfer => write!(f, "transfer"),
            OperationKind::Delegate => write!(f, "delegate"),
            OperationKind::ClaimBatch => write!(f, "claim"),
        }
    }
}

/// Hash on success, error text on failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { hash: String },
    Failure { error: String },
}

/// What one attempt was aimed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptTarget {
    Recipient(String),
    Validator(String),
    /// 1-based inclusive range into the positive-reward validator list
    ClaimRange { first: usize, last: usize },
}

impl fmt::Display for AttemptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptTarget::Recipient(addr) => write!(f, "to {}", addr),
            AttemptTarget::Validator(addr) => write!(f, "via {}", addr),
            AttemptTarget::ClaimRange { first, last } => {
                write!(f, "validators {}-{}", first, last)
            }
        }
    }
}

/// Outcome of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    pub kind: OperationKind,
    /// 1-based position within the operation
    pub ordinal: u32,
    pub total: u32,
    pub outcome: AttemptOutcome,
    pub target: AttemptTarget,
}

impl AttemptResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }

    pub fn hash(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Success { hash } => Some(hash),
            AttemptOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Success { .. } => None,
            AttemptOutcome::Failure { error } => Some(error),
        }
    }
}

/// Attempt counts for one completed operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
}

impl RunSummary {
    pub fn record(&mut self, result: &AttemptResult) {
        self.attempted += 1;
        if result.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// How an operation for one identity ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Delegation found no validator passing the eligibility rules
    NoEligibleValidator,
    /// No validator holds a positive reward
    NothingToClaim,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed(s) => write!(
                f,
                "completed: {} attempted, {} succeeded, {} failed",
                s.attempted, s.succeeded, s.failed
            ),
            RunOutcome::NoEligibleValidator => write!(f, "no eligible validator"),
            RunOutcome::NothingToClaim => write!(f, "nothing to claim"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    /// Submissions are about to start
    Started { kind: OperationKind, planned: u32 },
    /// Rewards fetched, before any claim is submitted
    ClaimPreflight { total: MicroAmount, validators: usize },
    Attempt(AttemptResult),
    Finished(RunOutcome),
    /// The operation could not run for this identity
    Aborted { reason: String },
    /// Waiting before the next identity
    Cooldown { duration: Duration },
    BalanceRefreshed { balance: MicroAmount },
}

/// Which identity an event belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletScope {
    pub address: String,
    /// 1-based position in the identity set
    pub position: usize,
    pub total: usize,
}

impl WalletScope {
    /// Scope for single-identity runs
    pub fn single(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            position: 1,
            total: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunEvent {
    pub at: DateTime<Utc>,
    pub wallet: WalletScope,
    pub event: OperationEvent,
}

/// Producer half of the event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<RunEvent>,
}

impl EventSink {
    /// Bounded channel of `capacity` events
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RunEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn scoped(&self, wallet: WalletScope) -> ScopedSink {
        ScopedSink {
            tx: self.tx.clone(),
            wallet,
        }
    }
}

/// Event sender tagged with one identity
#[derive(Debug, Clone)]
pub struct ScopedSink {
    tx: mpsc::Sender<RunEvent>,
    wallet: WalletScope,
}

impl ScopedSink {
    pub fn wallet(&self) -> &WalletScope {
        &self.wallet
    }

    pub async fn emit(&self, event: OperationEvent) {
        let event = RunEvent {
            at: Utc::now(),
            wallet: self.wallet.clone(),
            event,
        };
        if self.tx.send(event).await.is_err() {
            debug!("Event receiver closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(outcome: AttemptOutcome) -> AttemptResult {
        AttemptResult {
            kind: OperationKind::Transfer,
            ordinal: 1,
            total: 1,
            outcome,
            target: AttemptTarget::Recipient("empe1xyz".to_string()),
        }
    }

    #[test]
    fn test_hash_iff_success() {
        let ok = attempt(AttemptOutcome::Success {
            hash: "ABC".to_string(),
        });
        assert!(ok.succeeded());
        assert_eq!(ok.hash(), Some("ABC"));
        assert_eq!(ok.error(), None);

        let failed = attempt(AttemptOutcome::Failure {
            error: "out of gas".to_string(),
        });
        assert!(!failed.succeeded());
        assert_eq!(failed.hash(), None);
        assert_eq!(failed.error(), Some("out of gas"));

        let mut summary = RunSummary::default();
        summary.record(&ok);
        summary.record(&failed);
        assert_eq!(
            summary,
            RunSummary {
                attempted: 2,
                succeeded: 1,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_scoped_events_carry_wallet() {
        let (sink, mut rx) = EventSink::channel(4);
        let scoped = sink.scoped(WalletScope {
            address: "empe1abc".to_string(),
            position: 2,
            total: 3,
        });

        scoped
            .emit(OperationEvent::Finished(RunOutcome::NothingToClaim))
            .await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.wallet.position, 2);
        assert_eq!(received.wallet.total, 3);
        assert_eq!(
            received.event,
            OperationEvent::Finished(RunOutcome::NothingToClaim)
        );
    }

    #[tokio::test]
    async fn test_emit_without_receiver_is_dropped() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        let scoped = sink.scoped(WalletScope::single("empe1abc"));
        scoped
            .emit(OperationEvent::Aborted {
                reason: "gone".to_string(),
            })
            .await;
    }
}
