//! Runs one operation across several wallets
//!
//! Wallets are processed strictly one after another, with a cooldown between
//! consecutive wallets. A wallet whose operation aborts is recorded and the
//! sequencer moves on to the next one.

use std::time::Duration;
use tracing::{info, warn};

use crate::amount::MicroAmount;
use crate::ledger::Identity;
use crate::orchestrator::{EventSink, OperationEvent, OperationRequest, OperationRunner, RunOutcome, WalletScope};

/// Default pause between wallets
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(5_000);

/// What happened for one wallet
#[derive(Debug, Clone)]
pub struct WalletReport {
    pub label: String,
    pub address: String,
    /// Error text when the operation aborted
    pub outcome: std::result::Result<RunOutcome, String>,
    pub balance_after: MicroAmount,
}

impl WalletReport {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

pub struct WalletSequencer {
    cooldown: Duration,
}

impl WalletSequencer {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Run `request` for every identity in order.
    ///
    /// Events from each wallet are tagged with its position in `identities`.
    pub async fn run_for_all(
        &self,
        runner: &mut OperationRunner,
        identities: &[Identity],
        request: &OperationRequest,
        sink: &EventSink,
    ) -> Vec<WalletReport> {
        let total = identities.len();
        let mut reports = Vec::with_capacity(total);

        for (index, identity) in identities.iter().enumerate() {
            let position = index + 1;
            let scoped = sink.scoped(WalletScope {
                address: identity.address.clone(),
                position,
                total,
            });

            info!(
                "[{}/{}] {} {} ({})",
                position,
                total,
                request.label(),
                identity.label,
                identity.short_address()
            );

            let outcome = match runner.run(identity, request, &scoped).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    warn!("[{}/{}] {} failed, continuing: {}", position, total, identity.label, e);
                    Err(e.to_string())
                }
            };

            let balance_after = runner.query().balance(&identity.address).await;
            scoped
                .emit(OperationEvent::BalanceRefreshed {
                    balance: balance_after,
                })
                .await;

            reports.push(WalletReport {
                label: identity.label.clone(),
                address: identity.address.clone(),
                outcome,
                balance_after,
            });

            if position < total && !self.cooldown.is_zero() {
                scoped
                    .emit(OperationEvent::Cooldown {
                        duration: self.cooldown,
                    })
                    .await;
                tokio::time::sleep(self.cooldown).await;
            }
        }

        let ok = reports.iter().filter(|r| r.is_ok()).count();
        info!("Processed {} wallet(s), {} completed, {} aborted", total, ok, total - ok);
        reports
    }
}

impl Default for WalletSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
