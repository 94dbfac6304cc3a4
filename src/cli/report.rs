//! Console reporter
//!
//! Consumes run events, keeps the running statistics and prints one line per
//! event, stamped with the event time in UTC. Runs as its own task; the final
//! statistics come back through the join handle once every sender is dropped.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::amount::MicroAmount;
use crate::orchestrator::{
    AttemptOutcome, OperationEvent, RunEvent, RunningStats, StatsAggregator,
};

/// Display unit for a micro denom: "uempe" -> "EMPE"
pub fn display_unit(denom: &str) -> String {
    match denom.strip_prefix('u') {
        Some(rest) if !rest.is_empty() => rest.to_uppercase(),
        _ => denom.to_uppercase(),
    }
}

pub struct ConsoleReporter {
    stats: StatsAggregator,
    exponent: u32,
    unit: String,
    /// Attempts announced but not yet reported, per wallet position
    outstanding: HashMap<usize, u64>,
}

impl ConsoleReporter {
    pub fn new(exponent: u32, denom: &str) -> Self {
        Self {
            stats: StatsAggregator::new(),
            exponent,
            unit: display_unit(denom),
            outstanding: HashMap::new(),
        }
    }

    pub fn stats(&self) -> RunningStats {
        self.stats.snapshot()
    }

    fn amount(&self, amount: MicroAmount) -> String {
        format!("{} {}", amount.to_human(self.exponent), self.unit)
    }

    /// Update the statistics for `event` and render its console line
    pub fn handle(&mut self, event: &RunEvent) -> String {
        let wallet = &event.wallet;
        let time = event.at.format("%H:%M:%S");
        let prefix = if wallet.total > 1 {
            format!("{} [{}/{}] ", time, wallet.position, wallet.total)
        } else {
            format!("{} ", time)
        };

        let body = match &event.event {
            OperationEvent::Started { kind, planned } => {
                self.stats.adjust_pending(i64::from(*planned));
                *self.outstanding.entry(wallet.position).or_default() += u64::from(*planned);
                format!("starting {} x{} from {}", kind, planned, wallet.address)
            }
            OperationEvent::ClaimPreflight { total, validators } => format!(
                "claimable {} across {} validator(s)",
                self.amount(*total),
                validators
            ),
            OperationEvent::Attempt(result) => {
                self.stats.record(result);
                self.stats.adjust_pending(-1);
                if let Some(left) = self.outstanding.get_mut(&wallet.position) {
                    *left = left.saturating_sub(1);
                }
                let stats = self.stats.snapshot();
                let status = match &result.outcome {
                    AttemptOutcome::Success { hash } => format!("OK {}", hash),
                    AttemptOutcome::Failure { error } => format!("FAILED {}", error),
                };
                format!(
                    "{} {}/{} {}: {} | {}/{} ok ({:.1}%)",
                    result.kind,
                    result.ordinal,
                    result.total,
                    result.target,
                    status,
                    stats.succeeded,
                    stats.total,
                    stats.success_rate()
                )
            }
            OperationEvent::Finished(outcome) => {
                self.settle(wallet.position);
                outcome.to_string()
            }
            OperationEvent::Aborted { reason } => {
                self.settle(wallet.position);
                format!("aborted: {}", reason)
            }
            OperationEvent::Cooldown { duration } => {
                format!("cooling down {}ms before next wallet", duration.as_millis())
            }
            OperationEvent::BalanceRefreshed { balance } => {
                format!("balance {}", self.amount(*balance))
            }
        };

        format!("{}{}", prefix, body)
    }

    /// Drop whatever was announced for a wallet but never reported
    fn settle(&mut self, position: usize) {
        if let Some(left) = self.outstanding.remove(&position) {
            if left > 0 {
                self.stats.adjust_pending(-(left as i64));
            }
        }
    }
}

/// Spawn the reporter; the handle yields the final statistics
pub fn spawn_reporter(
    mut rx: mpsc::Receiver<RunEvent>,
    exponent: u32,
    denom: &str,
) -> JoinHandle<RunningStats> {
    let mut reporter = ConsoleReporter::new(exponent, denom);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{}", reporter.handle(&event));
        }
        reporter.stats()
    })
}
