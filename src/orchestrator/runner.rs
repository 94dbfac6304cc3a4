//! Runs one operation for one identity
//!
//! Each loop iteration is one signed submission. A failed submission is
//! reported as a failed attempt and the loop moves on; only an empty
//! precondition (no validator, nothing to claim) or a failed upstream query
//! ends the operation early.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::events::{
    AttemptOutcome, AttemptResult, AttemptTarget, OperationEvent, OperationKind, RunOutcome,
    RunSummary, ScopedSink,
};
use super::pacing::RateGovernor;
use super::request::{
    ClaimOptions, DelegateOptions, DestinationPolicy, OperationRequest, TransferOptions,
};
use super::rewards::plan_claims;
use super::validators::filter_eligible;
use crate::error::{Error, Result};
use crate::ledger::address;
use crate::ledger::{Coin, Identity, LedgerMessage, QueryService, SigningService};

/// Validators fetched per delegation run
pub const DEFAULT_VALIDATOR_QUERY_LIMIT: u32 = 200;

pub struct OperationRunner {
    signer: Arc<dyn SigningService>,
    query: Arc<dyn QueryService>,
    denom: String,
    address_prefix: String,
    governor: RateGovernor,
    rng: StdRng,
    validator_query_limit: u32,
}

impl OperationRunner {
    pub fn new(
        signer: Arc<dyn SigningService>,
        query: Arc<dyn QueryService>,
        denom: &str,
        address_prefix: &str,
        governor: RateGovernor,
    ) -> Self {
        Self {
            signer,
            query,
            denom: denom.to_string(),
            address_prefix: address_prefix.to_string(),
            governor,
            rng: StdRng::from_entropy(),
            validator_query_limit: DEFAULT_VALIDATOR_QUERY_LIMIT,
        }
    }

    pub fn with_validator_limit(mut self, limit: u32) -> Self {
        self.validator_query_limit = limit.max(1);
        self
    }

    /// Fix the destination and validator sampling sequence
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn query(&self) -> &Arc<dyn QueryService> {
        &self.query
    }

    /// Run `request` for `identity`, reporting through `sink`.
    ///
    /// A query failure is reported as `Aborted` and returned as the error.
    pub async fn run(
        &mut self,
        identity: &Identity,
        request: &OperationRequest,
        sink: &ScopedSink,
    ) -> Result<RunOutcome> {
        let result = match request {
            OperationRequest::Transfer(options) => self.run_transfer(identity, options, sink).await,
            OperationRequest::Delegate(options) => self.run_delegate(identity, options, sink).await,
            OperationRequest::ClaimRewards(options) => self.run_claim(identity, options, sink).await,
        };

        match result {
            Ok(outcome) => {
                sink.emit(OperationEvent::Finished(outcome.clone())).await;
                Ok(outcome)
            }
            Err(e) => {
                if e.is_query_failure() {
                    warn!("{} for {} aborted: {}", request.label(), identity.label, e);
                } else {
                    error!("{} for {} aborted: {}", request.label(), identity.label, e);
                }
                sink.emit(OperationEvent::Aborted {
                    reason: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    pub async fn run_transfer(
        &mut self,
        identity: &Identity,
        options: &TransferOptions,
        sink: &ScopedSink,
    ) -> Result<RunOutcome> {
        if matches!(options.destination, DestinationPolicy::Random) {
            address::parse_prefix(&self.address_prefix)?;
        }

        let total = options.count;
        let mut summary = RunSummary::default();
        sink.emit(OperationEvent::Started {
            kind: OperationKind::Transfer,
            planned: total,
        })
        .await;

        for ordinal in 1..=total {
            let destination = self.pick_destination(&options.destination)?;
            let message = LedgerMessage::send(
                &identity.address,
                &destination,
                Coin::new(&self.denom, options.amount),
            );

            let outcome = self.submit_single(identity, message).await;
            let result = AttemptResult {
                kind: OperationKind::Transfer,
                ordinal,
                total,
                outcome,
                target: AttemptTarget::Recipient(destination),
            };
            self.report(&mut summary, result, sink).await;
            self.pace(ordinal, total).await;
        }

        Ok(RunOutcome::Completed(summary))
    }

    pub async fn run_delegate(
        &mut self,
        identity: &Identity,
        options: &DelegateOptions,
        sink: &ScopedSink,
    ) -> Result<RunOutcome> {
        let validators = self
            .query
            .bonded_validators(self.validator_query_limit)
            .await?;
        let eligible = filter_eligible(&validators, &options.rules);
        info!(
            "{} of {} bonded validators eligible (max commission {})",
            eligible.len(),
            validators.len(),
            options.rules.max_commission
        );

        if eligible.is_empty() {
            return Ok(RunOutcome::NoEligibleValidator);
        }

        let total = options.count;
        let mut summary = RunSummary::default();
        sink.emit(OperationEvent::Started {
            kind: OperationKind::Delegate,
            planned: total,
        })
        .await;

        for ordinal in 1..=total {
            let validator = eligible
                .choose(&mut self.rng)
                .map(|v| v.operator_address.clone())
                .ok_or_else(|| Error::Internal("eligible validator set is empty".to_string()))?;
            let message = LedgerMessage::delegate(
                &identity.address,
                &validator,
                Coin::new(&self.denom, options.amount),
            );

            let outcome = self.submit_single(identity, message).await;
            let result = AttemptResult {
                kind: OperationKind::Delegate,
                ordinal,
                total,
                outcome,
                target: AttemptTarget::Validator(validator),
            };
            self.report(&mut summary, result, sink).await;
            self.pace(ordinal, total).await;
        }

        Ok(RunOutcome::Completed(summary))
    }

    pub async fn run_claim(
        &mut self,
        identity: &Identity,
        options: &ClaimOptions,
        sink: &ScopedSink,
    ) -> Result<RunOutcome> {
        let snapshot = self.query.rewards(&identity.address).await?;
        let plan = plan_claims(&snapshot, options.chunk_size);

        sink.emit(OperationEvent::ClaimPreflight {
            total: plan.total_claimable,
            validators: plan.validator_count,
        })
        .await;

        if plan.is_empty() {
            return Ok(RunOutcome::NothingToClaim);
        }

        let total = plan.chunks.len() as u32;
        let mut summary = RunSummary::default();
        sink.emit(OperationEvent::Started {
            kind: OperationKind::ClaimBatch,
            planned: total,
        })
        .await;

        for (ordinal, chunk) in (1..=total).zip(plan.chunks.iter()) {
            let messages: Vec<LedgerMessage> = chunk
                .validators
                .iter()
                .map(|v| LedgerMessage::withdraw_reward(&identity.address, v))
                .collect();

            let outcome = match self.signer.broadcast(identity, &messages).await {
                Ok(response) if response.is_success() => AttemptOutcome::Success {
                    hash: response.hash,
                },
                Ok(response) => failure(Error::Rejected {
                    code: response.code,
                    raw_log: response.raw_log,
                }),
                Err(e) => failure(e),
            };

            let result = AttemptResult {
                kind: OperationKind::ClaimBatch,
                ordinal,
                total,
                outcome,
                target: AttemptTarget::ClaimRange {
                    first: chunk.first,
                    last: chunk.last,
                },
            };
            self.report(&mut summary, result, sink).await;
            self.pace(ordinal, total).await;
        }

        Ok(RunOutcome::Completed(summary))
    }

    fn pick_destination(&mut self, policy: &DestinationPolicy) -> Result<String> {
        match policy {
            DestinationPolicy::Random => address::random_address(&self.address_prefix, &mut self.rng),
            DestinationPolicy::Pool(pool) => pool
                .choose(&mut self.rng)
                .cloned()
                .ok_or_else(|| Error::InvalidRequest("destination pool is empty".to_string())),
        }
    }

    async fn submit_single(&self, identity: &Identity, message: LedgerMessage) -> AttemptOutcome {
        match self.signer.broadcast_single(identity, message).await {
            Ok(hash) => AttemptOutcome::Success { hash },
            Err(e) => failure(e),
        }
    }

    async fn report(&self, summary: &mut RunSummary, result: AttemptResult, sink: &ScopedSink) {
        match &result.outcome {
            AttemptOutcome::Success { hash } => info!(
                "{} {}/{} {} ok: {}",
                result.kind, result.ordinal, result.total, result.target, hash
            ),
            AttemptOutcome::Failure { error } => warn!(
                "{} {}/{} {} failed: {}",
                result.kind, result.ordinal, result.total, result.target, error
            ),
        }
        summary.record(&result);
        sink.emit(OperationEvent::Attempt(result)).await;
    }

    async fn pace(&mut self, ordinal: u32, total: u32) {
        let delay = self.governor.next_delay(ordinal, total);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Every broadcast error becomes a failed attempt; only the log level differs
fn failure(e: Error) -> AttemptOutcome {
    if !e.is_submission_failure() {
        error!("Unexpected error while submitting: {:?}", e);
    }
    AttemptOutcome::Failure {
        error: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::{identity, snapshot, validator, ScriptedSigner, StaticQuery};
    use crate::orchestrator::events::{EventSink, RunEvent, WalletScope};
    use crate::orchestrator::pacing::PacingConfig;
    use crate::orchestrator::validators::EligibilityRules;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    fn runner(signer: &Arc<ScriptedSigner>, query: StaticQuery) -> OperationRunner {
        let governor = RateGovernor::new(PacingConfig::default(), Some(7));
        OperationRunner::new(signer.clone(), Arc::new(query), "uempe", "empe", governor)
            .with_seed(11)
    }

    fn drain(rx: &mut mpsc::Receiver<RunEvent>) -> Vec<OperationEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e.event);
        }
        events
    }

    fn attempts(events: &[OperationEvent]) -> Vec<AttemptResult> {
        events
            .iter()
            .filter_map(|e| match e {
                OperationEvent::Attempt(a) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_three_successes() {
        let signer = Arc::new(ScriptedSigner::new());
        let mut runner = runner(&signer, StaticQuery::default());
        let (sink, mut rx) = EventSink::channel(64);
        let sink = sink.scoped(WalletScope::single("empe1alice"));
        let request = OperationRequest::transfer("0.001", 3, DestinationPolicy::Random, 6).unwrap();

        let outcome = runner.run(&identity("alice"), &request, &sink).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed(RunSummary {
                attempted: 3,
                succeeded: 3,
                failed: 0
            })
        );

        let events = drain(&mut rx);
        let results = attempts(&events);
        assert_eq!(results.len(), 3);
        let hashes: HashSet<&str> = results.iter().filter_map(|r| r.hash()).collect();
        assert_eq!(hashes.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.ordinal).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(matches!(
            events.first(),
            Some(OperationEvent::Started { planned: 3, .. })
        ));
        assert!(matches!(events.last(), Some(OperationEvent::Finished(_))));

        for (sender, messages) in signer.sent() {
            assert_eq!(sender, "empe1alice");
            match &messages[..] {
                [LedgerMessage::Send {
                    to_address, amount, ..
                }] => {
                    assert!(to_address.starts_with("empe1"));
                    assert_eq!(amount[0].amount.get(), 1_000);
                    assert_eq!(amount[0].denom, "uempe");
                }
                other => panic!("unexpected messages {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_failure_continues() {
        let signer = Arc::new(ScriptedSigner::new());
        signer.push_ok("H1");
        signer.push_err(Error::Broadcast("connection reset".to_string()));
        signer.push_code(5, "insufficient funds");

        let mut runner = runner(&signer, StaticQuery::default());
        let (sink, mut rx) = EventSink::channel(64);
        let sink = sink.scoped(WalletScope::single("empe1alice"));
        let pool = vec!["empe1pool1".to_string(), "empe1pool2".to_string()];
        let request =
            OperationRequest::transfer("1", 4, DestinationPolicy::Pool(pool.clone()), 6).unwrap();

        let outcome = runner.run(&identity("alice"), &request, &sink).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed(RunSummary {
                attempted: 4,
                succeeded: 2,
                failed: 2
            })
        );

        let results = attempts(&drain(&mut rx));
        assert_eq!(results.len(), 4);
        assert!(results[0].succeeded());
        assert!(results[1].error().unwrap().contains("connection reset"));
        assert!(results[2].error().unwrap().contains("code 5"));
        assert!(results[3].succeeded());
        for r in &results {
            match &r.target {
                AttemptTarget::Recipient(addr) => assert!(pool.contains(addr)),
                other => panic!("unexpected target {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delegate_without_eligible_validator() {
        let signer = Arc::new(ScriptedSigner::new());
        let query = StaticQuery {
            validators: vec![validator("empevaloper1costly", dec!(0.25))],
            ..Default::default()
        };
        let mut runner = runner(&signer, query);
        let (sink, mut rx) = EventSink::channel(64);
        let sink = sink.scoped(WalletScope::single("empe1alice"));
        let rules = EligibilityRules {
            max_commission: dec!(0.20),
            ..Default::default()
        };
        let request = OperationRequest::delegate("1", 5, rules, 6).unwrap();

        let outcome = runner.run(&identity("alice"), &request, &sink).await.unwrap();
        assert_eq!(outcome, RunOutcome::NoEligibleValidator);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![OperationEvent::Finished(RunOutcome::NoEligibleValidator)]
        );
        assert!(signer.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delegate_samples_only_eligible() {
        let signer = Arc::new(ScriptedSigner::new());
        let mut jailed = validator("empevaloper1jailed", dec!(0.01));
        jailed.jailed = true;
        let query = StaticQuery {
            validators: vec![
                validator("empevaloper1a", dec!(0.05)),
                jailed,
                validator("empevaloper1b", dec!(0.10)),
                validator("empevaloper1costly", dec!(0.50)),
            ],
            ..Default::default()
        };
        let mut runner = runner(&signer, query);
        let (sink, _rx) = EventSink::channel(64);
        let sink = sink.scoped(WalletScope::single("empe1alice"));
        let request = OperationRequest::delegate("2.5", 10, EligibilityRules::default(), 6).unwrap();

        runner.run(&identity("alice"), &request, &sink).await.unwrap();

        let sent = signer.sent();
        assert_eq!(sent.len(), 10);
        for (_, messages) in sent {
            match &messages[..] {
                [LedgerMessage::Delegate {
                    validator_address,
                    amount,
                    ..
                }] => {
                    assert!(
                        validator_address == "empevaloper1a"
                            || validator_address == "empevaloper1b"
                    );
                    assert_eq!(amount.amount.get(), 2_500_000);
                }
                other => panic!("unexpected messages {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_single_chunk() {
        let signer = Arc::new(ScriptedSigner::new());
        signer.push_ok("ABC");
        let mut query = StaticQuery::default();
        query.rewards.insert(
            "empe1alice".to_string(),
            snapshot(&[("validatorA", 0), ("validatorB", 500_000)]),
        );
        let mut runner = runner(&signer, query);
        let (sink, mut rx) = EventSink::channel(64);
        let sink = sink.scoped(WalletScope::single("empe1alice"));

        let request = OperationRequest::claim(16).unwrap();
        runner.run(&identity("alice"), &request, &sink).await.unwrap();

        let events = drain(&mut rx);
        assert!(matches!(
            events[0],
            OperationEvent::ClaimPreflight { validators: 1, .. }
        ));
        let results = attempts(&events);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].hash(), Some("ABC"));
        assert_eq!(
            results[0].target,
            AttemptTarget::ClaimRange { first: 1, last: 1 }
        );

        let sent = signer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            vec![LedgerMessage::withdraw_reward("empe1alice", "validatorB")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_two_chunks_in_order() {
        let signer = Arc::new(ScriptedSigner::new());
        signer.push_code(11, "out of gas");

        let names: Vec<String> = (1..=20).map(|i| format!("val-{:02}", i)).collect();
        let entries: Vec<(&str, u128)> = names.iter().map(|n| (n.as_str(), 1_000)).collect();
        let mut query = StaticQuery::default();
        query
            .rewards
            .insert("empe1alice".to_string(), snapshot(&entries));
        let mut runner = runner(&signer, query);
        let (sink, mut rx) = EventSink::channel(64);
        let sink = sink.scoped(WalletScope::single("empe1alice"));

        let request = OperationRequest::claim(16).unwrap();
        let outcome = runner.run(&identity("alice"), &request, &sink).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed(RunSummary {
                attempted: 2,
                succeeded: 1,
                failed: 1
            })
        );

        let sent = signer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1.len(), 16);
        assert_eq!(sent[1].1.len(), 4);

        // The rejected first chunk fails as a whole
        let results = attempts(&drain(&mut rx));
        assert_eq!(
            results[0].target,
            AttemptTarget::ClaimRange { first: 1, last: 16 }
        );
        assert!(!results[0].succeeded());
        assert_eq!(
            results[1].target,
            AttemptTarget::ClaimRange { first: 17, last: 20 }
        );
        assert!(results[1].succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_to_claim() {
        let signer = Arc::new(ScriptedSigner::new());
        let mut runner = runner(&signer, StaticQuery::default());
        let (sink, mut rx) = EventSink::channel(64);
        let sink = sink.scoped(WalletScope::single("empe1alice"));

        let request = OperationRequest::claim(16).unwrap();
        let outcome = runner.run(&identity("alice"), &request, &sink).await.unwrap();
        assert_eq!(outcome, RunOutcome::NothingToClaim);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(attempts(&events).is_empty());
        assert!(signer.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_failure_aborts() {
        let signer = Arc::new(ScriptedSigner::new());
        let query = StaticQuery {
            fail_validators: true,
            ..Default::default()
        };
        let mut runner = runner(&signer, query);
        let (sink, mut rx) = EventSink::channel(64);
        let sink = sink.scoped(WalletScope::single("empe1alice"));

        let request = OperationRequest::delegate("1", 3, EligibilityRules::default(), 6).unwrap();
        let err = runner
            .run(&identity("alice"), &request, &sink)
            .await
            .unwrap_err();
        assert!(err.is_query_failure());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], OperationEvent::Aborted { .. }));
        assert!(signer.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_prefix_aborts_before_start() {
        let signer = Arc::new(ScriptedSigner::new());
        let governor = RateGovernor::new(PacingConfig::default(), Some(7));
        let mut runner = OperationRunner::new(
            signer.clone(),
            Arc::new(StaticQuery::default()),
            "uempe",
            "EMPE",
            governor,
        );
        let (sink, mut rx) = EventSink::channel(64);
        let sink = sink.scoped(WalletScope::single("empe1alice"));
        let request = OperationRequest::transfer("0.001", 3, DestinationPolicy::Random, 6).unwrap();

        let err = runner
            .run(&identity("alice"), &request, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], OperationEvent::Aborted { .. }));
        assert!(signer.sent().is_empty());

        // A pool needs no prefix of its own
        let pool = vec!["empe1pool1".to_string()];
        let request = OperationRequest::transfer("0.001", 1, DestinationPolicy::Pool(pool), 6).unwrap();
        runner.run(&identity("alice"), &request, &sink).await.unwrap();
        assert_eq!(signer.sent().len(), 1);
    }
}
