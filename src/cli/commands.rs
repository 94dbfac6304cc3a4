//! CLI command implementations

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::report::{display_unit, spawn_reporter};
use crate::amount::MicroAmount;
use crate::config::{Config, SignerMode};
use crate::ledger::{
    DryRunSigner, Identity, LcdClient, QueryService, RemoteSigner, SigningService,
};
use crate::orchestrator::request::parse_commission;
use crate::orchestrator::{
    filter_eligible, DestinationPolicy, EventSink, OperationEvent, OperationRequest,
    OperationRunner, RateGovernor, WalletScope,
};
use crate::wallet::{address_pool, seeds, WalletSequencer};

/// Signer, query client and the identities for one invocation
pub struct Session {
    signer: Arc<dyn SigningService>,
    query: Arc<dyn QueryService>,
    identities: Vec<Identity>,
}

fn query_client(config: &Config) -> Result<Arc<dyn QueryService>> {
    let client = LcdClient::new(
        &config.network.lcd_url,
        &config.network.denom,
        config.http_timeout(),
    )?;
    Ok(Arc::new(client))
}

fn signing_service(config: &Config, dry_run: bool) -> Result<Arc<dyn SigningService>> {
    if dry_run || config.signer.mode == SignerMode::DryRun {
        warn!("Running in DRY-RUN mode - no transactions will be broadcast");
        return Ok(Arc::new(DryRunSigner::new(&config.network.address_prefix)));
    }
    info!("Using signing service at {}", config.signer.url);
    Ok(Arc::new(RemoteSigner::new(
        &config.signer.url,
        config.chain_params(),
    )?))
}

/// Load seeds and derive one identity per seed
pub async fn connect(config: &Config, dry_run: bool, all_wallets: bool) -> Result<Session> {
    let signer = signing_service(config, dry_run)?;
    info!("Signing with the {} service", signer.name());
    let query = query_client(config)?;

    let seeds = seeds::load_seeds(
        &config.wallets.mnemonic_env,
        config.wallets.mnemonic_file.as_deref(),
        all_wallets,
        std::io::stdin().is_terminal(),
    )?;

    let mut identities = Vec::with_capacity(seeds.len());
    for (i, seed) in seeds.iter().enumerate() {
        let label = format!("wallet-{}", i + 1);
        let identity = signer
            .derive_identity(seed, &label)
            .await
            .with_context(|| format!("Failed to derive identity for {}", label))?;
        info!("Loaded {}: {}", identity.label, identity.address);
        identities.push(identity);
    }

    Ok(Session {
        signer,
        query,
        identities,
    })
}

/// True when `spend` plus the fee buffer is more than `balance`
pub fn exceeds_balance(spend: MicroAmount, buffer: MicroAmount, balance: MicroAmount) -> bool {
    match spend.checked_add(buffer) {
        Some(needed) => needed > balance,
        None => true,
    }
}

fn build_runner(session: &Session, config: &Config) -> OperationRunner {
    OperationRunner::new(
        session.signer.clone(),
        session.query.clone(),
        &config.network.denom,
        &config.network.address_prefix,
        RateGovernor::from_entropy(config.pacing.clone()),
    )
    .with_validator_limit(config.validators.query_limit)
}

/// Show balances, confirm, then run `request` for every identity in the session
async fn execute(
    session: &Session,
    config: &Config,
    request: OperationRequest,
    force: bool,
) -> Result<()> {
    let exponent = config.network.exponent;
    let unit = display_unit(&config.network.denom);
    let buffer = config.safety_buffer()?;

    println!("\n=== WALLETS ===\n");
    for identity in &session.identities {
        let balance = session.query.balance(&identity.address).await;
        println!(
            "{:<10} {}  {} {}",
            identity.label,
            identity.address,
            balance.to_human(exponent),
            unit
        );

        if let Some(spend) = request.spend() {
            if exceeds_balance(spend, buffer, balance) {
                warn!(
                    "{} may not cover {} {} plus {} {} for fees (balance {} {})",
                    identity.label,
                    spend.to_human(exponent),
                    unit,
                    buffer.to_human(exponent),
                    unit,
                    balance.to_human(exponent),
                    unit
                );
            }
        }
    }
    println!();

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Run {} for {} wallet(s)? This cannot be undone.",
                request.label(),
                session.identities.len()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("{} cancelled by user", request.label());
            return Ok(());
        }
    }

    let (sink, rx) = EventSink::channel(config.events.channel_capacity);
    let reporter = spawn_reporter(rx, exponent, &config.network.denom);
    let mut runner = build_runner(session, config);

    if session.identities.len() > 1 {
        let reports = WalletSequencer::new(config.cooldown())
            .run_for_all(&mut runner, &session.identities, &request, &sink)
            .await;
        for report in reports.iter().filter(|r| !r.is_ok()) {
            if let Err(reason) = &report.outcome {
                error!("{} ({}) aborted: {}", report.label, report.address, reason);
            }
        }
    } else if let Some(identity) = session.identities.first() {
        let scoped = sink.scoped(WalletScope::single(&identity.address));
        if let Err(e) = runner.run(identity, &request, &scoped).await {
            error!("{} failed for {}: {}", request.label(), identity.label, e);
        }
        let balance = session.query.balance(&identity.address).await;
        scoped
            .emit(OperationEvent::BalanceRefreshed { balance })
            .await;
    }

    drop(sink);
    let stats = reporter.await.context("Reporter task failed")?;

    println!("\n=== SUMMARY ===\n");
    println!("Attempts:     {}", stats.total);
    println!("Succeeded:    {}", stats.succeeded);
    println!("Failed:       {}", stats.failed);
    println!("Success rate: {:.1}%", stats.success_rate());

    Ok(())
}

fn destination_policy(config: &Config, use_pool: bool) -> Result<DestinationPolicy> {
    if !use_pool {
        return Ok(DestinationPolicy::Random);
    }
    let pool = address_pool::load_pool(
        &config.wallets.address_pool_file,
        &config.network.address_prefix,
    )?;
    Ok(pool.map_or(DestinationPolicy::Random, DestinationPolicy::Pool))
}

/// Send `count` transfers of `amount` from each wallet
pub async fn transfer(
    config: &Config,
    dry_run: bool,
    amount: &str,
    count: u32,
    use_pool: bool,
    all_wallets: bool,
    force: bool,
) -> Result<()> {
    let destination = destination_policy(config, use_pool)?;
    let request =
        OperationRequest::transfer(amount, count, destination, config.network.exponent)?;
    let session = connect(config, dry_run, all_wallets).await?;
    execute(&session, config, request, force).await
}

/// Delegate `amount` to `count` sampled eligible validators from each wallet
pub async fn delegate(
    config: &Config,
    dry_run: bool,
    amount: &str,
    count: u32,
    max_commission: Option<&str>,
    all_wallets: bool,
    force: bool,
) -> Result<()> {
    let mut rules = config.eligibility_rules();
    if let Some(raw) = max_commission {
        rules.max_commission = parse_commission(raw)?;
    }
    let request = OperationRequest::delegate(amount, count, rules, config.network.exponent)?;
    let session = connect(config, dry_run, all_wallets).await?;
    execute(&session, config, request, force).await
}

/// Withdraw all pending rewards from each wallet
pub async fn claim(
    config: &Config,
    dry_run: bool,
    chunk_size: Option<usize>,
    all_wallets: bool,
    force: bool,
) -> Result<()> {
    let request = OperationRequest::claim(chunk_size.unwrap_or(config.claims.chunk_size))?;
    let session = connect(config, dry_run, all_wallets).await?;
    execute(&session, config, request, force).await
}

/// Show balance, account number and sequence for every configured wallet
pub async fn balance(config: &Config, dry_run: bool) -> Result<()> {
    let all_wallets = config
        .wallets
        .mnemonic_file
        .as_ref()
        .map(|p| p.exists())
        .unwrap_or(false);
    let session = connect(config, dry_run, all_wallets).await?;
    let exponent = config.network.exponent;
    let unit = display_unit(&config.network.denom);

    println!("\n=== WALLET STATUS ===\n");
    for identity in &session.identities {
        let balance = session.query.balance(&identity.address).await;
        println!("{} ({})", identity.label, identity.address);
        println!("  Balance:  {} {}", balance.to_human(exponent), unit);

        match session.query.account_meta(&identity.address).await {
            Ok(meta) => {
                println!("  Account:  {}", meta.account_number);
                println!("  Sequence: {}", meta.sequence);
            }
            Err(e) => println!("  Account:  (lookup failed: {})", e),
        }
        match session.query.rewards(&identity.address).await {
            Ok(rewards) => println!("  Rewards:  {} {}", rewards.total.to_human(exponent), unit),
            Err(e) => println!("  Rewards:  (lookup failed: {})", e),
        }
        println!();
    }

    Ok(())
}

/// List bonded validators that pass the configured eligibility rules
pub async fn validators(config: &Config) -> Result<()> {
    let query = query_client(config)?;
    let rules = config.eligibility_rules();
    let bonded = query
        .bonded_validators(config.validators.query_limit)
        .await
        .context("Failed to fetch validators")?;
    let eligible = filter_eligible(&bonded, &rules);
    let exponent = config.network.exponent;

    println!(
        "\n=== ELIGIBLE VALIDATORS ({} of {}, max commission {}%) ===\n",
        eligible.len(),
        bonded.len(),
        rules.max_commission * rust_decimal::Decimal::ONE_HUNDRED
    );
    for v in &eligible {
        println!(
            "{:<24} {}  {:>6.2}%  {} {}",
            truncate(&v.moniker, 24),
            v.operator_address,
            v.commission * rust_decimal::Decimal::ONE_HUNDRED,
            v.tokens.to_human(exponent),
            display_unit(&config.network.denom)
        );
    }
    if eligible.is_empty() {
        println!("No validator passes the eligibility rules.");
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Show configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Menu loop: pick an operation, answer the prompts, repeat until exit
pub async fn interactive(config: &Config, dry_run: bool) -> Result<()> {
    let session = connect(config, dry_run, false).await?;
    let items = ["Transfer", "Delegate", "Claim rewards", "Show balance", "Exit"];

    loop {
        let choice = Select::new()
            .with_prompt("Choose an action")
            .items(&items)
            .default(0)
            .interact()?;

        let request = match choice {
            0 | 1 => {
                let amount: String = Input::new()
                    .with_prompt(format!(
                        "Amount per transaction ({})",
                        display_unit(&config.network.denom)
                    ))
                    .default("0.001".to_string())
                    .interact_text()?;
                let count: u32 = Input::new()
                    .with_prompt("Number of transactions")
                    .default(1)
                    .interact_text()?;

                let built = if choice == 0 {
                    let use_pool = Confirm::new()
                        .with_prompt("Send to addresses from the pool file?")
                        .default(false)
                        .interact()?;
                    destination_policy(config, use_pool).and_then(|d| {
                        OperationRequest::transfer(&amount, count, d, config.network.exponent)
                            .map_err(anyhow::Error::from)
                    })
                } else {
                    OperationRequest::delegate(
                        &amount,
                        count,
                        config.eligibility_rules(),
                        config.network.exponent,
                    )
                    .map_err(anyhow::Error::from)
                };

                match built {
                    Ok(request) => request,
                    Err(e) => {
                        warn!("{}", e);
                        continue;
                    }
                }
            }
            2 => OperationRequest::claim(config.claims.chunk_size)?,
            3 => {
                for identity in &session.identities {
                    let balance = session.query.balance(&identity.address).await;
                    println!(
                        "{}: {} {}",
                        identity.label,
                        balance.to_human(config.network.exponent),
                        display_unit(&config.network.denom)
                    );
                }
                continue;
            }
            _ => break,
        };

        if let Err(e) = execute(&session, config, request, false).await {
            error!("Operation failed: {}", e);
        }
    }

    info!("Bye");
    Ok(())
}
