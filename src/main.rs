//! Stake Batcher - paced batch transactions for Cosmos-SDK networks
//!
//! # WARNING
//! - Every broadcast moves real funds. Try `--dry-run` first.
//! - Transfers to random addresses are unrecoverable.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use stake_batcher::cli::commands;
use stake_batcher::config::Config;
use stake_batcher::Error;

/// Stake Batcher - paced batch transfers, delegations and reward claims
#[derive(Parser)]
#[command(name = "batcher")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "batcher.toml")]
    config: String,

    /// Hash transactions locally instead of broadcasting them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send transfers from each wallet
    Transfer {
        /// Amount per transfer in display units, e.g. 0.001
        #[arg(long)]
        amount: String,

        /// Number of transfers per wallet
        #[arg(long)]
        count: u32,

        /// Draw destinations from the address pool file instead of random addresses
        #[arg(long)]
        pool: bool,

        /// Run for every seed in the seed file
        #[arg(long)]
        all_wallets: bool,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Delegate to randomly sampled eligible validators
    Delegate {
        /// Amount per delegation in display units
        #[arg(long)]
        amount: String,

        /// Number of delegations per wallet
        #[arg(long)]
        count: u32,

        /// Highest acceptable commission rate, e.g. 0.1 (overrides config)
        #[arg(long)]
        max_commission: Option<String>,

        /// Run for every seed in the seed file
        #[arg(long)]
        all_wallets: bool,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Withdraw all pending staking rewards
    Claim {
        /// Validators per claim transaction (overrides config)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Run for every seed in the seed file
        #[arg(long)]
        all_wallets: bool,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show wallet balances, account numbers and pending rewards
    Balance,

    /// List validators eligible for delegation
    Validators,

    /// Show current configuration (secrets masked)
    Config,

    /// Menu-driven mode
    Interactive,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::builder()
        .with_default_directive(
            "stake_batcher=info"
                .parse::<Directive>()
                .map_err(|e| anyhow::anyhow!("invalid log directive: {}", e))?,
        )
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let dry_run = cli.dry_run;

    // Execute command
    let result = match cli.command {
        Commands::Transfer {
            amount,
            count,
            pool,
            all_wallets,
            force,
        } => commands::transfer(&config, dry_run, &amount, count, pool, all_wallets, force).await,
        Commands::Delegate {
            amount,
            count,
            max_commission,
            all_wallets,
            force,
        } => {
            commands::delegate(
                &config,
                dry_run,
                &amount,
                count,
                max_commission.as_deref(),
                all_wallets,
                force,
            )
            .await
        }
        Commands::Claim {
            chunk_size,
            all_wallets,
            force,
        } => commands::claim(&config, dry_run, chunk_size, all_wallets, force).await,
        Commands::Balance => commands::balance(&config, dry_run).await,
        Commands::Validators => commands::validators(&config).await,
        Commands::Config => commands::show_config(&config),
        Commands::Interactive => commands::interactive(&config, dry_run).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<Error>() {
            Some(err) if err.is_configuration() => {
                error!("Setup error: {:#}", e);
                error!(
                    "Check {} and the seed sources (file, env var, prompt)",
                    cli.config
                );
            }
            _ => error!("Command failed: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}
