//! NFT Bidding Bot CLI
//!
//! Resolves a collection's assets and places bulk offers on them.

use alloy::primitives::Address;
use anyhow::Result;
use clap::{ArgAction, Parser};
use nft_bidder::{
    build_bidders, load_signer, wallet_address, AlwaysDecline, AssetSource, BidContext, ChainClient, Config, Confirm,
    Executor, JsonRpcChain, Marketplace, Pipeline, ReqwestFetcher, RunOptions, StdinConfirm, TraitFilter,
};
use rust_decimal::Decimal;
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "nft-bidder")]
#[command(about = "Bulk offer bot for NFT collections")]
#[command(version)]
struct Cli {
    /// Collection contract address
    #[arg(short, long)]
    contract: String,

    /// Offer price in WETH
    #[arg(long)]
    bid: Decimal,

    /// Number of units per offer
    #[arg(long, default_value_t = 1)]
    quantity: u64,

    /// Offer lifetime in minutes
    #[arg(long = "offerExpiration", alias = "offer-expiration", default_value_t = 15)]
    offer_expiration: u64,

    /// Resolve all metadata and offer to refresh an existing cache
    #[arg(long, alias = "prefetchMetadata")]
    prefetch: bool,

    /// Stop after resolving assets (pass `--dryRun false` to bid)
    #[arg(
        long = "dryRun",
        alias = "dry-run",
        default_value_t = true,
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    dry_run: bool,

    /// Attribute trait_type to filter on
    #[arg(long = "trait", requires = "trait_value")]
    trait_name: Option<String>,

    /// Attribute value to filter on
    #[arg(long = "trait-value", requires = "trait_name")]
    trait_value: Option<String>,

    /// Marketplaces to bid on (repeatable)
    #[arg(long, value_enum, default_value = "opensea")]
    marketplace: Vec<Marketplace>,

    /// Asset source
    #[arg(long, value_enum, default_value = "chain")]
    source: AssetSource,

    /// Never prompt; the overwrite question is always declined
    #[arg(long)]
    non_interactive: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging (RUST_LOG wins over --verbose)
    let default_level = if cli.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .compact()
        .init();

    run_until_shutdown(run(cli), shutdown_signal()).await
}

/// Drive the run to completion or until a signal; every exit path logs the exit handler
async fn run_until_shutdown(run: impl Future<Output = Result<()>>, shutdown: impl Future<Output = ()>) -> ExitCode {
    let code = tokio::select! {
        result = run => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = shutdown => ExitCode::from(130),
    };

    info!("Exit handler called");
    code
}

async fn run(cli: Cli) -> Result<()> {
    // Validate offer terms before any network work
    let mut ctx = BidContext::new(Address::ZERO, cli.bid, cli.quantity, cli.offer_expiration)?;

    let config = Config::from_env()?;
    let chain: Arc<dyn ChainClient> = Arc::new(JsonRpcChain::new(config.rpc_url.clone())?);
    let fetcher = Arc::new(ReqwestFetcher::new()?);
    let confirm: Box<dyn Confirm> = if cli.non_interactive {
        Box::new(AlwaysDecline)
    } else {
        Box::new(StdinConfirm::default())
    };

    let filter = match (cli.trait_name, cli.trait_value) {
        (Some(trait_type), Some(value)) => Some(TraitFilter::new(trait_type, value)),
        _ => None,
    };
    let options = RunOptions {
        source: cli.source,
        prefetch: cli.prefetch,
        filter,
    };

    let pipeline = Pipeline::new(&config, Arc::clone(&chain), fetcher, confirm)?;
    let output = pipeline.run(&cli.contract, &options).await?;

    if output.failed > 0 {
        warn!(
            "{} tokens failed to resolve ({} expected failures suppressed)",
            output.failed, output.suppressed
        );
    }
    info!(
        "{} assets ready for {} ({})",
        output.assets.len(),
        output.collection.checksummed,
        if output.from_cache { "cached" } else { "fresh" }
    );

    if cli.dry_run {
        let report = Executor::new(Vec::new())
            .dry_run(true)
            .execute(&ctx, &output.assets)
            .await;
        info!("{}", report);
        return Ok(());
    }

    let signer = load_signer(config.require_private_key()?, config.chain_id)?;
    info!("Wallet: {}", wallet_address(&signer));
    ctx.offerer = signer.address();

    let bidders = build_bidders(&cli.marketplace, &config, signer, chain)?;
    let report = Executor::new(bidders).execute(&ctx, &output.assets).await;
    info!("{}", report);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::SignalKind;

        tokio::select! {
            _ = unix_signal(SignalKind::terminate(), "SIGTERM") => {}
            _ = unix_signal(SignalKind::user_defined1(), "SIGUSR1") => {}
            _ = unix_signal(SignalKind::user_defined2(), "SIGUSR2") => {}
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind, name: &str) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut signal) => {
            signal.recv().await;
            debug!("Received {}", name);
        }
        Err(e) => {
            warn!("Failed to install {} handler: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;

    #[tokio::test]
    async fn test_failed_run_exits_with_failure() {
        let code = run_until_shutdown(async { Err::<(), _>(anyhow::anyhow!("boom")) }, pending::<()>()).await;
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_completed_run_exits_with_success() {
        let code = run_until_shutdown(async { Ok::<(), anyhow::Error>(()) }, pending::<()>()).await;
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_signal_interrupts_run() {
        let code = run_until_shutdown(pending::<Result<()>>(), async {}).await;
        assert_eq!(code, ExitCode::from(130));
    }
}
