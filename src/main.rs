//! Lendscope
//!
//! Command-line front end over the chain and price clients:
//! - `events`: fetch lending pool events and write a CSV report
//! - `price`: resolve and read a Chainlink price feed
//! - `account`: inspect a lending pool account

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lendscope_api::CoinGeckoClient;
use lendscope_chain::{connect_http, EventKind, FeedResolver, PriceObservation, PriceReader};
use lendscope_core::{AccountInspector, AppConfig, CsvSink, EventPipeline};

#[derive(Debug, Parser)]
#[command(name = "lendscope", version, about = "Chainlink feeds and Aave pool analytics")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "LENDSCOPE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch pool events and write a report
    Events {
        /// Borrow, LiquidationCall or FlashLoan
        #[arg(long, default_value = "LiquidationCall")]
        kind: String,
        /// Defaults to `events.start_block`
        #[arg(long)]
        from_block: Option<u64>,
        /// Defaults to the latest block
        #[arg(long)]
        to_block: Option<u64>,
    },
    /// Read the price of a base/quote pair
    Price {
        #[arg(long)]
        base: String,
        #[arg(long)]
        quote: String,
        /// Historical round instead of the latest one
        #[arg(long)]
        round: Option<u128>,
        /// Use the local feed table only
        #[arg(long, conflicts_with = "registry")]
        local: bool,
        /// Read through the feed registry by pair
        #[arg(long)]
        registry: bool,
    },
    /// Inspect a lending pool account
    Account {
        #[arg(long)]
        user: Address,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lendscope_core=debug,lendscope_chain=debug")),
        )
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    config.log_config();

    match cli.command {
        Command::Events {
            kind,
            from_block,
            to_block,
        } => {
            // Unsupported kinds fail before connecting
            let kind: EventKind = kind.parse()?;
            run_events(&config, kind, from_block.unwrap_or(config.events.start_block), to_block)
                .await
        }
        Command::Price {
            base,
            quote,
            round,
            local,
            registry,
        } => run_price(&config, &base, &quote, round, local, registry).await,
        Command::Account { user } => run_account(&config, user).await,
    }
}

async fn run_events(
    config: &AppConfig,
    kind: EventKind,
    from_block: u64,
    to_block: Option<u64>,
) -> Result<()> {
    let client = Arc::new(
        connect_http(
            &config.rpc.http,
            config.contracts.chain_contracts(),
            config.rpc.settings(),
        )
        .await?,
    );

    let assets = Arc::new(config.asset_registry());
    info!(asset_count = assets.len(), "Asset registry loaded");

    let prices = CoinGeckoClient::new()
        .with_base_url(config.prices.coingecko_url.clone())
        .with_timeout(Duration::from_secs(config.prices.timeout_secs))
        .with_ids(assets.price_ids());

    let pipeline = EventPipeline::new(
        client,
        Arc::new(prices),
        assets.clone(),
        config.contracts.lending_pool,
    )
    .with_log_receipts(config.report.log_receipts);
    let sink = CsvSink::new(&config.report.output_dir)
        .with_persist_borrow(config.report.persist_borrow);

    let (report, path) = pipeline
        .run_and_write(kind, from_block, to_block, &sink)
        .await?;

    for (category, addresses) in report.issues.iter() {
        warn!(category, ?addresses, "Unresolved addresses");
    }
    match path {
        Some(path) => info!(
            %kind,
            rows = report.table.len(),
            duplicates = report.duplicates,
            path = %path.display(),
            "Report complete"
        ),
        None => info!(%kind, rows = report.table.len(), "Report complete, not persisted"),
    }
    Ok(())
}

async fn run_price(
    config: &AppConfig,
    base: &str,
    quote: &str,
    round: Option<u128>,
    local: bool,
    by_registry: bool,
) -> Result<()> {
    let client = Arc::new(
        connect_http(
            &config.rpc.http,
            config.contracts.chain_contracts(),
            config.rpc.settings(),
        )
        .await?,
    );

    let resolver = FeedResolver::new(client.clone(), client.clone(), config.denominations())
        .with_domain(config.feeds.name_domain.clone())
        .with_local_feeds(config.feeds.local_feeds());
    let reader = PriceReader::new(client.clone(), client);

    if by_registry {
        let denominations = resolver.denominations();
        let (Some(base_key), Some(quote_key)) = (denominations.get(base), denominations.get(quote))
        else {
            bail!("No registry key for {base}/{quote}");
        };
        let decimals = reader.decimals_by_pair(base_key, quote_key).await?;
        let observation = reader.read_latest_by_pair(base_key, quote_key, decimals).await?;
        log_observation(base, quote, &observation);
        return Ok(());
    }

    let feed = if local {
        resolver.local_feed(base, quote)
    } else {
        resolver.resolve_feed(base, quote).await?
    };
    let Some(feed) = feed else {
        warn!(base, quote, local, "No feed found");
        return Ok(());
    };
    info!(
        base,
        quote,
        address = %feed.address,
        direction = ?feed.direction,
        source = ?feed.source,
        "Feed resolved"
    );

    let observation = match round {
        Some(round_id) => {
            let observation = reader
                .read_round(feed.address, round_id)
                .await
                .with_context(|| format!("Failed to read round {round_id}"))?;
            if feed.direction.is_direct() {
                observation
            } else {
                observation.inverted()
            }
        }
        None => reader.read_resolved(&feed).await?,
    };
    log_observation(base, quote, &observation);
    Ok(())
}

fn log_observation(base: &str, quote: &str, observation: &PriceObservation) {
    match observation.price {
        Some(price) => info!(
            base,
            quote,
            price,
            round_id = observation.round_id,
            updated_at = observation.updated_at,
            answered_in_round = observation.answered_in_round,
            "Price"
        ),
        None => warn!(base, quote, round_id = observation.round_id, "No answer for pair"),
    }
}

async fn run_account(config: &AppConfig, user: Address) -> Result<()> {
    let client = Arc::new(
        connect_http(
            &config.rpc.http,
            config.contracts.chain_contracts(),
            config.rpc.settings(),
        )
        .await?,
    );

    let inspector = AccountInspector::new(client, Arc::new(config.asset_registry()));
    let report = inspector.inspect_account(user).await?;

    let summary = &report.summary;
    info!(
        %user,
        total_collateral_eth = summary.total_collateral_eth,
        total_debt_eth = summary.total_debt_eth,
        available_borrows_eth = summary.available_borrows_eth,
        ltv_pct = summary.ltv_pct,
        liquidation_threshold_pct = summary.liquidation_threshold_pct,
        health_factor = summary.health_factor,
        "Account data"
    );
    for reserve in report.reserves.iter().filter(|r| r.borrowing || r.collateral) {
        let c = &reserve.configuration;
        info!(
            index = reserve.index,
            asset = %reserve.symbol,
            address = %reserve.asset,
            borrowing = reserve.borrowing,
            collateral = reserve.collateral,
            ltv_bps = c.ltv_bps,
            liquidation_threshold_bps = c.liquidation_threshold_bps,
            liquidation_bonus_bps = c.liquidation_bonus_bps,
            decimals = c.decimals,
            active = c.active,
            frozen = c.frozen,
            "Reserve"
        );
    }
    Ok(())
}
