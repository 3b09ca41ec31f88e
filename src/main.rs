use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tiertrader::config::{AppConfig, LoggingConfig};
use tiertrader::exchange::{ExchangeAdapter, PaperExchange, ResolvedVenue, VenueRegistry};
use tiertrader::execution::{SupervisionOutcome, TradeExecutor};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinSet};
use tracing_subscriber::EnvFilter;

/// Execute tiered buy/sell signals against one exchange account
#[derive(Parser, Debug)]
#[command(name = "tiertrader", version)]
struct Args {
    /// Directory holding default.toml and per-environment overrides
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Signal to execute (BUY1..BUY3, SELL1..SELL3); repeatable.
    /// Without any, signals are read from stdin, one per line.
    #[arg(long = "signal")]
    signals: Vec<String>,

    /// Print the order history as JSON on exit
    #[arg(long)]
    dump_orders: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = AppConfig::load_from(&args.config_dir)
        .with_context(|| format!("loading config from {}", args.config_dir.display()))?;
    setup_logging(&config.logging);

    tracing::info!("🚀 TierTrader starting");

    let registry = VenueRegistry::with_overrides(config.venues.clone());
    let venue = registry.resolve(
        &config.trader.exchange,
        &config.trader.currency,
        &config.trader.asset,
    )?;
    let exchange = build_exchange(&config, &venue)?;

    tracing::info!(
        "  Market: {}/{} on {} (direct: {}, infinity orders: {})",
        venue.market.currency(),
        venue.market.asset(),
        venue.name,
        venue.capabilities.direct,
        venue.capabilities.infinity_order
    );

    let executor = TradeExecutor::from_config(exchange, venue, &config);
    executor
        .init()
        .await
        .context("could not load balances and fee")?;

    let mut running = JoinSet::new();

    if args.signals.is_empty() {
        tracing::info!("Reading signals from stdin, Ctrl+C to stop");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => dispatch(&executor, &line, &mut running),
                    None => break,
                },
                Some(joined) = running.join_next() => report(joined),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("⚠️  Received Ctrl+C, abandoning {} open supervisions", running.len());
                    running.shutdown().await;
                    break;
                }
            }
        }
    } else {
        for command in &args.signals {
            dispatch(&executor, command, &mut running);
        }
    }

    while !running.is_empty() {
        tokio::select! {
            Some(joined) = running.join_next() => report(joined),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, abandoning {} open supervisions", running.len());
                running.shutdown().await;
                break;
            }
        }
    }

    executor.store().log_portfolio();
    if args.dump_orders {
        println!("{}", serde_json::to_string_pretty(&executor.orders())?);
    }
    tracing::info!("👋 TierTrader stopped");
    Ok(())
}

fn setup_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Venue adapters live outside this crate; only the paper venue is built in
fn build_exchange(
    config: &AppConfig,
    venue: &ResolvedVenue,
) -> anyhow::Result<Arc<dyn ExchangeAdapter>> {
    if venue.slug != "paper" {
        bail!("no exchange adapter available for {}", venue.name);
    }

    let settings = config
        .paper
        .clone()
        .context("the paper venue needs a [paper] config section")?;
    Ok(Arc::new(PaperExchange::new(settings)))
}

fn dispatch(
    executor: &TradeExecutor,
    command: &str,
    running: &mut JoinSet<Result<SupervisionOutcome, JoinError>>,
) {
    if let Some(handle) = executor.trade_command(command) {
        running.spawn(handle);
    }
}

fn report(joined: Result<Result<SupervisionOutcome, JoinError>, JoinError>) {
    match joined.and_then(|inner| inner) {
        Ok(SupervisionOutcome::Filled { order }) => tracing::info!(
            "  ✓ {} filled: {} @ {} after {} attempt(s)",
            order.signal,
            order.amount,
            order.price,
            order.attempt
        ),
        Ok(SupervisionOutcome::Rejected {
            signal, rejection, ..
        }) => tracing::info!("  ✗ {} not placed: {}", signal, rejection),
        Ok(SupervisionOutcome::SubmissionFailed { signal, error, .. }) => {
            tracing::error!("  ✗ {} submission failed: {}", signal, error)
        }
        Ok(SupervisionOutcome::Abandoned { signal, error, .. }) => {
            tracing::error!("  ✗ {} abandoned: {}", signal, error)
        }
        Ok(SupervisionOutcome::RetryLimitReached { signal, attempts }) => {
            tracing::warn!("  ✗ {} gave up after {} attempts", signal, attempts)
        }
        Err(e) => tracing::error!("Supervision task failed: {}", e),
    }
}
