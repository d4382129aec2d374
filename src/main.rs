//! # Chitram
//!
//! An incremental harvester for now-playing movie listings. Each city's page
//! is scraped, normalized, and reconciled against previously stored state so
//! the per-city document keeps a permanent record: movies currently showing
//! are active, movies that dropped off the page stay behind as inactive.
//!
//! ## Architecture
//!
//! One harvest cycle per city runs strictly in order:
//! 1. **Cache check**: a durable 24 h TTL cache decides whether to re-fetch
//! 2. **Fetch**: HTTP GET with exponential backoff and a rotating user agent
//! 3. **Extract**: JSON-LD movie cards parsed into normalized records
//! 4. **Reconcile**: fresh batch merged with the stored group, vanished
//!    movies flagged inactive rather than deleted
//! 5. **Persist**: the merged group replaces the city's document atomically
//!
//! Cities are independent; the scheduler fans them out concurrently with a
//! fixed gap between outbound requests, once per interval.
//!
//! ## Usage
//!
//! ```sh
//! chitram --cities mumbai,pune --once
//! ```

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cache;
mod cli;
mod error;
mod fetch;
mod models;
mod pipeline;
mod reconcile;
mod scheduler;
mod scrapers;
mod store;
mod utils;

use cache::ListingsCache;
use cli::Cli;
use fetch::{DEFAULT_BACKOFF_BASE, HttpFetcher, RetryFetch};
use pipeline::Pipeline;
use scheduler::ScheduleConfig;
use scrapers::PaytmExtractor;
use store::ListingsStore;
use utils::ensure_writable_dir;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("chitram starting up");

    let args = Cli::parse();
    debug!(?args.data_dir, ?args.cache_dir, ?args.base_url, "parsed CLI arguments");

    // Fail fast on unusable directories instead of mid-harvest.
    for dir in [&args.data_dir, &args.cache_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "directory is not writable (fix perms or choose a different path)");
            return Err(e.into());
        }
    }

    let cities = args.resolve_cities().await?;
    info!(count = cities.len(), "city roster resolved");

    let base_url = Url::parse(&args.base_url)?;
    let fetcher = RetryFetch::new(
        HttpFetcher::new(FETCH_TIMEOUT)?,
        args.max_attempts,
        DEFAULT_BACKOFF_BASE,
    );
    let pipeline = Pipeline::new(
        fetcher,
        ListingsCache::new(&args.cache_dir),
        ListingsStore::new(&args.data_dir),
        PaytmExtractor,
        base_url,
    );

    let config = ScheduleConfig {
        interval: Duration::from_secs(args.interval_secs),
        fan_out: args.fan_out,
        request_gap: Duration::from_millis(args.request_gap_ms),
    };

    if args.once {
        let succeeded =
            scheduler::run_tick(&pipeline, &cities, config.fan_out, config.request_gap).await;
        let elapsed = start_time.elapsed();
        info!(
            succeeded,
            total = cities.len(),
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            "single pass complete"
        );
    } else {
        info!(
            interval_secs = config.interval.as_secs(),
            fan_out = config.fan_out,
            "starting recurring scheduler"
        );
        scheduler::run_forever(&pipeline, &cities, &config).await;
    }

    Ok(())
}
