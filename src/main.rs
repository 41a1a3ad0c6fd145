//! # Job Board Ingest
//!
//! Ingests job postings from a paginated listings site into SQLite and makes
//! them queryable.
//!
//! ## Usage
//!
//! ```sh
//! jobboard_ingest --database ./jobs.db
//! jobboard_ingest search --title actuary --per-page 20
//! ```
//!
//! ## Architecture
//!
//! An ingestion run is a pipeline driven page by page:
//! 1. **Fetching**: download a listing page with a rotating client identity
//! 2. **Extracting**: pull listing blocks into raw candidates
//! 3. **Deduplicating**: skip URLs already in the store
//! 4. **Describing**: fetch each new candidate's detail page
//! 5. **Normalizing**: canonical dates, tags, location, salary and validation
//! 6. **Committing**: insert the page's batch in one transaction, then pace
//!
//! Failures on a page or a candidate are logged and skipped; only setup
//! errors (bad config, unusable store) abort the run.

use std::error::Error;

use clap::Parser;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dedup;
mod error;
mod fetch;
mod ingest;
mod models;
mod normalize;
mod outputs;
mod query;
mod scrapers;
mod store;
mod utils;

use cli::{Cli, Command, IngestArgs, SearchArgs};
use config::IngestConfig;
use fetch::{HttpFetcher, RetryFetch};
use ingest::Ingestor;
use outputs::json;
use store::SqliteJobStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    debug!(database = %args.database.display(), command = ?args.command, "Parsed CLI arguments");

    match args.command {
        None => ingest(&args, &IngestArgs::default()).await,
        Some(Command::Ingest(ref ingest_args)) => ingest(&args, ingest_args).await,
        Some(Command::Search(ref search_args)) => search(&args, search_args),
        Some(Command::Show { id }) => show(&args, id),
    }
}

#[instrument(level = "info", skip_all)]
async fn ingest(cli: &Cli, args: &IngestArgs) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    info!("Ingestion starting up");

    let mut config = IngestConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        error!(error = %e, "Refusing to run with invalid configuration");
        return Err(e.into());
    }
    info!(
        base_url = %config.base_url,
        first_page = config.first_page,
        last_page = config.last_page,
        page_delay_ms = config.page_delay_ms,
        max_retries = config.max_retries,
        detail_concurrency = config.detail_concurrency,
        "Loaded ingestion configuration"
    );

    let store = match SqliteJobStore::open(&cli.database) {
        Ok(store) => store,
        Err(e) => {
            error!(path = %cli.database.display(), error = %e, "Failed to open job store");
            return Err(e.into());
        }
    };

    let fetcher = RetryFetch::new(
        HttpFetcher::new(&config.user_agents, config.request_timeout())?,
        config.max_retries,
        config.retry_base_delay(),
    );
    let mut ingestor = Ingestor::new(&config, fetcher, store)?;
    let summary = ingestor.run().await;

    if let Some(path) = &args.summary_json {
        if let Err(e) = json::write_summary(&summary, path).await {
            warn!(path = %path.display(), error = %e, "Failed to write run summary");
        }
    }

    let stored = ingestor.into_store().count().unwrap_or_default();
    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        committed = summary.committed,
        stored,
        "Execution complete"
    );
    Ok(())
}

fn search(cli: &Cli, args: &SearchArgs) -> Result<(), Box<dyn Error>> {
    let store = SqliteJobStore::open(&cli.database)?;
    let page = store.search(&args.to_query())?;
    info!(total = page.total, returned = page.jobs.len(), "Search complete");
    println!("{}", serde_json::to_string_pretty(&page.to_json())?);
    Ok(())
}

fn show(cli: &Cli, id: i64) -> Result<(), Box<dyn Error>> {
    let store = SqliteJobStore::open(&cli.database)?;
    match store.get(id)? {
        Some(job) => {
            println!("{}", serde_json::to_string_pretty(&job.to_json())?);
            Ok(())
        }
        None => Err(format!("job {id} not found").into()),
    }
}
