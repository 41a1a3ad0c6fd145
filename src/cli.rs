//! Command-line interface definitions.
//!
//! Running without a subcommand performs one ingestion run with default
//! settings. The storage location can come from `--database` or the
//! `JOBS_DATABASE` environment variable.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::IngestConfig;
use crate::query::{DEFAULT_PER_PAGE, JobQuery, SortField, SortOrder};

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Ingest with defaults into ./jobs.db
/// jobboard_ingest
///
/// # Ingest the first three pages with a YAML config
/// jobboard_ingest ingest -c ingest.yaml --last-page 3
///
/// # Query what was stored
/// jobboard_ingest search --company acme --tag Pricing --sort-by title --order asc
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// SQLite database file holding ingested jobs
    #[arg(long, env = "JOBS_DATABASE", default_value = "jobs.db", global = true)]
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch listing pages once and store new postings (the default)
    Ingest(IngestArgs),
    /// Filter, sort and page through stored postings
    Search(SearchArgs),
    /// Print one stored posting
    Show {
        /// Job ID
        id: i64,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct IngestArgs {
    /// Optional path to an ingestion config YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Listing page 1 URL
    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub first_page: Option<u32>,

    /// Last page to fetch (inclusive)
    #[arg(long)]
    pub last_page: Option<u32>,

    /// Pause between listing pages, in milliseconds
    #[arg(long)]
    pub page_delay_ms: Option<u64>,

    /// Job type recorded for every posting
    #[arg(long)]
    pub job_type: Option<String>,

    /// Extra attempts for transient fetch failures
    #[arg(long)]
    pub max_retries: Option<usize>,

    /// Detail pages fetched concurrently per listing page
    #[arg(long)]
    pub detail_concurrency: Option<usize>,

    /// Per-request timeout, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

impl IngestArgs {
    /// Overlay flags that were given on top of `config`.
    pub fn apply(&self, config: &mut IngestConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(first_page) = self.first_page {
            config.first_page = first_page;
        }
        if let Some(last_page) = self.last_page {
            config.last_page = last_page;
        }
        if let Some(delay) = self.page_delay_ms {
            config.page_delay_ms = delay;
        }
        if let Some(job_type) = &self.job_type {
            config.job_type = job_type.clone();
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(concurrency) = self.detail_concurrency {
            config.detail_concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout_secs {
            config.request_timeout_secs = timeout;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Title contains
    #[arg(long)]
    pub title: Option<String>,

    /// Company contains
    #[arg(long)]
    pub company: Option<String>,

    /// Location contains
    #[arg(long)]
    pub location: Option<String>,

    /// Exact job type
    #[arg(long)]
    pub job_type: Option<String>,

    /// Tag the posting must carry (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Free text across title, company, location and description
    #[arg(short, long)]
    pub query: Option<String>,

    #[arg(long, value_enum, default_value_t = SortField::PostingDate)]
    pub sort_by: SortField,

    #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
    pub order: SortOrder,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: u32,
}

impl SearchArgs {
    pub fn to_query(&self) -> JobQuery {
        JobQuery {
            title: self.title.clone(),
            company: self.company.clone(),
            location: self.location.clone(),
            job_type: self.job_type.clone(),
            tags: self.tags.clone(),
            text: self.query.clone(),
            sort_by: self.sort_by,
            order: self.order,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
