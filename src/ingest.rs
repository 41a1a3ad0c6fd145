//! Ingestion orchestration.
//!
//! One run walks a fixed page range:
//!
//! ```text
//! for page in first..=last:
//!     fetch page ──fail──▶ log, next page
//!     extract candidates
//!     for candidate: dedup, group by URL
//!     for URL group: detail fetch (once) ─▶ normalize ─▶ validate ─▶ stage
//!     commit staged batch ──fail──▶ log, batch lost
//!     pace
//! ```
//!
//! Every stage hands back an explicit outcome; nothing below the run itself
//! aborts it. A later run resumes naturally because already stored URLs are
//! skipped by the dedup check.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::IngestConfig;
use crate::dedup::{DedupGate, Verdict};
use crate::error::{ConfigError, FetchError, StorageError, ValidationError};
use crate::fetch::PageFetcher;
use crate::models::{NewJob, RawCandidate};
use crate::normalize::normalize_candidate;
use crate::scrapers::listings::{CompiledSelectors, extract_listings, fetch_description};
use crate::store::JobStore;
use crate::utils::{page_url, truncate_for_log};

/// What happened to one listing candidate.
#[derive(Debug)]
pub enum CandidateOutcome {
    Staged,
    Duplicate,
    Rejected(ValidationError),
    Failed(String),
}

/// What happened to one listing page.
#[derive(Debug)]
pub enum PageOutcome {
    Committed { committed: usize },
    FetchFailed(FetchError),
    CommitFailed { staged: usize, error: StorageError },
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RunSummary {
    pub pages_attempted: usize,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub failed_pages: Vec<u32>,
    pub candidates_seen: usize,
    pub dropped_incomplete: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub failed: usize,
    pub staged: usize,
    pub committed: usize,
    pub commit_failures: usize,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
}

impl RunSummary {
    fn record_candidate(&mut self, outcome: &CandidateOutcome) {
        match outcome {
            CandidateOutcome::Staged => self.staged += 1,
            CandidateOutcome::Duplicate => self.duplicates += 1,
            CandidateOutcome::Rejected(_) => self.rejected += 1,
            CandidateOutcome::Failed(_) => self.failed += 1,
        }
    }

    fn record_page(&mut self, page: u32, outcome: &PageOutcome) {
        self.pages_attempted += 1;
        match outcome {
            PageOutcome::Committed { committed } => {
                self.pages_fetched += 1;
                self.committed += committed;
            }
            PageOutcome::FetchFailed(_) => {
                self.pages_failed += 1;
                self.failed_pages.push(page);
            }
            PageOutcome::CommitFailed { .. } => {
                self.pages_fetched += 1;
                self.commit_failures += 1;
            }
        }
    }
}

/// Drives pagination and sequences fetch, extraction, dedup and commit.
///
/// The store handle is owned for the duration of the run and handed back by
/// [`Ingestor::into_store`].
pub struct Ingestor<F, S> {
    fetcher: F,
    store: S,
    gate: DedupGate,
    selectors: CompiledSelectors,
    base_url: Url,
    pages: RangeInclusive<u32>,
    page_delay: Duration,
    job_type: String,
    detail_concurrency: usize,
}

impl<F: PageFetcher, S: JobStore> Ingestor<F, S> {
    pub fn new(config: &IngestConfig, fetcher: F, store: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fetcher,
            store,
            gate: DedupGate::new(),
            selectors: config.selectors.compile()?,
            base_url: config.base_url()?,
            pages: config.pages(),
            page_delay: config.page_delay(),
            job_type: config.job_type.trim().to_string(),
            detail_concurrency: config.detail_concurrency.max(1),
        })
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Ingest every page in the configured range once.
    #[instrument(level = "info", skip_all, fields(base_url = %self.base_url))]
    pub async fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary {
            started_at: Some(Utc::now().naive_utc()),
            ..RunSummary::default()
        };
        let last = *self.pages.end();
        info!(first = *self.pages.start(), last, "Ingestion run starting");

        for page in self.pages.clone() {
            let outcome = self.ingest_page(page, &mut summary).await;
            match &outcome {
                PageOutcome::Committed { committed } => {
                    info!(page, committed, "Processed page");
                }
                PageOutcome::FetchFailed(e) => {
                    warn!(page, error = %e, "Failed to fetch page; skipping");
                }
                PageOutcome::CommitFailed { staged, error } => {
                    error!(page, staged, error = %error, "Failed to commit page batch; batch lost");
                }
            }
            summary.record_page(page, &outcome);

            if page < last && !self.page_delay.is_zero() {
                debug!(delay = ?self.page_delay, "Pacing before next page");
                sleep(self.page_delay).await;
            }
        }

        summary.finished_at = Some(Utc::now().naive_utc());
        info!(
            pages = summary.pages_attempted,
            pages_failed = summary.pages_failed,
            candidates = summary.candidates_seen,
            committed = summary.committed,
            duplicates = summary.duplicates,
            rejected = summary.rejected,
            failed = summary.failed,
            commit_failures = summary.commit_failures,
            "Ingestion run complete"
        );
        summary
    }

    #[instrument(level = "info", skip(self, summary))]
    async fn ingest_page(&mut self, page: u32, summary: &mut RunSummary) -> PageOutcome {
        let url = page_url(&self.base_url, page);
        let html = match self.fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) => return PageOutcome::FetchFailed(e),
        };

        let extracted = extract_listings(&html, &url, &self.selectors);
        summary.candidates_seen += extracted.candidates.len();
        summary.dropped_incomplete += extracted.dropped;

        // Cards sharing a URL are grouped so the detail page is fetched once.
        let mut groups: Vec<Vec<RawCandidate>> = Vec::new();
        let mut group_of: HashMap<String, usize> = HashMap::new();
        for candidate in extracted.candidates {
            if let Some(&index) = group_of.get(&candidate.detail_url) {
                groups[index].push(candidate);
                continue;
            }
            let outcome = match self.gate.check(&self.store, &candidate.detail_url) {
                Ok(Verdict::New) => {
                    group_of.insert(candidate.detail_url.clone(), groups.len());
                    groups.push(vec![candidate]);
                    continue;
                }
                Ok(_) => CandidateOutcome::Duplicate,
                Err(e) => CandidateOutcome::Failed(format!("dedup lookup failed: {e}")),
            };
            log_outcome(&candidate, &outcome);
            summary.record_candidate(&outcome);
        }

        let described = self.describe_all(groups).await;

        let mut batch = Vec::new();
        for (group, description) in described {
            for candidate in group {
                let outcome = self.stage(&candidate, &description, &mut batch);
                log_outcome(&candidate, &outcome);
                summary.record_candidate(&outcome);
            }
        }

        let outcome = self.commit(batch);
        self.gate.reset();
        outcome
    }

    /// Fetch one detail description per URL group, at most
    /// `detail_concurrency` at a time, keeping group order.
    async fn describe_all(
        &self,
        groups: Vec<Vec<RawCandidate>>,
    ) -> Vec<(Vec<RawCandidate>, String)> {
        let fetcher = &self.fetcher;
        let selectors = &self.selectors;
        stream::iter(groups)
            .map(|group| async move {
                let description = match group.first() {
                    Some(first) => fetch_description(fetcher, &first.detail_url, selectors).await,
                    None => String::new(),
                };
                (group, description)
            })
            .buffered(self.detail_concurrency)
            .collect()
            .await
    }

    fn stage(
        &mut self,
        candidate: &RawCandidate,
        description: &str,
        batch: &mut Vec<NewJob>,
    ) -> CandidateOutcome {
        if self.gate.is_staged(&candidate.detail_url) {
            return CandidateOutcome::Duplicate;
        }
        let now = Utc::now().naive_utc();
        let job = normalize_candidate(candidate, description, &self.job_type, now);
        match job.validate() {
            Ok(job) => {
                self.gate.stage(&job.url);
                batch.push(job);
                CandidateOutcome::Staged
            }
            Err(e) => CandidateOutcome::Rejected(e),
        }
    }

    fn commit(&mut self, batch: Vec<NewJob>) -> PageOutcome {
        if batch.is_empty() {
            return PageOutcome::Committed { committed: 0 };
        }
        match self.store.insert_batch(&batch) {
            Ok(committed) => PageOutcome::Committed { committed },
            Err(error) => PageOutcome::CommitFailed {
                staged: batch.len(),
                error,
            },
        }
    }
}

fn log_outcome(candidate: &RawCandidate, outcome: &CandidateOutcome) {
    let url = truncate_for_log(&candidate.detail_url, 200);
    match outcome {
        CandidateOutcome::Staged => debug!(%url, "Staged candidate"),
        CandidateOutcome::Duplicate => debug!(%url, "Already ingested; skipping"),
        CandidateOutcome::Rejected(e) => warn!(
            %url,
            title = %truncate_for_log(&candidate.title, 80),
            error = %e,
            "Rejected candidate"
        ),
        CandidateOutcome::Failed(reason) => warn!(%url, reason, "Skipping candidate"),
    }
}
