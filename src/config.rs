//! Ingestion configuration.
//!
//! Defaults reproduce a plain run against the listings site: pages 1 to 19,
//! two seconds between pages, one attempt per request, one detail fetch at a
//! time. A YAML file may override any subset of fields and CLI flags override
//! the file.

use std::time::Duration;

use scraper::Selector;
use serde::Deserialize;
use tracing::{info, instrument};
use url::Url;

use crate::error::ConfigError;
use crate::scrapers::listings::ListingSelectors;

/// Browser identities sampled per request.
pub const DEFAULT_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 12_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148",
    "Mozilla/5.0 (Linux; Android 11; SM-G960U) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.72 Mobile Safari/537.36",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Listing page 1; page N is this URL with `?page=N`.
    pub base_url: String,
    pub first_page: u32,
    /// Inclusive upper bound. Pagination is never auto-discovered.
    pub last_page: u32,
    pub page_delay_ms: u64,
    /// Job type assigned to every posting; the source does not expose one.
    pub job_type: String,
    pub user_agents: Vec<String>,
    pub request_timeout_secs: u64,
    /// Extra attempts per request after the first. Zero disables retrying.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    /// Upper bound on concurrent detail fetches within one page.
    pub detail_concurrency: usize,
    pub selectors: ListingSelectors,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.actuarylist.com/".to_string(),
            first_page: 1,
            last_page: 19,
            page_delay_ms: 2_000,
            job_type: "Full-time".to_string(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            request_timeout_secs: 30,
            max_retries: 0,
            retry_base_delay_ms: 1_000,
            detail_concurrency: 1,
            selectors: ListingSelectors::default(),
        }
    }
}

impl IngestConfig {
    /// Load from an optional YAML file, falling back to defaults.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(path, "Loaded ingestion config");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Check everything a run depends on before the first request goes out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url()?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http or https, got '{}'",
                self.base_url
            )));
        }
        if self.first_page == 0 {
            return Err(ConfigError::Invalid("first_page starts at 1".to_string()));
        }
        if self.first_page > self.last_page {
            return Err(ConfigError::Invalid(format!(
                "first_page {} is after last_page {}",
                self.first_page, self.last_page
            )));
        }
        if self.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(ConfigError::Invalid("user_agents pool is empty".to_string()));
        }
        if self.detail_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "detail_concurrency must be at least 1".to_string(),
            ));
        }
        if self.job_type.trim().is_empty() {
            return Err(ConfigError::Invalid("job_type cannot be empty".to_string()));
        }
        for (name, css) in self.selectors.entries() {
            Selector::parse(css).map_err(|e| {
                ConfigError::Invalid(format!("selector {name} '{css}' does not parse: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {e}", self.base_url)))
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.first_page..=self.last_page
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
