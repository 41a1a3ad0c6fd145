//! Error types for each failure class of an ingestion run.
//!
//! Only [`ConfigError`] and errors raised while opening the store abort a run.
//! Everything else is caught at page or candidate granularity and folded into
//! the [`RunSummary`](crate::ingest::RunSummary).

use std::io;

use thiserror::Error;

/// A page or detail fetch that did not yield a usable body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A record that breaks a write-time invariant. The record is rejected, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },
    #[error("URL must start with http:// or https://, got '{url}'")]
    UnacceptedScheme { url: String },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode tags: {0}")]
    Tags(#[from] serde_json::Error),
    #[error("constraint violation: {0}")]
    Constraint(#[from] ValidationError),
    #[error("failed to prepare storage location: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
