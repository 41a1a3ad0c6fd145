//! Output generation for run reports.
//!
//! # Submodules
//!
//! - [`json`]: Writes the [`RunSummary`](crate::ingest::RunSummary) of an
//!   ingestion run to a JSON file for monitoring or later inspection

pub mod json;
