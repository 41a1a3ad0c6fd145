//! Duplicate detection against persisted postings.
//!
//! A posting is new when no stored record carries its URL and no record staged
//! earlier on the same page does either. The check and the later insert are
//! not atomic, so two ingestion processes must not share a store.

use std::collections::HashSet;

use crate::error::StorageError;
use crate::store::JobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    New,
    /// Already committed by this or an earlier run.
    Stored,
    /// Staged earlier in the current batch.
    Staged,
}

/// Tracks URLs staged for the batch currently being built.
#[derive(Debug, Default)]
pub struct DedupGate {
    staged: HashSet<String>,
}

impl DedupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look `url` up without claiming it.
    pub fn check<S: JobStore>(&self, store: &S, url: &str) -> Result<Verdict, StorageError> {
        if self.is_staged(url) {
            return Ok(Verdict::Staged);
        }
        Ok(match store.find_by_url(url)? {
            Some(_) => Verdict::Stored,
            None => Verdict::New,
        })
    }

    pub fn is_staged(&self, url: &str) -> bool {
        self.staged.contains(url)
    }

    /// Claim `url` for the current batch.
    pub fn stage(&mut self, url: &str) {
        self.staged.insert(url.to_string());
    }

    /// Forget staged URLs once their batch is committed or abandoned.
    pub fn reset(&mut self) {
        self.staged.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewJob;
    use crate::store::SqliteJobStore;
    use chrono::Utc;

    fn job(url: &str) -> NewJob {
        NewJob {
            title: "Pricing Actuary".to_string(),
            company: "Acme Re".to_string(),
            location: "Remote".to_string(),
            job_type: "Full-time".to_string(),
            posting_date: Utc::now().naive_utc(),
            tags: vec![],
            description: "Salary: N/A\n\nN/A".to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_stored_urls_are_not_new() {
        let mut store = SqliteJobStore::open_in_memory().unwrap();
        store.insert_batch(&[job("https://a.test/1")]).unwrap();

        let gate = DedupGate::new();
        assert_eq!(gate.check(&store, "https://a.test/1").unwrap(), Verdict::Stored);
        assert_eq!(gate.check(&store, "https://a.test/2").unwrap(), Verdict::New);
    }

    #[test]
    fn test_staged_urls_are_not_new_until_reset() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let mut gate = DedupGate::new();
        gate.stage("https://a.test/1");
        assert_eq!(gate.check(&store, "https://a.test/1").unwrap(), Verdict::Staged);

        gate.reset();
        assert_eq!(gate.check(&store, "https://a.test/1").unwrap(), Verdict::New);
    }

    #[test]
    fn test_lookup_is_exact() {
        let mut store = SqliteJobStore::open_in_memory().unwrap();
        store.insert_batch(&[job("https://a.test/1")]).unwrap();
        let gate = DedupGate::new();
        assert_eq!(gate.check(&store, "https://a.test/1/").unwrap(), Verdict::New);
        assert_eq!(gate.check(&store, "HTTPS://A.TEST/1").unwrap(), Verdict::New);
    }
}
