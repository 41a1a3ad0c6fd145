//! Data models for job postings at each stage of ingestion.
//!
//! - [`RawCandidate`]: fields pulled straight out of one listing block
//! - [`NewJob`]: a normalized record staged for insertion
//! - [`JobRecord`]: a row as persisted by the [`JobStore`](crate::store::JobStore)

use chrono::NaiveDateTime;
use serde_json::json;

use crate::error::ValidationError;

/// A listing block as extracted from one listing page.
///
/// Nothing here is normalized yet. The detail URL is the only identity a
/// candidate has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub title: String,
    pub company: String,
    /// Country or location label shown on the card.
    pub location: String,
    /// Absolute URL of the posting's detail page.
    pub detail_url: String,
    pub tags: Vec<String>,
    pub salary: Option<String>,
    /// Posting date as printed, e.g. `"2h ago"` or `"January 5, 2024"`.
    pub posted: Option<String>,
}

/// A normalized posting waiting to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub job_type: String,
    pub posting_date: NaiveDateTime,
    pub tags: Vec<String>,
    pub description: String,
    pub url: String,
}

impl NewJob {
    /// Enforce the write-time invariants.
    ///
    /// Title, company, location and job type are trimmed and must not be empty.
    /// The URL must use the `http` or `https` scheme. A failing record is
    /// rejected as a whole.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.title = required("title", &self.title)?;
        self.company = required("company", &self.company)?;
        self.location = required("location", &self.location)?;
        self.job_type = required("job_type", &self.job_type)?;
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ValidationError::UnacceptedScheme { url: self.url });
        }
        Ok(self)
    }

    /// Tags encoded the way they are stored: a JSON array string.
    pub fn tags_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.tags)
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(trimmed.to_string())
    }
}

/// A persisted posting.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub posting_date: NaiveDateTime,
    pub job_type: String,
    /// JSON array string, e.g. `["Life","Pricing"]`.
    pub tags: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl JobRecord {
    /// Decoded tags. A malformed tag string decodes to no tags.
    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }

    /// JSON shape handed to consumers of the query surface.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "title": self.title,
            "company": self.company,
            "location": self.location,
            "posting_date": self.posting_date.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            "job_type": self.job_type,
            "tags": self.tag_list(),
            "description": self.description,
            "url": self.url,
            "created_at": self.created_at.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            "updated_at": self.updated_at.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        })
    }
}
