//! Read-only query surface over stored postings.
//!
//! Supports substring filters on title, company, location and tags, an exact
//! job type filter, free text across title, company, location and
//! description, sorting, and page-numbered pagination. Matching is
//! case-insensitive for ASCII, as with SQLite's `LIKE`.

use clap::ValueEnum;
use rusqlite::params_from_iter;
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::models::JobRecord;
use crate::store::SqliteJobStore;

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortField {
    #[default]
    #[value(name = "posting_date")]
    PostingDate,
    Title,
    Company,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::PostingDate => "posting_date",
            SortField::Title => "title",
            SortField::Company => "company",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters, ordering and page selection for [`SqliteJobStore::search`].
///
/// Empty strings count as "no filter".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    /// Every tag must appear in the stored tag string.
    pub tags: Vec<String>,
    /// Free text matched against title, company, location or description.
    pub text: Option<String>,
    pub sort_by: SortField,
    pub order: SortOrder,
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            title: None,
            company: None,
            location: None,
            job_type: None,
            tags: Vec::new(),
            text: None,
            sort_by: SortField::default(),
            order: SortOrder::default(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPage {
    pub jobs: Vec<JobRecord>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u32,
}

impl JobPage {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "jobs": self.jobs.iter().map(JobRecord::to_json).collect::<Vec<_>>(),
            "total": self.total,
            "pages": self.pages,
            "current_page": self.current_page,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `%needle%` with LIKE wildcards in the needle escaped.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl JobQuery {
    /// WHERE clause and its positional parameters.
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        let mut like = |column: &str, needle: &str, clauses: &mut Vec<String>| {
            params.push(contains_pattern(needle));
            clauses.push(format!("{column} LIKE ?{} ESCAPE '\\'", params.len()));
        };

        if let Some(title) = non_empty(&self.title) {
            like("title", title, &mut clauses);
        }
        if let Some(company) = non_empty(&self.company) {
            like("company", company, &mut clauses);
        }
        if let Some(location) = non_empty(&self.location) {
            like("location", location, &mut clauses);
        }
        for tag in self.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            like("tags", tag, &mut clauses);
        }
        if let Some(text) = non_empty(&self.text) {
            let mut any = Vec::new();
            for column in ["title", "company", "location", "description"] {
                like(column, text, &mut any);
            }
            clauses.push(format!("({})", any.join(" OR ")));
        }
        if let Some(job_type) = non_empty(&self.job_type) {
            params.push(job_type.to_string());
            clauses.push(format!("job_type = ?{}", params.len()));
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), params)
        }
    }
}

impl SqliteJobStore {
    /// Run a filtered, sorted, paginated search.
    #[instrument(level = "debug", skip(self))]
    pub fn search(&self, query: &JobQuery) -> Result<JobPage, StorageError> {
        let per_page = query.per_page.clamp(1, MAX_PER_PAGE);
        let page = query.page.max(1);
        let (filter, params) = query.where_clause();

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM jobs{filter}"),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;
        let total = u64::try_from(total).unwrap_or_default();

        let sql = format!(
            "SELECT {} FROM jobs{filter} ORDER BY {} {dir}, id {dir} LIMIT {per_page} OFFSET {}",
            Self::columns(),
            query.sort_by.column(),
            u64::from(page - 1) * u64::from(per_page),
            dir = query.order.keyword(),
        );
        debug!(%sql, "Searching jobs");
        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params_from_iter(params.iter()), Self::row_to_job)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(JobPage {
            jobs,
            total,
            pages: total.div_ceil(u64::from(per_page)),
            current_page: page,
        })
    }
}
