//! Durable job storage.
//!
//! The pipeline only needs [`JobStore`]: look a posting up by its URL and
//! insert a batch. [`SqliteJobStore`] implements it on SQLite and also backs
//! the read-only query surface in [`crate::query`].
//!
//! URLs are not unique at the schema level. Uniqueness comes from the dedup
//! check that runs before every insert, which assumes a single writer.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::{debug, info, instrument};

use crate::error::StorageError;
use crate::models::{JobRecord, NewJob};
use crate::utils::ensure_parent_dir;

/// Storage operations the ingestion pipeline depends on.
pub trait JobStore {
    /// Exact-match lookup on the posting URL.
    fn find_by_url(&self, url: &str) -> Result<Option<JobRecord>, StorageError>;

    /// Insert every job or none of them. Returns the number committed.
    fn insert_batch(&mut self, jobs: &[NewJob]) -> Result<usize, StorageError>;
}

const JOB_COLUMNS: &str = "id, title, company, location, posting_date, job_type, tags, \
                           description, url, created_at, updated_at";

pub struct SqliteJobStore {
    pub(crate) conn: Connection,
}

impl SqliteJobStore {
    /// Open (creating if needed) the database file and its schema.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        info!("Job store ready");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL,
                posting_date TEXT NOT NULL,
                job_type TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                description TEXT,
                url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_job_search ON jobs(title, company, location);
            CREATE INDEX IF NOT EXISTS idx_job_type_date ON jobs(job_type, posting_date);
            CREATE INDEX IF NOT EXISTS idx_job_url ON jobs(url);

            CREATE TRIGGER IF NOT EXISTS jobs_touch_updated_at
            AFTER UPDATE ON jobs
            FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
            BEGIN
                UPDATE jobs SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                WHERE id = NEW.id;
            END;
            "#,
        )?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Option<JobRecord>, StorageError> {
        let result = self.conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            [id],
            Self::row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count(&self) -> Result<i64, StorageError> {
        let total = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(total)
    }

    pub(crate) fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
        Ok(JobRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            location: row.get(3)?,
            posting_date: row.get(4)?,
            job_type: row.get(5)?,
            tags: row.get(6)?,
            description: row.get(7)?,
            url: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub(crate) fn columns() -> &'static str {
        JOB_COLUMNS
    }
}

impl JobStore for SqliteJobStore {
    fn find_by_url(&self, url: &str) -> Result<Option<JobRecord>, StorageError> {
        let result = self.conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE url = ?1 ORDER BY id LIMIT 1"),
            [url],
            Self::row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(level = "debug", skip_all, fields(batch = jobs.len()))]
    fn insert_batch(&mut self, jobs: &[NewJob]) -> Result<usize, StorageError> {
        let now = Utc::now().naive_utc();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO jobs (title, company, location, posting_date, job_type, tags,
                                   description, url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for job in jobs {
                let job = job.clone().validate()?;
                stmt.execute(params![
                    job.title,
                    job.company,
                    job.location,
                    job.posting_date,
                    job.job_type,
                    job.tags_json()?,
                    job.description,
                    job.url,
                    now,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        debug!(committed = jobs.len(), "Committed batch");
        Ok(jobs.len())
    }
}
