//! SQLite persistence: one `jobs` table keyed by the source-derived id,
//! upserted one transaction per pipeline run, plus the read-only aggregate
//! queries the report is built from.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use thiserror::Error;

use crate::models::CanonicalJobRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database not initialized - run 'jobmart init' first")]
    NotInitialized,
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

/// Row count, average min and average max for USD postings with a salary.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryStats {
    pub n: i64,
    pub avg_min: Option<f64>,
    pub avg_max: Option<f64>,
}

/// Headline numbers for the report.
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub total_jobs: i64,
    pub companies: i64,
    /// Fraction of postings flagged remote, 0.0 on an empty table.
    pub remote_share: f64,
}

/// Columns shown in the "recent postings" section of the report.
#[derive(Debug, Clone)]
pub struct RecentJob {
    pub publication_date: Option<String>,
    pub title: String,
    pub company_name: String,
    pub location: String,
    pub skills: String,
}

impl Database {
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&Self::default_path())
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::new(),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> PathBuf {
        // XDG data directory, falling back to the working directory
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobmart") {
            proj_dirs.data_dir().join("jobs.db")
        } else {
            PathBuf::from("jobs.db")
        }
    }

    pub fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                url TEXT,
                title TEXT NOT NULL,
                normalized_title TEXT NOT NULL,
                company_name TEXT NOT NULL,
                category TEXT NOT NULL,
                job_type TEXT NOT NULL,
                publication_date TEXT,
                location TEXT NOT NULL,
                remote INTEGER NOT NULL,
                salary_min REAL,
                salary_max REAL,
                salary_currency TEXT,
                description TEXT NOT NULL,
                tags TEXT NOT NULL,
                skills TEXT NOT NULL,
                seniority TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_publication_date ON jobs(publication_date);
            CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company_name);
            CREATE INDEX IF NOT EXISTS idx_jobs_location ON jobs(location);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<(), StoreError> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    /// Upsert a batch of canonical records in a single transaction.
    ///
    /// Last write wins for every column except `created_at`, which keeps
    /// the value from the first insert. A failure rolls the whole batch
    /// back; previously committed rows are untouched.
    pub fn upsert_jobs(
        &mut self,
        records: &[CanonicalJobRecord],
    ) -> Result<(usize, usize), StoreError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        let mut updated = 0;
        {
            let mut exists_stmt = tx.prepare("SELECT 1 FROM jobs WHERE id = ?1")?;
            let mut upsert_stmt = tx.prepare(
                r#"
                INSERT INTO jobs (
                    id, url, title, normalized_title, company_name, category,
                    job_type, publication_date, location, remote, salary_min,
                    salary_max, salary_currency, description, tags, skills, seniority
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                ON CONFLICT(id) DO UPDATE SET
                    url = excluded.url,
                    title = excluded.title,
                    normalized_title = excluded.normalized_title,
                    company_name = excluded.company_name,
                    category = excluded.category,
                    job_type = excluded.job_type,
                    publication_date = excluded.publication_date,
                    location = excluded.location,
                    remote = excluded.remote,
                    salary_min = excluded.salary_min,
                    salary_max = excluded.salary_max,
                    salary_currency = excluded.salary_currency,
                    description = excluded.description,
                    tags = excluded.tags,
                    skills = excluded.skills,
                    seniority = excluded.seniority
                "#,
            )?;

            for record in records {
                let exists = exists_stmt.exists(params![record.id])?;
                upsert_stmt.execute(params![
                    record.id,
                    record.url,
                    record.title,
                    record.normalized_title,
                    record.company_name,
                    record.category,
                    record.job_type,
                    record
                        .publication_date
                        .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string()),
                    record.location,
                    record.remote,
                    record.salary_min,
                    record.salary_max,
                    record.salary_currency,
                    record.description,
                    record.tags,
                    record.skills,
                    record.seniority,
                ])?;
                if exists {
                    updated += 1;
                } else {
                    inserted += 1;
                }
            }
        }
        tx.commit()?;
        Ok((inserted, updated))
    }

    // --- Aggregate queries (read-only) ---

    /// Job counts per category, most frequent first.
    pub fn jobs_by_category(&self) -> Result<Vec<(String, i64)>, StoreError> {
        self.grouped_counts(
            "SELECT category, COUNT(*) AS n FROM jobs
             GROUP BY category ORDER BY n DESC, category ASC",
        )
    }

    /// Top companies by posting count.
    pub fn top_companies(&self, limit: usize) -> Result<Vec<(String, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT company_name, COUNT(*) AS n FROM jobs
             GROUP BY company_name ORDER BY n DESC, company_name ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Frequency of the raw, comma-joined skills string. Deliberately naive:
    /// the string is grouped as-is, not split into individual skills.
    pub fn skill_frequency(&self, limit: usize) -> Result<Vec<(String, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT skills, COUNT(*) AS n FROM jobs
             GROUP BY skills ORDER BY n DESC, skills ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Salary statistics over USD postings that actually carry a salary.
    pub fn usd_salary_stats(&self) -> Result<SalaryStats, StoreError> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*), AVG(salary_min), AVG(salary_max) FROM jobs
             WHERE salary_currency = 'USD' AND salary_min IS NOT NULL",
            [],
            |row| {
                Ok(SalaryStats {
                    n: row.get(0)?,
                    avg_min: row.get(1)?,
                    avg_max: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Posting counts grouped by the remote flag, remote first.
    pub fn remote_counts(&self) -> Result<Vec<(bool, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT remote, COUNT(*) AS n FROM jobs GROUP BY remote ORDER BY remote DESC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn kpis(&self) -> Result<Kpis, StoreError> {
        let kpis = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT company_name), AVG(remote) FROM jobs",
            [],
            |row| {
                Ok(Kpis {
                    total_jobs: row.get(0)?,
                    companies: row.get(1)?,
                    remote_share: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                })
            },
        )?;
        Ok(kpis)
    }

    /// Newest postings by publication date.
    pub fn recent_jobs(&self, limit: usize) -> Result<Vec<RecentJob>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT publication_date, title, company_name, location, skills
             FROM jobs ORDER BY publication_date DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(RecentJob {
                publication_date: row.get(0)?,
                title: row.get(1)?,
                company_name: row.get(2)?,
                location: row.get(3)?,
                skills: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn grouped_counts(&self, sql: &str) -> Result<Vec<(String, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
