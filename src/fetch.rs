//! Record fetcher: one paginated-free GET against the Remotive public API.
//! The endpoint returns the full result set in a single page, so "pagination"
//! is just a client-side truncation to the requested limit. No retries; a
//! failed fetch aborts the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use scraper::Html;
use serde::Deserialize;
use thiserror::Error;

use crate::models::RawJobRecord;

const REMOTIVE_API_URL: &str = "https://remotive.io/api/remote-jobs";
const USER_AGENT: &str = concat!("jobmart/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("job API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("job API returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("failed to write raw records to {path}: {source}")]
    Audit {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode raw records: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Top-level shape of the API response. Anything else is malformed and
/// surfaces as a FetchError from the JSON decode.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    jobs: Vec<ApiJob>,
}

/// One posting as the API sends it. Every field is optional; the HTML
/// description and the tag list get flattened before anything downstream
/// sees them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiJob {
    id: Option<serde_json::Value>,
    url: Option<String>,
    title: Option<String>,
    company_name: Option<String>,
    category: Option<String>,
    job_type: Option<String>,
    publication_date: Option<String>,
    candidate_required_location: Option<String>,
    salary: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
}

/// Fetch postings matching `search`/`category`, truncated to `limit`.
pub fn fetch_jobs(
    search: Option<&str>,
    category: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<RawJobRecord>, FetchError> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let mut request = client.get(REMOTIVE_API_URL);
    if let Some(s) = search {
        request = request.query(&[("search", s)]);
    }
    if let Some(c) = category {
        request = request.query(&[("category", c)]);
    }

    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Server {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        });
    }

    let parsed: ApiResponse = response.json()?;
    let mut jobs = parsed.jobs;
    if let Some(n) = limit {
        jobs.truncate(n);
    }

    Ok(jobs.into_iter().map(flatten_job).collect())
}

/// Write the raw sequence to a durable audit file before normalization
/// touches it.
pub fn write_raw_json(records: &[RawJobRecord], path: &Path) -> Result<(), FetchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| FetchError::Audit {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).map_err(|source| FetchError::Audit {
        path: path.to_path_buf(),
        source,
    })
}

fn flatten_job(job: ApiJob) -> RawJobRecord {
    RawJobRecord {
        id: job.id,
        url: job.url,
        title: job.title,
        company_name: job.company_name,
        category: job.category,
        job_type: job.job_type,
        publication_date: job.publication_date,
        candidate_required_location: job.candidate_required_location,
        salary: job.salary,
        description_text: html_to_text(job.description.as_deref().unwrap_or("")),
        tags: job.tags.map(|t| t.join(", ")).unwrap_or_default(),
    }
}

/// Convert an HTML snippet to plain text, one line per text node.
fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn html_descriptions_become_plain_text() {
        let text = html_to_text("<p>We use <b>Python</b> daily.</p><p>And SQL.</p>");
        assert_eq!(text, "We use\nPython\ndaily.\nAnd SQL.");
        assert_eq!(html_to_text("   "), "");
    }

    #[test]
    fn api_jobs_flatten_into_raw_records() {
        let job: ApiJob = serde_json::from_value(json!({
            "id": 1923570,
            "url": "https://remotive.io/job/1923570",
            "title": "Data Engineer",
            "company_name": "Acme",
            "description": "<p>Build pipelines</p>",
            "tags": ["python", "aws"],
            "unexpected_field": true
        }))
        .unwrap();

        let raw = flatten_job(job);
        assert_eq!(raw.id, Some(json!(1923570)));
        assert_eq!(raw.title.as_deref(), Some("Data Engineer"));
        assert_eq!(raw.description_text, "Build pipelines");
        assert_eq!(raw.tags, "python, aws");
        assert_eq!(raw.salary, None);
    }

    #[test]
    fn missing_jobs_key_is_an_empty_batch() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"job-count": 0}"#).unwrap();
        assert!(parsed.jobs.is_empty());
    }
}
