use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One job posting as fetched from the source API, flattened for the raw
/// audit file. Any field may be absent or malformed; the normalizer deals
/// with that.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJobRecord {
    /// Source-assigned id. The API sends numbers; keep whatever JSON scalar
    /// arrived so the normalizer can decide what counts as usable.
    pub id: Option<serde_json::Value>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub category: Option<String>,
    pub job_type: Option<String>,
    pub publication_date: Option<String>,
    pub candidate_required_location: Option<String>,
    pub salary: Option<String>,
    /// Description with HTML already stripped by the fetch stage.
    pub description_text: String,
    /// Comma-joined source tags.
    pub tags: String,
}

/// Cleaned, schema-conformant representation of a job posting. Produced
/// only by the normalizer; persisted as-is by the store. `created_at` is
/// deliberately absent here - the store sets it on first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalJobRecord {
    pub id: String,
    pub url: Option<String>,
    pub title: String,
    pub normalized_title: String,
    pub company_name: String,
    pub category: String,
    pub job_type: String, // "full_time", "contract", ... or "unknown"
    pub publication_date: Option<NaiveDateTime>,
    pub location: String,
    pub remote: bool,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub description: String,
    pub tags: String,
    pub skills: String,
    pub seniority: String, // "junior", "mid", "senior" or "unknown"
}

/// Counters reported at the end of a normalization batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Records read from the fetcher.
    pub processed: usize,
    /// Records rejected for having no usable id.
    pub dropped: usize,
    /// Records whose id was already seen in this batch (first one wins).
    pub duplicates: usize,
    /// Records that made it into the output sequence.
    pub output: usize,
    pub null_publication_date: usize,
    pub null_salary_min: usize,
    pub null_salary_max: usize,
    pub null_salary_currency: usize,
}

impl BatchSummary {
    /// Null rate of a field as a percentage of the output records.
    pub fn null_rate(&self, nulls: usize) -> f64 {
        if self.output == 0 {
            0.0
        } else {
            100.0 * nulls as f64 / self.output as f64
        }
    }
}
