//! The transform stage: maps raw API records into canonical records with
//! deterministic cleaning rules. Everything in here is pure - no I/O, no
//! clocks, no randomness - so the same input always yields the same output.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::models::{BatchSummary, CanonicalJobRecord, RawJobRecord};

#[derive(Debug, Error, PartialEq)]
pub enum NormalizationError {
    /// A record with no stable identifier cannot be deduplicated or
    /// upserted, so it is rejected rather than given a synthetic id.
    #[error("record has no usable source id")]
    MissingId,
}

/// Controlled vocabulary for skill extraction. Matching is naive substring
/// (word-boundary) search, so it both over-matches and under-matches; that
/// is accepted for this version rather than papered over with NLP.
pub const SKILL_VOCAB: &[&str] = &[
    "python",
    "sql",
    "aws",
    "docker",
    "kubernetes",
    "pandas",
    "spark",
    "tensorflow",
    "pytorch",
    "scikit-learn",
    "excel",
    "tableau",
    "powerbi",
    "java",
    "scala",
    "r",
    "javascript",
    "react",
];

/// Seniority keywords in priority order; the first keyword found in the
/// title decides the level. Fixed ordering keeps tie-breaks reproducible.
const SENIORITY_KEYWORDS: &[(&str, &str)] = &[
    ("senior", "senior"),
    ("sr.", "senior"),
    ("lead", "senior"),
    ("principal", "senior"),
    ("staff", "senior"),
    ("junior", "junior"),
    ("jr.", "junior"),
    ("intern", "junior"),
    ("entry", "junior"),
    ("mid-level", "mid"),
    ("mid level", "mid"),
    ("intermediate", "mid"),
];

const JOB_TYPES: &[&str] = &[
    "full_time",
    "part_time",
    "contract",
    "freelance",
    "internship",
    "other",
];

/// Currency tokens recognized inside free-text salary strings.
const CURRENCY_CODES: &[&str] = &[
    "usd", "eur", "gbp", "cad", "aud", "inr", "chf", "sek", "pln", "brl", "jpy",
];

const REMOTE_INDICATORS: &[&str] = &["remote", "anywhere", "worldwide", "work from home"];

static SKILL_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    SKILL_VOCAB
        .iter()
        .map(|skill| {
            let pattern = format!(r"\b{}\b", regex::escape(skill));
            (*skill, Regex::new(&pattern).unwrap())
        })
        .collect()
});

static SALARY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)(k)?").unwrap());

static CURRENCY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b({})\b", CURRENCY_CODES.join("|"))).unwrap());

static REMOTE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bremote\b").unwrap());

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").unwrap());

/// Convert one raw record into its canonical form.
///
/// Only a missing/empty source id is an error; every other malformed field
/// degrades to a null or default value so a single bad field never sinks
/// the whole record.
pub fn normalize_record(raw: &RawJobRecord) -> Result<CanonicalJobRecord, NormalizationError> {
    let id = derive_id(raw)?;

    let title = clean_text(raw.title.as_deref().unwrap_or(""));
    let description = clean_text(&raw.description_text);
    let company_name = clean_text(raw.company_name.as_deref().unwrap_or(""));
    let location = standardize_location(raw.candidate_required_location.as_deref().unwrap_or(""));

    let title_lower = title.to_lowercase();
    let description_lower = description.to_lowercase();

    // Heuristic, not ground truth: a posting is flagged remote when the
    // location carries a remote indicator or the title/description contains
    // the word "remote" (as a token, so "remotely" does not count).
    let location_lower = raw
        .candidate_required_location
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
    let remote = REMOTE_INDICATORS
        .iter()
        .any(|tok| location_lower.contains(tok))
        || REMOTE_TOKEN.is_match(&title_lower)
        || REMOTE_TOKEN.is_match(&description_lower);

    let salary = parse_salary(raw.salary.as_deref().unwrap_or(""));

    let skill_haystack = format!(
        "{}\n{}\n{}",
        title_lower,
        description_lower,
        raw.tags.to_lowercase()
    );

    Ok(CanonicalJobRecord {
        id,
        url: raw
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from),
        normalized_title: normalize_title(&title),
        title,
        company_name,
        category: raw
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("uncategorized")
            .to_string(),
        job_type: normalize_job_type(raw.job_type.as_deref().unwrap_or("")),
        publication_date: raw
            .publication_date
            .as_deref()
            .and_then(parse_publication_date),
        location,
        remote,
        salary_min: salary.min,
        salary_max: salary.max,
        salary_currency: salary.currency,
        description,
        tags: raw.tags.clone(),
        skills: extract_skills(&skill_haystack).join(", "),
        seniority: infer_seniority(&title_lower).to_string(),
    })
}

/// Run the normalizer over a whole batch: records without an id are dropped
/// and counted, duplicate ids keep the first occurrence, and per-field null
/// counts are accumulated for the end-of-run summary.
pub fn normalize_batch(records: &[RawJobRecord]) -> (Vec<CanonicalJobRecord>, BatchSummary) {
    let mut out = Vec::with_capacity(records.len());
    let mut summary = BatchSummary::default();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for raw in records {
        summary.processed += 1;
        let record = match normalize_record(raw) {
            Ok(r) => r,
            Err(NormalizationError::MissingId) => {
                summary.dropped += 1;
                continue;
            }
        };

        if !seen_ids.insert(record.id.clone()) {
            summary.duplicates += 1;
            continue;
        }

        if record.publication_date.is_none() {
            summary.null_publication_date += 1;
        }
        if record.salary_min.is_none() {
            summary.null_salary_min += 1;
        }
        if record.salary_max.is_none() {
            summary.null_salary_max += 1;
        }
        if record.salary_currency.is_none() {
            summary.null_salary_currency += 1;
        }

        summary.output += 1;
        out.push(record);
    }

    (out, summary)
}

fn derive_id(raw: &RawJobRecord) -> Result<String, NormalizationError> {
    match &raw.id {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(NormalizationError::MissingId),
    }
}

/// Basic text cleanup: normalize line endings, collapse blank-line runs,
/// trim the ends.
fn clean_text(s: &str) -> String {
    let unified = s.replace("\r\n", "\n");
    NEWLINE_RUN.replace_all(&unified, "\n").trim().to_string()
}

/// Lower-case and collapse all whitespace runs to single spaces.
fn normalize_title(title: &str) -> String {
    WHITESPACE_RUN
        .replace_all(&title.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Collapse remote-ish locations to the literal "Remote"; title-case the
/// rest so "new york, ny" and "New York, NY" land on the same value.
fn standardize_location(loc: &str) -> String {
    let lower = WHITESPACE_RUN
        .replace_all(loc.trim(), " ")
        .to_lowercase();
    if lower.is_empty() {
        return String::new();
    }
    if REMOTE_INDICATORS.iter().any(|tok| lower.contains(tok)) {
        return "Remote".to_string();
    }
    title_case(&lower)
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

struct SalaryBounds {
    min: Option<f64>,
    max: Option<f64>,
    currency: Option<String>,
}

/// Best-effort parse of free-text salary strings like "$80k - $120k" or
/// "120000-150000 USD". One number means min == max; with several numbers
/// the smallest and largest win, which also repairs reversed ranges.
fn parse_salary(s: &str) -> SalaryBounds {
    let cleaned = s.replace(',', "").to_lowercase();
    if cleaned.trim().is_empty() {
        return SalaryBounds {
            min: None,
            max: None,
            currency: None,
        };
    }

    let currency = detect_currency(&cleaned);

    let mut values: Vec<f64> = Vec::new();
    for cap in SALARY_NUMBER.captures_iter(&cleaned) {
        if let Ok(mut v) = cap[1].parse::<f64>() {
            if cap.get(2).is_some() {
                v *= 1000.0;
            }
            values.push(v);
        }
    }

    let (min, max) = match values.as_slice() {
        [] => (None, None),
        [only] => (Some(*only), Some(*only)),
        many => {
            let mut lo = many[0];
            let mut hi = many[0];
            for &v in many {
                if v < lo {
                    lo = v;
                }
                if v > hi {
                    hi = v;
                }
            }
            (Some(lo), Some(hi))
        }
    };

    SalaryBounds { min, max, currency }
}

fn detect_currency(lower: &str) -> Option<String> {
    if lower.contains('$') || lower.contains("usd") {
        return Some("USD".to_string());
    }
    if lower.contains('€') || lower.contains("eur") {
        return Some("EUR".to_string());
    }
    if lower.contains('£') || lower.contains("gbp") {
        return Some("GBP".to_string());
    }
    CURRENCY_TOKEN
        .find(lower)
        .map(|m| m.as_str().to_uppercase())
}

/// Try a small fixed set of date formats; the first one that parses wins.
fn parse_publication_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Match the controlled vocabulary against the lower-cased haystack and
/// return the hits ordered by first occurrence, deduplicated.
fn extract_skills(haystack: &str) -> Vec<&'static str> {
    let mut hits: Vec<(usize, &'static str)> = SKILL_PATTERNS
        .iter()
        .filter_map(|(skill, re)| re.find(haystack).map(|m| (m.start(), *skill)))
        .collect();
    hits.sort_by_key(|(pos, _)| *pos);
    hits.into_iter().map(|(_, skill)| skill).collect()
}

fn infer_seniority(title_lower: &str) -> &'static str {
    for (keyword, level) in SENIORITY_KEYWORDS {
        if title_lower.contains(keyword) {
            return level;
        }
    }
    "unknown"
}

/// Fold source job-type spellings ("Full-time", "full time") into the
/// enumerated set, or "unknown" for anything outside it.
fn normalize_job_type(raw: &str) -> String {
    let folded = raw.trim().to_lowercase().replace(['-', ' '], "_");
    if JOB_TYPES.contains(&folded.as_str()) {
        folded
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RawJobRecord {
        RawJobRecord {
            id: Some(json!("r1")),
            title: Some("Senior Python Developer".to_string()),
            candidate_required_location: Some("Remote - US".to_string()),
            salary: Some("120000-150000 USD".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_the_reference_record() {
        let record = normalize_record(&sample()).unwrap();
        assert_eq!(record.id, "r1");
        assert_eq!(record.normalized_title, "senior python developer");
        assert!(record.remote);
        assert_eq!(record.seniority, "senior");
        assert_eq!(record.salary_min, Some(120000.0));
        assert_eq!(record.salary_max, Some(150000.0));
        assert_eq!(record.salary_currency.as_deref(), Some("USD"));
        assert!(record.skills.contains("python"));
        assert_eq!(record.location, "Remote");
    }

    #[test]
    fn is_deterministic() {
        let raw = sample();
        assert_eq!(
            normalize_record(&raw).unwrap(),
            normalize_record(&raw).unwrap()
        );
    }

    #[test]
    fn numeric_ids_become_strings() {
        let raw = RawJobRecord {
            id: Some(json!(1923570)),
            ..Default::default()
        };
        assert_eq!(normalize_record(&raw).unwrap().id, "1923570");
    }

    #[test]
    fn missing_id_is_rejected() {
        let no_id = RawJobRecord::default();
        assert_eq!(normalize_record(&no_id), Err(NormalizationError::MissingId));

        let blank_id = RawJobRecord {
            id: Some(json!("   ")),
            ..Default::default()
        };
        assert_eq!(
            normalize_record(&blank_id),
            Err(NormalizationError::MissingId)
        );
    }

    #[test]
    fn batch_drops_and_counts_idless_records() {
        let records = vec![RawJobRecord::default(), sample()];
        let (out, summary) = normalize_batch(&records);
        assert_eq!(out.len(), 1);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.output, 1);
    }

    #[test]
    fn batch_keeps_first_of_duplicate_ids() {
        let mut second = sample();
        second.title = Some("Another Title".to_string());
        let (out, summary) = normalize_batch(&[sample(), second]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Senior Python Developer");
        assert_eq!(summary.duplicates, 1);
    }

    #[test]
    fn reversed_salary_range_is_repaired() {
        let raw = RawJobRecord {
            id: Some(json!("x")),
            salary: Some("$150k - $120k".to_string()),
            ..Default::default()
        };
        let record = normalize_record(&raw).unwrap();
        assert_eq!(record.salary_min, Some(120000.0));
        assert_eq!(record.salary_max, Some(150000.0));
    }

    #[test]
    fn single_salary_value_fills_both_bounds() {
        let bounds = parse_salary("$95k");
        assert_eq!(bounds.min, Some(95000.0));
        assert_eq!(bounds.max, Some(95000.0));
        assert_eq!(bounds.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn unparseable_salary_degrades_to_null() {
        let bounds = parse_salary("competitive");
        assert_eq!(bounds.min, None);
        assert_eq!(bounds.max, None);
        assert_eq!(bounds.currency, None);
    }

    #[test]
    fn currency_codes_pass_through() {
        assert_eq!(parse_salary("80000 cad").currency.as_deref(), Some("CAD"));
        assert_eq!(parse_salary("€60k-70k").currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn date_formats_fall_through_in_order() {
        assert_eq!(
            parse_publication_date("2026-01-01T12:00:00+02:00"),
            NaiveDate::from_ymd_opt(2026, 1, 1).and_then(|d| d.and_hms_opt(10, 0, 0))
        );
        assert_eq!(
            parse_publication_date("2026-01-08T09:30:00"),
            NaiveDate::from_ymd_opt(2026, 1, 8).and_then(|d| d.and_hms_opt(9, 30, 0))
        );
        assert_eq!(
            parse_publication_date("2026-01-08"),
            NaiveDate::from_ymd_opt(2026, 1, 8).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_publication_date("last tuesday"), None);
    }

    #[test]
    fn seniority_uses_priority_order() {
        // "lead" maps to senior and sits before "junior" in the list.
        assert_eq!(infer_seniority("junior lead developer"), "senior");
        assert_eq!(infer_seniority("jr. analyst"), "junior");
        assert_eq!(infer_seniority("data engineer"), "unknown");
    }

    #[test]
    fn skills_are_ordered_by_first_occurrence() {
        assert_eq!(
            extract_skills("we need sql and python, plus more sql"),
            vec!["sql", "python"]
        );
    }

    #[test]
    fn skill_matching_respects_word_boundaries() {
        // "janitor" must not match "r", "javascripting" not "javascript"...
        assert!(extract_skills("janitor role").is_empty());
        // ...but a bare "r" token does match.
        assert_eq!(extract_skills("expert in r and python"), vec!["r", "python"]);
    }

    #[test]
    fn job_types_fold_into_the_enumerated_set() {
        assert_eq!(normalize_job_type("Full-time"), "full_time");
        assert_eq!(normalize_job_type("full time"), "full_time");
        assert_eq!(normalize_job_type("Gig"), "unknown");
        assert_eq!(normalize_job_type(""), "unknown");
    }

    #[test]
    fn normalized_title_collapses_whitespace() {
        let raw = RawJobRecord {
            id: Some(json!("x")),
            title: Some("  Senior   Data\t Engineer ".to_string()),
            ..Default::default()
        };
        let record = normalize_record(&raw).unwrap();
        assert_eq!(record.normalized_title, "senior data engineer");
    }

    #[test]
    fn locations_standardize() {
        assert_eq!(standardize_location("Worldwide"), "Remote");
        assert_eq!(standardize_location("work from home"), "Remote");
        assert_eq!(standardize_location("new york,  ny"), "New York, Ny");
        assert_eq!(standardize_location(""), "");
    }

    #[test]
    fn remote_flag_reads_title_and_description_too() {
        let raw = RawJobRecord {
            id: Some(json!("x")),
            candidate_required_location: Some("Austin, TX".to_string()),
            description_text: "This is a fully remote role.".to_string(),
            ..Default::default()
        };
        let record = normalize_record(&raw).unwrap();
        assert!(record.remote);
        assert_eq!(record.location, "Austin, Tx");
    }

    #[test]
    fn remote_flag_requires_a_whole_word_match() {
        let raw = RawJobRecord {
            id: Some(json!("x")),
            candidate_required_location: Some("Austin, TX".to_string()),
            description_text: "We monitor the remoteness of field sensors.".to_string(),
            ..Default::default()
        };
        assert!(!normalize_record(&raw).unwrap().remote);

        let hyphenated = RawJobRecord {
            id: Some(json!("y")),
            candidate_required_location: Some("Austin, TX".to_string()),
            title: Some("Engineer at a remote-first team".to_string()),
            ..Default::default()
        };
        assert!(normalize_record(&hyphenated).unwrap().remote);
    }
}
