//! Google Jobs results as returned by SerpAPI.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CollectorError;

/// Posting descriptions are cut to this many characters in the output.
pub(crate) const DESCRIPTION_MAX_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
struct JobsPage {
    #[serde(default)]
    jobs_results: Vec<RawJob>,
    #[serde(default)]
    serpapi_pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    #[serde(default)]
    title: String,
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    via: String,
    #[serde(default)]
    description: String,
    share_link: Option<String>,
    #[serde(default)]
    detected_extensions: DetectedExtensions,
    #[serde(default)]
    apply_options: Vec<Link>,
    #[serde(default)]
    related_links: Vec<Link>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectedExtensions {
    posted_at: Option<String>,
    schedule_type: Option<String>,
    salary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub posted_date: String,
    pub employment_type: String,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub description: String,
    pub source: String,
    pub apply_url: String,
}

/// One page of postings plus the token for the next page, if any.
pub(crate) fn parse_jobs_page(
    body: Value,
) -> Result<(Vec<JobPosting>, Option<String>), CollectorError> {
    let page: JobsPage = serde_json::from_value(body).map_err(|e| CollectorError::Deserialize {
        context: "google_jobs results".to_string(),
        source: e,
    })?;

    let next = page
        .serpapi_pagination
        .and_then(|p| p.next_page_token)
        .filter(|t| !t.is_empty());

    let postings = page
        .jobs_results
        .into_iter()
        .map(|job| {
            let (salary_min, salary_max) = job
                .detected_extensions
                .salary
                .as_deref()
                .map_or((None, None), parse_salary);
            let apply_url = job
                .apply_options
                .iter()
                .chain(job.related_links.iter())
                .find_map(|l| l.link.clone())
                .or(job.share_link)
                .unwrap_or_default();
            JobPosting {
                title: job.title,
                company: job.company_name,
                location: job.location,
                posted_date: job.detected_extensions.posted_at.unwrap_or_default(),
                employment_type: job.detected_extensions.schedule_type.unwrap_or_default(),
                salary_min,
                salary_max,
                description: job.description,
                source: job.via.trim_start_matches("via ").to_string(),
                apply_url,
            }
        })
        .collect();

    Ok((postings, next))
}

static SALARY_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$?\s*(\d[\d,]*(?:\.\d+)?)\s*(k)?").expect("valid salary regex")
});

/// Minimum and maximum from a free-text salary such as `"$80K–$120K a year"`
/// or `"45–60 an hour"`. A single figure fills only the minimum. `K`
/// multiplies its figure by 1000.
pub(crate) fn parse_salary(text: &str) -> (Option<f64>, Option<f64>) {
    let figures: Vec<f64> = SALARY_NUMBER
        .captures_iter(text)
        .filter_map(|cap| {
            let raw = cap.get(1)?.as_str().replace(',', "");
            let value: f64 = raw.parse().ok()?;
            Some(if cap.get(2).is_some() {
                value * 1000.0
            } else {
                value
            })
        })
        .collect();

    match figures.as_slice() {
        [] => (None, None),
        [only] => (Some(*only), None),
        [low, high, ..] => (Some(*low), Some(*high)),
    }
}
