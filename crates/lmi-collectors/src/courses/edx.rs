//! edX course search, read from the schema.org JSON-LD embedded in the
//! search results page.

use std::sync::LazyLock;

use lmi_core::{retry_with_backoff, RetryPolicy};
use regex::Regex;
use reqwest::{Client, Url};
use serde_json::Value;

use super::Course;
use crate::error::CollectorError;
use crate::http::{endpoint, parse_base_url, send_text, HttpSettings};

const SERVICE: &str = "edX";

pub(super) struct EdxClient {
    client: Client,
    base_url: Url,
    search_url: Url,
    retry: RetryPolicy,
}

impl EdxClient {
    pub(super) fn new(settings: &HttpSettings, base_url: &str) -> Result<Self, CollectorError> {
        let base = parse_base_url(base_url)?;
        Ok(Self {
            client: settings.build_client()?,
            search_url: endpoint(&base, "search")?,
            base_url: base,
            retry: settings.retry,
        })
    }

    pub(super) async fn search(
        &self,
        keywords: &str,
        limit: usize,
        level: &str,
    ) -> Result<Vec<Course>, CollectorError> {
        let mut params = vec![("q", keywords), ("tab", "course")];
        if let Some(edx_level) = edx_level(level) {
            params.push(("level", edx_level));
        }

        let html = retry_with_backoff(&self.retry, "edx search", || {
            send_text(
                SERVICE,
                self.client.get(self.search_url.clone()).query(&params),
            )
        })
        .await?;

        let mut courses = parse_courses(&html, &self.base_url);
        if level != "all" {
            courses.retain(|c| c.level.is_empty() || level_matches(&c.level, level));
        }
        courses.truncate(limit);
        Ok(courses)
    }
}

/// edX's own names for the difficulty filter.
fn edx_level(level: &str) -> Option<&'static str> {
    match level {
        "beginner" => Some("Introductory"),
        "intermediate" => Some("Intermediate"),
        "advanced" => Some("Advanced"),
        _ => None,
    }
}

fn level_matches(course_level: &str, wanted: &str) -> bool {
    let course_level = course_level.to_lowercase();
    match wanted {
        "beginner" => course_level.contains("beginner") || course_level.contains("introductory"),
        other => course_level.contains(other),
    }
}

static JSON_LD_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid json-ld script regex")
});

/// Every schema.org `Course` node in the page's JSON-LD blocks, in document
/// order, with relative URLs resolved against `base`.
pub(super) fn parse_courses(html: &str, base: &Url) -> Vec<Course> {
    let mut courses = Vec::new();
    for cap in JSON_LD_SCRIPT.captures_iter(html) {
        let raw = cap.get(1).map_or("", |m| m.as_str()).trim();
        if raw.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            tracing::debug!("skipping malformed JSON-LD block");
            continue;
        };
        collect_course_nodes(&value, base, &mut courses);
    }
    courses
}

fn collect_course_nodes(value: &Value, base: &Url, out: &mut Vec<Course>) {
    match value {
        Value::Object(map) => {
            if is_type(map.get("@type"), "Course") {
                if let Some(course) = course_from_node(map, base) {
                    out.push(course);
                }
                return;
            }
            for child in map.values() {
                collect_course_nodes(child, base, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_course_nodes(item, base, out);
            }
        }
        _ => {}
    }
}

fn is_type(value: Option<&Value>, wanted: &str) -> bool {
    match value {
        Some(Value::String(s)) => s.eq_ignore_ascii_case(wanted),
        Some(Value::Array(items)) => items
            .iter()
            .any(|v| v.as_str().is_some_and(|s| s.eq_ignore_ascii_case(wanted))),
        _ => false,
    }
}

fn str_field(map: &serde_json::Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn course_from_node(map: &serde_json::Map<String, Value>, base: &Url) -> Option<Course> {
    let title = str_field(map, "name");
    let raw_url = str_field(map, "url");
    if title.is_empty() || raw_url.is_empty() {
        return None;
    }
    let url = base.join(&raw_url).map_or(raw_url, |u| u.to_string());

    let provider = match map.get("provider") {
        Some(Value::Object(p)) => str_field(p, "name"),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|p| p.get("name").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    let offer = match map.get("offers") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    let price = offer.map(format_price).unwrap_or_default();

    let rating = map
        .get("aggregateRating")
        .and_then(|r| r.get("ratingValue"))
        .and_then(|v| v.as_f64().or_else(|| v.as_str()?.parse().ok()));

    let skills = match map.get("teaches").or_else(|| map.get("keywords")) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    Some(Course {
        source: SERVICE.to_string(),
        title,
        provider,
        url,
        price,
        duration: str_field(map, "timeRequired"),
        level: str_field(map, "educationalLevel"),
        rating,
        enrollments: None,
        description: str_field(map, "description"),
        skills,
        // A paid offer is the verified (certificate) track.
        has_certificate: offer.map(|_| true),
        last_updated: str_field(map, "dateModified"),
    })
}

fn format_price(offer: &Value) -> String {
    let price = match offer.get("price") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => return String::new(),
    };
    match offer.get("priceCurrency").and_then(Value::as_str) {
        Some(currency) => format!("{price} {currency}"),
        None => price,
    }
}
