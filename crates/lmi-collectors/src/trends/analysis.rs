//! Parsing of SerpAPI Google Trends payloads and the per-term summary.

use lmi_core::{Cell, Table, TERM_COLUMN};
use serde::Deserialize;
use serde_json::Value;

use crate::error::CollectorError;

/// Points needed before a direction is reported.
const MIN_POINTS_FOR_DIRECTION: usize = 8;
const DIRECTION_WINDOW: usize = 4;
/// Related queries kept per term and list.
const RELATED_PER_KIND: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Direction {
    Rising,
    Declining,
    Stable,
    Unknown,
}

impl Direction {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Direction::Rising => "Rising",
            Direction::Declining => "Declining",
            Direction::Stable => "Stable",
            Direction::Unknown => "Unknown",
        }
    }
}

/// Interest series for one term, oldest point first.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct TermSeries {
    pub term: String,
    pub points: Vec<(String, f64)>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    #[serde(default)]
    interest_over_time: InterestOverTime,
}

#[derive(Debug, Default, Deserialize)]
struct InterestOverTime {
    #[serde(default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
struct TimelinePoint {
    #[serde(default)]
    date: String,
    #[serde(default)]
    values: Vec<TimelineValue>,
}

#[derive(Debug, Deserialize)]
struct TimelineValue {
    #[serde(default)]
    query: String,
    extracted_value: Option<f64>,
}

/// Splits a TIMESERIES response into one series per requested term.
///
/// Values are matched to terms case-insensitively; terms absent from the
/// response get an empty series.
pub(super) fn parse_timeseries(
    body: Value,
    terms: &[String],
) -> Result<Vec<TermSeries>, CollectorError> {
    let response: TimeseriesResponse =
        serde_json::from_value(body).map_err(|e| CollectorError::Deserialize {
            context: "google trends timeseries".to_string(),
            source: e,
        })?;

    let mut series: Vec<TermSeries> = terms
        .iter()
        .map(|t| TermSeries {
            term: t.clone(),
            points: Vec::new(),
        })
        .collect();

    for point in response.interest_over_time.timeline_data {
        for value in point.values {
            if let Some(s) = series
                .iter_mut()
                .find(|s| s.term.eq_ignore_ascii_case(value.query.trim()))
            {
                s.points
                    .push((point.date.clone(), value.extracted_value.unwrap_or(0.0)));
            }
        }
    }
    Ok(series)
}

/// Compares the mean of the last four points with the first four.
pub(super) fn direction(values: &[f64]) -> Direction {
    if values.len() < MIN_POINTS_FOR_DIRECTION {
        return Direction::Unknown;
    }
    let older = mean(&values[..DIRECTION_WINDOW]);
    let recent = mean(&values[values.len() - DIRECTION_WINDOW..]);
    if recent > older * 1.1 {
        Direction::Rising
    } else if recent < older * 0.9 {
        Direction::Declining
    } else {
        Direction::Stable
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[allow(clippy::cast_possible_truncation)]
fn whole(value: f64) -> i64 {
    value.round() as i64
}

/// One summary row per term that has data.
pub(super) fn summary_table(series: &[TermSeries]) -> Table {
    let mut table = Table::new([
        TERM_COLUMN,
        "avg_interest",
        "peak_interest",
        "current_interest",
        "trend_direction",
    ]);
    for s in series.iter().filter(|s| !s.points.is_empty()) {
        let values: Vec<f64> = s.points.iter().map(|(_, v)| *v).collect();
        let peak = values.iter().copied().fold(f64::MIN, f64::max);
        let current = values.last().copied().unwrap_or_default();
        table.push_row(vec![
            Cell::from(s.term.as_str()),
            Cell::number(round1(mean(&values))),
            Cell::from(whole(peak)),
            Cell::from(whole(current)),
            Cell::from(direction(&values).as_str()),
        ]);
    }
    table
}

pub(super) fn series_table(series: &TermSeries) -> Table {
    let mut table = Table::new(["date", "interest"]);
    for (date, value) in &series.points {
        table.push_row(vec![Cell::from(date.as_str()), Cell::from(whole(*value))]);
    }
    table
}

#[derive(Debug, Default, Deserialize)]
struct RelatedResponse {
    #[serde(default)]
    related_queries: RelatedLists,
}

#[derive(Debug, Default, Deserialize)]
struct RelatedLists {
    #[serde(default)]
    top: Vec<RelatedEntry>,
    #[serde(default)]
    rising: Vec<RelatedEntry>,
}

#[derive(Debug, Deserialize)]
struct RelatedEntry {
    #[serde(default)]
    query: String,
    value: Option<Value>,
}

/// Appends the top and rising related queries for `term` to `table`.
pub(super) fn push_related_rows(
    table: &mut Table,
    term: &str,
    body: Value,
) -> Result<usize, CollectorError> {
    let response: RelatedResponse =
        serde_json::from_value(body).map_err(|e| CollectorError::Deserialize {
            context: format!("google trends related queries for '{term}'"),
            source: e,
        })?;
    let lists = response.related_queries;
    let mut added = 0;
    for (kind, entries) in [("top", lists.top), ("rising", lists.rising)] {
        for entry in entries.into_iter().take(RELATED_PER_KIND) {
            let value = match entry.value {
                Some(Value::String(s)) => s,
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            table.push_row(vec![
                Cell::from(term),
                Cell::from(entry.query),
                Cell::from(kind),
                Cell::from(value),
            ]);
            added += 1;
        }
    }
    Ok(added)
}

pub(super) fn related_table() -> Table {
    Table::new([TERM_COLUMN, "related_query", "query_type", "value"])
}
