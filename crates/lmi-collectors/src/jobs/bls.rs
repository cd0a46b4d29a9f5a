//! BLS Occupational Employment and Wage Statistics lookup.
//!
//! Queries are mapped onto a small SOC code table by keyword; each matched
//! occupation contributes three national OEWS series (employment, mean
//! annual wage, median hourly wage).

use chrono::{Datelike, Utc};
use lmi_core::{retry_with_backoff, Cell, RetryPolicy, Table};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use crate::error::CollectorError;
use crate::http::{endpoint, parse_base_url, send_json, HttpSettings};

const SERVICE: &str = "BLS";

/// At most this many occupations are requested per query.
const MAX_OCCUPATIONS: usize = 5;

/// OEUN + national area (7) + all industries (6).
const SERIES_PREFIX: &str = "OEUN0000000000000";

const DATATYPE_EMPLOYMENT: &str = "01";
const DATATYPE_MEAN_ANNUAL_WAGE: &str = "04";
const DATATYPE_MEDIAN_HOURLY_WAGE: &str = "13";

const SOC_CODES: &[(&str, &str)] = &[
    ("15-1252", "Software Developers"),
    ("15-1251", "Computer Programmers"),
    ("15-1211", "Computer Systems Analysts"),
    ("15-1212", "Information Security Analysts"),
    ("15-2051", "Data Scientists"),
    ("15-1241", "Computer Network Architects"),
    ("15-1244", "Network and Computer Systems Administrators"),
    ("15-1232", "Computer User Support Specialists"),
    ("15-1299", "Computer Occupations, All Other"),
    ("13-2011", "Accountants and Auditors"),
    ("13-1111", "Management Analysts"),
    ("13-2051", "Financial Analysts"),
    ("13-1161", "Market Research Analysts"),
    ("13-2072", "Loan Officers"),
    ("11-3031", "Financial Managers"),
    ("29-1141", "Registered Nurses"),
    ("29-1071", "Physician Assistants"),
    ("29-2061", "Licensed Practical Nurses"),
    ("31-1120", "Home Health and Personal Care Aides"),
    ("11-1021", "General and Operations Managers"),
    ("11-2021", "Marketing Managers"),
    ("11-3021", "Computer and Information Systems Managers"),
    ("11-9111", "Medical and Health Services Managers"),
    ("41-3091", "Sales Representatives, Services"),
    ("41-4012", "Sales Representatives, Wholesale"),
    ("25-1099", "Postsecondary Teachers"),
    ("25-2031", "Secondary School Teachers"),
];

/// Query words that should pull in titles containing a different word.
const KEYWORD_ALIASES: &[(&str, &[&str])] = &[
    ("data", &["data", "analyst"]),
    ("software", &["software"]),
    ("developer", &["developers", "programmers"]),
    ("security", &["security"]),
    ("cyber", &["security"]),
    ("nurse", &["nurses"]),
    ("nursing", &["nurses"]),
    ("manager", &["managers"]),
    ("teacher", &["teachers"]),
    ("sales", &["sales"]),
];

pub(crate) struct BlsClient {
    client: Client,
    data_url: Url,
    api_key: Option<String>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct BlsResponse {
    status: String,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results", default)]
    results: Option<BlsResults>,
}

#[derive(Debug, Deserialize)]
struct BlsResults {
    #[serde(default)]
    series: Vec<BlsSeries>,
}

#[derive(Debug, Deserialize)]
struct BlsSeries {
    #[serde(rename = "seriesID")]
    series_id: String,
    #[serde(default)]
    data: Vec<BlsObservation>,
}

#[derive(Debug, Deserialize)]
struct BlsObservation {
    year: String,
    value: String,
}

impl BlsClient {
    pub(crate) fn new(
        settings: &HttpSettings,
        api_key: Option<String>,
        base_url: &str,
    ) -> Result<Self, CollectorError> {
        let base = parse_base_url(base_url)?;
        Ok(Self {
            client: settings.build_client()?,
            data_url: endpoint(&base, "publicAPI/v2/timeseries/data/")?,
            api_key,
            retry: settings.retry,
        })
    }

    /// Employment and wage figures for occupations matching `query`.
    ///
    /// Returns an empty table when no occupation matches.
    pub(crate) async fn occupation_stats(&self, query: &str) -> Result<Table, CollectorError> {
        let occupations = match_occupations(query);
        if occupations.is_empty() {
            tracing::debug!(query, "no SOC codes match query");
            return Ok(occupation_table());
        }

        let this_year = Utc::now().year();
        let mut payload = json!({
            "seriesid": series_ids(&occupations),
            "startyear": (this_year - 2).to_string(),
            "endyear": (this_year - 1).to_string(),
        });
        if let Some(key) = &self.api_key {
            payload["registrationkey"] = json!(key);
        }

        let body = retry_with_backoff(&self.retry, "bls timeseries", || {
            send_json(
                SERVICE,
                self.client.post(self.data_url.clone()).json(&payload),
            )
        })
        .await?;

        let response: BlsResponse =
            serde_json::from_value(body).map_err(|e| CollectorError::Deserialize {
                context: "BLS timeseries".to_string(),
                source: e,
            })?;

        if response.status != "REQUEST_SUCCEEDED" {
            return Err(CollectorError::Api {
                service: SERVICE,
                message: if response.message.is_empty() {
                    response.status
                } else {
                    response.message.join("; ")
                },
            });
        }

        let series = response.results.map(|r| r.series).unwrap_or_default();
        Ok(build_table(&occupations, &series))
    }
}

/// SOC codes whose titles share a word (or alias) with the query.
pub(crate) fn match_occupations(query: &str) -> Vec<(&'static str, &'static str)> {
    let query = query.to_lowercase();
    let mut needles: Vec<&str> = query.split_whitespace().filter(|w| w.len() > 2).collect();
    for (keyword, aliases) in KEYWORD_ALIASES {
        if query.contains(keyword) {
            needles.extend_from_slice(aliases);
        }
    }

    SOC_CODES
        .iter()
        .filter(|(_, title)| {
            let title = title.to_lowercase();
            needles.iter().any(|n| title.contains(n))
        })
        .take(MAX_OCCUPATIONS)
        .copied()
        .collect()
}

pub(crate) fn series_ids(occupations: &[(&str, &str)]) -> Vec<String> {
    occupations
        .iter()
        .flat_map(|(soc, _)| {
            let base = format!("{SERIES_PREFIX}{}", soc.replace('-', ""));
            [
                DATATYPE_EMPLOYMENT,
                DATATYPE_MEAN_ANNUAL_WAGE,
                DATATYPE_MEDIAN_HOURLY_WAGE,
            ]
            .map(|dt| format!("{base}{dt}"))
        })
        .collect()
}

fn occupation_table() -> Table {
    Table::new([
        "soc_code",
        "occupation_title",
        "employment",
        "mean_annual_wage",
        "median_hourly_wage",
        "year",
    ])
}

/// BLS publishes suppressed values as "-" or "*"; those stay as text.
fn value_cell(raw: &str) -> Cell {
    raw.replace(',', "")
        .parse::<f64>()
        .map_or_else(|_| Cell::from(raw), Cell::number)
}

fn build_table(occupations: &[(&str, &str)], series: &[BlsSeries]) -> Table {
    let mut table = occupation_table();
    for (soc, title) in occupations {
        let soc_digits = soc.replace('-', "");
        let mut employment = Cell::Empty;
        let mut mean_wage = Cell::Empty;
        let mut median_hourly = Cell::Empty;
        let mut year = Cell::Empty;
        let mut found = false;

        for s in series {
            let Some(rest) = s.series_id.strip_prefix(SERIES_PREFIX) else {
                continue;
            };
            let Some(datatype) = rest.strip_prefix(soc_digits.as_str()) else {
                continue;
            };
            // Observations are newest first.
            let Some(latest) = s.data.first() else {
                continue;
            };
            found = true;
            let cell = value_cell(&latest.value);
            match datatype {
                DATATYPE_EMPLOYMENT => employment = cell,
                DATATYPE_MEAN_ANNUAL_WAGE => mean_wage = cell,
                DATATYPE_MEDIAN_HOURLY_WAGE => median_hourly = cell,
                _ => continue,
            }
            year = Cell::from(latest.year.as_str());
        }

        if found {
            table.push_row(vec![
                Cell::from(*soc),
                Cell::from(*title),
                employment,
                mean_wage,
                median_hourly,
                year,
            ]);
        }
    }
    table
}
