//! Google search-interest trends (via SerpAPI) for skills and topics.

mod analysis;

use async_trait::async_trait;
use chrono::Utc;
use lmi_core::{
    Availability, Collector, FieldKind, FieldSpec, ModuleInputs, ModuleKind, ModuleResult,
    TableSet, UpstreamArtifacts, TRENDS_SUMMARY_TABLE,
};

use crate::error::CollectorError;
use crate::http::HttpSettings;
use crate::jobs::title_case;
use crate::serpapi::SerpApiClient;
use crate::Endpoints;

use self::analysis::{parse_timeseries, push_related_rows, related_table, series_table, summary_table};

const RELATED_TABLE: &str = "Related Queries";

/// Google Trends compares at most five terms per request.
const MAX_TERMS: usize = 5;

const TIMEFRAMES: &[&str] = &["today 1-m", "today 3-m", "today 12-m", "today 5-y"];
const GEOS: &[&str] = &["US", "GB", "CA", "AU", "WORLDWIDE"];

pub struct TrendsCollector {
    serpapi: Option<SerpApiClient>,
    fields: Vec<FieldSpec>,
}

impl TrendsCollector {
    /// # Errors
    ///
    /// Returns [`CollectorError`] if the HTTP client cannot be built or the
    /// SerpAPI URL is invalid.
    pub fn new(
        settings: &HttpSettings,
        serpapi_key: Option<&str>,
        endpoints: &Endpoints,
    ) -> Result<Self, CollectorError> {
        let serpapi = serpapi_key
            .map(|key| SerpApiClient::new(settings, key, &endpoints.serpapi))
            .transpose()?;
        Ok(Self {
            serpapi,
            fields: input_fields(),
        })
    }
}

fn input_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(
            "terms",
            "Search Terms",
            FieldKind::TermList {
                max_items: MAX_TERMS,
            },
        )
        .required()
        .help("Comma-separated skills or topics, up to five"),
        FieldSpec::new(
            "max_terms",
            "Maximum Terms",
            FieldKind::Integer {
                min: 1,
                max: 5,
            },
        )
        .default_value(5_i64)
        .advanced(),
        FieldSpec::new(
            "timeframe",
            "Time Range",
            FieldKind::Select {
                options: TIMEFRAMES,
            },
        )
        .default_value("today 12-m"),
        FieldSpec::new("geo", "Region", FieldKind::Select { options: GEOS })
            .default_value("US")
            .advanced(),
        FieldSpec::new("include_related", "Include Related Queries", FieldKind::Checkbox)
            .default_value(true),
        FieldSpec::new(
            "include_job_skills",
            "Add Skills from Job Postings",
            FieldKind::Checkbox,
        )
        .default_value(false)
        .help("Fill remaining term slots with the top skills extracted by the job collector"),
    ]
}

/// Caller terms first, then upstream job skills, deduplicated
/// case-insensitively and capped at `max_terms`.
fn working_terms(inputs: &ModuleInputs, upstream: &UpstreamArtifacts) -> Vec<String> {
    let max_terms = inputs.count("max_terms", MAX_TERMS).clamp(1, MAX_TERMS);
    let mut terms: Vec<String> = Vec::new();
    let job_skills = if inputs.flag("include_job_skills") {
        upstream.extracted_skills.as_deref().unwrap_or_default()
    } else {
        &[]
    };
    for candidate in inputs.list("terms").iter().chain(job_skills) {
        let candidate = candidate.trim();
        if candidate.is_empty() || terms.iter().any(|t| t.eq_ignore_ascii_case(candidate)) {
            continue;
        }
        if terms.len() == max_terms {
            break;
        }
        terms.push(candidate.to_string());
    }
    terms
}

impl TrendsCollector {
    fn geo_param(inputs: &ModuleInputs) -> Option<String> {
        inputs
            .text("geo")
            .filter(|g| *g != "WORLDWIDE")
            .map(str::to_string)
    }

    async fn related_queries(
        serpapi: &SerpApiClient,
        terms: &[String],
        inputs: &ModuleInputs,
        warnings: &mut Vec<String>,
    ) -> lmi_core::Table {
        let mut table = related_table();
        for term in terms {
            let mut params: Vec<(&str, String)> = vec![
                ("engine", "google_trends".to_string()),
                ("q", term.clone()),
                ("data_type", "RELATED_QUERIES".to_string()),
                (
                    "date",
                    inputs.text("timeframe").unwrap_or("today 12-m").to_string(),
                ),
            ];
            if let Some(geo) = Self::geo_param(inputs) {
                params.push(("geo", geo));
            }
            let outcome = match serpapi.search(&params).await {
                Ok(body) => push_related_rows(&mut table, term, body),
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                tracing::warn!(term, error = %e, "related queries lookup failed");
                warnings.push(format!("Related queries unavailable for '{term}': {e}"));
            }
        }
        table
    }
}

#[async_trait]
impl Collector for TrendsCollector {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Trends
    }

    fn display_name(&self) -> &'static str {
        "Search Trends"
    }

    fn description(&self) -> &'static str {
        "Track Google search interest for skills and topics over time. Can use skills extracted from job postings."
    }

    fn input_fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn availability(&self) -> Availability {
        if self.serpapi.is_some() {
            Availability::ready()
        } else {
            Availability::missing("SERPAPI_KEY not configured")
        }
    }

    async fn execute(&self, inputs: &ModuleInputs, upstream: &UpstreamArtifacts) -> ModuleResult {
        let started_at = Utc::now();
        let Some(serpapi) = &self.serpapi else {
            return ModuleResult::failed(vec![CollectorError::NotConfigured("SERPAPI_KEY").to_string()])
                .timed(started_at);
        };

        let terms = working_terms(inputs, upstream);
        if terms.is_empty() {
            return ModuleResult::failed(vec!["No valid search terms provided".to_string()])
                .timed(started_at);
        }
        let timeframe = inputs.text("timeframe").unwrap_or("today 12-m");
        let geo = inputs.text("geo").unwrap_or("US");
        tracing::info!(?terms, timeframe, geo, "fetching google trends");

        let mut params: Vec<(&str, String)> = vec![
            ("engine", "google_trends".to_string()),
            ("q", terms.join(",")),
            ("data_type", "TIMESERIES".to_string()),
            ("date", timeframe.to_string()),
        ];
        if let Some(geo) = Self::geo_param(inputs) {
            params.push(("geo", geo));
        }

        let series = match serpapi.search(&params).await {
            Ok(body) => parse_timeseries(body, &terms),
            Err(e) => Err(e),
        };
        let series = match series {
            Ok(series) => series,
            Err(e) => {
                tracing::error!(error = %e, "google trends request failed");
                return ModuleResult::failed(vec![format!(
                    "Failed to fetch Google Trends data: {e}"
                )])
                .with_metadata("terms", terms)
                .timed(started_at);
            }
        };

        let mut tables = TableSet::new();
        let mut warnings = Vec::new();

        let summary = summary_table(&series);
        if summary.is_empty() {
            warnings.push("Google Trends returned no data for the requested terms".to_string());
        } else {
            tables.insert(TRENDS_SUMMARY_TABLE, summary);
        }
        for s in series.iter().filter(|s| !s.points.is_empty()) {
            tables.insert(format!("Trend - {}", title_case(&s.term)), series_table(s));
        }

        if inputs.flag("include_related") {
            let related = Self::related_queries(serpapi, &terms, inputs, &mut warnings).await;
            if !related.is_empty() {
                tables.insert(RELATED_TABLE, related);
            }
        }

        ModuleResult::from_outcome(tables, Vec::new(), warnings)
            .with_metadata("terms_analyzed", terms.len())
            .with_metadata("terms", terms)
            .with_metadata("timeframe", timeframe)
            .with_metadata("geo", geo)
            .timed(started_at)
    }
}
