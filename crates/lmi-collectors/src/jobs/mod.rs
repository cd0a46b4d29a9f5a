//! Job postings from Google Jobs (via SerpAPI) enriched with BLS wage data.

mod bls;
mod postings;
mod skills;

use async_trait::async_trait;
use chrono::Utc;
use lmi_core::{
    Availability, Cell, Collector, FieldKind, FieldSpec, ModuleInputs, ModuleKind, ModuleResult,
    Table, TableSet, UpstreamArtifacts, SKILLS_SUMMARY_TABLE,
};

use crate::error::CollectorError;
use crate::http::HttpSettings;
use crate::serpapi::SerpApiClient;
use crate::Endpoints;

use self::bls::BlsClient;
use self::postings::{parse_jobs_page, JobPosting, DESCRIPTION_MAX_CHARS};
use self::skills::{extract_skills, skills_summary};

pub(crate) use self::skills::title_case;

const JOBS_TABLE: &str = "Jobs";
const BLS_TABLE: &str = "BLS Data";

/// Google Jobs returns about ten postings per page.
const PAGE_SIZE: usize = 10;

const EMPLOYMENT_TYPES: &[&str] = &["all", "FULLTIME", "PARTTIME", "CONTRACTOR", "INTERN"];
const DATE_POSTED: &[&str] = &["today", "3days", "week", "month"];

pub struct JobsCollector {
    serpapi: Option<SerpApiClient>,
    bls: BlsClient,
    fields: Vec<FieldSpec>,
}

impl JobsCollector {
    /// # Errors
    ///
    /// Returns [`CollectorError`] if an HTTP client cannot be built or an
    /// endpoint URL is invalid.
    pub fn new(
        settings: &HttpSettings,
        serpapi_key: Option<&str>,
        bls_api_key: Option<String>,
        endpoints: &Endpoints,
    ) -> Result<Self, CollectorError> {
        let serpapi = serpapi_key
            .map(|key| SerpApiClient::new(settings, key, &endpoints.serpapi))
            .transpose()?;
        Ok(Self {
            serpapi,
            bls: BlsClient::new(settings, bls_api_key, &endpoints.bls)?,
            fields: input_fields(),
        })
    }

    async fn fetch_postings(
        &self,
        serpapi: &SerpApiClient,
        inputs: &ModuleInputs,
        limit: usize,
    ) -> Result<Vec<JobPosting>, CollectorError> {
        let mut params: Vec<(&str, String)> = vec![
            ("engine", "google_jobs".to_string()),
            ("q", inputs.text("query").unwrap_or_default().to_string()),
        ];
        if let Some(location) = inputs.text("location") {
            params.push(("location", location.to_string()));
        }
        if let Some(chips) = chips(inputs) {
            params.push(("chips", chips));
        }

        let mut postings = Vec::new();
        let mut next_page: Option<String> = None;
        for page in 0..limit.div_ceil(PAGE_SIZE) {
            let mut page_params = params.clone();
            if let Some(token) = &next_page {
                page_params.push(("next_page_token", token.clone()));
            }
            let body = serpapi.search(&page_params).await?;
            let (batch, next) = parse_jobs_page(body)?;
            tracing::debug!(page, fetched = batch.len(), "google jobs page");
            postings.extend(batch);
            next_page = next;
            if postings.len() >= limit || next_page.is_none() {
                break;
            }
        }
        postings.truncate(limit);
        Ok(postings)
    }
}

fn input_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("query", "Search Keywords", FieldKind::Text { min_len: 2 })
            .required()
            .help("Job title or keywords to search for"),
        FieldSpec::new("location", "Location", FieldKind::Text { min_len: 0 })
            .default_value("United States")
            .help("City, state, or country"),
        FieldSpec::new(
            "results_limit",
            "Maximum Results",
            FieldKind::Integer { min: 5, max: 100 },
        )
        .default_value(20_i64),
        FieldSpec::new(
            "employment_type",
            "Employment Type",
            FieldKind::Select {
                options: EMPLOYMENT_TYPES,
            },
        )
        .default_value("all")
        .advanced(),
        FieldSpec::new(
            "date_posted",
            "Date Posted",
            FieldKind::Select {
                options: DATE_POSTED,
            },
        )
        .default_value("month")
        .advanced(),
        FieldSpec::new("include_bls", "Include BLS Data", FieldKind::Checkbox)
            .default_value(true)
            .help("Employment and wage statistics from the Bureau of Labor Statistics")
            .advanced(),
        FieldSpec::new(
            "extract_skills",
            "Extract Skills from Descriptions",
            FieldKind::Checkbox,
        )
        .default_value(true)
        .advanced(),
    ]
}

/// SerpAPI `chips` filter for employment type and posting age.
fn chips(inputs: &ModuleInputs) -> Option<String> {
    let mut chips = Vec::new();
    if let Some(kind) = inputs.text("employment_type").filter(|k| *k != "all") {
        chips.push(format!("employment_type:{kind}"));
    }
    if let Some(age) = inputs.text("date_posted") {
        chips.push(format!("date_posted:{age}"));
    }
    (!chips.is_empty()).then(|| chips.join(","))
}

fn jobs_table(postings: &[JobPosting], skills_per_job: &[Vec<&'static str>]) -> Table {
    let mut table = Table::new([
        "job_title",
        "company",
        "location",
        "posted_date",
        "employment_type",
        "salary_min",
        "salary_max",
        "description",
        "skills_extracted",
        "source",
        "apply_url",
    ]);
    for (i, job) in postings.iter().enumerate() {
        let skills = skills_per_job.get(i).map(|s| s.join(", ")).unwrap_or_default();
        table.push_row(vec![
            Cell::from(job.title.as_str()),
            Cell::from(job.company.as_str()),
            Cell::from(job.location.as_str()),
            Cell::from(job.posted_date.as_str()),
            Cell::from(job.employment_type.as_str()),
            job.salary_min.map_or(Cell::Empty, Cell::number),
            job.salary_max.map_or(Cell::Empty, Cell::number),
            Cell::from(lmi_core::truncate_chars(&job.description, DESCRIPTION_MAX_CHARS)),
            Cell::from(skills),
            Cell::from(job.source.as_str()),
            Cell::from(job.apply_url.as_str()),
        ]);
    }
    table
}

#[async_trait]
impl Collector for JobsCollector {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Jobs
    }

    fn display_name(&self) -> &'static str {
        "Job Postings & Labor Data"
    }

    fn description(&self) -> &'static str {
        "Search Google Jobs for current postings and enrich with BLS employment and wage statistics."
    }

    fn input_fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn availability(&self) -> Availability {
        if self.serpapi.is_some() {
            Availability::ready()
        } else {
            Availability::missing(
                "SERPAPI_KEY not configured. Get a free key (100 searches/month) at https://serpapi.com",
            )
        }
    }

    async fn execute(&self, inputs: &ModuleInputs, _upstream: &UpstreamArtifacts) -> ModuleResult {
        let started_at = Utc::now();
        let Some(serpapi) = &self.serpapi else {
            return ModuleResult::failed(vec![CollectorError::NotConfigured("SERPAPI_KEY").to_string()])
                .timed(started_at);
        };

        let query = inputs.text("query").unwrap_or_default();
        let location = inputs.text("location").unwrap_or("United States");
        let limit = inputs.count("results_limit", 20);
        let want_skills = inputs.flag("extract_skills");

        let mut tables = TableSet::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut mentions: Vec<&'static str> = Vec::new();
        let mut jobs_found = 0usize;

        match self.fetch_postings(serpapi, inputs, limit).await {
            Ok(postings) => {
                if postings.is_empty() {
                    warnings.push(format!("No job postings found for '{query}' in '{location}'"));
                }
                let per_job: Vec<Vec<&'static str>> = if want_skills {
                    postings
                        .iter()
                        .map(|p| extract_skills(&format!("{} {}", p.title, p.description)))
                        .collect()
                } else {
                    Vec::new()
                };
                mentions = per_job.iter().flatten().copied().collect();
                jobs_found = postings.len();
                tables.insert(JOBS_TABLE, jobs_table(&postings, &per_job));
            }
            Err(e) => {
                tracing::error!(query, error = %e, "job posting search failed");
                errors.push(format!("Failed to fetch job postings: {e}"));
            }
        }

        if inputs.flag("include_bls") {
            match self.bls.occupation_stats(query).await {
                Ok(table) if table.is_empty() => {
                    warnings.push(format!("No BLS occupation data found matching '{query}'"));
                }
                Ok(table) => {
                    tables.insert(BLS_TABLE, table);
                }
                Err(e) => {
                    tracing::warn!(query, error = %e, "BLS lookup failed");
                    warnings.push(format!("BLS data unavailable: {e}"));
                }
            }
        }

        let summary = skills_summary(&mentions, jobs_found);
        let skills_found = summary.len();
        if want_skills && !summary.is_empty() {
            tables.insert(SKILLS_SUMMARY_TABLE, summary);
        }

        ModuleResult::from_outcome(tables, errors, warnings)
            .with_metadata("query", query)
            .with_metadata("location", location)
            .with_metadata("jobs_found", jobs_found)
            .with_metadata("skills_found", skills_found)
            .timed(started_at)
    }
}
