//! Online course search across Coursera and edX.

mod coursera;
mod edx;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use lmi_core::{
    Availability, Cell, Collector, FieldKind, FieldSpec, ModuleInputs, ModuleKind, ModuleResult,
    Table, TableSet, UpstreamArtifacts,
};

use crate::error::CollectorError;
use crate::http::HttpSettings;
use crate::Endpoints;

use self::coursera::CourseraClient;
use self::edx::EdxClient;

const COURSES_TABLE: &str = "Courses";

const SOURCES: &[&str] = &["coursera", "edx"];
const LEVELS: &[&str] = &["all", "beginner", "intermediate", "advanced"];

/// One course listing, normalised across platforms.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub source: String,
    pub title: String,
    pub provider: String,
    pub url: String,
    pub price: String,
    pub duration: String,
    pub level: String,
    pub rating: Option<f64>,
    pub enrollments: Option<i64>,
    pub description: String,
    pub skills: String,
    /// `None` when the platform does not say.
    pub has_certificate: Option<bool>,
    pub last_updated: String,
}

pub struct CoursesCollector {
    coursera: CourseraClient,
    edx: EdxClient,
    fields: Vec<FieldSpec>,
}

impl CoursesCollector {
    /// # Errors
    ///
    /// Returns [`CollectorError`] if an HTTP client cannot be built or an
    /// endpoint URL is invalid.
    pub fn new(settings: &HttpSettings, endpoints: &Endpoints) -> Result<Self, CollectorError> {
        Ok(Self {
            coursera: CourseraClient::new(settings, &endpoints.coursera)?,
            edx: EdxClient::new(settings, &endpoints.edx)?,
            fields: input_fields(),
        })
    }
}

fn input_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("keywords", "Search Keywords", FieldKind::Text { min_len: 2 })
            .required()
            .help("Topic or skill to find courses for"),
        FieldSpec::new(
            "max_results",
            "Maximum Results per Source",
            FieldKind::Integer { min: 5, max: 50 },
        )
        .default_value(15_i64),
        FieldSpec::new(
            "sources",
            "Course Platforms",
            FieldKind::MultiSelect {
                options: SOURCES,
                min_selected: 1,
            },
        )
        .default_value(SOURCES),
        FieldSpec::new("level", "Difficulty Level", FieldKind::Select { options: LEVELS })
            .default_value("all"),
        FieldSpec::new(
            "include_certificates",
            "Certificate Courses Only",
            FieldKind::Checkbox,
        )
        .default_value(false)
        .help("Only show courses that offer certificates")
        .advanced(),
    ]
}

fn source_label(source: &str) -> &'static str {
    match source {
        "coursera" => "Coursera",
        _ => "edX",
    }
}

fn courses_table(courses: &[Course]) -> Table {
    let mut table = Table::new([
        "source",
        "title",
        "provider",
        "url",
        "price",
        "duration",
        "level",
        "rating",
        "enrollments",
        "description",
        "skills",
        "has_certificate",
        "last_updated",
    ]);
    for c in courses {
        table.push_row(vec![
            Cell::from(c.source.as_str()),
            Cell::from(c.title.as_str()),
            Cell::from(c.provider.as_str()),
            Cell::from(c.url.as_str()),
            Cell::from(c.price.as_str()),
            Cell::from(c.duration.as_str()),
            Cell::from(c.level.as_str()),
            Cell::from(c.rating),
            Cell::from(c.enrollments),
            Cell::from(c.description.as_str()),
            Cell::from(c.skills.as_str()),
            Cell::from(c.has_certificate),
            Cell::from(c.last_updated.as_str()),
        ]);
    }
    table
}

/// Drops repeated URLs, keeping the first listing.
fn dedupe_by_url(courses: Vec<Course>) -> Vec<Course> {
    let mut seen = HashSet::new();
    courses
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}

#[async_trait]
impl Collector for CoursesCollector {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Courses
    }

    fn display_name(&self) -> &'static str {
        "Online Courses"
    }

    fn description(&self) -> &'static str {
        "Search Coursera and edX for relevant online courses, certifications, and training programs."
    }

    fn input_fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn availability(&self) -> Availability {
        Availability::ready()
    }

    async fn execute(&self, inputs: &ModuleInputs, _upstream: &UpstreamArtifacts) -> ModuleResult {
        let started_at = Utc::now();
        let keywords = inputs.text("keywords").unwrap_or_default();
        let max_results = inputs.count("max_results", 15);
        let level = inputs.text("level").unwrap_or("all");
        let sources = inputs.list("sources");

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut courses = Vec::new();

        for source in sources {
            let fetched = match source.as_str() {
                "coursera" => {
                    if level != "all" {
                        warnings.push(format!(
                            "Coursera: level filter '{level}' is not supported; showing all levels"
                        ));
                    }
                    self.coursera.search(keywords, max_results).await
                }
                "edx" => self.edx.search(keywords, max_results, level).await,
                other => {
                    tracing::warn!(source = other, "ignoring unknown course source");
                    continue;
                }
            };
            let label = source_label(source);
            match fetched {
                Ok(batch) => {
                    tracing::info!(source = label, count = batch.len(), "retrieved courses");
                    courses.extend(batch);
                }
                Err(e) => {
                    tracing::error!(source = label, error = %e, "course search failed");
                    errors.push(format!("{label}: {e}"));
                }
            }
        }

        let mut courses = dedupe_by_url(courses);
        if inputs.flag("include_certificates") {
            courses.retain(|c| c.has_certificate == Some(true));
        }

        let mut tables = TableSet::new();
        if courses.is_empty() {
            if errors.is_empty() {
                warnings.push(format!("No courses found for '{keywords}'"));
            }
        } else {
            tables.insert(COURSES_TABLE, courses_table(&courses));
        }

        ModuleResult::from_outcome(tables, errors, warnings)
            .with_metadata("keywords", keywords)
            .with_metadata("sources", sources.to_vec())
            .with_metadata("courses_found", courses.len())
            .timed(started_at)
    }
}
