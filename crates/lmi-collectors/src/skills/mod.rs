//! Skill normalisation and related-skill discovery against the Lightcast
//! taxonomy.

mod lightcast;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lmi_core::{
    resolve_inputs, Availability, Cell, Collector, FieldKind, FieldSpec, LightcastCredentials,
    ModuleInputs, ModuleKind, ModuleResult, RawInputs, Table, TableSet, UpstreamArtifacts,
    ValidationResult, REUSE_FROM_JOBS_FIELD, REUSE_FROM_TRENDS_FIELD,
};

use crate::error::CollectorError;
use crate::http::HttpSettings;
use crate::Endpoints;

use self::lightcast::{LightcastClient, LightcastSkill};

const INPUT_SKILLS_TABLE: &str = "Input Skills";
const RELATED_SKILLS_TABLE: &str = "Related Skills";
const DESCRIPTION_MAX_CHARS: usize = 200;

pub struct SkillsCollector {
    client: Option<LightcastClient>,
    request_delay: Duration,
    fields: Vec<FieldSpec>,
}

impl SkillsCollector {
    /// `credentials` of `None` leaves the collector unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError`] if the HTTP client cannot be built or a
    /// Lightcast URL is invalid.
    pub fn new(
        settings: &HttpSettings,
        credentials: Option<LightcastCredentials>,
        request_delay: Duration,
        endpoints: &Endpoints,
    ) -> Result<Self, CollectorError> {
        let client = credentials
            .map(|creds| {
                LightcastClient::new(
                    settings,
                    creds,
                    &endpoints.lightcast_auth,
                    &endpoints.lightcast_api,
                )
            })
            .transpose()?;
        Ok(Self {
            client,
            request_delay,
            fields: input_fields(),
        })
    }
}

fn input_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("skills", "Skills", FieldKind::TermList { max_items: 50 })
            .help("Comma-separated skills to normalise, e.g. python, project management"),
        FieldSpec::new(
            REUSE_FROM_JOBS_FIELD,
            "Use Skills from Job Postings",
            FieldKind::Checkbox,
        )
        .default_value(false),
        FieldSpec::new(
            REUSE_FROM_TRENDS_FIELD,
            "Use Terms from Search Trends",
            FieldKind::Checkbox,
        )
        .default_value(false),
        FieldSpec::new(
            "max_skills",
            "Maximum Skills to Look Up",
            FieldKind::Integer { min: 1, max: 50 },
        )
        .default_value(30_i64)
        .advanced(),
        FieldSpec::new(
            "max_related",
            "Related Skills to Return",
            FieldKind::Integer { min: 5, max: 20 },
        )
        .default_value(10_i64),
    ]
}

/// Manual skills, then reused job skills, then reused trend terms.
/// Deduplicated case-insensitively in that order and capped at `max_skills`.
fn working_skills(inputs: &ModuleInputs, upstream: &UpstreamArtifacts) -> Vec<String> {
    let max_skills = inputs.count("max_skills", 30);
    let reused = |flag: &str, source: &Option<Vec<String>>| -> Vec<String> {
        if inputs.flag(flag) {
            source.clone().unwrap_or_default()
        } else {
            Vec::new()
        }
    };
    let from_jobs = reused(REUSE_FROM_JOBS_FIELD, &upstream.extracted_skills);
    let from_trends = reused(REUSE_FROM_TRENDS_FIELD, &upstream.trend_terms);

    let mut skills: Vec<String> = Vec::new();
    for candidate in inputs.list("skills").iter().chain(&from_jobs).chain(&from_trends) {
        let candidate = candidate.trim();
        if candidate.is_empty() || skills.iter().any(|s| s.eq_ignore_ascii_case(candidate)) {
            continue;
        }
        skills.push(candidate.to_string());
    }
    skills.truncate(max_skills);
    skills
}

fn input_skills_table(matches: &[(String, LightcastSkill)]) -> Table {
    let mut table = Table::new([
        "input",
        "skill_name",
        "lightcast_id",
        "skill_type",
        "category",
        "subcategory",
    ]);
    for (input, skill) in matches {
        table.push_row(vec![
            Cell::from(input.as_str()),
            Cell::from(skill.name.as_str()),
            Cell::from(skill.id.as_str()),
            Cell::from(skill.skill_type.as_str()),
            Cell::from(skill.category.as_str()),
            Cell::from(skill.subcategory.as_str()),
        ]);
    }
    table
}

fn related_skills_table(related: &[LightcastSkill]) -> Table {
    let mut table = Table::new([
        "skill_name",
        "lightcast_id",
        "skill_type",
        "category",
        "description",
    ]);
    for skill in related {
        table.push_row(vec![
            Cell::from(skill.name.as_str()),
            Cell::from(skill.id.as_str()),
            Cell::from(skill.skill_type.as_str()),
            Cell::from(skill.category.as_str()),
            Cell::from(lmi_core::truncate_chars(&skill.description, DESCRIPTION_MAX_CHARS)),
        ]);
    }
    table
}

#[async_trait]
impl Collector for SkillsCollector {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Skills
    }

    fn display_name(&self) -> &'static str {
        "Skill Taxonomy (Lightcast)"
    }

    fn description(&self) -> &'static str {
        "Normalise skills against the Lightcast Open Skills taxonomy and discover related skills."
    }

    fn input_fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Skills may be left blank when reusing upstream output.
    fn validate(&self, raw: &RawInputs) -> ValidationResult {
        let inputs = match resolve_inputs(&self.fields, raw) {
            Ok(inputs) => inputs,
            Err(result) => return result,
        };
        let mut result = ValidationResult::new();
        if inputs.list("skills").is_empty()
            && !inputs.flag(REUSE_FROM_JOBS_FIELD)
            && !inputs.flag(REUSE_FROM_TRENDS_FIELD)
        {
            result.add_error(
                "skills",
                "Enter at least one skill, or reuse skills from job postings or search trends",
            );
        }
        result
    }

    fn availability(&self) -> Availability {
        if self.client.is_some() {
            Availability::ready()
        } else {
            Availability::missing(
                "Lightcast credentials not configured. Set LIGHTCAST_CLIENT_ID and LIGHTCAST_CLIENT_SECRET",
            )
        }
    }

    async fn execute(&self, inputs: &ModuleInputs, upstream: &UpstreamArtifacts) -> ModuleResult {
        let started_at = Utc::now();
        let Some(client) = &self.client else {
            return ModuleResult::failed(vec![
                CollectorError::NotConfigured("Lightcast credentials").to_string()
            ])
            .timed(started_at);
        };

        let skills = working_skills(inputs, upstream);
        if skills.is_empty() {
            return ModuleResult::failed(vec![
                "No skills to look up: none entered and no upstream skills available".to_string(),
            ])
            .timed(started_at);
        }
        tracing::info!(count = skills.len(), "normalising skills against lightcast");

        if let Err(e) = client.token().await {
            tracing::error!(error = %e, "lightcast authentication failed");
            return ModuleResult::failed(vec![format!("Lightcast authentication failed: {e}")])
                .timed(started_at);
        }

        let mut warnings = Vec::new();
        let mut matches: Vec<(String, LightcastSkill)> = Vec::new();
        for (i, skill) in skills.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            match client.find_skill(skill).await {
                Ok(Some(found)) => {
                    tracing::debug!(input = %skill, id = %found.id, "normalised skill");
                    matches.push((skill.clone(), found));
                }
                Ok(None) => warnings.push(format!("Could not find skill: {skill}")),
                Err(e) => {
                    tracing::warn!(input = %skill, error = %e, "skill lookup failed");
                    warnings.push(format!("Error processing '{skill}': {e}"));
                }
            }
        }

        if matches.is_empty() {
            return ModuleResult::failed(vec![
                "No skills could be matched in the Lightcast taxonomy".to_string(),
            ])
            .with_warnings(warnings)
            .timed(started_at);
        }

        let mut errors = Vec::new();
        let mut tables = TableSet::new();
        tables.insert(INPUT_SKILLS_TABLE, input_skills_table(&matches));

        let ids: Vec<String> = matches.iter().map(|(_, s)| s.id.clone()).collect();
        let max_related = inputs.count("max_related", 10);
        let mut related_found = 0;
        match client.related_skills(&ids, max_related).await {
            Ok(related) => {
                related_found = related.len();
                if !related.is_empty() {
                    tables.insert(RELATED_SKILLS_TABLE, related_skills_table(&related));
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "related skills lookup failed");
                errors.push(format!("Could not fetch related skills: {e}"));
            }
        }

        ModuleResult::from_outcome(tables, errors, warnings)
            .with_metadata("input_skills", matches.len())
            .with_metadata("related_skills", related_found)
            .timed(started_at)
    }
}

#[cfg(test)]
mod tests {
    use lmi_core::InputValue;
    use serde_json::json;

    use super::*;

    fn collector() -> SkillsCollector {
        SkillsCollector::new(
            &HttpSettings::default(),
            None,
            Duration::ZERO,
            &Endpoints::default(),
        )
        .unwrap()
    }

    #[test]
    fn validate_requires_skills_without_reuse() {
        let raw = json!({"skills": ""});
        let result = collector().validate(raw.as_object().unwrap());
        assert!(result.error_for("skills").is_some());
    }

    #[test]
    fn validate_accepts_reuse_without_skills() {
        let raw = json!({"reuse_from_trends": true});
        assert!(collector().validate(raw.as_object().unwrap()).is_valid());
    }

    #[test]
    fn working_skills_merges_sources_in_order() {
        let inputs = ModuleInputs::from_iter([
            ("skills", InputValue::from(&["Python", "sql"][..])),
            (REUSE_FROM_JOBS_FIELD, InputValue::from(true)),
            (REUSE_FROM_TRENDS_FIELD, InputValue::from(true)),
            ("max_skills", InputValue::from(4_i64)),
        ]);
        let upstream = UpstreamArtifacts {
            extracted_skills: Some(vec!["SQL".into(), "Docker".into()]),
            trend_terms: Some(vec!["rust".into(), "go".into()]),
        };
        assert_eq!(
            working_skills(&inputs, &upstream),
            vec!["Python", "sql", "Docker", "rust"]
        );
    }

    #[test]
    fn working_skills_ignores_upstream_without_flags() {
        let inputs = ModuleInputs::from_iter([("skills", InputValue::from(&["Excel"][..]))]);
        let upstream = UpstreamArtifacts {
            extracted_skills: Some(vec!["SQL".into()]),
            trend_terms: None,
        };
        assert_eq!(working_skills(&inputs, &upstream), vec!["Excel"]);
    }

    #[test]
    fn unconfigured_collector_is_unavailable() {
        let availability = collector().availability();
        assert!(!availability.available);
        assert!(availability.reason.unwrap().contains("LIGHTCAST_CLIENT_ID"));
    }
}
