//! Coursera public catalog API (`courses.v1`).

use std::collections::HashMap;

use lmi_core::{retry_with_backoff, RetryPolicy};
use reqwest::{Client, Url};
use serde::Deserialize;

use super::Course;
use crate::error::CollectorError;
use crate::http::{endpoint, parse_base_url, send_json, HttpSettings};

const SERVICE: &str = "Coursera";
const COURSE_URL_PREFIX: &str = "https://www.coursera.org/learn/";
const FIELDS: &str = "name,slug,description,workload,partnerIds,certificates,domainTypes";

pub(super) struct CourseraClient {
    client: Client,
    courses_url: Url,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    elements: Vec<CatalogCourse>,
    #[serde(default)]
    linked: Linked,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogCourse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    description: String,
    workload: Option<String>,
    #[serde(default)]
    partner_ids: Vec<String>,
    #[serde(default)]
    certificates: Vec<String>,
    #[serde(default)]
    domain_types: Vec<DomainType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainType {
    domain_id: Option<String>,
    subdomain_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Linked {
    #[serde(rename = "partners.v1", default)]
    partners: Vec<Partner>,
}

#[derive(Debug, Deserialize)]
struct Partner {
    id: String,
    name: String,
}

impl CourseraClient {
    pub(super) fn new(settings: &HttpSettings, base_url: &str) -> Result<Self, CollectorError> {
        let base = parse_base_url(base_url)?;
        Ok(Self {
            client: settings.build_client()?,
            courses_url: endpoint(&base, "api/courses.v1")?,
            retry: settings.retry,
        })
    }

    pub(super) async fn search(
        &self,
        keywords: &str,
        limit: usize,
    ) -> Result<Vec<Course>, CollectorError> {
        let limit = limit.to_string();
        let body = retry_with_backoff(&self.retry, "coursera search", || {
            send_json(
                SERVICE,
                self.client.get(self.courses_url.clone()).query(&[
                    ("q", "search"),
                    ("query", keywords),
                    ("limit", limit.as_str()),
                    ("fields", FIELDS),
                    ("includes", "partnerIds"),
                ]),
            )
        })
        .await?;

        let response: CatalogResponse =
            serde_json::from_value(body).map_err(|e| CollectorError::Deserialize {
                context: "coursera courses.v1".to_string(),
                source: e,
            })?;
        Ok(to_courses(response))
    }
}

fn to_courses(response: CatalogResponse) -> Vec<Course> {
    let partners: HashMap<&str, &str> = response
        .linked
        .partners
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect();

    response
        .elements
        .iter()
        .filter(|c| !c.name.is_empty() && !c.slug.is_empty())
        .map(|c| {
            let provider = c
                .partner_ids
                .iter()
                .filter_map(|id| partners.get(id.as_str()).copied())
                .collect::<Vec<_>>()
                .join(", ");
            let mut skills: Vec<String> = Vec::new();
            for d in &c.domain_types {
                for id in [&d.domain_id, &d.subdomain_id].into_iter().flatten() {
                    let label = id.replace('-', " ");
                    if !skills.contains(&label) {
                        skills.push(label);
                    }
                }
            }
            Course {
                source: SERVICE.to_string(),
                title: c.name.clone(),
                provider,
                url: format!("{COURSE_URL_PREFIX}{}", c.slug),
                price: String::new(),
                duration: c.workload.clone().unwrap_or_default(),
                level: String::new(),
                rating: None,
                enrollments: None,
                description: c.description.clone(),
                skills: skills.join(", "),
                has_certificate: Some(!c.certificates.is_empty()),
                last_updated: String::new(),
            }
        })
        .collect()
}
