//! The four data collectors: job postings, online courses, search trends,
//! and Lightcast skill normalisation.
//!
//! Each collector implements [`lmi_core::Collector`] and owns its HTTP
//! clients. Upstream base URLs are injectable through [`Endpoints`] so the
//! integration tests can point every collector at a wiremock server.

pub mod courses;
pub mod error;
pub mod http;
pub mod jobs;
pub mod skills;
pub mod trends;

mod serpapi;

use std::sync::Arc;

use lmi_core::{AppConfig, Collector};

pub use courses::CoursesCollector;
pub use error::CollectorError;
pub use http::HttpSettings;
pub use jobs::JobsCollector;
pub use skills::SkillsCollector;
pub use trends::TrendsCollector;

/// Base URLs of every upstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub serpapi: String,
    pub bls: String,
    pub coursera: String,
    pub edx: String,
    pub lightcast_auth: String,
    pub lightcast_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            serpapi: "https://serpapi.com".to_string(),
            bls: "https://api.bls.gov".to_string(),
            coursera: "https://api.coursera.org".to_string(),
            edx: "https://www.edx.org".to_string(),
            lightcast_auth: "https://auth.emsicloud.com".to_string(),
            lightcast_api: "https://emsiservices.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Every service at the same base URL.
    #[must_use]
    pub fn all(base_url: &str) -> Self {
        Self {
            serpapi: base_url.to_string(),
            bls: base_url.to_string(),
            coursera: base_url.to_string(),
            edx: base_url.to_string(),
            lightcast_auth: base_url.to_string(),
            lightcast_api: base_url.to_string(),
        }
    }
}

/// Builds all four collectors in canonical order.
///
/// # Errors
///
/// Returns [`CollectorError`] if an HTTP client or endpoint URL cannot be
/// constructed. Missing credentials are not an error; the affected
/// collector reports itself unavailable.
pub fn build_collectors(config: &AppConfig) -> Result<Vec<Arc<dyn Collector>>, CollectorError> {
    build_collectors_with(config, &Endpoints::default())
}

/// [`build_collectors`] against custom endpoints.
///
/// # Errors
///
/// See [`build_collectors`].
pub fn build_collectors_with(
    config: &AppConfig,
    endpoints: &Endpoints,
) -> Result<Vec<Arc<dyn Collector>>, CollectorError> {
    let settings = HttpSettings::from_config(config);
    let serpapi_key = config.serpapi_key.as_deref();

    Ok(vec![
        Arc::new(JobsCollector::new(
            &settings,
            serpapi_key,
            config.bls_api_key.clone(),
            endpoints,
        )?),
        Arc::new(CoursesCollector::new(&settings, endpoints)?),
        Arc::new(TrendsCollector::new(&settings, serpapi_key, endpoints)?),
        Arc::new(SkillsCollector::new(
            &settings,
            config.lightcast.clone(),
            std::time::Duration::from_millis(config.lightcast_request_delay_ms),
            endpoints,
        )?),
    ])
}
