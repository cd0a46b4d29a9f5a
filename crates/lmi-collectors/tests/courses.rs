//! Integration tests for `CoursesCollector` against mocked Coursera and edX.

use lmi_collectors::{CoursesCollector, Endpoints, HttpSettings};
use lmi_core::{Collector, InputValue, ModuleInputs, ModuleStatus, RetryPolicy, UpstreamArtifacts};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn collector(server: &MockServer) -> CoursesCollector {
    let settings = HttpSettings {
        timeout_secs: 5,
        user_agent: "lmi-test".to_string(),
        retry: RetryPolicy::none(),
    };
    CoursesCollector::new(&settings, &Endpoints::all(&server.uri()))
        .expect("collector construction should not fail")
}

fn inputs(sources: &[&str], certificates_only: bool) -> ModuleInputs {
    ModuleInputs::from_iter([
        ("keywords", InputValue::from("data analysis")),
        ("max_results", InputValue::from(15_i64)),
        ("sources", InputValue::from(sources)),
        ("level", InputValue::from("all")),
        ("include_certificates", InputValue::from(certificates_only)),
    ])
}

async fn mount_coursera(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/courses.v1"))
        .and(query_param("q", "search"))
        .and(query_param("query", "data analysis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "elements": [
                {"slug": "data-analysis-python", "name": "Data Analysis with Python",
                 "partnerIds": ["7"], "certificates": ["Specialization"]},
                {"slug": "intro-stats", "name": "Intro to Statistics", "partnerIds": []}
            ],
            "linked": {"partners.v1": [{"id": "7", "name": "IBM"}]}
        })))
        .mount(server)
        .await;
}

fn edx_page() -> String {
    r#"<html><head>
    <script type="application/ld+json">
    [{"@type": "Course", "name": "Data Analysis Essentials", "url": "/learn/data-analysis/essentials",
      "provider": {"name": "MITx"}, "offers": {"price": 49, "priceCurrency": "USD"}}]
    </script></head><body></body></html>"#
        .to_string()
}

#[tokio::test]
async fn execute_merges_both_sources() {
    let server = MockServer::start().await;
    mount_coursera(&server).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("tab", "course"))
        .respond_with(ResponseTemplate::new(200).set_body_string(edx_page()))
        .mount(&server)
        .await;

    let result = collector(&server)
        .execute(&inputs(&["coursera", "edx"], false), &UpstreamArtifacts::none())
        .await;

    assert_eq!(result.status, ModuleStatus::Completed, "{:?}", result.errors);
    let courses = result.tables.get("Courses").expect("courses table");
    assert_eq!(
        courses.text_column("source"),
        vec!["Coursera", "Coursera", "edX"]
    );
    assert_eq!(
        courses.text_column("url")[2],
        format!("{}/learn/data-analysis/essentials", server.uri())
    );
}

#[tokio::test]
async fn one_failing_source_gives_partial() {
    let server = MockServer::start().await;
    mount_coursera(&server).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = collector(&server)
        .execute(&inputs(&["coursera", "edx"], false), &UpstreamArtifacts::none())
        .await;

    assert_eq!(result.status, ModuleStatus::Partial);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("edX: "));
    assert_eq!(result.row_count(), 2);
}

#[tokio::test]
async fn all_sources_failing_gives_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = collector(&server)
        .execute(&inputs(&["coursera", "edx"], false), &UpstreamArtifacts::none())
        .await;

    assert_eq!(result.status, ModuleStatus::Failed);
    assert_eq!(result.errors.len(), 2);
    assert!(result.tables.is_empty());
}

#[tokio::test]
async fn certificate_filter_drops_courses_without_one() {
    let server = MockServer::start().await;
    mount_coursera(&server).await;

    let result = collector(&server)
        .execute(&inputs(&["coursera"], true), &UpstreamArtifacts::none())
        .await;

    let courses = result.tables.get("Courses").expect("courses table");
    assert_eq!(courses.text_column("title"), vec!["Data Analysis with Python"]);
}

#[tokio::test]
async fn empty_search_completes_with_warning() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/courses.v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"elements": []})))
        .mount(&server)
        .await;

    let result = collector(&server)
        .execute(&inputs(&["coursera"], false), &UpstreamArtifacts::none())
        .await;

    assert_eq!(result.status, ModuleStatus::Completed);
    assert!(result.tables.is_empty());
    assert!(result.warnings.iter().any(|w| w.contains("No courses found")));
}
