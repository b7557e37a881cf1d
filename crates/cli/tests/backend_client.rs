//! ApiClient against a mocked migration backend.

use std::time::Duration;

use serde_json::{json, Map};
use url::Url;
use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use m204_cli::client::{ApiClient, ApiError};
use m204_cli::exit_code::ExitCode;
use m204_cli::poll::wait_for_analysis;
use m204_common::inventory::{InventoryTab, SaveRequest};
use m204_common::source_files::PollPolicy;
use m204_common::types::{AnalysisStatus, MermaidFixRequest, SourceType};

fn client(server: &MockServer) -> ApiClient {
    let base = Url::parse(&server.uri()).unwrap();
    ApiClient::new(base, Some(Duration::from_secs(5))).unwrap()
}

fn source_file(status: &str) -> serde_json::Value {
    json!({
        "id": "f1",
        "original_filename": "PAYROLL.M204",
        "source_type": "m204",
        "size": 2048,
        "analysis_status": status
    })
}

#[tokio::test]
async fn lists_projects_from_an_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "project_id": 7, "project_name": "Payroll", "description": "Nightly batch" },
                { "project_id": 8, "project_name": "Invoices" }
            ]
        })))
        .mount(&server)
        .await;

    let projects = client(&server).list_projects(100).await.unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].id, "7");
    assert_eq!(projects[0].name, "Payroll");
    assert_eq!(projects[1].description, "");
}

#[tokio::test]
async fn error_detail_and_status_reach_the_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Project not found" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/projects/"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{ "loc": ["body", "project_name"], "msg": "field required" }]
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    let err = api.get_project("99").await.unwrap_err();
    let api_error = err.chain().find_map(|cause| cause.downcast_ref::<ApiError>()).unwrap();
    assert_eq!(api_error.status, 404);
    assert!(format!("{err:#}").contains("Project not found (status 404)"));
    assert_eq!(ExitCode::from_error(&err), ExitCode::NotFound);

    let new_project = m204_common::dashboard::validate_new_project("Payroll", "Nightly").unwrap();
    let err = api.create_project(&new_project).await.unwrap_err();
    assert!(format!("{err:#}").contains("body.project_name: field required"));
    assert_eq!(ExitCode::from_error(&err), ExitCode::Usage);
}

#[tokio::test]
async fn unreachable_backend_maps_to_its_exit_code() {
    let api = ApiClient::new(Url::parse("http://127.0.0.1:9").unwrap(), Some(Duration::from_secs(2))).unwrap();
    let err = api.list_projects(10).await.unwrap_err();
    assert!(matches!(ExitCode::from_error(&err), ExitCode::Unreachable | ExitCode::Timeout));
}

#[tokio::test]
async fn uploads_one_file_with_its_source_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/7/upload_source_files/"))
        .and(body_string_contains("name=\"source_types\""))
        .and(body_string_contains("filename=\"PAYROLL.M204\""))
        .and(body_string_contains("BEGIN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([source_file("pending")])))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .upload_source_file("7", "PAYROLL.M204", b"BEGIN\nEND\n".to_vec(), SourceType::M204)
        .await
        .unwrap();
    assert_eq!(response[0]["original_filename"], "PAYROLL.M204");
}

#[tokio::test]
async fn file_content_is_json_or_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/source_files/f1/content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "BEGIN\nEND\n" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/source_files/f2/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string("//JOB1 JOB\n"))
        .mount(&server)
        .await;

    let api = client(&server);
    assert_eq!(api.source_file_content("f1").await.unwrap(), "BEGIN\nEND\n");
    assert_eq!(api.source_file_content("f2").await.unwrap(), "//JOB1 JOB\n");
}

#[tokio::test]
async fn missing_requirements_document_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/requirements/projects/7/latest-document"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "No document" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/requirements/projects/8/latest-document"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "document_id": 5,
            "project_id": 8,
            "markdown_content": "# Invoices\n"
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    assert!(api.latest_requirements("7").await.unwrap().is_none());
    let document = api.latest_requirements("8").await.unwrap().unwrap();
    assert_eq!(document.id.as_deref(), Some("5"));
    assert_eq!(document.content, "# Invoices\n");
}

#[tokio::test]
async fn saves_inventory_items_with_put() {
    let server = MockServer::start().await;
    let mut payload = Map::new();
    payload.insert("summary".into(), json!("Computes net pay"));
    payload.insert("isRunnableMain".into(), json!(true));

    Mock::given(method("PUT"))
        .and(path("/projects/7/metadata/procedures/42"))
        .and(body_json(json!({ "summary": "Computes net pay", "isRunnableMain": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "name": "CALCPAY",
            "type": "procedure",
            "summary": "Computes net pay",
            "isRunnableMain": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = SaveRequest { tab: InventoryTab::Procedures, item_id: "42".into(), payload };
    let saved = client(&server).save_inventory_item("7", &request).await.unwrap().unwrap();
    assert_eq!(saved.key(), "42");
    assert_eq!(saved.name(), "CALCPAY");
}

#[tokio::test]
async fn fix_mermaid_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analysis/fix-mermaid"))
        .and(body_json(json!({ "mermaid_code": "grph TD", "error_message": "unknown diagram type" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "fixed_code": "graph TD" })))
        .mount(&server)
        .await;

    let request = MermaidFixRequest { mermaid_code: "grph TD".into(), error_message: "unknown diagram type".into() };
    let response = client(&server).fix_mermaid(&request).await.unwrap();
    assert_eq!(response.fixed_code, "graph TD");
}

#[tokio::test]
async fn analysis_is_polled_until_settled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analysis/project/7/analyze-ordered"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "message": "Analysis started" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/7/source_files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([source_file("analyzing")])))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/7/source_files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([source_file("analyzed")])))
        .mount(&server)
        .await;

    let api = client(&server);
    api.analyze_ordered("7").await.unwrap();
    let policy = PollPolicy { initial_delay_ms: 0, per_file_delay_ms: 0, interval_ms: 0, max_attempts: 5, ..PollPolicy::default() };
    let outcome = wait_for_analysis(&policy, 1, || api.list_source_files("7")).await.unwrap();

    assert!(outcome.is_settled());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.files()[0].analysis_status, AnalysisStatus::Analyzed);
}

#[tokio::test]
async fn saved_copy_with_nulls_decodes_and_garbage_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/projects/7/metadata/procedures/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "name": "CALCPAY",
            "isRunnableMain": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/projects/7/metadata/procedures/43"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 43, "name": ["not", "a", "name"] })))
        .mount(&server)
        .await;

    let api = client(&server);
    let request = SaveRequest { tab: InventoryTab::Procedures, item_id: "42".into(), payload: Map::new() };
    let saved = api.save_inventory_item("7", &request).await.unwrap().unwrap();
    assert_eq!(saved.name(), "CALCPAY");

    let request = SaveRequest { tab: InventoryTab::Procedures, item_id: "43".into(), payload: Map::new() };
    assert!(api.save_inventory_item("7", &request).await.unwrap().is_none());
}
