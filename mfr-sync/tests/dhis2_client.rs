use chrono::NaiveDate;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{basic_auth, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mfr_sync::SyncError;
use mfr_sync::api::destination::{ImportStrategy, OrgUnit, OrgUnitStore};
use mfr_sync::api::resilience::RetryableError;
use mfr_sync::api::{Dhis2Client, ResilienceConfig};

fn fast_retry() -> ResilienceConfig {
    ResilienceConfig::builder()
        .max_attempts(3)
        .base_delay(Duration::from_millis(1))
        .jitter(false)
        .build()
}

fn client(server: &MockServer) -> Dhis2Client {
    Dhis2Client::new(format!("{}/api", server.uri()), "admin", "district", fast_retry()).unwrap()
}

fn unit(code: &str) -> OrgUnit {
    OrgUnit::new(
        format!("Facility {} Health Center", code),
        format!("Facility {} HC", code),
        code,
        NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
    )
}

#[tokio::test]
async fn test_find_by_code_filters_on_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/organisationUnits"))
        .and(query_param("filter", "code:eq:ET-1"))
        .and(query_param("paging", "false"))
        .and(basic_auth("admin", "district"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organisationUnits": [{
                "id": "Rp268JB6Ne4",
                "name": "Facility ET-1 Health Center",
                "code": "ET-1",
                "openingDate": "1994-01-01T00:00:00.000",
                "parent": {"id": "qtr8GGlm4gg"}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = client(&server).find_by_code("ET-1").await.unwrap().unwrap();
    assert_eq!(found.id.as_deref(), Some("Rp268JB6Ne4"));
    assert_eq!(found.parent_id.as_deref(), Some("qtr8GGlm4gg"));
}

#[tokio::test]
async fn test_find_by_code_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/organisationUnits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"organisationUnits": []})))
        .mount(&server)
        .await;

    assert!(client(&server).find_by_code("ET-404").await.unwrap().is_none());
}

#[tokio::test]
async fn test_transient_lookup_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/organisationUnits"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/organisationUnits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"organisationUnits": []})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client(&server).find_by_code("ET-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/organisationUnits"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).find_by_code("ET-1").await.unwrap_err();
    assert!(matches!(err, SyncError::DestinationFetch { status: Some(401), .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_create_returns_uid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/organisationUnits"))
        .and(body_partial_json(json!({
            "code": "ET-7",
            "openingDate": "1980-01-01",
            "parent": {"id": "parentUid01"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "httpStatus": "Created",
            "status": "OK",
            "response": {"uid": "newUid00001"}
        })))
        .mount(&server)
        .await;

    let id = client(&server)
        .create(&unit("ET-7").with_parent(Some("parentUid01".into())))
        .await
        .unwrap();
    assert_eq!(id, "newUid00001");
}

#[tokio::test]
async fn test_create_conflict_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/organisationUnits"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "httpStatus": "Conflict",
            "status": "ERROR",
            "response": {"errorReports": [{"message": "Property `code` with value `ET-7` is already taken"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).create(&unit("ET-7")).await.unwrap_err();
    assert_eq!(err.kind(), "DestinationWriteError");
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("already taken"));
}

#[tokio::test]
async fn test_import_uses_code_identifier_for_creates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/metadata"))
        .and(query_param("identifier", "CODE"))
        .and(query_param("importStrategy", "CREATE_AND_UPDATE"))
        .and(body_partial_json(json!({"organisationUnits": [{"code": "ET-1"}, {"code": "ET-2"}]})))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "status": "WARNING",
            "response": {
                "stats": {"created": 1, "updated": 0, "ignored": 1},
                "typeReports": [{"objectReports": [
                    {"index": 0, "uid": "uidET1", "errorReports": []},
                    {"index": 1, "errorReports": [{"message": "Invalid parent"}]}
                ]}]
            }
        })))
        .mount(&server)
        .await;

    let summary = client(&server)
        .import(&[unit("ET-1"), unit("ET-2")], ImportStrategy::CreateAndUpdate)
        .await
        .unwrap();
    assert_eq!(summary.imported.get("ET-1").map(String::as_str), Some("uidET1"));
    assert_eq!(summary.rejections.len(), 1);
    assert_eq!(summary.rejections[0].code.as_deref(), Some("ET-2"));
}

#[tokio::test]
async fn test_import_updates_by_uid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/metadata"))
        .and(query_param("identifier", "UID"))
        .and(query_param("importStrategy", "UPDATE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "response": {"stats": {"created": 0, "updated": 1, "ignored": 0}, "typeReports": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client(&server)
        .import(&[unit("ET-1").with_id("uidET1")], ImportStrategy::Update)
        .await
        .unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.imported.get("ET-1").map(String::as_str), Some("uidET1"));
}
