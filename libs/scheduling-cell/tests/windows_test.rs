use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::{CreateWindowRequest, SchedulingError, WindowStatus};
use scheduling_cell::services::windows::AvailabilityService;
use shared_utils::test_utils::TestConfig;

fn window_json(id: Uuid, provider_id: Uuid, start: &str, end: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "provider_id": provider_id,
        "start_time": start,
        "end_time": end,
        "status": status,
        "created_at": "2025-06-01T00:00:00Z",
        "updated_at": "2025-06-01T00:00:00Z"
    })
}

fn service_for(server: &MockServer) -> AvailabilityService {
    let config = TestConfig::with_store_url(&server.uri()).to_app_config();
    AvailabilityService::new(&config)
}

#[tokio::test]
async fn propose_window_inserts_free_window() {
    let mock_server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    let window_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([window_json(
            window_id,
            provider_id,
            "2025-06-02T10:00:00Z",
            "2025-06-02T11:00:00Z",
            "free"
        )])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let request = CreateWindowRequest {
        start_time: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap(),
    };

    let window = service
        .propose_window(provider_id, request, "test-token")
        .await
        .expect("window should be created");

    assert_eq!(window.id, window_id);
    assert_eq!(window.provider_id, provider_id);
    assert_eq!(window.status, WindowStatus::Free);
}

#[tokio::test]
async fn propose_window_rejects_overlap() {
    let mock_server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    // Store already holds a window intersecting the proposal
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([window_json(
            Uuid::new_v4(),
            provider_id,
            "2025-06-02T10:30:00Z",
            "2025-06-02T11:30:00Z",
            "free"
        )])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let request = CreateWindowRequest {
        start_time: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap(),
    };

    let result = service.propose_window(provider_id, request, "test-token").await;
    assert_matches!(result, Err(SchedulingError::OverlapConflict));
}

#[tokio::test]
async fn propose_window_rejects_short_duration_without_store_call() {
    // No mocks mounted: a 20-minute window must be rejected before any
    // store round-trip.
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    let request = CreateWindowRequest {
        start_time: Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 6, 2, 9, 20, 0).unwrap(),
    };

    let result = service
        .propose_window(Uuid::new_v4(), request, "test-token")
        .await;
    assert_matches!(result, Err(SchedulingError::InvalidDuration));
}

#[tokio::test]
async fn propose_window_rejects_inverted_range() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    let request = CreateWindowRequest {
        start_time: Utc.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(),
    };

    let result = service
        .propose_window(Uuid::new_v4(), request, "test-token")
        .await;
    assert_matches!(result, Err(SchedulingError::InvalidRange));
}

#[tokio::test]
async fn propose_window_accepts_touching_boundary() {
    let mock_server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    let window_id = Uuid::new_v4();

    // The half-open filter excludes a window ending exactly at the new start,
    // so the store reports no overlap.
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([window_json(
            window_id,
            provider_id,
            "2025-06-02T11:00:00Z",
            "2025-06-02T12:00:00Z",
            "free"
        )])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let request = CreateWindowRequest {
        start_time: Utc.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
    };

    let window = service
        .propose_window(provider_id, request, "test-token")
        .await
        .expect("touching window should be accepted");
    assert_eq!(window.id, window_id);
}

#[tokio::test]
async fn delete_window_removes_free_window() {
    let mock_server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    let window_id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("id", format!("eq.{}", window_id)))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("status", "eq.free"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([window_json(
            window_id,
            provider_id,
            "2025-06-02T10:00:00Z",
            "2025-06-02T11:00:00Z",
            "free"
        )])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service
        .delete_window(window_id, provider_id, "test-token")
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn delete_claimed_window_is_rejected() {
    let mock_server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    let window_id = Uuid::new_v4();

    // Guarded DELETE matches nothing
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // Follow-up read shows the window is ours but claimed
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("id", format!("eq.{}", window_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([window_json(
            window_id,
            provider_id,
            "2025-06-02T10:00:00Z",
            "2025-06-02T11:00:00Z",
            "claimed"
        )])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service
        .delete_window(window_id, provider_id, "test-token")
        .await;
    assert_matches!(result, Err(SchedulingError::WindowNotFree));
}

#[tokio::test]
async fn delete_foreign_window_reports_not_owner() {
    let mock_server = MockServer::start().await;
    let window_id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // Window exists but belongs to someone else; caller just sees NotOwner
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([window_json(
            window_id,
            Uuid::new_v4(),
            "2025-06-02T10:00:00Z",
            "2025-06-02T11:00:00Z",
            "free"
        )])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service
        .delete_window(window_id, Uuid::new_v4(), "test-token")
        .await;
    assert_matches!(result, Err(SchedulingError::NotOwner));
}

#[tokio::test]
async fn delete_missing_window_reports_not_owner() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service
        .delete_window(Uuid::new_v4(), Uuid::new_v4(), "test-token")
        .await;
    assert_matches!(result, Err(SchedulingError::NotOwner));
}
