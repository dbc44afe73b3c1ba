use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reminder_cell::models::{CreateReminderRequest, ReminderError, ReminderFrequency};
use reminder_cell::services::reminders::ReminderService;
use shared_utils::test_utils::TestConfig;

fn service_for(server: &MockServer) -> ReminderService {
    let config = TestConfig::with_store_url(&server.uri()).to_app_config();
    ReminderService::new(&config)
}

#[tokio::test]
async fn create_reminder_inserts_undelivered_row() {
    let mock_server = MockServer::start().await;
    let owner_id = Uuid::new_v4();
    let reminder_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/medication_reminders"))
        .and(body_partial_json(json!({
            "owner_id": owner_id,
            "medication": "Amoxicillin",
            "frequency": "daily",
            "delivered": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": reminder_id,
            "owner_id": owner_id,
            "medication": "Amoxicillin",
            "due_at": "2025-06-02T08:00:00Z",
            "notes": "with food",
            "frequency": "daily",
            "delivered": false,
            "created_at": "2025-06-01T00:00:00Z",
            "updated_at": "2025-06-01T00:00:00Z"
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let reminder = service
        .create_reminder(
            owner_id,
            CreateReminderRequest {
                medication: "Amoxicillin".to_string(),
                due_at: Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
                notes: Some("with food".to_string()),
                frequency: ReminderFrequency::Daily,
            },
            "test-token",
        )
        .await
        .expect("reminder should be created");

    assert_eq!(reminder.id, reminder_id);
    assert_eq!(reminder.frequency, ReminderFrequency::Daily);
    assert!(!reminder.delivered);
}

#[tokio::test]
async fn create_reminder_requires_medication_name() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    let result = service
        .create_reminder(
            Uuid::new_v4(),
            CreateReminderRequest {
                medication: "   ".to_string(),
                due_at: Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
                notes: None,
                frequency: ReminderFrequency::Once,
            },
            "test-token",
        )
        .await;

    assert_matches!(result, Err(ReminderError::ValidationError(_)));
}

#[tokio::test]
async fn list_returns_owner_reminders_in_due_order() {
    let mock_server = MockServer::start().await;
    let owner_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/medication_reminders"))
        .and(query_param("owner_id", format!("eq.{}", owner_id)))
        .and(query_param("order", "due_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4(),
                "owner_id": owner_id,
                "medication": "Amoxicillin",
                "due_at": "2025-06-02T08:00:00Z",
                "notes": null,
                "frequency": "once",
                "delivered": false,
                "created_at": "2025-06-01T00:00:00Z",
                "updated_at": "2025-06-01T00:00:00Z"
            },
            {
                "id": Uuid::new_v4(),
                "owner_id": owner_id,
                "medication": "Metformin",
                "due_at": "2025-06-02T20:00:00Z",
                "notes": null,
                "frequency": "daily",
                "delivered": false,
                "created_at": "2025-06-01T00:00:00Z",
                "updated_at": "2025-06-01T00:00:00Z"
            }
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let reminders = service
        .list_for_owner(owner_id, "test-token")
        .await
        .expect("list should succeed");

    assert_eq!(reminders.len(), 2);
    assert_eq!(reminders[0].medication, "Amoxicillin");
}

#[tokio::test]
async fn delete_of_foreign_reminder_is_forbidden() {
    let mock_server = MockServer::start().await;

    // Owner filter matches nothing
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/medication_reminders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service
        .delete_reminder(Uuid::new_v4(), Uuid::new_v4(), "test-token")
        .await;

    assert_matches!(result, Err(ReminderError::NotOwner));
}

#[tokio::test]
async fn delete_removes_owned_reminder() {
    let mock_server = MockServer::start().await;
    let owner_id = Uuid::new_v4();
    let reminder_id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/medication_reminders"))
        .and(query_param("id", format!("eq.{}", reminder_id)))
        .and(query_param("owner_id", format!("eq.{}", owner_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": reminder_id,
            "owner_id": owner_id,
            "medication": "Amoxicillin",
            "due_at": "2025-06-02T08:00:00Z",
            "notes": null,
            "frequency": "once",
            "delivered": false,
            "created_at": "2025-06-01T00:00:00Z",
            "updated_at": "2025-06-01T00:00:00Z"
        }])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let result = service
        .delete_reminder(reminder_id, owner_id, "test-token")
        .await;
    assert!(result.is_ok());
}
