use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{DoctorError, PublishAvailabilityRequest, SlotEntry};
use doctor_cell::router::doctor_routes;
use doctor_cell::services::AvailabilityService;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestUser};

fn mock_config(mock_server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: mock_server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_service_key: "test-service-key".to_string(),
        supabase_jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
    }
}

fn create_test_app(config: AppConfig) -> Router {
    doctor_routes(Arc::new(config))
}

#[tokio::test]
async fn test_list_doctors_public() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let doctor_id = uuid::Uuid::new_v4().to_string();
    let user_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, &user_id)
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json_response["total"], 1);
    assert_eq!(json_response["doctors"][0]["id"], doctor_id.as_str());
    assert_eq!(json_response["doctors"][0]["user"]["name"], "Test User");
}

#[tokio::test]
async fn test_get_doctor_not_found() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/{}", uuid::Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_doctor_without_profile_embed_is_an_error() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let doctor_id = uuid::Uuid::new_v4().to_string();

    // Doctor row whose user relation came back null.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": doctor_id,
            "user_id": uuid::Uuid::new_v4().to_string(),
            "specialty": "Cardiology",
            "experience": null,
            "education": null,
            "bio": null,
            "created_at": "2024-01-01T00:00:00Z",
            "user": null
        }])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/{}", doctor_id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(
        json_response["error"],
        "Doctor record has no linked user profile"
    );
}

#[tokio::test]
async fn test_available_times_via_rpc() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_available_time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "start_time": "09:00:00", "end_time": "09:30:00" },
            { "start_time": "2025-06-02T14:30:00+00:00", "end_time": "2025-06-02T15:00:00+00:00" }
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/{}/availability?date=2025-06-02", uuid::Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json_response["available_times"], json!(["09:00", "14:30"]));
}

#[tokio::test]
async fn test_available_times_falls_back_to_table() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let doctor_id = uuid::Uuid::new_v4().to_string();

    // Function is missing on this database.
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_available_time_slots"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "function public.get_available_time_slots does not exist"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("is_available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_slot_response(&doctor_id, "2025-06-02", "10:00:00", "10:30:00")
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/{}/availability?date=2025-06-02", doctor_id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json_response["available_times"], json!(["10:00"]));
}

#[tokio::test]
async fn test_publish_availability_requires_auth() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/availability", uuid::Uuid::new_v4()))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "date": "2025-06-02", "slots": [] }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_publish_availability_as_admin() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let doctor_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("date", "eq.2025-06-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::availability_slot_response(&doctor_id, "2025-06-02", "09:00:00", "09:30:00"),
            MockSupabaseResponses::availability_slot_response(&doctor_id, "2025-06-02", "09:30:00", "10:00:00")
        ])))
        .mount(&mock_server)
        .await;

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));

    let app = create_test_app(config);

    let payload = json!({
        "date": "2025-06-02",
        "slots": [
            { "start_time": "09:00", "end_time": "09:30", "is_available": true },
            { "start_time": "09:30", "end_time": "10:00", "is_available": true },
            { "start_time": "10:00", "end_time": "10:30", "is_available": false }
        ]
    });

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/availability", doctor_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json_response["published"], 2);
}

#[tokio::test]
async fn test_publish_availability_rejects_duplicate_starts() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));

    let app = create_test_app(config);

    let payload = json!({
        "date": "2025-06-02",
        "slots": [
            { "start_time": "09:00", "end_time": "09:30", "is_available": true },
            { "start_time": "09:00:00", "end_time": "10:00", "is_available": true }
        ]
    });

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/availability", uuid::Uuid::new_v4()))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_publish_availability_rejects_inverted_slot() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));

    let app = create_test_app(config);

    let payload = json!({
        "date": "2025-06-02",
        "slots": [
            { "start_time": "10:00", "end_time": "09:30", "is_available": true }
        ]
    });

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/availability", uuid::Uuid::new_v4()))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_publish_availability_forbidden_for_other_doctor() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let doctor_id = uuid::Uuid::new_v4().to_string();
    let owner_user_id = uuid::Uuid::new_v4().to_string();

    // The doctor row belongs to someone else.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, &owner_user_id)
        ])))
        .mount(&mock_server)
        .await;

    let intruder = TestUser::doctor("other@example.com");
    let token = JwtTestUtils::create_test_token(&intruder, &config.supabase_jwt_secret, Some(24));

    let app = create_test_app(config);

    let payload = json!({
        "date": "2025-06-02",
        "slots": [
            { "start_time": "09:00", "end_time": "09:30", "is_available": true }
        ]
    });

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/availability", doctor_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_claim_slot_conflict_when_already_taken() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    // Conditional update matches no rows: someone got there first.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("is_available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let result = service
        .claim_slot(
            &uuid::Uuid::new_v4().to_string(),
            "2025-06-02".parse().unwrap(),
            "09:00",
            "some-token",
        )
        .await;

    assert_matches!(result, Err(DoctorError::SlotTaken));
}

#[tokio::test]
async fn test_claim_slot_success_marks_unavailable() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let doctor_id = uuid::Uuid::new_v4().to_string();
    let mut row =
        MockSupabaseResponses::availability_slot_response(&doctor_id, "2025-06-02", "09:00:00", "09:30:00");
    row["is_available"] = json!(false);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("start_time", "eq.09:00"))
        .and(query_param("is_available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let slot = service
        .claim_slot(&doctor_id, "2025-06-02".parse().unwrap(), "09:00:00", "some-token")
        .await
        .unwrap();

    assert!(!slot.is_available);
    assert_eq!(slot.start_time, "09:00:00");
}

#[tokio::test]
async fn test_create_doctor_requires_admin_role() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.supabase_jwt_secret, Some(24));

    let app = create_test_app(config);

    let payload = json!({
        "email": "newdoc@example.com",
        "password": "long-enough-password",
        "name": "New Doctor",
        "specialty": "Dermatology"
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_doctor_as_admin() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let user_id = uuid::Uuid::new_v4().to_string();
    let doctor_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": user_id,
            "email": "newdoc@example.com"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::user_profile_response(&user_id)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": doctor_id,
            "user_id": user_id,
            "specialty": "Dermatology",
            "experience": null,
            "education": null,
            "bio": null,
            "created_at": "2024-01-01T00:00:00Z"
        }])))
        .mount(&mock_server)
        .await;

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));

    let app = create_test_app(config);

    let payload = json!({
        "email": "newdoc@example.com",
        "password": "long-enough-password",
        "name": "New Doctor",
        "specialty": "Dermatology"
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json_response["id"], doctor_id.as_str());
    assert_eq!(json_response["specialty"], "Dermatology");
}
