use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use upi_db::{create_pool, init_schema, DbCredentials, DbRuntimeSettings};
use upi_server::{app, AppState};
use upi_store::UpiStore;

fn setup_app() -> (Router, UpiStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let credentials = DbCredentials {
        name: dir.path().join("upi.db").to_string_lossy().into_owned(),
        ..DbCredentials::default()
    };
    let pool = create_pool(&credentials, DbRuntimeSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        init_schema(&conn).unwrap();
    }

    let store = UpiStore::new(pool);
    let router = app(AppState {
        store: store.clone(),
    });
    (router, store, dir)
}

fn break_store(store: &UpiStore) {
    store
        .pool()
        .get()
        .unwrap()
        .execute_batch("DROP TABLE upi;")
        .unwrap();
}

fn unique_upi_id(prefix: &str) -> String {
    format!("{}_{}@upi", prefix, &uuid::Uuid::new_v4().simple().to_string()[..6])
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (app, _store, _dir) = setup_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_then_list() {
    let (app, _store, _dir) = setup_app();
    let upi_id = unique_upi_id("testuser");

    let (status, body) = send(
        &app,
        "POST",
        "/upi/",
        Some(json!({"name": "Test User", "upi_id": upi_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "UPI created successfully");

    let (status, body) = send(&app, "GET", "/upi/", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().expect("list should be an array");
    let created = records
        .iter()
        .find(|r| r["name"] == "Test User")
        .expect("created record should be listed");
    assert_eq!(created["upi_id"], upi_id.as_str());
    assert!(created["id"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_list_empty() {
    let (app, _store, _dir) = setup_app();
    let (status, body) = send(&app, "GET", "/upi/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_create_invalid_input() {
    let (app, store, _dir) = setup_app();

    let (status, body) = send(
        &app,
        "POST",
        "/upi/",
        Some(json!({"name": "", "upi_id": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"].as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        "POST",
        "/upi/",
        Some(json!({"name": "Short", "upi_id": "abcd"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(store.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_validation_runs_before_store() {
    let (app, store, _dir) = setup_app();
    break_store(&store);

    // A broken store would answer 400; 422 proves it was never reached.
    let (status, _) = send(
        &app,
        "POST",
        "/upi/",
        Some(json!({"name": "", "upi_id": "abcde"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "PUT",
        "/upi/1",
        Some(json!({"name": "X", "upi_id": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_body_is_unprocessable() {
    let (app, _store, _dir) = setup_app();

    let request = Request::builder()
        .method("POST")
        .uri("/upi/")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&app, "POST", "/upi/", Some(json!({"name": "Only"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["loc"], json!(["body", "upi_id"]));
    assert_eq!(body["detail"][0]["type"], "missing");
}

#[tokio::test]
async fn test_mistyped_field_is_reported_by_name() {
    let (app, store, _dir) = setup_app();

    let (status, body) = send(
        &app,
        "PUT",
        "/upi/1",
        Some(json!({"name": 42, "upi_id": "abcde"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["loc"], json!(["body", "name"]));
    assert_eq!(body["detail"][0]["type"], "string_type");
    assert!(store.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_body_is_payload_too_large() {
    let (app, store, _dir) = setup_app();

    let (status, _) = send(
        &app,
        "POST",
        "/upi/",
        Some(json!({"name": "x".repeat(70 * 1024), "upi_id": "abcde"})),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(store.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_integer_id_is_unprocessable() {
    let (app, _store, _dir) = setup_app();
    let (status, body) = send(&app, "DELETE", "/upi/abc", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["loc"], json!(["path", "id"]));
}

#[tokio::test]
async fn test_update_existing() {
    let (app, store, _dir) = setup_app();
    store.create("Test User", "testuser@upi").unwrap();
    let id = store.list_all().unwrap()[0].id;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/upi/{id}"),
        Some(json!({"name": "Updated User", "upi_id": "updated@upi"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "UPI updated successfully");

    let records = store.list_all().unwrap();
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].name, "Updated User");
    assert_eq!(records[0].upi_id, "updated@upi");
}

#[tokio::test]
async fn test_update_missing_id_succeeds() {
    let (app, store, _dir) = setup_app();

    let (status, body) = send(
        &app,
        "PUT",
        "/upi/999999",
        Some(json!({"name": "X", "upi_id": "abcde"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "UPI updated successfully");
    assert!(store.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_existing() {
    let (app, store, _dir) = setup_app();
    store.create("Doomed", "doomed@upi").unwrap();
    store.create("Survivor", "survivor@upi").unwrap();
    let doomed = store
        .list_all()
        .unwrap()
        .into_iter()
        .find(|r| r.name == "Doomed")
        .unwrap();

    let (status, body) = send(&app, "DELETE", &format!("/upi/{}", doomed.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "UPI deleted successfully");

    let remaining = store.list_all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "Survivor");
}

#[tokio::test]
async fn test_delete_missing_id_succeeds() {
    let (app, _store, _dir) = setup_app();
    let (status, body) = send(&app, "DELETE", "/upi/999999", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "UPI deleted successfully");
}

#[tokio::test]
async fn test_store_failures_return_400_with_raw_message() {
    let (app, store, _dir) = setup_app();
    break_store(&store);

    let (status, body) = send(
        &app,
        "POST",
        "/upi/",
        Some(json!({"name": "Test User", "upi_id": "testuser@upi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("no such table: upi"));

    let (status, body) = send(
        &app,
        "PUT",
        "/upi/99999",
        Some(json!({"name": "Updated User", "upi_id": "updated@upi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("no such table"));

    let (status, body) = send(&app, "DELETE", "/upi/99999", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("no such table"));

    let (status, body) = send(&app, "GET", "/upi/", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("no such table"));
}
