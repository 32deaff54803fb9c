//! Router-level tests for the medication tracker API.
//!
//! Requests go through the full router (extractors, error mapping, CORS)
//! via `tower::ServiceExt::oneshot`, backed by an in-memory store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use medtrack_core::{FileStore, KvStore, MemoryStore};
use medtrack_server::{api_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let router = api_router(AppState::new(store.clone()));
    (router, store)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-ID", user);
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn medications() -> Value {
    json!([
        {"id": "m3", "name": "Zinc", "timesPerDay": 1, "frequency": "daily", "daysOfWeek": []},
        {"id": "m1", "name": "Aspirin", "timesPerDay": 2, "frequency": "weekly", "daysOfWeek": ["1", "3"], "color": "#ff0000"},
        {"id": "m2", "name": "Iron", "timesPerDay": 1, "frequency": "every-other-day", "daysOfWeek": []}
    ])
}

#[tokio::test]
async fn get_data_for_new_user_is_empty() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"medications": [], "entries": {}}));
}

#[tokio::test]
async fn medications_roundtrip_preserves_order() {
    let (app, _) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/medications",
        Some("alice"),
        Some(json!({"medications": medications()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["medications"], medications());

    let (_, data) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    assert_eq!(data["medications"], medications());
}

#[tokio::test]
async fn medications_must_be_an_array() {
    let (app, store) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/medications",
        Some("alice"),
        Some(json!({"medications": {"id": "m1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(store.is_empty());
}

#[tokio::test]
async fn medications_roundtrip_keeps_unknown_fields_and_weekday_order() {
    let (app, _) = app();
    let sent = json!([{
        "id": "m1",
        "name": "A",
        "timesPerDay": 1,
        "frequency": "weekly",
        "daysOfWeek": [3, 1],
        "color": null,
        "notes": "with food"
    }, {
        "id": "m2",
        "name": "B"
    }]);
    let (status, body) = call(
        &app,
        "POST",
        "/api/medications",
        Some("alice"),
        Some(json!({"medications": sent.clone()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["medications"], sent);

    let (_, data) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    assert_eq!(data["medications"], sent);

    // Deleting one leaves the other untouched
    call(&app, "DELETE", "/api/medication/m1", Some("alice"), None).await;
    let (_, data) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    assert_eq!(data["medications"], json!([{"id": "m2", "name": "B"}]));
}

#[tokio::test]
async fn medications_elements_must_be_medications() {
    let (app, store) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/medications",
        Some("alice"),
        Some(json!({"medications": [{"id": "m1", "name": "A"}, {"name": "no id"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("medications[1]"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn huge_dose_index_is_bad_request() {
    let (app, store) = app();
    for index in [json!(64), json!(u64::MAX)] {
        for method in ["POST", "PUT", "DELETE"] {
            let (status, body) = call(
                &app,
                method,
                "/api/entry",
                Some("alice"),
                Some(json!({
                    "date": "2024-03-04",
                    "medicationId": "m1",
                    "taken": true,
                    "timestamp": "2024-03-04T08:00:00.000Z",
                    "doseIndex": index
                })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, index);
            assert!(body["error"].as_str().unwrap().contains("doseIndex"));
        }
    }
    assert!(store.is_empty());

    // The server is still answering
    let (status, _) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn record_then_get_preserves_dose_exactly() {
    let (app, _) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/entry",
        Some("alice"),
        Some(json!({
            "date": "2024-03-04",
            "medicationId": "m1",
            "taken": false,
            "timestamp": "2024-03-04T21:07:13.512Z",
            "doseIndex": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["entry"]["m1"]["doses"][0], Value::Null);

    let (_, data) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    let doses = &data["entries"]["2024-03-04"]["m1"]["doses"];
    assert_eq!(
        doses,
        &json!([null, null, {"taken": false, "timestamp": "2024-03-04T21:07:13.512Z"}])
    );
}

#[tokio::test]
async fn record_requires_date_medication_and_taken() {
    let (app, store) = app();
    for body in [
        json!({"medicationId": "m1", "taken": true}),
        json!({"date": "2024-03-04", "taken": true}),
        json!({"date": "2024-03-04", "medicationId": "m1"}),
    ] {
        let (status, response) = call(&app, "POST", "/api/entry", Some("alice"), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response["error"].as_str().unwrap().contains("required"));
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let (app, _) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/entry",
        Some("alice"),
        Some(json!({"date": "yesterday", "medicationId": "m1", "taken": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/api/entry")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_missing_dose_is_404_and_creates_nothing() {
    let (app, store) = app();
    let update = json!({
        "date": "2024-03-04",
        "medicationId": "m1",
        "timestamp": "2024-03-04T09:00:00.000Z",
        "doseIndex": 1
    });

    let (status, body) = call(&app, "PUT", "/api/entry", Some("alice"), Some(update.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
    assert!(store.is_empty());

    // Day exists, slot 1 does not
    call(
        &app,
        "POST",
        "/api/entry",
        Some("alice"),
        Some(json!({"date": "2024-03-04", "medicationId": "m1", "taken": true, "timestamp": "t0"})),
    )
    .await;
    let (status, _) = call(&app, "PUT", "/api/entry", Some("alice"), Some(update)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, data) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    assert_eq!(
        data["entries"]["2024-03-04"]["m1"]["doses"],
        json!([{"taken": true, "timestamp": "t0"}])
    );
}

#[tokio::test]
async fn update_changes_only_timestamp() {
    let (app, _) = app();
    call(
        &app,
        "POST",
        "/api/entry",
        Some("alice"),
        Some(json!({"date": "2024-03-04", "medicationId": "m1", "taken": false, "timestamp": "t0"})),
    )
    .await;

    let (status, body) = call(
        &app,
        "PUT",
        "/api/entry",
        Some("alice"),
        Some(json!({"date": "2024-03-04", "medicationId": "m1", "timestamp": "t1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["entry"]["m1"]["doses"][0],
        json!({"taken": false, "timestamp": "t1"})
    );
}

#[tokio::test]
async fn clearing_last_dose_removes_the_day() {
    let (app, store) = app();
    for index in [0, 1] {
        call(
            &app,
            "POST",
            "/api/entry",
            Some("alice"),
            Some(json!({"date": "2024-03-04", "medicationId": "m1", "taken": true, "doseIndex": index})),
        )
        .await;
    }
    call(
        &app,
        "POST",
        "/api/entry",
        Some("alice"),
        Some(json!({"date": "2024-03-05", "medicationId": "m1", "taken": true})),
    )
    .await;

    let clear = |index: usize| json!({"date": "2024-03-04", "medicationId": "m1", "doseIndex": index});

    let (status, body) = call(&app, "DELETE", "/api/entry", Some("alice"), Some(clear(0))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
    let (_, data) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    assert_eq!(
        data["entries"]["2024-03-04"]["m1"]["doses"][0],
        Value::Null
    );

    call(&app, "DELETE", "/api/entry", Some("alice"), Some(clear(1))).await;
    let (_, data) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    assert!(data["entries"].get("2024-03-04").is_none());
    assert!(data["entries"].get("2024-03-05").is_some());
    assert!(store
        .get("user:alice:entries:2024-03-04")
        .unwrap()
        .is_none());

    // Idempotent
    let (status, _) = call(&app, "DELETE", "/api/entry", Some("alice"), Some(clear(1))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn delete_medication_keeps_history_and_is_idempotent() {
    let (app, _) = app();
    call(
        &app,
        "POST",
        "/api/medications",
        Some("alice"),
        Some(json!({"medications": medications()})),
    )
    .await;
    call(
        &app,
        "POST",
        "/api/entry",
        Some("alice"),
        Some(json!({"date": "2024-03-04", "medicationId": "m1", "taken": true})),
    )
    .await;

    for _ in 0..2 {
        let (status, body) = call(&app, "DELETE", "/api/medication/m1", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    let (_, data) = call(&app, "GET", "/api/data", Some("alice"), None).await;
    let ids: Vec<_> = data["medications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["m3", "m2"]);
    assert!(data["entries"]["2024-03-04"]["m1"].is_object());
}

#[tokio::test]
async fn users_are_partitioned_by_header() {
    let (app, _) = app();
    call(
        &app,
        "POST",
        "/api/medications",
        Some("alice"),
        Some(json!({"medications": medications()})),
    )
    .await;

    let (_, bob) = call(&app, "GET", "/api/data", Some("bob"), None).await;
    assert_eq!(bob["medications"], json!([]));
}

#[tokio::test]
async fn missing_header_uses_configured_fallback() {
    let store = Arc::new(MemoryStore::new());
    let app = api_router(AppState::new(store.clone()).with_fallback_user(Some("household".into())));

    call(
        &app,
        "POST",
        "/api/entry",
        None,
        Some(json!({"date": "2024-03-04", "medicationId": "m1", "taken": true})),
    )
    .await;

    assert!(store
        .get("user:household:entries:2024-03-04")
        .unwrap()
        .is_some());
    let (_, data) = call(&app, "GET", "/api/data", Some("household"), None).await;
    assert!(data["entries"]["2024-03-04"].is_object());
}

#[tokio::test]
async fn missing_header_without_fallback_gets_anonymous_partition() {
    let (app, store) = app();
    call(
        &app,
        "POST",
        "/api/entry",
        None,
        Some(json!({"date": "2024-03-04", "medicationId": "m1", "taken": true})),
    )
    .await;

    let keys = store.list("user:anonymous-").unwrap();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].ends_with(":entries:2024-03-04"));
}

#[tokio::test]
async fn cors_is_open_to_any_origin() {
    let (app, _) = app();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/entry")
        .header("Origin", "https://calendar.example")
        .header("Access-Control-Request-Method", "DELETE")
        .header("Access-Control-Request-Headers", "x-user-id,content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/api/nothing-here", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn file_store_backend_persists_across_routers() {
    let temp_dir = tempfile::tempdir().unwrap();
    let make_app = || {
        let store = FileStore::open(temp_dir.path()).unwrap();
        api_router(AppState::new(Arc::new(store)))
    };

    let first = make_app();
    call(
        &first,
        "POST",
        "/api/entry",
        Some("alice"),
        Some(json!({"date": "2024-03-04", "medicationId": "m1", "taken": true, "timestamp": "t"})),
    )
    .await;

    let second = make_app();
    let (_, data) = call(&second, "GET", "/api/data", Some("alice"), None).await;
    assert_eq!(
        data["entries"]["2024-03-04"]["m1"]["doses"],
        json!([{"taken": true, "timestamp": "t"}])
    );
}
