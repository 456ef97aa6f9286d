use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use cyclefit_backend::{cycle::CycleScheduler, routes, store::MemoryCycleStore};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let scheduler = Arc::new(CycleScheduler::new(Arc::new(MemoryCycleStore::new())));
    routes::router(scheduler)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/users",
        Some(json!({ "email": email, "name": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check() {
    let (status, body) = send(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("✅ Backend up".into()));
}

#[tokio::test]
async fn register_and_fetch_user() {
    let app = app();
    let user_id = register(&app, "ada@example.com").await;

    let (status, body) = send(&app, Method::GET, &format!("/user?user_id={user_id}"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["menstrual_length"], 5);
    assert_eq!(body["follicular_length"], 9);
    assert_eq!(body["ovulation_length"], 1);
    assert_eq!(body["luteal_length"], 13);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = app();
    register(&app, "ada@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/users",
        Some(json!({ "email": "ada@example.com" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already exists");
}

#[tokio::test]
async fn period_lifecycle_over_http() {
    let app = app();
    let user_id = register(&app, "ada@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/log-period/2025-01-01?user_id={user_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["cycle_is_new"], true);
    assert_eq!(body["message"], "New cycle created and period logged successfully");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/log-period/2025-01-02?user_id={user_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["cycle_is_new"], false);

    let (_, cycles) = send(&app, Method::GET, &format!("/cycles?user_id={user_id}"), None).await;
    let cycles = cycles.as_array().unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0]["start_date"], "2025-01-01");
    assert_eq!(cycles[0]["cycle_length"], 28);
    let cycle_id = cycles[0]["id"].as_str().unwrap();

    let (status, phases) = send(
        &app,
        Method::GET,
        &format!("/cycles/{cycle_id}/phases?user_id={user_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let phases = phases.as_array().unwrap();
    assert_eq!(phases.len(), 4);
    assert_eq!(phases[0]["phase"], "Menstrual");
    assert_eq!(phases[0]["end_date"], "2025-01-05");
    assert_eq!(phases[3]["phase"], "Luteal");
    assert_eq!(phases[3]["end_date"], "2025-01-28");

    let (_, dates) = send(
        &app,
        Method::GET,
        &format!("/period-dates?user_id={user_id}"),
        None,
    )
    .await;
    assert_eq!(dates, json!({ "period_dates": ["2025-01-01", "2025-01-02"] }));

    let (_, history) = send(
        &app,
        Method::GET,
        &format!("/period-history?user_id={user_id}"),
        None,
    )
    .await;
    assert_eq!(history[0]["start_date"], "2025-01-01");
    assert_eq!(history[0]["end_date"], "2025-01-02");

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/log-period/2025-01-01?user_id={user_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cycle_deleted"], true);

    let (_, cycles) = send(&app, Method::GET, &format!("/cycles?user_id={user_id}"), None).await;
    assert_eq!(cycles, json!([]));
}

#[tokio::test]
async fn cycle_data_reports_today() {
    let app = app();
    let user_id = register(&app, "ada@example.com").await;

    let (_, body) = send(&app, Method::GET, &format!("/cycle-data?user_id={user_id}"), None).await;
    assert_eq!(body["state"], "no_cycle");
    assert_eq!(body["current_phase"], Value::Null);

    let today = chrono::Utc::now().naive_utc().date();
    send(
        &app,
        Method::POST,
        &format!("/log-period/{today}?user_id={user_id}"),
        None,
    )
    .await;

    let (status, body) =
        send(&app, Method::GET, &format!("/cycle-data?user_id={user_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "in_cycle");
    assert_eq!(body["current_phase"], "Menstrual");
    assert_eq!(body["cycle_day"], 1);
    assert_eq!(body["cycle_length"], 28);
    assert_eq!(body["lower_intensity"], true);
}

#[tokio::test]
async fn update_user_rejects_bad_lengths() {
    let app = app();
    let user_id = register(&app, "ada@example.com").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/user?user_id={user_id}"),
        Some(json!({ "luteal_length": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Luteal"));

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/user?user_id={user_id}"),
        Some(json!({ "name": "Ada L.", "luteal_length": 14 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ada L.");
    assert_eq!(body["luteal_length"], 14);
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let app = app();
    let user_id = register(&app, "ada@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/log-period/01-02-2025?user_id={user_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid date format (expected YYYY-MM-DD)");

    let (status, _) = send(&app, Method::POST, "/log-period/2025-01-01", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = uuid::Uuid::new_v4();
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/log-period/2025-01-01?user_id={unknown}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user not found");

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/log-period/2025-01-01?user_id={user_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn symptoms_over_http() {
    let app = app();
    let user_id = register(&app, "ada@example.com").await;

    let (status, symptom) = send(
        &app,
        Method::POST,
        "/symptoms",
        Some(json!({ "name": "Cramps" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let symptom_id = symptom["id"].as_str().unwrap().to_string();

    let (_, catalog) = send(&app, Method::GET, "/symptoms", None).await;
    assert_eq!(catalog.as_array().unwrap().len(), 1);

    send(
        &app,
        Method::POST,
        &format!("/log-period/2025-01-01?user_id={user_id}"),
        None,
    )
    .await;

    let (status, day) = send(
        &app,
        Method::PUT,
        &format!("/log-period/2025-01-01/symptoms?user_id={user_id}"),
        Some(json!({ "symptom_ids": [symptom_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(day["symptoms"], json!(["Cramps"]));
    assert_eq!(day["phase"], "Menstrual");

    let (_, logs) = send(&app, Method::GET, &format!("/logs?user_id={user_id}"), None).await;
    assert_eq!(logs[0]["date"], "2025-01-01");
    assert_eq!(logs[0]["symptoms"], json!(["Cramps"]));
}
