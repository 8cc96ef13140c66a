use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use serial_test::serial;
use tower::ServiceExt;

mod common;

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health_reports_memory_storage() {
    let (_, app) = common::create_test_app();
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["storage"]["backend"], "memory");
    assert_eq!(body["dependencies"]["ai"]["providers"][0], "fixed");
}

#[tokio::test]
async fn session_routes_require_a_token() {
    let (_, app) = common::create_test_app();
    let (status, _) = call(&app, "GET", "/api/v1/sessions/abc", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, "GET", "/api/v1/sessions/abc", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_require_the_admin_role() {
    let (state, app) = common::create_test_app();
    let player = common::token(&state, "alice", "player");
    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/admin/sessions",
        Some(&player),
        Some(json!({ "title": "Mine" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_session_validates_input() {
    let (state, app) = common::create_test_app();
    let admin = common::admin_token(&state);

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/admin/sessions",
        Some(&admin),
        Some(json!({ "title": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Validation error"));

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/admin/sessions",
        Some(&admin),
        Some(json!({ "title": "Quiz", "maxParticipants": -3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["maxParticipants"], 200);
    assert_eq!(body["status"], "waiting");
}

#[tokio::test]
async fn full_round_over_http() {
    let (state, app) = common::create_test_app();
    let admin = common::admin_token(&state);
    let alice = common::token(&state, "alice", "player");
    let bob = common::token(&state, "bob", "player");

    let (status, session) = call(
        &app,
        "POST",
        "/api/v1/admin/sessions",
        Some(&admin),
        Some(json!({ "title": "Finals", "maxParticipants": 10, "revivalEnabled": true, "revivalCount": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = session["id"].as_str().unwrap().to_string();

    for token in [&alice, &bob] {
        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/v1/sessions/{}/join", id),
            Some(token),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/admin/sessions/{}/control", id),
        Some(&admin),
        Some(json!({ "action": "start" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");

    let (status, question) = call(
        &app,
        "POST",
        &format!("/api/v1/admin/sessions/{}/generate-question", id),
        Some(&admin),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let question_id = question["id"].as_str().unwrap().to_string();

    let (status, current) = call(
        &app,
        "GET",
        &format!("/api/v1/sessions/{}/current-question", id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["id"], question_id.as_str());
    assert!(current.get("correctAnswer").is_none());

    let (status, ack) = call(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/answers", id),
        Some(&alice),
        Some(json!({ "questionId": question_id, "selectedOption": common::CORRECT })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["isCorrect"], true);

    let (status, outcome) = call(
        &app,
        "POST",
        &format!("/api/v1/admin/sessions/{}/process-results", id),
        Some(&admin),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["survivors"][0]["userId"], "alice");
    assert_eq!(outcome["eliminated"][0]["userId"], "bob");
    assert_eq!(outcome["session"]["status"], "finished");

    // bob's late answer hits a finished session
    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/answers", id),
        Some(&bob),
        Some(json!({ "questionId": question_id, "selectedOption": common::CORRECT })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "session is not active");

    let (status, stats) = call(
        &app,
        "GET",
        &format!("/api/v1/admin/sessions/{}/stats", id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["participants"]["total"], 2);
    assert_eq!(stats["participants"]["eliminated"], 1);
    assert_eq!(stats["answers"]["correct"], 1);
    assert_eq!(stats["answers"]["correctRate"], 100.0);

    let (status, results) = call(
        &app,
        "GET",
        &format!("/api/v1/admin/sessions/{}/results", id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["session"]["status"], "finished");
    let standings = results["participants"].as_array().unwrap();
    assert_eq!(standings.len(), 2);
    let alice_row = standings.iter().find(|p| p["userId"] == "alice").unwrap();
    assert_eq!(alice_row["status"], "active");
    assert_eq!(alice_row["correctAnswers"], 1);
    assert!(alice_row["score"].as_u64().unwrap() > 0);
    let bob_row = standings.iter().find(|p| p["userId"] == "bob").unwrap();
    assert_eq!(bob_row["status"], "eliminated");
    assert!(!bob_row["eliminatedAt"].is_null());

    let (status, _) = call(
        &app,
        "GET",
        &format!("/api/v1/admin/sessions/{}/results", id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let (state, app) = common::create_test_app();
    let admin = common::admin_token(&state);

    let (status, body) = call(&app, "GET", "/api/v1/sessions/nope", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "session not found");

    let session = common::started_session(&state, &["a", "b"], false, 0).await;
    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/admin/sessions/{}/revival", session.id),
        Some(&admin),
        Some(json!({ "count": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/admin/sessions/{}/revival", session.id),
        Some(&admin),
        Some(json!({ "count": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/admin/sessions/{}/skip-question", session.id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/admin/sessions/{}/next-round", session.id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentRound"], 2);
}

#[tokio::test]
async fn responses_carry_a_trace_id() {
    let (_, app) = common::create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-trace-id", "trace-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-trace-id"], "trace-42");
}

#[tokio::test]
#[serial]
async fn metrics_require_basic_auth() {
    std::env::set_var("METRICS_AUTH", "ops:secret");
    let (_, app) = common::create_test_app();

    let (status, _) = call(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let credentials = general_purpose::STANDARD.encode("ops:secret");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header("authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&text).contains("http_requests_total"));

    std::env::remove_var("METRICS_AUTH");
}
