use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use reminder_bot::chat::ChatRouter;
use reminder_bot::clock::FixedClock;
use reminder_bot::daemon::{build_router, AppState};
use reminder_bot::reminders::ReminderStore;
use reminder_bot::services::reminders::ReminderService;
use reminder_bot::session::InMemoryPendingSchedules;

async fn make_app(token: &str) -> (TempDir, Router) {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("daemon.db").to_string_lossy().to_string();
    let store = Arc::new(ReminderStore::new(&db_path).await.unwrap());
    let now = NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let service = Arc::new(ReminderService::new(
        store,
        Arc::new(InMemoryPendingSchedules::new()),
        Arc::new(FixedClock::new(now)),
    ));
    let state = AppState {
        chat: Arc::new(ChatRouter::new(service)),
        token: token.to_string(),
    };
    (temp, build_router(state))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn say(app: &Router, user_id: i64, text: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/messages")
                .header("authorization", "Bearer token")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"user_id": user_id, "text": text}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["reply"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn daemon_health_and_auth() {
    let (_temp, app) = make_app("token").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/messages")
                .header("content-type", "application/json")
                .body(Body::from(json!({"user_id": 1, "text": "/start"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/reminders?user_id=1")
                .header("x-api-key", "token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn daemon_empty_token_fails_closed() {
    let (_temp, app) = make_app("").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/reminders?user_id=1")
                .header("authorization", "Bearer ")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_flow_over_messages_endpoint() {
    let (_temp, app) = make_app("token").await;

    let reply = say(&app, 42, "/remind").await;
    assert!(reply.contains("HH:MM"));

    let reply = say(&app, 42, "tomorrow-ish").await;
    assert!(reply.contains("didn't get that"));

    let reply = say(&app, 42, "18:45").await;
    assert!(reply.contains("what should I remind you about"));

    let reply = say(&app, 42, "water the plants").await;
    assert!(reply.contains("19.10 18:45"));
    assert!(reply.contains("water the plants"));

    let reply = say(&app, 42, "/myreminders").await;
    assert!(reply.contains("[19.10 18:45] water the plants - Pending"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/reminders?user_id=42")
                .header("authorization", "Bearer token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    let reminders = body["reminders"].as_array().unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0]["text"], "water the plants");
    assert_eq!(reminders[0]["sent"], false);
}

#[tokio::test]
async fn reminders_endpoints_schedule_delete_and_clear() {
    let (_temp, app) = make_app("token").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reminders")
                .header("authorization", "Bearer token")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"user_id": 7, "time": "25.12 09:30", "text": "gifts"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reminders")
                .header("authorization", "Bearer token")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"user_id": 7, "time": "31.02 09:30", "text": "never"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/reminders/{id}?user_id=8"))
                .header("authorization", "Bearer token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/reminders/{id}?user_id=7"))
                .header("authorization", "Bearer token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for time in ["10:00", "11:00"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reminders")
                    .header("authorization", "Bearer token")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"user_id": 7, "time": time, "text": "batch"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/reminders?user_id=7")
                .header("authorization", "Bearer token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], 2);
}
