use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::chat::ChatRouter;
use crate::clock::{SystemClock, Zone};
use crate::config::Config;
use crate::delivery::DeliveryJob;
use crate::error::{ReminderBotError, Result};
use crate::notifiers::build_notifier;
use crate::reminders::{Reminder, ReminderStore};
use crate::scheduler::Scheduler;
use crate::services::reminders::ReminderService;
use crate::session::InMemoryPendingSchedules;
use crate::telegram::{self, TelegramClient};

pub const BUILD_ID: &str = env!("REMINDER_BOT_BUILD_ID");

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatRouter>,
    pub token: String,
}

impl AppState {
    fn service(&self) -> &ReminderService {
        self.chat.service()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    build: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct MessageRequest {
    user_id: i64,
    text: String,
}

#[derive(Serialize)]
struct MessageResponse {
    reply: String,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: i64,
}

#[derive(Deserialize)]
struct ScheduleRequest {
    user_id: i64,
    time: String,
    text: String,
}

#[derive(Serialize)]
struct RemindersResponse {
    reminders: Vec<Reminder>,
}

#[derive(Serialize)]
struct DeletedResponse {
    deleted: usize,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/messages", post(post_message))
        .route(
            "/reminders",
            get(list_reminders)
                .post(schedule_reminder)
                .delete(clear_reminders),
        )
        .route("/reminders/{id}", delete(delete_reminder))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        build: BUILD_ID.to_string(),
    })
}

async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MessageRequest>,
) -> Response {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let reply = state.chat.handle(request.user_id, &request.text).await;
    Json(MessageResponse { reply }).into_response()
}

async fn list_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserQuery>,
) -> Response {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state.service().list_reminders(query.user_id).await {
        Ok(reminders) => Json(RemindersResponse { reminders }).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

async fn schedule_reminder(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ScheduleRequest>,
) -> Response {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    if request.text.trim().is_empty() {
        return bad_request("text must not be empty").into_response();
    }

    match state
        .service()
        .schedule_reminder(request.user_id, &request.time, &request.text)
        .await
    {
        Ok(reminder) => (StatusCode::CREATED, Json(reminder)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

async fn delete_reminder(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Response {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state.service().delete_reminder(query.user_id, id).await {
        Ok(true) => Json(DeletedResponse { deleted: 1 }).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("reminder {id} not found"),
            }),
        )
            .into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

async fn clear_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserQuery>,
) -> Response {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    match state.service().clear_reminders(query.user_id).await {
        Ok(deleted) => Json(DeletedResponse { deleted }).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn error_response(err: ReminderBotError) -> ApiError {
    let status = if err.is_recoverable() {
        StatusCode::BAD_REQUEST
    } else {
        tracing::error!(error = %err, "Request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn unauthorized() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "Unauthorized".to_string(),
        }),
    )
}

/// Accepts `Authorization: Bearer <token>` or `x-api-key: <token>`. An empty
/// configured token rejects everything.
fn authorize(headers: &HeaderMap, token: &str) -> std::result::Result<(), ApiError> {
    let expected_token = token.trim();
    if expected_token.is_empty() {
        return Err(unauthorized());
    }

    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let bearer = header.strip_prefix("Bearer ").unwrap_or("").trim();

    if bearer == expected_token || api_key.trim() == expected_token {
        Ok(())
    } else {
        Err(unauthorized())
    }
}

pub async fn run(config: Config, db_path: &str, host: &str, port: u16, token: &str) -> Result<()> {
    run_with_shutdown(
        config,
        db_path,
        host,
        port,
        token,
        futures::future::pending::<()>(),
    )
    .await
}

/// Opens the store, starts delivery and the optional Telegram transport, and
/// serves the HTTP API until `shutdown` resolves.
pub async fn run_with_shutdown<F>(
    config: Config,
    db_path: &str,
    host: &str,
    port: u16,
    token: &str,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sqlite_path = config.sqlite_path_or(db_path).to_string();
    tracing::info!(
        sqlite_path = %sqlite_path,
        notifier = ?config.effective_notifier(),
        poll_seconds = config.delivery.poll_seconds,
        build = BUILD_ID,
        "Starting reminder daemon"
    );

    let store = Arc::new(ReminderStore::new(&sqlite_path).await?);
    let clock = Arc::new(SystemClock::new(Zone::from_config(&config.timezone)?));
    let sessions = Arc::new(InMemoryPendingSchedules::new());
    let service = Arc::new(ReminderService::new(
        store.clone(),
        sessions,
        clock.clone(),
    ));
    let chat = Arc::new(ChatRouter::new(service));

    let gateway = build_notifier(&config)?;
    tracing::info!(gateway = gateway.name(), "Notification gateway ready");

    let mut scheduler = Scheduler::new();
    scheduler.register_job(Arc::new(DeliveryJob::from_config(
        store,
        gateway,
        clock,
        &config.delivery,
    )));
    scheduler.start();

    let (stop_tx, stop_rx) = watch::channel(false);
    let polling = match config.telegram_token() {
        Some(bot_token) => {
            let client = Arc::new(TelegramClient::new(
                bot_token,
                config.telegram.api_base_url.as_deref(),
            )?);
            Some(tokio::spawn(telegram::run_polling(
                client,
                chat.clone(),
                config.telegram.poll_timeout_seconds,
                stop_rx,
            )))
        }
        None => {
            tracing::info!("No Telegram token configured; chat is available over HTTP only");
            None
        }
    };

    if token.trim().is_empty() {
        tracing::warn!("No API token set; HTTP endpoints other than /health will reject requests");
    }

    let app = build_router(AppState {
        chat,
        token: token.to_string(),
    });

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
    tracing::info!(%addr, "Listening");

    let shutdown = async move {
        shutdown.await;
        tracing::info!("Shutdown requested");
        let _ = stop_tx.send(true);
        scheduler.stop().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;

    if let Some(handle) = polling {
        let _ = handle.await;
    }
    tracing::info!("Reminder daemon stopped");
    Ok(())
}
