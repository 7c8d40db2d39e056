//! Webhook server for the Courier Lead Bot
//!
//! Accepts Telegram-style updates, turns them into typed events and hands
//! them to the event router. The reply carries render instructions
//! (`outcome` + `screens`), not Bot API calls, so this server sits behind a
//! presentation layer: that layer owns the Telegram webhook registration,
//! forwards updates here, renders the screens and answers callback queries.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::dialogue::Event;
use crate::models::UserRef;
use crate::router::{EventRouter, InboundEvent};

/// =============================
/// Update Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelegramUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelegramMessage {
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelegramCallbackQuery {
    pub id: Option<String>,
    pub from: TelegramUser,
    pub data: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelegramUpdate {
    pub update_id: Option<i64>,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<TelegramCallbackQuery>,
}

impl TelegramUpdate {
    /// Button presses win over text; anything else carries nothing to route.
    pub fn into_inbound(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let data = query.data?;
            return Some(InboundEvent {
                user: user_ref(query.from),
                event: Event::from_callback(&data),
            });
        }

        let message = self.message?;
        let text = message.text?;
        let from = message.from?;
        Some(InboundEvent {
            user: user_ref(from),
            event: Event::from_text(&text),
        })
    }
}

fn user_ref(user: TelegramUser) -> UserRef {
    UserRef {
        id: user.id,
        username: user.username,
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub router: Arc<EventRouter>,
    pub bot_token: Arc<str>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<Value> {
    let snapshot = state.router.engine().cache().current_snapshot().ok();
    let status = if snapshot.is_some() { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "sessions": state.router.store().len().await,
        "income_records": snapshot.as_ref().map(|s| s.len()).unwrap_or(0),
        "income_loaded_at": snapshot.map(|s| s.loaded_at().to_rfc3339()),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Webhook Endpoint
/// =============================

async fn webhook(
    State(state): State<ApiState>,
    Path(token): Path<String>,
    Json(update): Json<TelegramUpdate>,
) -> (StatusCode, Json<Value>) {
    if token != *state.bot_token {
        return (StatusCode::NOT_FOUND, Json(json!({ "ok": false })));
    }

    let update_id = update.update_id;
    let Some(inbound) = update.into_inbound() else {
        debug!(?update_id, "Update has nothing to route");
        return (StatusCode::OK, Json(json!({ "ok": true })));
    };
    let user_id = inbound.user.id;

    match state.router.route(inbound).await {
        Ok(routed) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "outcome": routed.outcome,
                "screens": routed.screens,
            })),
        ),
        Err(e) => {
            error!(user_id, ?update_id, "Failed to route update: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(router: Arc<EventRouter>, bot_token: &str) -> Router {
    let state = ApiState {
        router,
        bot_token: Arc::from(bot_token),
    };

    Router::new()
        .route("/health", get(health))
        .route("/webhook/:token", post(webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    router: Arc<EventRouter>,
    bot_token: &str,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let app = create_router(router, bot_token);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Webhook server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::tests::{sample_records, FakeSource};
    use crate::cache::IncomeCache;
    use crate::dialogue::catalog::default_priority_cities;
    use crate::dialogue::DialogueEngine;
    use crate::leads::InMemoryLeadSink;
    use crate::session::InMemorySessionStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    const TOKEN: &str = "123:abc";

    /// Serve `app` on an ephemeral local port; returns its base URL.
    pub(crate) async fn serve_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}", addr)
    }

    async fn app(loaded: bool) -> Router {
        let source = if loaded {
            FakeSource::with_records(sample_records())
        } else {
            FakeSource::failing()
        };
        let cache = Arc::new(IncomeCache::new(Arc::new(source), Duration::from_secs(900)));
        if loaded {
            cache.refresh().await.unwrap();
        }

        let router = EventRouter::new(
            Arc::new(InMemorySessionStore::new()),
            DialogueEngine::new(cache, default_priority_cities()),
            Arc::new(InMemoryLeadSink::new()),
        );
        create_router(Arc::new(router), TOKEN)
    }

    async fn post_update(app: Router, path: &str, update: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(update.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn callback(user_id: i64, data: &str) -> Value {
        json!({
            "update_id": 1,
            "callback_query": {
                "id": "cb",
                "from": { "id": user_id, "username": "rider" },
                "data": data
            }
        })
    }

    #[test]
    fn test_update_parsing() {
        let update: TelegramUpdate = serde_json::from_value(json!({
            "update_id": 5,
            "message": { "from": { "id": 9 }, "text": "/start promo" }
        }))
        .unwrap();
        let inbound = update.into_inbound().unwrap();
        assert_eq!(inbound.user.id, 9);
        assert_eq!(inbound.event, Event::StartCommand);

        let update: TelegramUpdate =
            serde_json::from_value(json!({ "update_id": 6, "edited_message": {} })).unwrap();
        assert!(update.into_inbound().is_none());
    }

    #[tokio::test]
    async fn test_health_reports_cache_and_sessions() {
        let response = app(true)
            .await
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sessions"], 0);
        assert_eq!(body["income_records"], sample_records().len());
    }

    #[tokio::test]
    async fn test_wrong_token_is_not_found() {
        let (status, _) =
            post_update(app(true).await, "/webhook/nope", callback(1, "calc_income")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_routed_update_returns_screens() {
        let path = format!("/webhook/{}", TOKEN);
        let (status, body) = post_update(app(true).await, &path, callback(1, "calc_income")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["outcome"]["status"], "applied");
        assert_eq!(body["screens"][0]["screen"], "age_question");
    }

    #[tokio::test]
    async fn test_reply_is_render_instructions_only() {
        let path = format!("/webhook/{}", TOKEN);
        let (_, body) = post_update(app(true).await, &path, callback(3, "calc_income")).await;

        let mut keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["ok", "outcome", "screens"]);
        assert!(body.get("method").is_none());
    }

    #[tokio::test]
    async fn test_empty_update_is_acknowledged() {
        let path = format!("/webhook/{}", TOKEN);
        let (status, body) = post_update(app(true).await, &path, json!({ "update_id": 2 })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_unloaded_cache_is_a_server_error() {
        let app = app(false).await;
        let path = format!("/webhook/{}", TOKEN);

        for data in ["calc_income", "age_yes"] {
            let (status, _) = post_update(app.clone(), &path, callback(1, data)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = post_update(app, &path, callback(1, "citizenship_ru")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], false);
    }
}
