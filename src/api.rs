// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::metrics::Metrics;
use crate::notify::{DealMessage, Notifier};
use crate::validate::DealValidator;

#[derive(Clone)]
pub struct AppState {
    pub notifier: Arc<dyn Notifier>,
    pub validator: Arc<DealValidator>,
}

impl AppState {
    pub fn new(notifier: Arc<dyn Notifier>, validator: DealValidator) -> Self {
        Self {
            notifier,
            validator: Arc::new(validator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "OK" }))
        .route("/health/notifier", get(notifier_health))
        .route("/send", post(send))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Same as [`router`] plus `/metrics`.
pub fn router_with_metrics(state: AppState, metrics: &Metrics) -> Router {
    router(state).merge(metrics.router())
}

#[derive(serde::Deserialize)]
struct SendReq {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "deal-notifier",
        "status": "live",
        "endpoints": {
            "POST /send": "Send deal notification",
            "GET /health": "Liveness check",
            "GET /health/notifier": "Notification channel connectivity",
            "GET /": "This page"
        },
        "usage": {
            "send_deal": {
                "method": "POST",
                "url": "/send",
                "body": {
                    "title": "Deal title (required)",
                    "url": "Deal URL (required)",
                    "price": "Price (optional)",
                    "description": "Description (optional)"
                }
            }
        }
    }))
}

async fn notifier_health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.notifier.test_connection().await {
        (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "notifier": state.notifier.name(),
                "timestamp": now_iso(),
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": "notifier connection failed" })),
        )
    }
}

async fn send(
    State(state): State<AppState>,
    body: Result<Json<SendReq>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Ok(Json(req)) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No JSON data provided" })),
        );
    };

    let title = req.title.unwrap_or_default();
    let url = req.url.unwrap_or_default();
    if title.trim().is_empty() || url.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required fields: title and url" })),
        );
    }

    tracing::info!(target: "api", %title, "received deal notification request");

    let verdict = state.validator.validate_deal(
        &title,
        &url,
        req.price.as_deref(),
        req.description.as_deref(),
    );
    if !verdict.is_valid() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "Deal failed validation",
                "errors": verdict.error_messages(),
                "warnings": verdict.warnings,
            })),
        );
    }

    let msg = DealMessage {
        title,
        url,
        price: req.price,
        description: req.description,
    };
    match state.notifier.send_deal(&msg).await {
        Ok(out) => {
            let mut body = match out.raw {
                Value::Object(map) => Value::Object(map),
                other => json!({ "ok": out.accepted, "response": other }),
            };
            body["timestamp"] = json!(now_iso());
            body["processed"] = json!(true);
            body["warnings"] = json!(verdict.warnings);
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            tracing::error!(target: "api", error = %format!("{e:#}"), "error processing deal request");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string(), "ok": false })),
            )
        }
    }
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}
